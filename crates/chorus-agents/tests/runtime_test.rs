//! Integration coverage for the per-minion reactive loop: loop-avoidance
//! against system join/leave notices, per-channel response rate limiting,
//! and the error state reached after exhausted generator retries.

use async_trait::async_trait;
use chorus_agents::tools::{SendChannelMessageTool, ToolRegistry};
use chorus_agents::{AgentRuntime, AgentState};
use chorus_bus::EventBus;
use chorus_channels::ChannelService;
use chorus_common::domain::{ChannelType, MemberRole, Persona};
use chorus_common::generator::{GenerationConfig, GenerationOutcome, GeneratorError, ResponseGenerator, ToolDescriptor};
use chorus_common::repo::{InMemoryChannelRepository, InMemoryMessageRepository};
use chorus_memory::ConversationBuffer;
use chorus_mood::{EmotionalEngine, KeywordMoodHeuristic};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct AlwaysReplies {
    calls: AtomicUsize,
}

#[async_trait]
impl ResponseGenerator for AlwaysReplies {
    async fn generate(
        &self,
        _system_instruction: &str,
        _history: &str,
        _tools: &[ToolDescriptor],
        _config: &GenerationConfig,
    ) -> Result<GenerationOutcome, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GenerationOutcome::Text("acknowledged".to_string()))
    }
}

struct AlwaysFails;

#[async_trait]
impl ResponseGenerator for AlwaysFails {
    async fn generate(
        &self,
        _system_instruction: &str,
        _history: &str,
        _tools: &[ToolDescriptor],
        _config: &GenerationConfig,
    ) -> Result<GenerationOutcome, GeneratorError> {
        Err(GeneratorError::Backend("unavailable".to_string()))
    }
}

fn aria_persona() -> Persona {
    Persona::new(
        "Aria",
        "a curious research assistant",
        vec![],
        vec![],
        vec!["distributed systems".to_string()],
        vec!["send_channel_message".to_string()],
        "test-model",
        0.7,
        200,
    )
    .unwrap()
}

async fn build(
    generator: Arc<dyn ResponseGenerator>,
) -> (Arc<AgentRuntime>, Arc<ChannelService>) {
    let bus = Arc::new(EventBus::new(1000, 1000));
    let channels = ChannelService::new(
        bus.clone(),
        Arc::new(InMemoryChannelRepository::default()),
        Arc::new(InMemoryMessageRepository::default()),
        5,
        3600,
    );
    channels
        .create_channel("c1", "random", ChannelType::Public, None, None, HashMap::new())
        .await
        .unwrap();
    let memory = Arc::new(ConversationBuffer::new(8, 20));
    let emotional = EmotionalEngine::new("aria", bus.clone(), Arc::new(KeywordMoodHeuristic));
    let tools = Arc::new(ToolRegistry::new());
    tools
        .register(Arc::new(SendChannelMessageTool::new("aria", channels.clone())))
        .await;
    let runtime = AgentRuntime::new(
        "aria",
        aria_persona(),
        bus.clone(),
        channels.clone(),
        memory,
        emotional,
        generator,
        tools,
    );
    runtime.subscribe_to_channel("c1").await;
    runtime.install().await;
    (runtime, channels)
}

#[tokio::test]
async fn does_not_reply_to_member_joined_system_notice() {
    let generator = Arc::new(AlwaysReplies { calls: AtomicUsize::new(0) });
    let (_runtime, channels) = build(generator.clone()).await;
    channels.add_member("c1", "newbie", MemberRole::Member, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn per_channel_rate_limit_caps_replies_in_a_burst() {
    let generator = Arc::new(AlwaysReplies { calls: AtomicUsize::new(0) });
    let (_runtime, channels) = build(generator.clone()).await;
    for i in 0..5 {
        channels
            .send_message("c1", "commander", format!("ping {i}"), HashMap::new(), None)
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_generator_retries_reach_error_state() {
    let (runtime, channels) = build(Arc::new(AlwaysFails)).await;
    channels
        .send_message("c1", "commander", "are you there?", HashMap::new(), None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    channels
        .send_message("c1", "commander", "hello??", HashMap::new(), None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    channels
        .send_message("c1", "commander", "please respond", HashMap::new(), None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(runtime.state(), AgentState::Error);
}
