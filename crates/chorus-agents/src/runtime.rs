//! The per-minion reactive loop: one task that subscribes to channel
//! traffic, decides whether to respond, and if so drives a response
//! generator through the tool-dispatch protocol. Modeled on the
//! subscribe-decide-act shape of an `Agent` that turns one incoming
//! stimulus into zero or one outgoing action, generalized here from
//! "execute one task" to "one conversational turn".

use crate::error::{AgentError, AgentResult};
use crate::tools::ToolRegistry;
use async_trait::async_trait;
use chorus_bus::{EventBus, EventHandler, RateLimitState};
use chorus_channels::ChannelService;
use chorus_common::domain::Persona;
use chorus_common::event::{Event, EventData, EventType};
use chorus_common::generator::{GenerationConfig, GenerationOutcome, ResponseGenerator};
use chorus_memory::ConversationBuffer;
use chorus_mood::EmotionalEngine;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const CONTEXT_TOKEN_BUDGET: usize = 500;
const DEFAULT_RESPONSES_PER_MINUTE: u32 = 3;
const MAX_RETRIES: u32 = 3;
const MAX_TOOL_ROUNDS: u32 = 2;
const GENERATOR_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Thinking,
    Emitting,
    Error,
}

/// One minion's reactive loop: subscribed channels, the system-instruction
/// template built once from its persona, and the collaborators it invokes
/// per turn (memory, emotional engine, response generator, tools).
pub struct AgentRuntime {
    minion_id: String,
    persona: Persona,
    bus: Arc<EventBus>,
    channels: Arc<ChannelService>,
    memory: Arc<ConversationBuffer>,
    emotional: Arc<EmotionalEngine>,
    generator: Arc<dyn ResponseGenerator>,
    tools: Arc<ToolRegistry>,
    subscribed_channels: RwLock<HashSet<String>>,
    response_rate: Mutex<HashMap<String, RateLimitState>>,
    state: watch::Sender<AgentState>,
    system_instruction_template: String,
    shutdown: CancellationToken,
    retries: Mutex<u32>,
}

impl AgentRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        minion_id: impl Into<String>,
        persona: Persona,
        bus: Arc<EventBus>,
        channels: Arc<ChannelService>,
        memory: Arc<ConversationBuffer>,
        emotional: Arc<EmotionalEngine>,
        generator: Arc<dyn ResponseGenerator>,
        tools: Arc<ToolRegistry>,
    ) -> Arc<Self> {
        let minion_id = minion_id.into();
        let template = build_system_instruction(&persona);
        let (state_tx, _) = watch::channel(AgentState::Idle);
        Arc::new(AgentRuntime {
            minion_id,
            persona,
            bus,
            channels,
            memory,
            emotional,
            generator,
            tools,
            subscribed_channels: RwLock::new(HashSet::new()),
            response_rate: Mutex::new(HashMap::new()),
            state: state_tx,
            system_instruction_template: template,
            shutdown: CancellationToken::new(),
            retries: Mutex::new(0),
        })
    }

    pub fn minion_id(&self) -> &str {
        &self.minion_id
    }

    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn subscribe_to_channel(&self, channel_id: impl Into<String>) {
        self.subscribed_channels.write().await.insert(channel_id.into());
    }

    pub async fn unsubscribe_from_channel(&self, channel_id: &str) {
        self.subscribed_channels.write().await.remove(channel_id);
    }

    /// Registers this runtime's handler on the bus. Idempotent only in the
    /// sense that calling it twice yields two independent subscriptions;
    /// callers install once per runtime lifetime.
    pub async fn install(self: &Arc<Self>) {
        let handler: Arc<dyn EventHandler> = Arc::new(RuntimeHandler { runtime: self.clone() });
        self.bus.subscribe(EventType::ChannelMessage, handler).await;
    }

    async fn set_state(&self, next: AgentState) {
        let _ = self.state.send(next);
    }

    /// The full per-event decision procedure. Drops events this minion must
    /// never answer, then renders a turn and dispatches it.
    async fn on_channel_message(&self, event: &Event) {
        let (message_id, channel_id, sender_id, content, message_type, metadata) = match &event.data {
            EventData::ChannelMessage {
                message_id,
                channel_id,
                sender_id,
                content,
                message_type,
                metadata,
                ..
            } => (
                message_id.clone(),
                channel_id.clone(),
                sender_id.clone(),
                content.clone(),
                message_type.clone(),
                metadata.clone(),
            ),
            _ => return,
        };

        // Every observed message feeds the conversation buffer regardless
        // of whether this minion ends up responding, so future turns have
        // context even for exchanges it only overheard.
        let recorded = chorus_common::domain::Message::new(
            channel_id.clone(),
            sender_id.clone(),
            content.clone(),
            chorus_common::domain::MessageType::Chat,
            HashMap::new(),
            None,
        );
        self.memory.record(&channel_id, recorded);

        if sender_id == self.minion_id {
            return;
        }
        if !self.subscribed_channels.read().await.contains(&channel_id) {
            return;
        }
        if is_loop_avoidance_wire_event(&message_type, &metadata) {
            return;
        }
        {
            let mut rates = self.response_rate.lock().await;
            let state = rates
                .entry(channel_id.clone())
                .or_insert_with(|| RateLimitState::with_window(DEFAULT_RESPONSES_PER_MINUTE, Duration::from_secs(60)));
            if !state.check_and_record(std::time::Instant::now()) {
                debug!(minion_id = %self.minion_id, %channel_id, "per-channel response rate limit hit, dropping turn");
                return;
            }
        }

        debug!(minion_id = %self.minion_id, %message_id, %channel_id, "taking a turn");
        self.set_state(AgentState::Thinking).await;
        match self.take_turn(&channel_id).await {
            Ok(()) => self.set_state(AgentState::Idle).await,
            Err(err) => self.handle_turn_failure(err).await,
        }
    }

    async fn handle_turn_failure(&self, err: AgentError) {
        warn!(minion_id = %self.minion_id, error = %err, "turn failed");
        let mut retries = self.retries.lock().await;
        *retries += 1;
        if *retries >= MAX_RETRIES {
            error!(minion_id = %self.minion_id, "exhausted retries, entering error state");
            self.set_state(AgentState::Error).await;
            let _ = self
                .bus
                .emit(
                    EventType::MinionError,
                    EventData::MinionError {
                        minion_id: self.minion_id.clone(),
                        message: err.to_string(),
                    },
                    self.minion_id.clone(),
                    HashMap::new(),
                )
                .await;
        } else {
            self.set_state(AgentState::Idle).await;
        }
    }

    /// Steps 3–7 of the per-event decision: gather context, invoke the
    /// generator, dispatch any tool calls, and feed results back for at
    /// most one follow-up round.
    async fn take_turn(&self, channel_id: &str) -> AgentResult<()> {
        let history = self.memory.format_context(channel_id, CONTEXT_TOKEN_BUDGET);
        let mood_cue = self.emotional.mood_cue().await;
        let instruction = self
            .system_instruction_template
            .replace("<current_emotional_cue>", &mood_cue)
            .replace("<conversation_history_cue>", &history);
        let config = GenerationConfig::for_persona(self.persona.temperature, self.persona.max_tokens);
        let descriptors = self.tools.descriptors().await;

        let mut transcript = history;
        let mut round = 0;
        loop {
            let outcome = self.generate_with_cancellation(&instruction, &transcript, &descriptors, &config).await?;
            self.set_state(AgentState::Emitting).await;
            match outcome {
                GenerationOutcome::Text(text) => {
                    self.dispatch_send(channel_id, &text).await?;
                    *self.retries.lock().await = 0;
                    return Ok(());
                }
                GenerationOutcome::ToolCalls(calls) => {
                    if calls.is_empty() {
                        *self.retries.lock().await = 0;
                        return Ok(());
                    }
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        let result = self.tools.execute(&call.name, call.arguments.clone()).await;
                        match result {
                            Ok(value) => results.push(format!("{}: {}", call.name, value)),
                            Err(e) => {
                                results.push(format!("{}: error: {e}", call.name));
                            }
                        }
                    }
                    round += 1;
                    if round >= MAX_TOOL_ROUNDS {
                        *self.retries.lock().await = 0;
                        return Ok(());
                    }
                    transcript = format!("{transcript}\n[tool results]\n{}", results.join("\n"));
                }
            }
        }
    }

    async fn generate_with_cancellation(
        &self,
        instruction: &str,
        history: &str,
        descriptors: &[chorus_common::generator::ToolDescriptor],
        config: &GenerationConfig,
    ) -> AgentResult<GenerationOutcome> {
        tokio::select! {
            _ = self.shutdown.cancelled() => {
                Err(AgentError::Generator(chorus_common::generator::GeneratorError::Cancelled))
            }
            outcome = tokio::time::timeout(
                GENERATOR_DEADLINE,
                self.generator.generate(instruction, history, descriptors, config),
            ) => {
                match outcome {
                    Ok(result) => Ok(result?),
                    Err(_elapsed) => Err(AgentError::Generator(chorus_common::generator::GeneratorError::Timeout)),
                }
            }
        }
    }

    /// The only path by which this minion's words reach a channel: always
    /// through the `send_channel_message` tool, never a direct bus emit.
    async fn dispatch_send(&self, channel_id: &str, text: &str) -> AgentResult<()> {
        let args = serde_json::json!({ "channel": channel_id, "message": text });
        self.tools.execute("send_channel_message", args).await?;
        Ok(())
    }
}

/// Base personality, quirks, catchphrases, and expertise areas rendered as
/// a bulleted block around the two dynamic-cue placeholders the runtime
/// substitutes every turn.
fn build_system_instruction(persona: &Persona) -> String {
    let mut sections = vec![
        format!("You are {}, {}.", persona.name, persona.base_personality),
        "<current_emotional_cue>".to_string(),
    ];
    if !persona.quirks.is_empty() {
        sections.push(format!("Quirks:\n{}", bulleted(&persona.quirks)));
    }
    if !persona.catchphrases.is_empty() {
        sections.push(format!("Catchphrases you favor:\n{}", bulleted(&persona.catchphrases)));
    }
    if !persona.expertise_areas.is_empty() {
        sections.push(format!("Areas of expertise:\n{}", bulleted(&persona.expertise_areas)));
    }
    sections.push("Recent conversation:".to_string());
    sections.push("<conversation_history_cue>".to_string());
    sections.join("\n\n")
}

fn bulleted(items: &[String]) -> String {
    items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
}

fn is_loop_avoidance_wire_event(message_type: &str, metadata: &HashMap<String, serde_json::Value>) -> bool {
    if message_type != "system" {
        return false;
    }
    matches!(
        metadata.get("event").and_then(|v| v.as_str()),
        Some("member_joined") | Some("member_left") | Some("channel_deleted")
    )
}

struct RuntimeHandler {
    runtime: Arc<AgentRuntime>,
}

#[async_trait]
impl EventHandler for RuntimeHandler {
    async fn handle(&self, event: &Event) {
        self.runtime.on_channel_message(event).await;
    }

    fn name(&self) -> &str {
        "agent_runtime"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_common::domain::ChannelType;
    use chorus_common::generator::{GeneratorError, ToolCall};
    use chorus_common::repo::{InMemoryChannelRepository, InMemoryMessageRepository};
    use chorus_mood::KeywordMoodHeuristic;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedGenerator {
        calls: AtomicUsize,
        responses: Vec<GenerationOutcome>,
    }

    #[async_trait]
    impl ResponseGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            _system_instruction: &str,
            _history: &str,
            _tools: &[chorus_common::generator::ToolDescriptor],
            _config: &GenerationConfig,
        ) -> Result<GenerationOutcome, GeneratorError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .get(i)
                .cloned()
                .ok_or(GeneratorError::Backend("no more scripted responses".to_string()))
        }
    }

    async fn build_runtime(responses: Vec<GenerationOutcome>) -> (Arc<AgentRuntime>, Arc<ChannelService>) {
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
        let persona = Persona::new(
            "Aria",
            "endlessly curious",
            vec!["taps desk when thinking".to_string()],
            vec!["let's dig in".to_string()],
            vec!["distributed systems".to_string()],
            vec!["send_channel_message".to_string()],
            "test-model",
            0.8,
            256,
        )
        .unwrap();
        let memory = Arc::new(ConversationBuffer::new(8, 20));
        let emotional = EmotionalEngine::new("aria", bus.clone(), Arc::new(KeywordMoodHeuristic));
        let generator = Arc::new(ScriptedGenerator {
            calls: AtomicUsize::new(0),
            responses,
        });
        let tools = Arc::new(ToolRegistry::new());
        tools
            .register(Arc::new(crate::tools::SendChannelMessageTool::new("aria", channels.clone())))
            .await;
        let runtime = AgentRuntime::new(
            "aria",
            persona,
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
    async fn never_responds_to_its_own_message() {
        let (runtime, channels) = build_runtime(vec![GenerationOutcome::Text("should never run".to_string())]).await;
        channels
            .send_message("c1", "aria", "talking to myself", HashMap::new(), None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runtime.state(), AgentState::Idle);
        let (messages, total, _) = channels.get_messages("c1", 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(messages[0].sender_id, "aria");
    }

    #[tokio::test]
    async fn ignores_messages_outside_subscribed_channels() {
        let (runtime, channels) = build_runtime(vec![]).await;
        channels
            .create_channel("other", "other", ChannelType::Public, None, None, HashMap::new())
            .await
            .unwrap();
        channels
            .send_message("other", "commander", "hello?", HashMap::new(), None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runtime.state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn responds_via_send_channel_message_tool() {
        let (runtime, channels) = build_runtime(vec![GenerationOutcome::Text("hello there".to_string())]).await;
        channels
            .send_message("c1", "commander", "hi aria", HashMap::new(), None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(runtime.state(), AgentState::Idle);
        let (messages, total, _) = channels.get_messages("c1", 10, 0).await.unwrap();
        assert_eq!(total, 2);
        assert!(messages.iter().any(|m| m.sender_id == "aria" && m.content == "hello there"));
    }

    #[tokio::test]
    async fn tool_call_round_feeds_results_back_before_replying() {
        let (runtime, channels) = build_runtime(vec![
            GenerationOutcome::ToolCalls(vec![ToolCall {
                name: "get_channel_history".to_string(),
                arguments: serde_json::json!({"channel": "c1", "limit": 5}),
            }]),
            GenerationOutcome::Text("caught up now".to_string()),
        ])
        .await;
        channels
            .send_message("c1", "commander", "what did I miss?", HashMap::new(), None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(runtime.state(), AgentState::Idle);
        let (messages, total, _) = channels.get_messages("c1", 10, 0).await.unwrap();
        assert_eq!(total, 2);
        assert!(messages.iter().any(|m| m.content == "caught up now"));
    }
}
