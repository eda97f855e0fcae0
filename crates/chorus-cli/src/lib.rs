//! Deterministic wiring and ordered lifecycle for the messaging core: the
//! one place that constructs the event bus, repositories, channel
//! service, emotional engines, agent runtimes, and the websocket bridge,
//! and tears them down in reverse.

pub mod generator;

use chorus_agents::AgentRuntime;
use chorus_agents::tools::{
    GetChannelHistoryTool, ListenToChannelTool, SendChannelMessageTool, SendDirectMessageTool, ToolRegistry,
};
use chorus_api::WebSocketBridge;
use chorus_bus::EventBus;
use chorus_channels::ChannelService;
use chorus_common::config::SystemConfig;
use chorus_common::domain::DEFAULT_CHANNELS;
use chorus_common::repo::{InMemoryChannelRepository, InMemoryMessageRepository};
use chorus_memory::ConversationBuffer;
use chorus_mood::{EmotionalEngine, KeywordMoodHeuristic};
use generator::UnconfiguredGenerator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const MEMORY_CHANNEL_CAPACITY: usize = 64;
const MEMORY_MESSAGES_PER_CHANNEL: usize = 50;

/// Owns every long-lived component and the cancellation token that
/// unwinds their background loops.
pub struct ServiceContainer {
    pub bus: Arc<EventBus>,
    pub channels: Arc<ChannelService>,
    pub emotional_engines: Vec<Arc<EmotionalEngine>>,
    pub agent_runtimes: Vec<Arc<AgentRuntime>>,
    pub bridge: Arc<WebSocketBridge>,
    shutdown: CancellationToken,
}

impl ServiceContainer {
    /// Stage 1-6 of the component design: bus, repositories, channel
    /// service, emotional engines, agent runtimes, websocket bridge — in
    /// that order, since later stages depend on earlier ones.
    pub async fn start(config: &SystemConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let shutdown = CancellationToken::new();

        let bus = Arc::new(EventBus::new(config.bus.history_limit, config.bus.default_rate_limit_per_second));

        let channel_repo = Arc::new(InMemoryChannelRepository::default());
        let message_repo = Arc::new(InMemoryMessageRepository::default());

        let channels = ChannelService::new(
            bus.clone(),
            channel_repo,
            message_repo,
            config.channels.flush_interval_secs,
            config.channels.cleanup_interval_secs,
        );
        channels.ensure_default_channels().await?;
        channels.spawn_background_loops(shutdown.clone());
        channels.install_minion_spawn_handler().await;

        let mut emotional_engines = Vec::with_capacity(config.minions.len());
        let mut agent_runtimes = Vec::with_capacity(config.minions.len());

        for minion in &config.minions {
            let persona = minion.persona.clone().into_persona()?;

            let emotional = EmotionalEngine::new(minion.id.clone(), bus.clone(), Arc::new(KeywordMoodHeuristic));
            emotional.install().await;
            emotional.spawn_self_regulation_loop(config.mood.self_regulation_interval_secs, shutdown.clone());
            emotional_engines.push(emotional.clone());

            let tools = Arc::new(ToolRegistry::new());
            tools.register(Arc::new(SendChannelMessageTool::new(minion.id.clone(), channels.clone()))).await;
            tools.register(Arc::new(GetChannelHistoryTool::new(channels.clone()))).await;
            tools.register(Arc::new(ListenToChannelTool)).await;
            tools.register(Arc::new(SendDirectMessageTool)).await;

            let memory = Arc::new(ConversationBuffer::new(MEMORY_CHANNEL_CAPACITY, MEMORY_MESSAGES_PER_CHANNEL));

            let runtime = AgentRuntime::new(
                minion.id.clone(),
                persona,
                bus.clone(),
                channels.clone(),
                memory,
                emotional.clone(),
                Arc::new(UnconfiguredGenerator) as _,
                tools,
            );
            for name in DEFAULT_CHANNELS {
                runtime.subscribe_to_channel(name).await;
            }
            runtime.install().await;
            agent_runtimes.push(runtime);
        }

        let bridge = WebSocketBridge::new(bus.clone());
        bridge.install().await;

        info!(minions = config.minions.len(), "service container started");

        Ok(ServiceContainer {
            bus,
            channels,
            emotional_engines,
            agent_runtimes,
            bridge,
            shutdown,
        })
    }

    pub async fn serve_websocket(&self, addr: SocketAddr) -> std::io::Result<()> {
        chorus_api::server::serve(addr, self.bridge.clone()).await
    }

    /// Reverse of `start`: flush buffered messages before cancelling the
    /// background loops that would otherwise keep retrying against a torn
    /// down bus.
    pub async fn stop(self) {
        self.channels.flush_now().await;
        self.shutdown.cancel();
        for runtime in &self.agent_runtimes {
            runtime.shutdown_token().cancel();
        }
        info!("service container stopped");
    }
}

/// Waits for `INT` or (on unix) `TERM`, whichever arrives first.
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install SIGINT handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => warn!("failed to install SIGTERM handler: {e}"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
