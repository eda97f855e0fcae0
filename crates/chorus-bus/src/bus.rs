use crate::error::{BusError, BusResult};
use crate::handler::{EventHandler, Subscription};
use crate::history::History;
use crate::rate_limit::RateLimitState;
use chorus_common::domain::new_message_id;
use chorus_common::event::{Event, EventData, EventType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

const DEFAULT_RATE_LIMIT: u32 = 10;

/// The sole inter-component communication channel for events. Owns the
/// subscription table and the history ring; no direct method calls between
/// subsystems should ever substitute for an event.
pub struct EventBus {
    subscriptions: RwLock<HashMap<EventType, Vec<Subscription>>>,
    history: History,
    rate_limits: RwLock<HashMap<String, RateLimitState>>,
    default_rate_limit: u32,
}

impl EventBus {
    pub fn new(history_limit: usize, default_rate_limit: u32) -> Self {
        EventBus {
            subscriptions: RwLock::new(HashMap::new()),
            history: History::new(history_limit),
            rate_limits: RwLock::new(HashMap::new()),
            default_rate_limit,
        }
    }

    pub fn with_defaults() -> Self {
        EventBus::new(1000, DEFAULT_RATE_LIMIT)
    }

    /// Reject at the emission budget, append to history, then hand the
    /// event to every matching subscriber's queue. Returns as soon as
    /// fan-out is scheduled — handlers run on their own worker tasks and
    /// never block this call.
    pub async fn emit(
        &self,
        event_type: EventType,
        data: EventData,
        source: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> BusResult<Event> {
        let source = source.into();
        if !self.check_rate_limit(&source).await {
            return Err(BusError::RateLimited { source_name: source });
        }
        let event = Event::new(event_type, data, source, metadata);
        self.history.push(event.clone()).await;
        self.fan_out(&event).await;
        Ok(event)
    }

    /// Convenience wrapper generating a globally unique `message_id` and
    /// stamping the `channel.message` event's data shape in one call.
    pub async fn emit_channel_message(
        &self,
        channel_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> BusResult<Event> {
        let channel_id = channel_id.into();
        let sender_id = sender_id.into();
        let content = content.into();
        let message_id = new_message_id();
        let timestamp = chrono::Utc::now();
        self.emit(
            EventType::ChannelMessage,
            EventData::ChannelMessage {
                message_id,
                channel_id,
                sender_id,
                content,
                message_type: "chat".to_string(),
                metadata: metadata.clone(),
                timestamp,
            },
            source,
            metadata,
        )
        .await
    }

    async fn fan_out(&self, event: &Event) {
        let subscriptions = self.subscriptions.read().await;
        if let Some(subs) = subscriptions.get(&event.event_type) {
            for sub in subs {
                if !sub.enqueue(event.clone()) {
                    warn!(subscription = %sub.id, "dropped event: subscriber worker gone");
                }
            }
        }
    }

    pub async fn subscribe(&self, event_type: EventType, handler: Arc<dyn EventHandler>) -> Uuid {
        let sub = Subscription::new(handler);
        let id = sub.id;
        self.subscriptions
            .write()
            .await
            .entry(event_type)
            .or_default()
            .push(sub);
        id
    }

    /// Registers `handler` once per known event type. Each registration
    /// gets an independent worker and subscription id so per-type FIFO
    /// ordering is preserved even though the handler object is shared.
    pub async fn subscribe_all(&self, handler: Arc<dyn EventHandler>) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(EventType::ALL.len());
        for &event_type in EventType::ALL {
            ids.push(self.subscribe(event_type, handler.clone()).await);
        }
        ids
    }

    pub async fn unsubscribe(&self, subscription_id: Uuid) {
        let mut subscriptions = self.subscriptions.write().await;
        for subs in subscriptions.values_mut() {
            subs.retain(|s| s.id != subscription_id);
        }
    }

    pub async fn set_rate_limit(&self, source: impl Into<String>, events_per_second: u32) {
        let source = source.into();
        let mut limits = self.rate_limits.write().await;
        limits
            .entry(source)
            .and_modify(|s| s.set_limit(events_per_second))
            .or_insert_with(|| RateLimitState::new(events_per_second));
    }

    async fn check_rate_limit(&self, source: &str) -> bool {
        let mut limits = self.rate_limits.write().await;
        let state = limits
            .entry(source.to_string())
            .or_insert_with(|| RateLimitState::new(self.default_rate_limit));
        state.check_and_record(Instant::now())
    }

    pub async fn recent_events(&self, event_type: Option<EventType>, limit: Option<usize>) -> Vec<Event> {
        self.history.recent(event_type, limit).await
    }

    pub async fn clear_history(&self) {
        self.history.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct RecordingHandler {
        seen: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: &Event) {
            if let EventData::ChannelMessage { content, .. } = &event.data {
                self.seen.lock().unwrap().push(content.clone());
            }
        }
    }

    struct PanickingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for PanickingHandler {
        async fn handle(&self, _event: &Event) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("handler fault");
        }
    }

    #[tokio::test]
    async fn single_emission_is_observed_exactly_once() {
        let bus = EventBus::with_defaults();
        let handler = Arc::new(RecordingHandler {
            seen: StdMutex::new(Vec::new()),
        });
        bus.subscribe(EventType::ChannelMessage, handler.clone()).await;
        let event = bus
            .emit_channel_message("general", "u1", "hi", "test", HashMap::new())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(handler.seen.lock().unwrap().as_slice(), ["hi"]);
        match event.data {
            EventData::ChannelMessage { message_id, .. } => {
                assert!(message_id.starts_with("msg_"));
            }
            _ => panic!("wrong data variant"),
        }
    }

    #[tokio::test]
    async fn rate_limit_rejects_beyond_budget_then_recovers() {
        let bus = EventBus::with_defaults();
        bus.set_rate_limit("spammer", 2).await;
        let mut successes = 0;
        let mut rejections = 0;
        for _ in 0..5 {
            match bus
                .emit_channel_message("general", "spammer", "msg", "spammer", HashMap::new())
                .await
            {
                Ok(_) => successes += 1,
                Err(BusError::RateLimited { .. }) => rejections += 1,
            }
        }
        assert_eq!(successes, 2);
        assert_eq!(rejections, 3);
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert!(bus
            .emit_channel_message("general", "spammer", "msg", "spammer", HashMap::new())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn handler_isolation_panic_does_not_stop_delivery() {
        let bus = EventBus::with_defaults();
        let calls = Arc::new(AtomicUsize::new(0));
        let panicking = Arc::new(PanickingHandler { calls: calls.clone() });
        let recording = Arc::new(RecordingHandler {
            seen: StdMutex::new(Vec::new()),
        });
        bus.subscribe(EventType::ChannelMessage, panicking).await;
        bus.subscribe(EventType::ChannelMessage, recording.clone()).await;
        bus.emit_channel_message("general", "u1", "first", "test", HashMap::new())
            .await
            .unwrap();
        bus.emit_channel_message("general", "u1", "second", "test", HashMap::new())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            recording.seen.lock().unwrap().as_slice(),
            ["first", "second"]
        );
    }

    #[tokio::test]
    async fn concurrent_sends_each_get_a_unique_message_id() {
        let bus = Arc::new(EventBus::new(1000, 1000));
        let mut handles = Vec::new();
        for i in 0..20 {
            let bus = bus.clone();
            handles.push(tokio::spawn(async move {
                bus.emit_channel_message("c1", format!("u{i}"), format!("msg{i}"), "test", HashMap::new())
                    .await
                    .unwrap()
            }));
        }
        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            let event = handle.await.unwrap();
            if let EventData::ChannelMessage { message_id, .. } = event.data {
                ids.insert(message_id);
            }
        }
        assert_eq!(ids.len(), 20);
    }

    #[tokio::test]
    async fn unsubscribe_stops_further_delivery() {
        let bus = EventBus::with_defaults();
        let handler = Arc::new(RecordingHandler {
            seen: StdMutex::new(Vec::new()),
        });
        let id = bus.subscribe(EventType::ChannelMessage, handler.clone()).await;
        bus.unsubscribe(id).await;
        bus.emit_channel_message("general", "u1", "hi", "test", HashMap::new())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_recent_events_respects_type_filter_and_limit() {
        let bus = EventBus::with_defaults();
        bus.emit_channel_message("general", "u1", "a", "test", HashMap::new())
            .await
            .unwrap();
        bus.emit(
            EventType::SystemHealth,
            EventData::SystemHealth { status: "ok".into() },
            "test",
            HashMap::new(),
        )
        .await
        .unwrap();
        let channel_only = bus.recent_events(Some(EventType::ChannelMessage), None).await;
        assert_eq!(channel_only.len(), 1);
        let limited = bus.recent_events(None, Some(1)).await;
        assert_eq!(limited.len(), 1);
    }
}
