//! The only path from internal events to the network. Subscribes to a
//! curated allow-list of event types, projects each to a `WireFrame`, and
//! fans it out to connected clients according to the delivery rules for
//! its kind.

use crate::types::WireFrame;
use async_trait::async_trait;
use chorus_bus::{EventBus, EventHandler};
use chorus_common::event::{Event, EventData, EventType};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

const CLIENT_CHANNEL_CAPACITY: usize = 256;

/// Per-connection subscription state. Each socket task owns exactly one of
/// these — there is no lock shared across clients.
pub struct ClientHandle {
    pub id: Uuid,
    subscribed_channels: Mutex<HashSet<String>>,
    subscribed_minions: Mutex<HashSet<String>>,
    sender: broadcast::Sender<WireFrame>,
}

impl ClientHandle {
    fn new() -> (Arc<Self>, broadcast::Receiver<WireFrame>) {
        let (tx, rx) = broadcast::channel(CLIENT_CHANNEL_CAPACITY);
        let handle = Arc::new(ClientHandle {
            id: Uuid::new_v4(),
            subscribed_channels: Mutex::new(HashSet::new()),
            subscribed_minions: Mutex::new(HashSet::new()),
            sender: tx,
        });
        (handle, rx)
    }

    pub async fn subscribe_channel(&self, channel_id: impl Into<String>) {
        self.subscribed_channels.lock().await.insert(channel_id.into());
    }

    pub async fn unsubscribe_channel(&self, channel_id: &str) {
        self.subscribed_channels.lock().await.remove(channel_id);
    }

    pub async fn subscribe_minion(&self, minion_id: impl Into<String>) {
        self.subscribed_minions.lock().await.insert(minion_id.into());
    }

    pub async fn unsubscribe_minion(&self, minion_id: &str) {
        self.subscribed_minions.lock().await.remove(minion_id);
    }

    pub async fn subscriptions(&self) -> (Vec<String>, Vec<String>) {
        (
            self.subscribed_channels.lock().await.iter().cloned().collect(),
            self.subscribed_minions.lock().await.iter().cloned().collect(),
        )
    }

    async fn wants(&self, delivery: &Delivery) -> bool {
        match delivery {
            Delivery::All => true,
            Delivery::Channel(channel_id) => self.subscribed_channels.lock().await.contains(channel_id),
            Delivery::Minion(minion_id) => self.subscribed_minions.lock().await.contains(minion_id),
        }
    }

    /// Non-blocking: drops the frame if the client is lagging rather than
    /// ever stalling the fan-out loop for other clients.
    pub fn push(&self, frame: WireFrame) {
        let _ = self.sender.send(frame);
    }
}

enum Delivery {
    All,
    Channel(String),
    Minion(String),
}

/// Applies the delivery table from the component design: which projected
/// events reach which clients, and under what on-the-wire frame name.
fn project(event: &Event) -> Option<(WireFrame, Delivery)> {
    match &event.data {
        EventData::ChannelMessage { channel_id, .. } => Some((
            WireFrame::new(event.event_type.wire_name(), event.data.as_json()),
            Delivery::Channel(channel_id.clone()),
        )),
        EventData::ChannelCreated { .. }
        | EventData::ChannelUpdated { .. }
        | EventData::ChannelDeleted { .. }
        | EventData::ChannelMemberAdded { .. }
        | EventData::ChannelMemberRemoved { .. }
        | EventData::MinionSpawned { .. }
        | EventData::MinionDespawned { .. } => Some((
            WireFrame::new(event.event_type.wire_name(), event.data.as_json()),
            Delivery::All,
        )),
        EventData::MinionStateChanged { minion_id, .. }
        | EventData::MinionEmotionalChange { minion_id, .. }
        | EventData::MinionError { minion_id, .. } => Some((
            WireFrame::new(event.event_type.wire_name(), event.data.as_json()),
            Delivery::Minion(minion_id.clone()),
        )),
        EventData::Task { task_id, .. } => {
            let mut fields = event.data.as_json();
            if let serde_json::Value::Object(ref mut map) = fields {
                map.insert("event_type".to_string(), serde_json::Value::String(event.event_type.dotted()));
                map.insert("task_id".to_string(), serde_json::Value::String(task_id.clone()));
            }
            Some((WireFrame::new("task_event", fields), Delivery::All))
        }
        EventData::SystemHealth { .. } | EventData::SystemError { .. } | EventData::Raw(_) => None,
    }
}

/// Owns the connected-client table and the single bus subscription that
/// feeds it. No other component writes to a socket.
pub struct WebSocketBridge {
    bus: Arc<EventBus>,
    clients: RwLock<HashMap<Uuid, Arc<ClientHandle>>>,
}

impl WebSocketBridge {
    pub fn new(bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(WebSocketBridge {
            bus,
            clients: RwLock::new(HashMap::new()),
        })
    }

    /// Subscribes once to every `channel.*`, `minion.*`, and `task.*` event
    /// type — the allow-list the component design calls for.
    pub async fn install(self: &Arc<Self>) {
        let handler: Arc<dyn EventHandler> = Arc::new(BridgeHandler { bridge: self.clone() });
        for &event_type in EventType::ALL.iter().filter(|t| {
            matches!(t.namespace(), "channel" | "minion") || t.is_task()
        }) {
            self.bus.subscribe(event_type, handler.clone()).await;
        }
    }

    pub async fn register_client(self: &Arc<Self>) -> (Arc<ClientHandle>, broadcast::Receiver<WireFrame>) {
        let (handle, rx) = ClientHandle::new();
        self.clients.write().await.insert(handle.id, handle.clone());
        (handle, rx)
    }

    /// A disconnect removes the client from every subscription set at
    /// once: dropping the handle is enough, no historical replay is owed.
    pub async fn unregister_client(&self, client_id: Uuid) {
        self.clients.write().await.remove(&client_id);
    }

    async fn fan_out(&self, event: &Event) {
        let Some((frame, delivery)) = project(event) else {
            return;
        };
        let clients = self.clients.read().await;
        for client in clients.values() {
            if client.wants(&delivery).await {
                client.push(frame.clone());
            }
        }
    }

    /// Surfaced only for diagnostics; never used to route frames.
    pub async fn connected_client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

struct BridgeHandler {
    bridge: Arc<WebSocketBridge>,
}

#[async_trait]
impl EventHandler for BridgeHandler {
    async fn handle(&self, event: &Event) {
        self.bridge.fan_out(event).await;
    }

    fn name(&self) -> &str {
        "websocket_bridge"
    }
}
