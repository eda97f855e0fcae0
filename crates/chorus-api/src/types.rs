//! Wire vocabulary for the bridge: the thin frame every projected internal
//! event is flattened into, and the client command / server response shapes
//! from the protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{ "type": ..., "timestamp": ..., ...fields }` — the one envelope every
/// outbound frame uses, whether it carries a projected bus event or a
/// direct protocol response (`connected`, `pong`, ...).
#[derive(Debug, Clone, Serialize)]
pub struct WireFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: serde_json::Value,
}

impl WireFrame {
    pub fn new(frame_type: impl Into<String>, fields: serde_json::Value) -> Self {
        WireFrame {
            frame_type: frame_type.into(),
            timestamp: Utc::now(),
            fields,
        }
    }

    pub fn empty(frame_type: impl Into<String>) -> Self {
        WireFrame::new(frame_type, serde_json::json!({}))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    SubscribeChannel { channel_id: String },
    UnsubscribeChannel { channel_id: String },
    SubscribeMinion { minion_id: String },
    UnsubscribeMinion { minion_id: String },
    GetSubscriptions,
    Ping,
}
