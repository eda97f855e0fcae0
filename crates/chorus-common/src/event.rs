//! The typed event closed over every namespace the bus and its subscribers
//! understand. Mirrors the dotted `EventType` string enum of the system this
//! was distilled from, but as a closed Rust enum per the redesign guidance:
//! dynamic dispatch on event types becomes an exhaustive match, never a
//! string-keyed map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    ChannelCreated,
    ChannelUpdated,
    ChannelDeleted,
    ChannelMemberAdded,
    ChannelMemberRemoved,
    ChannelMessage,
    MinionSpawned,
    MinionDespawned,
    MinionStateChanged,
    MinionEmotionalChange,
    MinionError,
    TaskCreated,
    TaskUpdated,
    TaskStatusChanged,
    TaskAssigned,
    TaskProgressUpdate,
    TaskCompleted,
    TaskFailed,
    TaskCancelled,
    TaskDeleted,
    SystemHealth,
    SystemError,
}

impl EventType {
    pub const ALL: &'static [EventType] = &[
        EventType::ChannelCreated,
        EventType::ChannelUpdated,
        EventType::ChannelDeleted,
        EventType::ChannelMemberAdded,
        EventType::ChannelMemberRemoved,
        EventType::ChannelMessage,
        EventType::MinionSpawned,
        EventType::MinionDespawned,
        EventType::MinionStateChanged,
        EventType::MinionEmotionalChange,
        EventType::MinionError,
        EventType::TaskCreated,
        EventType::TaskUpdated,
        EventType::TaskStatusChanged,
        EventType::TaskAssigned,
        EventType::TaskProgressUpdate,
        EventType::TaskCompleted,
        EventType::TaskFailed,
        EventType::TaskCancelled,
        EventType::TaskDeleted,
        EventType::SystemHealth,
        EventType::SystemError,
    ];

    pub fn namespace(self) -> &'static str {
        match self {
            EventType::ChannelCreated
            | EventType::ChannelUpdated
            | EventType::ChannelDeleted
            | EventType::ChannelMemberAdded
            | EventType::ChannelMemberRemoved
            | EventType::ChannelMessage => "channel",
            EventType::MinionSpawned
            | EventType::MinionDespawned
            | EventType::MinionStateChanged
            | EventType::MinionEmotionalChange
            | EventType::MinionError => "minion",
            EventType::TaskCreated
            | EventType::TaskUpdated
            | EventType::TaskStatusChanged
            | EventType::TaskAssigned
            | EventType::TaskProgressUpdate
            | EventType::TaskCompleted
            | EventType::TaskFailed
            | EventType::TaskCancelled
            | EventType::TaskDeleted => "task",
            EventType::SystemHealth | EventType::SystemError => "system",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EventType::ChannelCreated => "created",
            EventType::ChannelUpdated => "updated",
            EventType::ChannelDeleted => "deleted",
            EventType::ChannelMemberAdded => "member_added",
            EventType::ChannelMemberRemoved => "member_removed",
            EventType::ChannelMessage => "message",
            EventType::MinionSpawned => "spawned",
            EventType::MinionDespawned => "despawned",
            EventType::MinionStateChanged => "state_changed",
            EventType::MinionEmotionalChange => "emotional_change",
            EventType::MinionError => "error",
            EventType::TaskCreated => "created",
            EventType::TaskUpdated => "updated",
            EventType::TaskStatusChanged => "status_changed",
            EventType::TaskAssigned => "assigned",
            EventType::TaskProgressUpdate => "progress_update",
            EventType::TaskCompleted => "completed",
            EventType::TaskFailed => "failed",
            EventType::TaskCancelled => "cancelled",
            EventType::TaskDeleted => "deleted",
            EventType::SystemHealth => "health",
            EventType::SystemError => "error",
        }
    }

    /// `<namespace>.<name>`, e.g. `channel.message` — used for log lines and
    /// for parsing externally-supplied strings (config, CLI flags).
    pub fn dotted(self) -> String {
        format!("{}.{}", self.namespace(), self.name())
    }

    /// `<namespace>_<name>`, the wire naming scheme the bridge uses.
    pub fn wire_name(self) -> String {
        format!("{}_{}", self.namespace(), self.name())
    }

    pub fn parse_dotted(s: &str) -> Option<EventType> {
        EventType::ALL.iter().copied().find(|t| t.dotted() == s)
    }

    pub fn is_task(self) -> bool {
        self.namespace() == "task"
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

/// One variant per `EventType` discriminant, carrying typed fields instead
/// of a free-form dictionary. `as_json` is the escape hatch used only at the
/// wire boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventData {
    ChannelCreated {
        channel_id: String,
        name: String,
    },
    ChannelUpdated {
        channel_id: String,
    },
    ChannelDeleted {
        channel_id: String,
    },
    ChannelMemberAdded {
        channel_id: String,
        member_id: String,
        role: String,
    },
    ChannelMemberRemoved {
        channel_id: String,
        member_id: String,
    },
    ChannelMessage {
        message_id: String,
        channel_id: String,
        sender_id: String,
        content: String,
        message_type: String,
        metadata: HashMap<String, serde_json::Value>,
        timestamp: DateTime<Utc>,
    },
    MinionSpawned {
        minion_id: String,
    },
    MinionDespawned {
        minion_id: String,
    },
    MinionStateChanged {
        minion_id: String,
        state: String,
    },
    MinionEmotionalChange {
        minion_id: String,
        mood: serde_json::Value,
        energy: f32,
        stress: f32,
        commander_opinion: f32,
    },
    MinionError {
        minion_id: String,
        message: String,
    },
    Task {
        task_id: String,
        status: String,
        assigned_to: Option<String>,
        progress: f32,
    },
    SystemHealth {
        status: String,
    },
    SystemError {
        message: String,
    },
    /// Escape hatch for the rare event that does not need a typed shape
    /// (currently unused by any emitter but kept so `Event::new` never has
    /// to panic on an exhaustive match it cannot satisfy).
    Raw(serde_json::Value),
}

impl EventData {
    pub fn as_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub data: EventData,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    pub fn new(
        event_type: EventType,
        data: EventData,
        source: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        Event {
            id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            source: source.into(),
            data,
            metadata,
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Event {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_name_replaces_dot_with_underscore() {
        assert_eq!(EventType::ChannelMessage.wire_name(), "channel_message");
        assert_eq!(EventType::MinionEmotionalChange.wire_name(), "minion_emotional_change");
    }

    #[test]
    fn dotted_round_trips_through_parse() {
        for &t in EventType::ALL {
            assert_eq!(EventType::parse_dotted(&t.dotted()), Some(t));
        }
    }

    #[test]
    fn unknown_dotted_string_is_rejected() {
        assert_eq!(EventType::parse_dotted("bogus.type"), None);
    }

    #[test]
    fn event_equality_is_by_id() {
        let a = Event::new(
            EventType::SystemHealth,
            EventData::SystemHealth { status: "ok".into() },
            "test",
            HashMap::new(),
        );
        let b = a.clone();
        assert_eq!(a, b);
    }
}
