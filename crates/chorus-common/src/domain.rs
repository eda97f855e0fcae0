//! Core domain types: channels, messages, minions, personas, and tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_CHANNELS: [&str; 3] = ["general", "announcements", "task_coordination"];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {reason}")]
    Field { field: &'static str, reason: String },
}

impl ValidationError {
    fn field(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Field {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Public,
    Private,
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Moderator,
    Member,
}

impl MemberRole {
    /// Admins and moderators may add/remove members of a private channel.
    pub fn can_manage_members(self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Moderator)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMember {
    pub member_id: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub added_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub channel_type: ChannelType,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub members: Vec<ChannelMember>,
    pub message_count: u64,
    pub last_activity: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub deleted: bool,
}

impl Channel {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        channel_type: ChannelType,
        description: Option<String>,
        created_by: Option<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Channel {
            id: id.into(),
            name: name.into(),
            channel_type,
            description,
            created_at: now,
            created_by,
            members: Vec::new(),
            message_count: 0,
            last_activity: now,
            metadata,
            deleted: false,
        }
    }

    pub fn is_default(&self) -> bool {
        DEFAULT_CHANNELS.contains(&self.name.as_str())
    }

    pub fn has_member(&self, member_id: &str) -> bool {
        self.members.iter().any(|m| m.member_id == member_id)
    }

    pub fn member_role(&self, member_id: &str) -> Option<MemberRole> {
        self.members
            .iter()
            .find(|m| m.member_id == member_id)
            .map(|m| m.role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Chat,
    System,
    Task,
    Status,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Chat => "chat",
            MessageType::System => "system",
            MessageType::Task => "task",
            MessageType::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub sender_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub parent_message_id: Option<String>,
    pub reactions: HashMap<String, Vec<String>>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        channel_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
        message_type: MessageType,
        metadata: HashMap<String, serde_json::Value>,
        parent_message_id: Option<String>,
    ) -> Self {
        Message {
            id: new_message_id(),
            channel_id: channel_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            message_type,
            timestamp: Utc::now(),
            metadata,
            parent_message_id,
            reactions: HashMap::new(),
            edited: false,
            edited_at: None,
        }
    }

    pub fn system(
        channel_id: impl Into<String>,
        content: impl Into<String>,
        event: &'static str,
    ) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("event".to_string(), serde_json::Value::String(event.to_string()));
        Message::new(channel_id, "system", content, MessageType::System, metadata, None)
    }

    /// True for the join/leave/delete system notices agents must never reply to.
    pub fn is_loop_avoidance_system_event(&self) -> bool {
        if self.message_type != MessageType::System {
            return false;
        }
        matches!(
            self.metadata.get("event").and_then(|v| v.as_str()),
            Some("member_joined") | Some("member_left") | Some("channel_deleted")
        )
    }
}

pub fn new_message_id() -> String {
    format!("msg_{}", Uuid::new_v4())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub base_personality: String,
    pub quirks: Vec<String>,
    pub catchphrases: Vec<String>,
    pub expertise_areas: Vec<String>,
    pub allowed_tools: Vec<String>,
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Persona {
    pub fn new(
        name: impl Into<String>,
        base_personality: impl Into<String>,
        quirks: Vec<String>,
        catchphrases: Vec<String>,
        expertise_areas: Vec<String>,
        allowed_tools: Vec<String>,
        model_name: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Self, ValidationError> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ValidationError::field(
                "temperature",
                format!("{temperature} outside [0,2]"),
            ));
        }
        if max_tokens == 0 {
            return Err(ValidationError::field("max_tokens", "must be > 0"));
        }
        Ok(Persona {
            name: name.into(),
            base_personality: base_personality.into(),
            quirks,
            catchphrases,
            expertise_areas,
            allowed_tools,
            model_name: model_name.into(),
            temperature,
            max_tokens,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinionStatus {
    Active,
    Idle,
    Error,
    Despawned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Minion {
    pub id: String,
    pub persona: Persona,
    pub status: MinionStatus,
    pub created_at: DateTime<Utc>,
}

impl Minion {
    pub fn new(id: impl Into<String>, persona: Persona) -> Self {
        Minion {
            id: id.into(),
            persona,
            status: MinionStatus::Active,
            created_at: Utc::now(),
        }
    }
}

/// Supplements the distilled spec's bare `task.*` event names with just
/// enough shape for the Emotional Engine's `task.*` subscription and the
/// WebSocket Bridge's unified `task_event` projection to carry real data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Blocked,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub assigned_to: Option<String>,
    pub progress: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Task {
            id: format!("task_{}", Uuid::new_v4()),
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            assigned_to: None,
            progress: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}
