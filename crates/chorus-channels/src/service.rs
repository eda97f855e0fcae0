use crate::error::{ChannelError, ChannelResult};
use async_trait::async_trait;
use chorus_bus::{EventBus, EventHandler};
use chorus_common::domain::{
    Channel, ChannelMember, ChannelType, MemberRole, Message, MessageType, DEFAULT_CHANNELS,
};
use chorus_common::event::{Event, EventData, EventType};
use chorus_common::repo::{ChannelRepository, MessageRepository};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DIRECT_CHANNEL_TTL: chrono::Duration = chrono::Duration::days(7);

/// Authoritative state of channels and messages. The only component that
/// emits `channel.*` events; every message creation path funnels through
/// `send_message`.
pub struct ChannelService {
    bus: Arc<EventBus>,
    channel_repo: Arc<dyn ChannelRepository>,
    message_repo: Arc<dyn MessageRepository>,
    channels: RwLock<HashMap<String, Channel>>,
    buffer: Mutex<Vec<Message>>,
    flush_interval_secs: u64,
    cleanup_interval_secs: u64,
}

impl ChannelService {
    pub fn new(
        bus: Arc<EventBus>,
        channel_repo: Arc<dyn ChannelRepository>,
        message_repo: Arc<dyn MessageRepository>,
        flush_interval_secs: u64,
        cleanup_interval_secs: u64,
    ) -> Arc<Self> {
        Arc::new(ChannelService {
            bus,
            channel_repo,
            message_repo,
            channels: RwLock::new(HashMap::new()),
            buffer: Mutex::new(Vec::new()),
            flush_interval_secs,
            cleanup_interval_secs,
        })
    }

    /// Creates the three undeletable default channels if they are not
    /// already present (idempotent, safe to call on every startup).
    pub async fn ensure_default_channels(&self) -> ChannelResult<()> {
        for name in DEFAULT_CHANNELS {
            let exists = {
                let channels = self.channels.read().await;
                channels.values().any(|c| c.name == name)
            };
            if !exists {
                self.create_channel(
                    name.to_string(),
                    name.to_string(),
                    ChannelType::Public,
                    None,
                    None,
                    HashMap::new(),
                )
                .await?;
            }
        }
        Ok(())
    }

    pub async fn create_channel(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        channel_type: ChannelType,
        description: Option<String>,
        creator: Option<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> ChannelResult<Channel> {
        let id = id.into();
        {
            let channels = self.channels.read().await;
            if channels.contains_key(&id) {
                return Err(ChannelError::Validation(format!("duplicate channel id: {id}")));
            }
        }
        let channel = Channel::new(id.clone(), name, channel_type, description, creator, metadata);
        self.channels.write().await.insert(id.clone(), channel.clone());
        self.channel_repo.save(&channel).await?;
        self.bus
            .emit(
                EventType::ChannelCreated,
                EventData::ChannelCreated {
                    channel_id: channel.id.clone(),
                    name: channel.name.clone(),
                },
                "channel_service",
                HashMap::new(),
            )
            .await
            .map_err(|_| ChannelError::RateLimited)?;
        Ok(channel)
    }

    pub async fn get_channel(&self, channel_id: &str) -> ChannelResult<Channel> {
        self.channels
            .read()
            .await
            .get(channel_id)
            .cloned()
            .ok_or_else(|| ChannelError::not_found("channel", channel_id))
    }

    pub async fn list_channels(&self) -> Vec<Channel> {
        self.channels.read().await.values().cloned().collect()
    }

    pub async fn add_member(
        &self,
        channel_id: &str,
        member_id: impl Into<String>,
        role: MemberRole,
        added_by: Option<String>,
    ) -> ChannelResult<Channel> {
        let member_id = member_id.into();
        let channel = {
            let mut channels = self.channels.write().await;
            let channel = channels
                .get_mut(channel_id)
                .ok_or_else(|| ChannelError::not_found("channel", channel_id))?;
            if channel.has_member(&member_id) {
                return Err(ChannelError::Validation(format!(
                    "{member_id} is already a member of {channel_id}"
                )));
            }
            if channel.channel_type == ChannelType::Private {
                let permitted = added_by
                    .as_deref()
                    .and_then(|adder| channel.member_role(adder))
                    .map(|r| r.can_manage_members())
                    .unwrap_or(false);
                if !permitted {
                    return Err(ChannelError::PermissionDenied {
                        reason: "adding members to a private channel requires admin or moderator"
                            .to_string(),
                    });
                }
            }
            channel.members.push(ChannelMember {
                member_id: member_id.clone(),
                role,
                joined_at: chrono::Utc::now(),
                added_by: added_by.clone(),
            });
            channel.clone()
        };
        self.channel_repo.save(&channel).await?;
        self.bus
            .emit(
                EventType::ChannelMemberAdded,
                EventData::ChannelMemberAdded {
                    channel_id: channel_id.to_string(),
                    member_id: member_id.clone(),
                    role: format!("{role:?}"),
                },
                "channel_service",
                HashMap::new(),
            )
            .await
            .map_err(|_| ChannelError::RateLimited)?;
        self.send_system_message(
            channel_id,
            format!("{member_id} joined the channel"),
            "member_joined",
        )
        .await?;
        self.get_channel(channel_id).await
    }

    pub async fn remove_member(
        &self,
        channel_id: &str,
        member_id: &str,
        _removed_by: Option<String>,
    ) -> ChannelResult<Channel> {
        {
            let mut channels = self.channels.write().await;
            let channel = channels
                .get_mut(channel_id)
                .ok_or_else(|| ChannelError::not_found("channel", channel_id))?;
            channel.members.retain(|m| m.member_id != member_id);
        }
        let channel = self.get_channel(channel_id).await?;
        self.channel_repo.save(&channel).await?;
        self.bus
            .emit(
                EventType::ChannelMemberRemoved,
                EventData::ChannelMemberRemoved {
                    channel_id: channel_id.to_string(),
                    member_id: member_id.to_string(),
                },
                "channel_service",
                HashMap::new(),
            )
            .await
            .map_err(|_| ChannelError::RateLimited)?;
        self.send_system_message(
            channel_id,
            format!("{member_id} left the channel"),
            "member_left",
        )
        .await?;
        self.get_channel(channel_id).await
    }

    async fn send_system_message(
        &self,
        channel_id: &str,
        content: String,
        event: &'static str,
    ) -> ChannelResult<Message> {
        let mut metadata = HashMap::new();
        metadata.insert("event".to_string(), serde_json::Value::String(event.to_string()));
        self.write_message(channel_id, "system", content, MessageType::System, metadata, None)
            .await
    }

    /// The single write-path for messages: the only place a `channel.message`
    /// event is constructed. Every public entry point — `send_message` and
    /// the system-message helpers above — funnels through here exactly once
    /// per call.
    pub async fn send_message(
        &self,
        channel_id: &str,
        sender_id: impl Into<String>,
        content: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
        parent_message_id: Option<String>,
    ) -> ChannelResult<Message> {
        let sender_id = sender_id.into();
        let content = content.into();
        {
            let channels = self.channels.read().await;
            let channel = channels
                .get(channel_id)
                .ok_or_else(|| ChannelError::not_found("channel", channel_id))?;
            if channel.channel_type != ChannelType::Public && !channel.has_member(&sender_id) {
                return Err(ChannelError::PermissionDenied {
                    reason: format!("{sender_id} is not a member of {channel_id}"),
                });
            }
        }
        self.write_message(
            channel_id,
            sender_id,
            content,
            MessageType::Chat,
            metadata,
            parent_message_id,
        )
        .await
    }

    async fn write_message(
        &self,
        channel_id: &str,
        sender_id: impl Into<String>,
        content: impl Into<String>,
        message_type: MessageType,
        metadata: HashMap<String, serde_json::Value>,
        parent_message_id: Option<String>,
    ) -> ChannelResult<Message> {
        let message = Message::new(
            channel_id.to_string(),
            sender_id,
            content,
            message_type,
            metadata,
            parent_message_id,
        );
        {
            let mut channels = self.channels.write().await;
            let channel = channels
                .get_mut(channel_id)
                .ok_or_else(|| ChannelError::not_found("channel", channel_id))?;
            channel.message_count += 1;
            channel.last_activity = message.timestamp;
        }
        self.buffer.lock().await.push(message.clone());
        self.bus
            .emit(
                EventType::ChannelMessage,
                EventData::ChannelMessage {
                    message_id: message.id.clone(),
                    channel_id: channel_id.to_string(),
                    sender_id: message.sender_id.clone(),
                    content: message.content.clone(),
                    message_type: message.message_type.as_str().to_string(),
                    metadata: message.metadata.clone(),
                    timestamp: message.timestamp,
                },
                "channel_service",
                HashMap::new(),
            )
            .await
            .map_err(|_| ChannelError::RateLimited)?;
        Ok(message)
    }

    pub async fn get_messages(
        &self,
        channel_id: &str,
        limit: usize,
        offset: usize,
    ) -> ChannelResult<(Vec<Message>, usize, bool)> {
        self.get_channel(channel_id).await?;
        let persisted = self
            .message_repo
            .get_channel_messages(channel_id, usize::MAX, None, None, None)
            .await?;
        let buffered: Vec<Message> = self
            .buffer
            .lock()
            .await
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect();
        let mut all = persisted;
        all.extend(buffered);
        all.sort_by_key(|m| std::cmp::Reverse(m.timestamp));
        let total = all.len();
        let page: Vec<Message> = all.into_iter().skip(offset).take(limit).collect();
        let has_more = offset + page.len() < total;
        Ok((page, total, has_more))
    }

    pub async fn delete_channel(&self, channel_id: &str) -> ChannelResult<()> {
        let mut channels = self.channels.write().await;
        let channel = channels
            .get_mut(channel_id)
            .ok_or_else(|| ChannelError::not_found("channel", channel_id))?;
        if channel.is_default() {
            return Err(ChannelError::Validation(format!(
                "{channel_id} is a default channel and cannot be deleted"
            )));
        }
        channel.deleted = true;
        let channel = channel.clone();
        drop(channels);
        self.channel_repo.save(&channel).await?;
        self.bus
            .emit(
                EventType::ChannelDeleted,
                EventData::ChannelDeleted {
                    channel_id: channel_id.to_string(),
                },
                "channel_service",
                HashMap::new(),
            )
            .await
            .map_err(|_| ChannelError::RateLimited)?;
        Ok(())
    }

    /// Drains the in-memory buffer and persists each message. Persistence
    /// failures are logged and the message is dropped from the buffer
    /// rather than re-enqueued (at-most-once durability).
    pub async fn flush_now(&self) {
        let drained: Vec<Message> = {
            let mut buffer = self.buffer.lock().await;
            std::mem::take(&mut *buffer)
        };
        for message in drained {
            if let Err(e) = self.message_repo.save(&message).await {
                error!(message_id = %message.id, error = %e, "persistence fault, dropping message from buffer");
            }
        }
    }

    /// Soft-deletes empty direct channels whose last activity is older than
    /// the configured TTL.
    pub async fn cleanup_stale_direct_channels(&self) {
        let cutoff = chrono::Utc::now() - DIRECT_CHANNEL_TTL;
        let stale_ids: Vec<String> = {
            let channels = self.channels.read().await;
            channels
                .values()
                .filter(|c| {
                    c.channel_type == ChannelType::Direct
                        && !c.deleted
                        && c.members.is_empty()
                        && c.last_activity < cutoff
                })
                .map(|c| c.id.clone())
                .collect()
        };
        for id in stale_ids {
            let mut channels = self.channels.write().await;
            if let Some(channel) = channels.get_mut(&id) {
                channel.deleted = true;
                info!(channel_id = %id, "soft-deleted stale empty direct channel");
            }
        }
    }

    /// Spawns the persistence-flush and channel-cleanup background loops.
    /// Cancelling `token` stops both cleanly on the next tick.
    pub fn spawn_background_loops(self: &Arc<Self>, token: CancellationToken) {
        let flush_service = self.clone();
        let flush_interval = self.flush_interval_secs;
        tokio::spawn({
            let token = token.clone();
            async move {
                let mut ticker = tokio::time::interval(std::time::Duration::from_secs(flush_interval));
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => flush_service.flush_now().await,
                    }
                }
            }
        });

        let cleanup_service = self.clone();
        let cleanup_interval = self.cleanup_interval_secs;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(cleanup_interval));
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => cleanup_service.cleanup_stale_direct_channels().await,
                }
            }
        });
    }

    /// Registers the handler that auto-joins newly spawned minions to
    /// every public channel, reusing the ordinary `add_member` path so the
    /// join is announced through the same system-message mechanism as a
    /// human-triggered add.
    pub async fn install_minion_spawn_handler(self: &Arc<Self>) {
        self.bus
            .subscribe(
                EventType::MinionSpawned,
                Arc::new(MinionSpawnedHandler {
                    service: self.clone(),
                }),
            )
            .await;
    }
}

struct MinionSpawnedHandler {
    service: Arc<ChannelService>,
}

#[async_trait]
impl EventHandler for MinionSpawnedHandler {
    async fn handle(&self, event: &Event) {
        let EventData::MinionSpawned { minion_id } = &event.data else {
            return;
        };
        let public_channel_ids: Vec<String> = {
            let channels = self.service.channels.read().await;
            channels
                .values()
                .filter(|c| c.channel_type == ChannelType::Public && !c.deleted)
                .map(|c| c.id.clone())
                .collect()
        };
        for channel_id in public_channel_ids {
            if let Err(e) = self
                .service
                .add_member(&channel_id, minion_id.clone(), MemberRole::Member, None)
                .await
            {
                warn!(minion_id, channel_id, error = %e, "failed to auto-join spawned minion to public channel");
            }
        }
    }
}
