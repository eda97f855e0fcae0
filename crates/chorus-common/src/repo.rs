//! Repository traits treated as opaque collaborators: this crate defines
//! only the contracts and an in-memory stand-in, since durable persistence
//! is explicitly out of scope. Concrete storage crates implement these
//! contracts downstream.

use crate::domain::{Channel, Message, Minion, MinionStatus, Task, TaskStatus};
use crate::error::CommonResult;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn save(&self, channel: &Channel) -> CommonResult<()>;
    async fn get_by_id(&self, id: &str) -> CommonResult<Option<Channel>>;
    async fn list_all(&self, limit: usize, offset: usize) -> CommonResult<Vec<Channel>>;
    async fn list_active(&self) -> CommonResult<Vec<Channel>>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn save(&self, message: &Message) -> CommonResult<()>;
    async fn get_channel_messages(
        &self,
        channel_id: &str,
        limit: usize,
        before: Option<chrono::DateTime<chrono::Utc>>,
        after: Option<chrono::DateTime<chrono::Utc>>,
        sender_id: Option<&str>,
    ) -> CommonResult<Vec<Message>>;
}

#[async_trait]
pub trait MinionRepository: Send + Sync {
    async fn save(&self, minion: &Minion) -> CommonResult<()>;
    async fn get_by_id(&self, id: &str) -> CommonResult<Option<Minion>>;
    async fn list_all(&self) -> CommonResult<Vec<Minion>>;
    async fn list_by_status(&self, status: MinionStatus) -> CommonResult<Vec<Minion>>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn save(&self, task: &Task) -> CommonResult<()>;
    async fn get_by_id(&self, id: &str) -> CommonResult<Option<Task>>;
    async fn list_all(&self) -> CommonResult<Vec<Task>>;
    async fn list_by_status(&self, status: TaskStatus) -> CommonResult<Vec<Task>>;
}

#[derive(Default)]
pub struct InMemoryChannelRepository {
    channels: RwLock<HashMap<String, Channel>>,
}

#[async_trait]
impl ChannelRepository for InMemoryChannelRepository {
    async fn save(&self, channel: &Channel) -> CommonResult<()> {
        self.channels
            .write()
            .await
            .insert(channel.id.clone(), channel.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> CommonResult<Option<Channel>> {
        Ok(self.channels.read().await.get(id).cloned())
    }

    async fn list_all(&self, limit: usize, offset: usize) -> CommonResult<Vec<Channel>> {
        let channels = self.channels.read().await;
        Ok(channels.values().skip(offset).take(limit).cloned().collect())
    }

    async fn list_active(&self) -> CommonResult<Vec<Channel>> {
        let channels = self.channels.read().await;
        Ok(channels.values().filter(|c| !c.deleted).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn save(&self, message: &Message) -> CommonResult<()> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn get_channel_messages(
        &self,
        channel_id: &str,
        limit: usize,
        before: Option<chrono::DateTime<chrono::Utc>>,
        after: Option<chrono::DateTime<chrono::Utc>>,
        sender_id: Option<&str>,
    ) -> CommonResult<Vec<Message>> {
        let messages = self.messages.read().await;
        let mut matching: Vec<Message> = messages
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .filter(|m| before.map_or(true, |b| m.timestamp < b))
            .filter(|m| after.map_or(true, |a| m.timestamp > a))
            .filter(|m| sender_id.map_or(true, |s| m.sender_id == s))
            .cloned()
            .collect();
        matching.sort_by_key(|m| std::cmp::Reverse(m.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryMinionRepository {
    minions: RwLock<HashMap<String, Minion>>,
}

#[async_trait]
impl MinionRepository for InMemoryMinionRepository {
    async fn save(&self, minion: &Minion) -> CommonResult<()> {
        self.minions
            .write()
            .await
            .insert(minion.id.clone(), minion.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> CommonResult<Option<Minion>> {
        Ok(self.minions.read().await.get(id).cloned())
    }

    async fn list_all(&self) -> CommonResult<Vec<Minion>> {
        Ok(self.minions.read().await.values().cloned().collect())
    }

    async fn list_by_status(&self, status: MinionStatus) -> CommonResult<Vec<Minion>> {
        Ok(self
            .minions
            .read()
            .await
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<String, Task>>,
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn save(&self, task: &Task) -> CommonResult<()> {
        self.tasks.write().await.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> CommonResult<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn list_all(&self) -> CommonResult<Vec<Task>> {
        Ok(self.tasks.read().await.values().cloned().collect())
    }

    async fn list_by_status(&self, status: TaskStatus) -> CommonResult<Vec<Task>> {
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect())
    }
}
