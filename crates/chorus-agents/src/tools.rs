//! Tool dispatch: the protocol the response generator uses to act through
//! the agent runtime. Grounded on the `ToolExecutor`/`ToolRegistry`
//! pattern — a name/description/schema contract plus an async `call`,
//! registered once per runtime.

use async_trait::async_trait;
use chorus_channels::ChannelService;
use chorus_common::generator::ToolDescriptor;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("channel service error: {0}")]
    Channel(#[from] chorus_channels::ChannelError),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> serde_json::Value;
    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry::default()
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.write().await.insert(tool.name().to_string(), tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .read()
            .await
            .values()
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description().to_string(),
                schema: t.schema(),
            })
            .collect()
    }

    pub async fn execute(&self, name: &str, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let tool = self
            .get(name)
            .await
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.call(args).await
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SendChannelMessageArgs {
    pub channel: String,
    pub message: String,
}

pub struct SendChannelMessageTool {
    minion_id: String,
    channels: Arc<ChannelService>,
}

impl SendChannelMessageTool {
    pub fn new(minion_id: impl Into<String>, channels: Arc<ChannelService>) -> Self {
        SendChannelMessageTool {
            minion_id: minion_id.into(),
            channels,
        }
    }
}

#[async_trait]
impl Tool for SendChannelMessageTool {
    fn name(&self) -> &'static str {
        "send_channel_message"
    }

    fn description(&self) -> &'static str {
        "Send a chat message to a channel as this minion."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(SendChannelMessageArgs)).unwrap_or(serde_json::Value::Null)
    }

    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: SendChannelMessageArgs = parse_args(args)?;
        let preview: String = args.message.chars().take(80).collect();
        match self
            .channels
            .send_message(&args.channel, self.minion_id.clone(), args.message.clone(), HashMap::new(), None)
            .await
        {
            Ok(_) => Ok(serde_json::json!({
                "success": true,
                "tool_used": "send_channel_message",
                "channel": args.channel,
                "message_preview": preview,
            })),
            Err(e) => Ok(serde_json::json!({
                "success": false,
                "error": e.to_string(),
                "tool_used": "send_channel_message",
                "channel": args.channel,
                "message_preview": preview,
            })),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListenToChannelArgs {
    pub channel: String,
    pub duration_secs: u64,
}

/// Stub: full implementations (actually pausing to observe a channel in
/// real time) are out of core scope. Returns a structured acknowledgement
/// so the tool-call protocol still round-trips.
pub struct ListenToChannelTool;

#[async_trait]
impl Tool for ListenToChannelTool {
    fn name(&self) -> &'static str {
        "listen_to_channel"
    }

    fn description(&self) -> &'static str {
        "Observe a channel for a bounded duration without responding."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(ListenToChannelArgs)).unwrap_or(serde_json::Value::Null)
    }

    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: ListenToChannelArgs = parse_args(args)?;
        Ok(serde_json::json!({
            "success": true,
            "tool_used": "listen_to_channel",
            "channel": args.channel,
            "observed_secs": args.duration_secs,
        }))
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetChannelHistoryArgs {
    pub channel: String,
    pub limit: usize,
}

pub struct GetChannelHistoryTool {
    channels: Arc<ChannelService>,
}

impl GetChannelHistoryTool {
    pub fn new(channels: Arc<ChannelService>) -> Self {
        GetChannelHistoryTool { channels }
    }
}

#[async_trait]
impl Tool for GetChannelHistoryTool {
    fn name(&self) -> &'static str {
        "get_channel_history"
    }

    fn description(&self) -> &'static str {
        "Fetch recent messages from a channel."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(GetChannelHistoryArgs)).unwrap_or(serde_json::Value::Null)
    }

    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: GetChannelHistoryArgs = parse_args(args)?;
        let (messages, total, has_more) = self.channels.get_messages(&args.channel, args.limit, 0).await?;
        Ok(serde_json::json!({
            "success": true,
            "tool_used": "get_channel_history",
            "messages": messages,
            "total": total,
            "has_more": has_more,
        }))
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SendDirectMessageArgs {
    pub recipient: String,
    pub message: String,
}

/// Stub: direct-message delivery outside the channel abstraction is out of
/// core scope; this records intent via a structured result only.
pub struct SendDirectMessageTool;

#[async_trait]
impl Tool for SendDirectMessageTool {
    fn name(&self) -> &'static str {
        "send_direct_message"
    }

    fn description(&self) -> &'static str {
        "Send a private message to another participant."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(SendDirectMessageArgs)).unwrap_or(serde_json::Value::Null)
    }

    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: SendDirectMessageArgs = parse_args(args)?;
        Ok(serde_json::json!({
            "success": true,
            "tool_used": "send_direct_message",
            "recipient": args.recipient,
            "message_preview": args.message.chars().take(80).collect::<String>(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_bus::EventBus;
    use chorus_common::domain::ChannelType;
    use chorus_common::repo::{InMemoryChannelRepository, InMemoryMessageRepository};

    async fn service() -> Arc<ChannelService> {
        let bus = Arc::new(EventBus::new(1000, 1000));
        let service = ChannelService::new(
            bus,
            Arc::new(InMemoryChannelRepository::default()),
            Arc::new(InMemoryMessageRepository::default()),
            5,
            3600,
        );
        service
            .create_channel("c1", "random", ChannelType::Public, None, None, HashMap::new())
            .await
            .unwrap();
        service
    }

    #[tokio::test]
    async fn send_channel_message_tool_reports_success() {
        let channels = service().await;
        let tool = SendChannelMessageTool::new("aria", channels);
        let result = tool
            .call(serde_json::json!({"channel": "c1", "message": "hi there"}))
            .await
            .unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["tool_used"], "send_channel_message");
    }

    #[tokio::test]
    async fn send_channel_message_tool_reports_failure_for_missing_channel() {
        let channels = service().await;
        let tool = SendChannelMessageTool::new("aria", channels);
        let result = tool
            .call(serde_json::json!({"channel": "ghost", "message": "hi"}))
            .await
            .unwrap();
        assert_eq!(result["success"], false);
    }

    #[tokio::test]
    async fn registry_executes_by_name() {
        let channels = service().await;
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SendChannelMessageTool::new("aria", channels))).await;
        let result = registry
            .execute("send_channel_message", serde_json::json!({"channel": "c1", "message": "hi"}))
            .await
            .unwrap();
        assert_eq!(result["success"], true);
    }

    #[tokio::test]
    async fn registry_reports_unknown_tool() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nonexistent", serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::UnknownTool(_))));
    }
}
