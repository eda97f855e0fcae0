//! The per-minion reactive loop: subscribes to channel traffic, decides
//! when to respond, invokes a response generator, and dispatches tool
//! calls through a registry. Never emits `channel.message` directly.

pub mod error;
pub mod runtime;
pub mod tools;

pub use error::{AgentError, AgentResult};
pub use runtime::{AgentRuntime, AgentState};
pub use tools::{
    GetChannelHistoryTool, ListenToChannelTool, SendChannelMessageTool, SendDirectMessageTool, Tool, ToolError,
    ToolRegistry,
};
