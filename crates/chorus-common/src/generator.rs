//! The response-generator interface: an opaque LLM collaborator consumed
//! by both the agent runtime (conversational turns) and, optionally, the
//! emotional engine's policy-driven mood heuristic. Defined here rather
//! than in either consuming crate so both can depend on the contract
//! without depending on each other.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GenerationOutcome {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl GenerationConfig {
    pub fn for_persona(temperature: f32, max_output_tokens: u32) -> Self {
        GenerationConfig {
            temperature,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens,
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GeneratorError {
    #[error("generator call timed out")]
    Timeout,
    #[error("generator call cancelled")]
    Cancelled,
    #[error("generator backend error: {0}")]
    Backend(String),
}

/// Given a system instruction, a materialized transcript, and the tools
/// available this turn, returns either a plain textual response or a
/// sequence of tool calls. Never implemented in this workspace beyond
/// test-only mocks — the LLM stays an opaque collaborator.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(
        &self,
        system_instruction: &str,
        history: &str,
        tools: &[ToolDescriptor],
        config: &GenerationConfig,
    ) -> Result<GenerationOutcome, GeneratorError>;
}
