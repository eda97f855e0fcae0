//! Error taxonomy for the per-minion reactive loop.

use chorus_common::generator::GeneratorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("response generator error: {0}")]
    Generator(#[from] GeneratorError),
    #[error("tool dispatch error: {0}")]
    Tool(#[from] crate::tools::ToolError),
    #[error("exhausted retries for minion {minion_id}")]
    ExhaustedRetries { minion_id: String },
}

impl AgentError {
    /// Generator timeouts and backend hiccups are worth a retry; a
    /// cancelled in-flight call (shutdown) is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::Generator(GeneratorError::Timeout) | AgentError::Generator(GeneratorError::Backend(_))
        )
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
