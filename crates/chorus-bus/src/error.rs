use thiserror::Error;

/// Mirrors the shape of `agent_network::error::AgentNetworkError`: a closed,
/// non-exhaustive enum with `is_retryable`/`is_critical` helpers so callers
/// can decide whether to surface, log, or abort without matching on every
/// variant.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BusError {
    #[error("rate limit exceeded for source `{source_name}`")]
    RateLimited { source_name: String },
}

impl BusError {
    /// Rate limiting is the only user-visible emit failure and it is
    /// transient by construction: retrying after the window slides is
    /// always the right caller response.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BusError::RateLimited { .. })
    }

    pub fn is_critical(&self) -> bool {
        false
    }
}

pub type BusResult<T> = Result<T, BusError>;
