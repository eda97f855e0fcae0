use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChannelError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{resource_type} not found: {resource_id}")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },

    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("rate limited")]
    RateLimited,

    #[error(transparent)]
    Repository(#[from] chorus_common::error::CommonError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChannelError {
    pub fn not_found(resource_type: &'static str, resource_id: impl Into<String>) -> Self {
        ChannelError::NotFound {
            resource_type,
            resource_id: resource_id.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ChannelError::RateLimited)
    }

    pub fn is_critical(&self) -> bool {
        false
    }
}

pub type ChannelResult<T> = Result<T, ChannelError>;
