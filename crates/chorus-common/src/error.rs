use thiserror::Error;

/// Shared error taxonomy used where a crate-specific error enum would be
/// overkill (config loading, repository stand-ins). Per-crate error enums
/// (`chorus_bus::BusError`, `chorus_channels::ChannelError`, ...) follow the
/// same shape and wrap `CommonError` via `#[from]` where appropriate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommonError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{resource_type} not found: {resource_id}")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CommonError {
    pub fn not_found(resource_type: &'static str, resource_id: impl Into<String>) -> Self {
        CommonError::NotFound {
            resource_type,
            resource_id: resource_id.into(),
        }
    }

    /// Fatal errors abort the process (wiring/config failures); everything
    /// else is reported to a caller or absorbed by the core per the error
    /// propagation policy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommonError::Config(_) | CommonError::Io(_))
    }
}

pub type CommonResult<T> = Result<T, CommonError>;
