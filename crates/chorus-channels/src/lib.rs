//! Authoritative channel/message state and the sole emitter of
//! `channel.*` events.

pub mod error;
pub mod service;

pub use error::{ChannelError, ChannelResult};
pub use service::ChannelService;
