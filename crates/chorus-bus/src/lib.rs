//! Single in-process pub/sub: typed events, per-source rate limiting,
//! bounded history, and isolated concurrent handler execution. This is the
//! sole inter-component communication channel for events in the workspace.

pub mod bus;
pub mod error;
pub mod handler;
pub mod history;
pub mod rate_limit;

pub use bus::EventBus;
pub use error::{BusError, BusResult};
pub use handler::{EventHandler, Subscription};
pub use rate_limit::RateLimitState;
