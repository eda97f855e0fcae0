//! The WebSocket bridge: the single place internal events cross into the
//! network. Projects a curated allow-list of bus events into a flat wire
//! frame and fans each out to the clients subscribed to its channel or
//! minion, per connection.

pub mod bridge;
pub mod server;
pub mod types;
pub mod ws;

pub use bridge::{ClientHandle, WebSocketBridge};
pub use types::{ClientCommand, WireFrame};
