//! WebSocket push channel.
//!
//! Authenticates the upgrade request, attaches the connection to the
//! [`EventBus`](tether_events::EventBus) and lets clients join the rooms they
//! are entitled to.

mod handler;
pub mod protocol;

pub use handler::ws_handler;
