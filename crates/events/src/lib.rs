//! Tether push-event fan-out.
//!
//! This crate provides the process-local publish/subscribe hub that carries
//! command pushes to devices and state changes to dashboards:
//!
//! - [`RoomKey`]: typed room identity (`device:{id}` / `owner:{id}`).
//! - [`PushEvent`]: the envelope delivered to every room member.
//! - [`EventBus`]: connection registry plus room membership; delivery is
//!   at-most-once and nothing is queued for absent subscribers.

pub mod bus;
pub mod room;

pub use bus::{ConnectionId, EventBus, PushEvent, PushReceiver};
pub use room::{RoomKey, RoomKind};

/// Event names published on the bus.
pub mod names {
    /// Dispatcher → `device:{id}`: a new command to execute.
    pub const REMOTE_COMMAND: &str = "remote-command";
    /// Dispatcher → `owner:{id}`: a device reported a command outcome.
    pub const COMMAND_EXECUTED: &str = "command-executed";
    /// Ingest → `owner:{id}`: a new location sample was accepted.
    pub const LOCATION_UPDATE: &str = "location-update";
    /// Registry → `owner:{id}`: registration or heartbeat changed device state.
    pub const DEVICE_STATUS: &str = "device-status";
}
