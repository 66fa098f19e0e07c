//! Device command and presence engine.
//!
//! The [`DeviceRegistry`] owns device records and ownership checks, the
//! [`CommandDispatcher`] runs the command lifecycle on top of it, and
//! [`LocationIngest`] accepts location samples. All three publish state
//! changes on the shared event bus.

pub mod dispatcher;
pub mod geofence;
pub mod ingest;
pub mod registry;

pub use dispatcher::CommandDispatcher;
pub use ingest::LocationIngest;
pub use registry::DeviceRegistry;
