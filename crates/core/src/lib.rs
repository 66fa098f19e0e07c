//! Pure domain logic for the Tether device command service.
//!
//! Everything in this crate is free of I/O so it can be shared by the
//! storage layer, the event bus, and the HTTP surface alike.

pub mod command;
pub mod device;
pub mod error;
pub mod geo;
pub mod presence;
pub mod types;
