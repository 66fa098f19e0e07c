pub mod commands;
pub mod devices;
pub mod location;
