pub mod activity_log;
pub mod command;
pub mod device;
pub mod location;
