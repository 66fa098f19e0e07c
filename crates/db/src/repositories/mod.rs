//! Query functions over the Postgres tables, one repository per table.
//!
//! Repositories return raw rows; [`PgStore`](crate::PgStore) decodes them
//! into domain types.

pub mod activity_log_repo;
pub mod command_repo;
pub mod device_repo;
pub mod location_repo;

pub use activity_log_repo::ActivityLogRepo;
pub use command_repo::CommandRepo;
pub use device_repo::DeviceRepo;
pub use location_repo::LocationRepo;
