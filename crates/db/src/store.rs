//! The storage capability consumed by the engine.
//!
//! Row-level CRUD only: callers must not assume any isolation between two
//! calls. Every method is a single statement in the Postgres backend.

use async_trait::async_trait;
use tether_core::command::CommandType;
use tether_core::device::DeviceStatus;
use tether_core::types::{DbId, Timestamp};

use crate::error::StoreResult;
use crate::models::activity_log::{ActivityLog, NewActivityLog};
use crate::models::command::{Command, CommandResolution, NewCommand};
use crate::models::device::{Device, UpsertDevice};
use crate::models::location::{LocationFilter, LocationSample, NewLocation};

#[async_trait]
pub trait Store: Send + Sync {
    /// Verify the backend is reachable.
    async fn health_check(&self) -> StoreResult<()>;

    // -- devices ------------------------------------------------------------

    /// Insert the device, or refresh it if `device_id` exists and belongs to
    /// the same user.
    ///
    /// Returns `None` when the id is already registered to another user.
    async fn upsert_device(&self, input: &UpsertDevice) -> StoreResult<Option<Device>>;

    async fn find_device(&self, device_id: &str) -> StoreResult<Option<Device>>;

    /// All devices owned by `user_id`, ordered by name.
    async fn list_devices_by_owner(&self, user_id: DbId) -> StoreResult<Vec<Device>>;

    async fn set_lock_flag(&self, device_id: &str, locked: bool) -> StoreResult<()>;

    async fn set_alarm_flag(&self, device_id: &str, active: bool) -> StoreResult<()>;

    async fn set_battery_level(&self, device_id: &str, level: i16) -> StoreResult<()>;

    async fn touch_last_seen(&self, device_id: &str, at: Timestamp) -> StoreResult<()>;

    /// Update self-reported status fields; `None` leaves a field unchanged.
    async fn update_device_state(
        &self,
        device_id: &str,
        status: Option<DeviceStatus>,
        network_type: Option<&str>,
    ) -> StoreResult<()>;

    /// Delete the device and, by cascade, its commands, locations and logs.
    async fn delete_device(&self, device_id: &str) -> StoreResult<bool>;

    // -- commands -----------------------------------------------------------

    /// Insert a pending command. Ids are strictly increasing.
    async fn insert_command(&self, input: &NewCommand) -> StoreResult<Command>;

    async fn find_command(&self, id: DbId) -> StoreResult<Option<Command>>;

    /// Overwrite status, response and execution time (last write wins).
    async fn resolve_command(
        &self,
        id: DbId,
        resolution: &CommandResolution,
    ) -> StoreResult<Option<Command>>;

    /// Pending commands for a device, oldest first.
    async fn list_pending_commands(&self, device_id: &str) -> StoreResult<Vec<Command>>;

    /// All commands for a device, newest first.
    async fn list_commands(&self, device_id: &str, limit: i64) -> StoreResult<Vec<Command>>;

    /// Id of the newest command for a device whose type is in `types`.
    async fn latest_command_id(
        &self,
        device_id: &str,
        types: &[CommandType],
    ) -> StoreResult<Option<DbId>>;

    // -- locations ----------------------------------------------------------

    async fn insert_location(&self, input: &NewLocation) -> StoreResult<LocationSample>;

    /// Samples matching `filter`, newest first.
    async fn list_locations(
        &self,
        device_id: &str,
        filter: &LocationFilter,
    ) -> StoreResult<Vec<LocationSample>>;

    async fn latest_location(&self, device_id: &str) -> StoreResult<Option<LocationSample>>;

    // -- activity log -------------------------------------------------------

    async fn append_log(&self, input: &NewActivityLog) -> StoreResult<ActivityLog>;

    /// Log entries for a device, newest first.
    async fn list_logs(&self, device_id: &str, limit: i64) -> StoreResult<Vec<ActivityLog>>;
}
