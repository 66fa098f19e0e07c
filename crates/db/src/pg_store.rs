//! PostgreSQL-backed [`Store`].

use async_trait::async_trait;
use tether_core::command::CommandType;
use tether_core::device::DeviceStatus;
use tether_core::types::{DbId, Timestamp};

use crate::error::{StoreError, StoreResult};
use crate::models::activity_log::{ActivityLog, NewActivityLog};
use crate::models::command::{Command, CommandResolution, CommandRow, NewCommand};
use crate::models::device::{Device, UpsertDevice};
use crate::models::location::{LocationFilter, LocationSample, NewLocation};
use crate::repositories::{ActivityLogRepo, CommandRepo, DeviceRepo, LocationRepo};
use crate::store::Store;
use crate::DbPool;

/// [`Store`] over a sqlx connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn decode_commands(rows: Vec<CommandRow>) -> StoreResult<Vec<Command>> {
    rows.into_iter().map(Command::try_from).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(crate::health_check(&self.pool).await?)
    }

    async fn upsert_device(&self, input: &UpsertDevice) -> StoreResult<Option<Device>> {
        DeviceRepo::upsert(&self.pool, input)
            .await?
            .map(Device::try_from)
            .transpose()
    }

    async fn find_device(&self, device_id: &str) -> StoreResult<Option<Device>> {
        DeviceRepo::find_by_id(&self.pool, device_id)
            .await?
            .map(Device::try_from)
            .transpose()
    }

    async fn list_devices_by_owner(&self, user_id: DbId) -> StoreResult<Vec<Device>> {
        DeviceRepo::list_by_owner(&self.pool, user_id)
            .await?
            .into_iter()
            .map(Device::try_from)
            .collect()
    }

    async fn set_lock_flag(&self, device_id: &str, locked: bool) -> StoreResult<()> {
        Ok(DeviceRepo::set_lock_flag(&self.pool, device_id, locked).await?)
    }

    async fn set_alarm_flag(&self, device_id: &str, active: bool) -> StoreResult<()> {
        Ok(DeviceRepo::set_alarm_flag(&self.pool, device_id, active).await?)
    }

    async fn set_battery_level(&self, device_id: &str, level: i16) -> StoreResult<()> {
        Ok(DeviceRepo::set_battery_level(&self.pool, device_id, level).await?)
    }

    async fn touch_last_seen(&self, device_id: &str, at: Timestamp) -> StoreResult<()> {
        Ok(DeviceRepo::touch_last_seen(&self.pool, device_id, at).await?)
    }

    async fn update_device_state(
        &self,
        device_id: &str,
        status: Option<DeviceStatus>,
        network_type: Option<&str>,
    ) -> StoreResult<()> {
        Ok(DeviceRepo::update_state(
            &self.pool,
            device_id,
            status.map(DeviceStatus::as_str),
            network_type,
        )
        .await?)
    }

    async fn delete_device(&self, device_id: &str) -> StoreResult<bool> {
        Ok(DeviceRepo::delete(&self.pool, device_id).await?)
    }

    async fn insert_command(&self, input: &NewCommand) -> StoreResult<Command> {
        let (command_type, payload) = input.payload.to_parts();
        let row = CommandRepo::create(
            &self.pool,
            &input.device_id,
            input.user_id,
            command_type.as_str(),
            &payload,
            input.sent_at,
        )
        .await
        .map_err(|e| StoreError::from_insert(e, &input.device_id))?;
        Command::try_from(row)
    }

    async fn find_command(&self, id: DbId) -> StoreResult<Option<Command>> {
        CommandRepo::find_by_id(&self.pool, id)
            .await?
            .map(Command::try_from)
            .transpose()
    }

    async fn resolve_command(
        &self,
        id: DbId,
        resolution: &CommandResolution,
    ) -> StoreResult<Option<Command>> {
        CommandRepo::resolve(
            &self.pool,
            id,
            resolution.status.as_str(),
            resolution.response.as_ref(),
            resolution.executed_at,
        )
        .await?
        .map(Command::try_from)
        .transpose()
    }

    async fn list_pending_commands(&self, device_id: &str) -> StoreResult<Vec<Command>> {
        decode_commands(CommandRepo::list_pending(&self.pool, device_id).await?)
    }

    async fn list_commands(&self, device_id: &str, limit: i64) -> StoreResult<Vec<Command>> {
        decode_commands(CommandRepo::list_by_device(&self.pool, device_id, limit).await?)
    }

    async fn latest_command_id(
        &self,
        device_id: &str,
        types: &[CommandType],
    ) -> StoreResult<Option<DbId>> {
        let types: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
        Ok(CommandRepo::latest_id_of_types(&self.pool, device_id, &types).await?)
    }

    async fn insert_location(&self, input: &NewLocation) -> StoreResult<LocationSample> {
        LocationRepo::create(&self.pool, input)
            .await
            .map_err(|e| StoreError::from_insert(e, &input.device_id))
    }

    async fn list_locations(
        &self,
        device_id: &str,
        filter: &LocationFilter,
    ) -> StoreResult<Vec<LocationSample>> {
        Ok(LocationRepo::list(&self.pool, device_id, filter).await?)
    }

    async fn latest_location(&self, device_id: &str) -> StoreResult<Option<LocationSample>> {
        Ok(LocationRepo::latest(&self.pool, device_id).await?)
    }

    async fn append_log(&self, input: &NewActivityLog) -> StoreResult<ActivityLog> {
        ActivityLogRepo::create(&self.pool, input)
            .await
            .map_err(|e| StoreError::from_insert(e, &input.device_id))
    }

    async fn list_logs(&self, device_id: &str, limit: i64) -> StoreResult<Vec<ActivityLog>> {
        Ok(ActivityLogRepo::list_by_device(&self.pool, device_id, limit).await?)
    }
}
