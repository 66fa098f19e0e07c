//! In-process [`Store`] used by tests and by local runs without a database.
//!
//! Mirrors the Postgres semantics that callers can observe: owner-guarded
//! upserts, strictly increasing ids, cascade on device delete, and the same
//! orderings for every list query.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tether_core::command::{CommandStatus, CommandType};
use tether_core::device::DeviceStatus;
use tether_core::types::{DbId, Timestamp};
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::models::activity_log::{ActivityLog, NewActivityLog};
use crate::models::command::{Command, CommandResolution, NewCommand};
use crate::models::device::{Device, UpsertDevice};
use crate::models::location::{LocationFilter, LocationSample, NewLocation};
use crate::store::Store;

#[derive(Default)]
struct State {
    devices: HashMap<String, Device>,
    commands: BTreeMap<DbId, Command>,
    locations: BTreeMap<DbId, LocationSample>,
    logs: BTreeMap<DbId, ActivityLog>,
    last_command_id: DbId,
    last_location_id: DbId,
    last_log_id: DbId,
}

/// [`Store`] held entirely in memory behind a single mutex.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn with_device<F>(&self, device_id: &str, f: F)
    where
        F: FnOnce(&mut Device) + Send,
    {
        let mut state = self.state.lock().await;
        if let Some(device) = state.devices.get_mut(device_id) {
            f(device);
        }
    }
}

fn ensure_device(state: &State, device_id: &str) -> StoreResult<()> {
    if state.devices.contains_key(device_id) {
        Ok(())
    } else {
        Err(StoreError::MissingDevice(device_id.to_string()))
    }
}

fn next_id(counter: &mut DbId) -> DbId {
    *counter += 1;
    *counter
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn upsert_device(&self, input: &UpsertDevice) -> StoreResult<Option<Device>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        if let Some(existing) = state.devices.get_mut(&input.device_id) {
            if existing.user_id != input.user_id {
                return Ok(None);
            }
            existing.name = input.name.clone();
            existing.model = input.model.clone();
            existing.platform_version = input.platform_version.clone();
            existing.status = DeviceStatus::Active;
            existing.last_seen = input.seen_at;
            existing.updated_at = now;
            return Ok(Some(existing.clone()));
        }

        let device = Device {
            device_id: input.device_id.clone(),
            user_id: input.user_id,
            name: input.name.clone(),
            model: input.model.clone(),
            platform_version: input.platform_version.clone(),
            network_type: None,
            is_locked: false,
            alarm_active: false,
            battery_level: None,
            status: DeviceStatus::Active,
            last_seen: input.seen_at,
            created_at: now,
            updated_at: now,
        };
        state
            .devices
            .insert(device.device_id.clone(), device.clone());
        Ok(Some(device))
    }

    async fn find_device(&self, device_id: &str) -> StoreResult<Option<Device>> {
        Ok(self.state.lock().await.devices.get(device_id).cloned())
    }

    async fn list_devices_by_owner(&self, user_id: DbId) -> StoreResult<Vec<Device>> {
        let state = self.state.lock().await;
        let mut devices: Vec<Device> = state
            .devices
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        devices.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.device_id.cmp(&b.device_id))
        });
        Ok(devices)
    }

    async fn set_lock_flag(&self, device_id: &str, locked: bool) -> StoreResult<()> {
        self.with_device(device_id, |d| {
            d.is_locked = locked;
            d.updated_at = Utc::now();
        })
        .await;
        Ok(())
    }

    async fn set_alarm_flag(&self, device_id: &str, active: bool) -> StoreResult<()> {
        self.with_device(device_id, |d| {
            d.alarm_active = active;
            d.updated_at = Utc::now();
        })
        .await;
        Ok(())
    }

    async fn set_battery_level(&self, device_id: &str, level: i16) -> StoreResult<()> {
        self.with_device(device_id, |d| {
            d.battery_level = Some(level);
            d.updated_at = Utc::now();
        })
        .await;
        Ok(())
    }

    async fn touch_last_seen(&self, device_id: &str, at: Timestamp) -> StoreResult<()> {
        self.with_device(device_id, |d| d.last_seen = at).await;
        Ok(())
    }

    async fn update_device_state(
        &self,
        device_id: &str,
        status: Option<DeviceStatus>,
        network_type: Option<&str>,
    ) -> StoreResult<()> {
        let network_type = network_type.map(str::to_string);
        self.with_device(device_id, move |d| {
            if let Some(status) = status {
                d.status = status;
            }
            if let Some(network_type) = network_type {
                d.network_type = Some(network_type);
            }
            d.updated_at = Utc::now();
        })
        .await;
        Ok(())
    }

    async fn delete_device(&self, device_id: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        if state.devices.remove(device_id).is_none() {
            return Ok(false);
        }
        state.commands.retain(|_, c| c.device_id != device_id);
        state.locations.retain(|_, l| l.device_id != device_id);
        state.logs.retain(|_, l| l.device_id != device_id);
        Ok(true)
    }

    async fn insert_command(&self, input: &NewCommand) -> StoreResult<Command> {
        let mut state = self.state.lock().await;
        ensure_device(&state, &input.device_id)?;
        let id = next_id(&mut state.last_command_id);
        let command = Command {
            id,
            device_id: input.device_id.clone(),
            user_id: input.user_id,
            payload: input.payload.clone(),
            status: CommandStatus::Pending,
            sent_at: input.sent_at,
            executed_at: None,
            response: None,
        };
        state.commands.insert(id, command.clone());
        Ok(command)
    }

    async fn find_command(&self, id: DbId) -> StoreResult<Option<Command>> {
        Ok(self.state.lock().await.commands.get(&id).cloned())
    }

    async fn resolve_command(
        &self,
        id: DbId,
        resolution: &CommandResolution,
    ) -> StoreResult<Option<Command>> {
        let mut state = self.state.lock().await;
        Ok(state.commands.get_mut(&id).map(|command| {
            command.status = resolution.status;
            command.response = resolution.response.clone();
            command.executed_at = Some(resolution.executed_at);
            command.clone()
        }))
    }

    async fn list_pending_commands(&self, device_id: &str) -> StoreResult<Vec<Command>> {
        let state = self.state.lock().await;
        Ok(state
            .commands
            .values()
            .filter(|c| c.device_id == device_id && c.status == CommandStatus::Pending)
            .cloned()
            .collect())
    }

    async fn list_commands(&self, device_id: &str, limit: i64) -> StoreResult<Vec<Command>> {
        let state = self.state.lock().await;
        Ok(state
            .commands
            .values()
            .rev()
            .filter(|c| c.device_id == device_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn latest_command_id(
        &self,
        device_id: &str,
        types: &[CommandType],
    ) -> StoreResult<Option<DbId>> {
        let state = self.state.lock().await;
        Ok(state
            .commands
            .values()
            .rev()
            .find(|c| c.device_id == device_id && types.contains(&c.command_type()))
            .map(|c| c.id))
    }

    async fn insert_location(&self, input: &NewLocation) -> StoreResult<LocationSample> {
        let mut state = self.state.lock().await;
        ensure_device(&state, &input.device_id)?;
        let id = next_id(&mut state.last_location_id);
        let sample = LocationSample {
            id,
            device_id: input.device_id.clone(),
            latitude: input.coordinates.latitude,
            longitude: input.coordinates.longitude,
            accuracy: input.accuracy,
            altitude: input.altitude,
            bearing: input.bearing,
            speed: input.speed,
            source: input.source.clone(),
            address: input.address.clone(),
            timestamp: input.timestamp,
        };
        state.locations.insert(id, sample.clone());
        Ok(sample)
    }

    async fn list_locations(
        &self,
        device_id: &str,
        filter: &LocationFilter,
    ) -> StoreResult<Vec<LocationSample>> {
        let state = self.state.lock().await;
        let mut samples: Vec<LocationSample> = state
            .locations
            .values()
            .filter(|l| l.device_id == device_id && filter.matches(l))
            .cloned()
            .collect();
        samples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        samples.truncate(usize::try_from(filter.effective_limit()).unwrap_or(0));
        Ok(samples)
    }

    async fn latest_location(&self, device_id: &str) -> StoreResult<Option<LocationSample>> {
        let state = self.state.lock().await;
        Ok(state
            .locations
            .values()
            .filter(|l| l.device_id == device_id)
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn append_log(&self, input: &NewActivityLog) -> StoreResult<ActivityLog> {
        let mut state = self.state.lock().await;
        ensure_device(&state, &input.device_id)?;
        let id = next_id(&mut state.last_log_id);
        let entry = ActivityLog {
            id,
            device_id: input.device_id.clone(),
            user_id: input.user_id,
            action: input.action.to_string(),
            details: input.details.clone(),
            created_at: Utc::now(),
        };
        state.logs.insert(id, entry.clone());
        Ok(entry)
    }

    async fn list_logs(&self, device_id: &str, limit: i64) -> StoreResult<Vec<ActivityLog>> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .values()
            .rev()
            .filter(|l| l.device_id == device_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }
}
