//! Device registry: ownership checks, registration, liveness and the cached
//! control flags.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tether_core::command::FlagUpdate;
use tether_core::device::{
    validate_battery_level, validate_device_id, validate_device_name, DeviceStatus,
};
use tether_core::error::CoreError;
use tether_core::types::DbId;
use tether_db::models::activity_log::{actions, ActivityLog, NewActivityLog};
use tether_db::models::device::{Device, DeviceView, UpsertDevice};
use tether_db::{Store, StoreResult};
use tether_events::{names, EventBus, RoomKey};

use crate::error::AppResult;

/// Fields a device supplies when it registers.
#[derive(Debug, Clone)]
pub struct Registration {
    pub device_id: String,
    pub name: String,
    pub model: Option<String>,
    pub platform_version: Option<String>,
}

/// Self-reported state carried by a heartbeat.
#[derive(Debug, Clone, Default)]
pub struct Heartbeat {
    pub status: Option<DeviceStatus>,
    pub battery_level: Option<i16>,
    pub network_type: Option<String>,
}

/// Authoritative record of devices and their cached flags.
pub struct DeviceRegistry {
    store: Arc<dyn Store>,
    event_bus: Arc<EventBus>,
}

impl DeviceRegistry {
    pub fn new(store: Arc<dyn Store>, event_bus: Arc<EventBus>) -> Self {
        Self { store, event_bus }
    }

    /// Create the device or refresh its metadata. Idempotent per `device_id`.
    ///
    /// Fails with `Conflict` when the id is registered to another user.
    pub async fn register(&self, user_id: DbId, input: Registration) -> AppResult<Device> {
        validate_device_id(&input.device_id)?;
        validate_device_name(&input.name)?;

        let upsert = UpsertDevice {
            device_id: input.device_id,
            user_id,
            name: input.name.trim().to_string(),
            model: input.model,
            platform_version: input.platform_version,
            seen_at: Utc::now(),
        };
        let device = self.store.upsert_device(&upsert).await?.ok_or_else(|| {
            CoreError::Conflict(format!(
                "Device {} is registered to another account",
                upsert.device_id
            ))
        })?;

        tracing::info!(device_id = %device.device_id, user_id, "Device registered");
        self.record_activity(
            &device.device_id,
            user_id,
            actions::DEVICE_REGISTERED,
            json!({
                "name": device.name,
                "model": device.model,
                "platformVersion": device.platform_version,
            }),
        )
        .await;
        self.publish_status(&device).await;
        Ok(device)
    }

    /// Fetch a device on behalf of `user_id`.
    ///
    /// A missing device and a device owned by someone else produce the same
    /// `NotFound` error.
    pub async fn get_owned(&self, user_id: DbId, device_id: &str) -> AppResult<Device> {
        match self.store.find_device(device_id).await? {
            Some(device) if device.is_owned_by(user_id) => Ok(device),
            _ => Err(CoreError::device_not_found(device_id).into()),
        }
    }

    pub async fn list_by_owner(&self, user_id: DbId) -> AppResult<Vec<Device>> {
        Ok(self.store.list_devices_by_owner(user_id).await?)
    }

    /// Record liveness and self-reported state, then notify the owner.
    pub async fn heartbeat(
        &self,
        user_id: DbId,
        device_id: &str,
        beat: Heartbeat,
    ) -> AppResult<Device> {
        if let Some(level) = beat.battery_level {
            validate_battery_level(level)?;
        }
        self.get_owned(user_id, device_id).await?;

        self.store.touch_last_seen(device_id, Utc::now()).await?;
        if let Some(level) = beat.battery_level {
            self.store.set_battery_level(device_id, level).await?;
        }
        if beat.status.is_some() || beat.network_type.is_some() {
            self.store
                .update_device_state(device_id, beat.status, beat.network_type.as_deref())
                .await?;
        }

        let device = self.get_owned(user_id, device_id).await?;
        tracing::debug!(device_id, user_id, battery = ?device.battery_level, "Heartbeat");
        self.publish_status(&device).await;
        Ok(device)
    }

    /// Delete an owned device together with its commands, locations and logs.
    pub async fn delete(&self, user_id: DbId, device_id: &str) -> AppResult<()> {
        self.get_owned(user_id, device_id).await?;
        if !self.store.delete_device(device_id).await? {
            return Err(CoreError::device_not_found(device_id).into());
        }
        tracing::info!(device_id, user_id, "Device deleted");
        Ok(())
    }

    /// Activity log of an owned device, newest first.
    pub async fn logs(
        &self,
        user_id: DbId,
        device_id: &str,
        limit: i64,
    ) -> AppResult<Vec<ActivityLog>> {
        self.get_owned(user_id, device_id).await?;
        Ok(self.store.list_logs(device_id, limit).await?)
    }

    /// Write one cached control flag.
    pub async fn apply_flag(&self, device_id: &str, update: FlagUpdate) -> StoreResult<()> {
        match update {
            FlagUpdate::Locked(locked) => self.store.set_lock_flag(device_id, locked).await,
            FlagUpdate::Alarm(active) => self.store.set_alarm_flag(device_id, active).await,
        }
    }

    pub async fn touch_last_seen(&self, device_id: &str) -> StoreResult<()> {
        self.store.touch_last_seen(device_id, Utc::now()).await
    }

    pub async fn set_battery_level(&self, device_id: &str, level: i16) -> AppResult<()> {
        validate_battery_level(level)?;
        Ok(self.store.set_battery_level(device_id, level).await?)
    }

    /// Append an audit entry. Failures are logged and otherwise ignored.
    pub(crate) async fn record_activity(
        &self,
        device_id: &str,
        user_id: DbId,
        action: &'static str,
        details: serde_json::Value,
    ) {
        let entry = NewActivityLog {
            device_id: device_id.to_string(),
            user_id,
            action,
            details,
        };
        if let Err(e) = self.store.append_log(&entry).await {
            tracing::warn!(device_id, action, error = %e, "Failed to append activity log");
        }
    }

    async fn publish_status(&self, device: &Device) {
        let view = DeviceView::at(device.clone(), Utc::now());
        let data = serde_json::to_value(&view).unwrap_or_default();
        self.event_bus
            .publish(&RoomKey::owner(device.user_id), names::DEVICE_STATUS, data)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use assert_matches::assert_matches;
    use tether_db::MemoryStore;

    fn registry() -> (DeviceRegistry, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        (DeviceRegistry::new(store, Arc::clone(&bus)), bus)
    }

    fn registration(device_id: &str, name: &str) -> Registration {
        Registration {
            device_id: device_id.into(),
            name: name.into(),
            model: None,
            platform_version: None,
        }
    }

    #[tokio::test]
    async fn register_publishes_status_to_owner_room() {
        let (registry, bus) = registry();
        let mut rx = bus.connect("dash", Some(1)).await;
        bus.subscribe("dash", RoomKey::owner(1)).await;

        registry.register(1, registration("d1", "Phone")).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, names::DEVICE_STATUS);
        assert_eq!(event.data["deviceId"], "d1");
        assert_eq!(event.data["isOnline"], true);
    }

    #[tokio::test]
    async fn register_rejects_foreign_device_id() {
        let (registry, _bus) = registry();
        registry.register(1, registration("d1", "Mine")).await.unwrap();

        assert_matches!(
            registry.register(2, registration("d1", "Theirs")).await,
            Err(AppError::Core(CoreError::Conflict(_)))
        );
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let (registry, _bus) = registry();
        assert_matches!(
            registry.register(1, registration("", "Phone")).await,
            Err(AppError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            registry.register(1, registration("d1", "   ")).await,
            Err(AppError::Core(CoreError::Validation(_)))
        );
    }

    #[tokio::test]
    async fn get_owned_hides_foreign_devices() {
        let (registry, _bus) = registry();
        registry.register(1, registration("d1", "Phone")).await.unwrap();

        assert!(registry.get_owned(1, "d1").await.is_ok());
        assert_matches!(
            registry.get_owned(2, "d1").await,
            Err(AppError::Core(CoreError::NotFound { .. }))
        );
        assert_matches!(
            registry.get_owned(1, "missing").await,
            Err(AppError::Core(CoreError::NotFound { .. }))
        );
    }

    #[tokio::test]
    async fn heartbeat_updates_reported_state() {
        let (registry, _bus) = registry();
        registry.register(1, registration("d1", "Phone")).await.unwrap();

        let device = registry
            .heartbeat(
                1,
                "d1",
                Heartbeat {
                    status: Some(DeviceStatus::Inactive),
                    battery_level: Some(55),
                    network_type: Some("lte".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(device.battery_level, Some(55));
        assert_eq!(device.status, DeviceStatus::Inactive);
        assert_eq!(device.network_type.as_deref(), Some("lte"));
    }

    #[tokio::test]
    async fn heartbeat_rejects_bad_battery_before_writing() {
        let (registry, _bus) = registry();
        registry.register(1, registration("d1", "Phone")).await.unwrap();

        let beat = Heartbeat {
            battery_level: Some(120),
            ..Default::default()
        };
        assert_matches!(
            registry.heartbeat(1, "d1", beat).await,
            Err(AppError::Core(CoreError::Validation(_)))
        );
        let device = registry.get_owned(1, "d1").await.unwrap();
        assert_eq!(device.battery_level, None);
    }

    #[tokio::test]
    async fn delete_is_owner_only() {
        let (registry, _bus) = registry();
        registry.register(1, registration("d1", "Phone")).await.unwrap();

        assert!(registry.delete(2, "d1").await.is_err());
        registry.delete(1, "d1").await.unwrap();
        assert!(registry.get_owned(1, "d1").await.is_err());
    }

    #[tokio::test]
    async fn registration_is_logged() {
        let (registry, _bus) = registry();
        registry.register(1, registration("d1", "Phone")).await.unwrap();

        let logs = registry.logs(1, "d1", 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, actions::DEVICE_REGISTERED);
    }
}
