//! Repository for the `devices` table.

use sqlx::PgPool;
use tether_core::types::{DbId, Timestamp};

use crate::models::device::{DeviceRow, UpsertDevice};

const COLUMNS: &str = "\
    device_id, user_id, name, model, platform_version, network_type, \
    is_locked, alarm_active, battery_level, status, last_seen, created_at, updated_at";

/// Provides CRUD operations for devices.
pub struct DeviceRepo;

impl DeviceRepo {
    /// Insert or refresh a device keyed by `device_id`.
    ///
    /// The conflict branch only fires for the same owner, so a device
    /// registered to someone else yields `None` and is left untouched.
    pub async fn upsert(pool: &PgPool, input: &UpsertDevice) -> Result<Option<DeviceRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO devices (device_id, user_id, name, model, platform_version, status, last_seen) \
             VALUES ($1, $2, $3, $4, $5, 'active', $6) \
             ON CONFLICT (device_id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 model = EXCLUDED.model, \
                 platform_version = EXCLUDED.platform_version, \
                 status = 'active', \
                 last_seen = EXCLUDED.last_seen, \
                 updated_at = NOW() \
             WHERE devices.user_id = EXCLUDED.user_id \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeviceRow>(&query)
            .bind(&input.device_id)
            .bind(input.user_id)
            .bind(&input.name)
            .bind(&input.model)
            .bind(&input.platform_version)
            .bind(input.seen_at)
            .fetch_optional(pool)
            .await
    }

    /// Find a device by its client-supplied id.
    pub async fn find_by_id(pool: &PgPool, device_id: &str) -> Result<Option<DeviceRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices WHERE device_id = $1");
        sqlx::query_as::<_, DeviceRow>(&query)
            .bind(device_id)
            .fetch_optional(pool)
            .await
    }

    /// List every device owned by a user.
    pub async fn list_by_owner(pool: &PgPool, user_id: DbId) -> Result<Vec<DeviceRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM devices WHERE user_id = $1 ORDER BY name, device_id");
        sqlx::query_as::<_, DeviceRow>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn set_lock_flag(pool: &PgPool, device_id: &str, locked: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE devices SET is_locked = $2, updated_at = NOW() WHERE device_id = $1")
            .bind(device_id)
            .bind(locked)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_alarm_flag(pool: &PgPool, device_id: &str, active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE devices SET alarm_active = $2, updated_at = NOW() WHERE device_id = $1")
            .bind(device_id)
            .bind(active)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_battery_level(pool: &PgPool, device_id: &str, level: i16) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE devices SET battery_level = $2, updated_at = NOW() WHERE device_id = $1")
            .bind(device_id)
            .bind(level)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn touch_last_seen(pool: &PgPool, device_id: &str, at: Timestamp) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE devices SET last_seen = $2 WHERE device_id = $1")
            .bind(device_id)
            .bind(at)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Update status and network type, keeping existing values for `None`.
    pub async fn update_state(
        pool: &PgPool,
        device_id: &str,
        status: Option<&str>,
        network_type: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE devices SET \
                 status = COALESCE($2, status), \
                 network_type = COALESCE($3, network_type), \
                 updated_at = NOW() \
             WHERE device_id = $1",
        )
        .bind(device_id)
        .bind(status)
        .bind(network_type)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete a device. Dependent rows go with it via `ON DELETE CASCADE`.
    pub async fn delete(pool: &PgPool, device_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM devices WHERE device_id = $1")
            .bind(device_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
