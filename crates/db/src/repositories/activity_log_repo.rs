//! Repository for the `device_logs` table.

use sqlx::PgPool;

use crate::models::activity_log::{ActivityLog, NewActivityLog};

const COLUMNS: &str = "id, device_id, user_id, action, details, created_at";

/// Append-only access to the per-device audit trail.
pub struct ActivityLogRepo;

impl ActivityLogRepo {
    pub async fn create(pool: &PgPool, input: &NewActivityLog) -> Result<ActivityLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO device_logs (device_id, user_id, action, details) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ActivityLog>(&query)
            .bind(&input.device_id)
            .bind(input.user_id)
            .bind(input.action)
            .bind(&input.details)
            .fetch_one(pool)
            .await
    }

    pub async fn list_by_device(
        pool: &PgPool,
        device_id: &str,
        limit: i64,
    ) -> Result<Vec<ActivityLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_logs \
             WHERE device_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, ActivityLog>(&query)
            .bind(device_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
