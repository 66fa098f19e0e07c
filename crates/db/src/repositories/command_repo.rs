//! Repository for the `commands` table.

use sqlx::PgPool;
use tether_core::types::{DbId, Timestamp};

use crate::models::command::CommandRow;

const COLUMNS: &str = "\
    id, device_id, user_id, command_type, payload, status, response, sent_at, executed_at";

/// Provides insert, lookup and resolution for command records.
pub struct CommandRepo;

impl CommandRepo {
    /// Insert a new pending command. The BIGSERIAL id gives per-table FIFO order.
    pub async fn create(
        pool: &PgPool,
        device_id: &str,
        user_id: DbId,
        command_type: &str,
        payload: &serde_json::Value,
        sent_at: Timestamp,
    ) -> Result<CommandRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO commands (device_id, user_id, command_type, payload, status, sent_at) \
             VALUES ($1, $2, $3, $4, 'pending', $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CommandRow>(&query)
            .bind(device_id)
            .bind(user_id)
            .bind(command_type)
            .bind(payload)
            .bind(sent_at)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<CommandRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM commands WHERE id = $1");
        sqlx::query_as::<_, CommandRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set the terminal status. Repeated calls overwrite the previous outcome.
    pub async fn resolve(
        pool: &PgPool,
        id: DbId,
        status: &str,
        response: Option<&serde_json::Value>,
        executed_at: Timestamp,
    ) -> Result<Option<CommandRow>, sqlx::Error> {
        let query = format!(
            "UPDATE commands SET status = $2, response = $3, executed_at = $4 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CommandRow>(&query)
            .bind(id)
            .bind(status)
            .bind(response)
            .bind(executed_at)
            .fetch_optional(pool)
            .await
    }

    /// Pending commands for a device in issue order.
    pub async fn list_pending(pool: &PgPool, device_id: &str) -> Result<Vec<CommandRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM commands \
             WHERE device_id = $1 AND status = 'pending' \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, CommandRow>(&query)
            .bind(device_id)
            .fetch_all(pool)
            .await
    }

    /// Command history for a device, newest first.
    pub async fn list_by_device(
        pool: &PgPool,
        device_id: &str,
        limit: i64,
    ) -> Result<Vec<CommandRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM commands \
             WHERE device_id = $1 \
             ORDER BY id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, CommandRow>(&query)
            .bind(device_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Id of the newest command for a device with one of `command_types`.
    pub async fn latest_id_of_types(
        pool: &PgPool,
        device_id: &str,
        command_types: &[&str],
    ) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<DbId>>(
            "SELECT MAX(id) FROM commands WHERE device_id = $1 AND command_type = ANY($2)",
        )
        .bind(device_id)
        .bind(command_types)
        .fetch_one(pool)
        .await
    }
}
