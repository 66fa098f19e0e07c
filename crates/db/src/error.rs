/// PostgreSQL SQLSTATE for a foreign key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Failure of a [`Store`](crate::Store) operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing database rejected or failed the query.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be decoded into its domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A dependent row referenced a device that does not exist.
    #[error("Device {0} does not exist")]
    MissingDevice(String),
}

impl StoreError {
    /// Build a [`StoreError::Corrupt`], logging the offending row.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::warn!(detail = %detail, "Failed to decode stored row");
        StoreError::Corrupt(detail)
    }

    /// Map a foreign key violation on an insert for `device_id` to
    /// [`StoreError::MissingDevice`]; other errors pass through.
    pub fn from_insert(err: sqlx::Error, device_id: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
                tracing::warn!(device_id, "Insert referenced a missing device");
                return StoreError::MissingDevice(device_id.to_string());
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
