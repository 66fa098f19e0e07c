#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for the device lookup failure every owner-scoped operation
    /// returns, whether the device is missing or belongs to someone else.
    pub fn device_not_found(device_id: &str) -> Self {
        CoreError::NotFound {
            entity: "Device",
            id: device_id.to_string(),
        }
    }
}
