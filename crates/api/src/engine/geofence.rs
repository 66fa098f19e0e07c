//! Geofence evaluation hook.
//!
//! Every accepted location sample is handed to a [`GeofenceEvaluator`] on a
//! spawned task. The ingest path never waits for it or sees its errors.

use async_trait::async_trait;
use tether_core::error::CoreError;
use tether_core::types::DbId;
use tether_db::models::location::LocationSample;

#[async_trait]
pub trait GeofenceEvaluator: Send + Sync + 'static {
    async fn evaluate(&self, user_id: DbId, sample: &LocationSample) -> Result<(), CoreError>;
}

/// Evaluator that records the trigger and does nothing else.
#[derive(Debug, Default)]
pub struct LoggingGeofence;

#[async_trait]
impl GeofenceEvaluator for LoggingGeofence {
    async fn evaluate(&self, user_id: DbId, sample: &LocationSample) -> Result<(), CoreError> {
        tracing::trace!(
            user_id,
            device_id = %sample.device_id,
            latitude = sample.latitude,
            longitude = sample.longitude,
            "Geofence evaluation requested",
        );
        Ok(())
    }
}
