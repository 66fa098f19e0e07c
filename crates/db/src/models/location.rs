//! Location samples and history query filters.

use serde::Serialize;
use sqlx::FromRow;
use tether_core::geo::Coordinates;
use tether_core::types::{DbId, Timestamp};

/// Default number of samples returned by a history query.
pub const DEFAULT_HISTORY_LIMIT: i64 = 100;

/// Hard cap on samples returned by a history query.
pub const MAX_HISTORY_LIMIT: i64 = 1000;

/// Source recorded when the device does not say.
pub const DEFAULT_LOCATION_SOURCE: &str = "gps";

/// A row from the `locations` table. Immutable once written.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub id: DbId,
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub altitude: Option<f64>,
    pub bearing: Option<f64>,
    pub speed: Option<f64>,
    pub source: String,
    pub address: Option<String>,
    #[sqlx(rename = "recorded_at")]
    pub timestamp: Timestamp,
}

impl LocationSample {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Insert input for a validated sample.
#[derive(Debug, Clone)]
pub struct NewLocation {
    pub device_id: String,
    pub coordinates: Coordinates,
    pub accuracy: Option<f64>,
    pub altitude: Option<f64>,
    pub bearing: Option<f64>,
    pub speed: Option<f64>,
    pub source: String,
    pub address: Option<String>,
    pub timestamp: Timestamp,
}

/// Filters for a location history query. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct LocationFilter {
    /// Inclusive lower bound on `timestamp`.
    pub start: Option<Timestamp>,
    /// Inclusive upper bound on `timestamp`.
    pub end: Option<Timestamp>,
    /// Exact match on `source`.
    pub source: Option<String>,
    /// Only samples with `accuracy <= max_accuracy` (samples without an
    /// accuracy are excluded when this is set).
    pub max_accuracy: Option<f64>,
    pub limit: Option<i64>,
}

impl LocationFilter {
    /// The effective row limit, clamped to `1..=MAX_HISTORY_LIMIT`.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT)
    }

    /// In-memory equivalent of the SQL predicate.
    pub fn matches(&self, sample: &LocationSample) -> bool {
        if self.start.is_some_and(|start| sample.timestamp < start) {
            return false;
        }
        if self.end.is_some_and(|end| sample.timestamp > end) {
            return false;
        }
        if let Some(source) = &self.source {
            if &sample.source != source {
                return false;
            }
        }
        if let Some(max) = self.max_accuracy {
            match sample.accuracy {
                Some(a) if a <= max => {}
                _ => return false,
            }
        }
        true
    }
}
