//! Repository for the `locations` table.

use sqlx::PgPool;

use crate::models::location::{LocationFilter, LocationSample, NewLocation};

const COLUMNS: &str = "\
    id, device_id, latitude, longitude, accuracy, altitude, bearing, speed, \
    source, address, recorded_at";

/// Provides insert and query operations for location samples.
pub struct LocationRepo;

impl LocationRepo {
    pub async fn create(pool: &PgPool, input: &NewLocation) -> Result<LocationSample, sqlx::Error> {
        let query = format!(
            "INSERT INTO locations \
                 (device_id, latitude, longitude, accuracy, altitude, bearing, speed, \
                  source, address, recorded_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LocationSample>(&query)
            .bind(&input.device_id)
            .bind(input.coordinates.latitude)
            .bind(input.coordinates.longitude)
            .bind(input.accuracy)
            .bind(input.altitude)
            .bind(input.bearing)
            .bind(input.speed)
            .bind(&input.source)
            .bind(&input.address)
            .bind(input.timestamp)
            .fetch_one(pool)
            .await
    }

    /// Samples matching the filter, newest first.
    pub async fn list(
        pool: &PgPool,
        device_id: &str,
        filter: &LocationFilter,
    ) -> Result<Vec<LocationSample>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM locations \
             WHERE device_id = $1 \
               AND ($2::TIMESTAMPTZ IS NULL OR recorded_at >= $2) \
               AND ($3::TIMESTAMPTZ IS NULL OR recorded_at <= $3) \
               AND ($4::TEXT IS NULL OR source = $4) \
               AND ($5::DOUBLE PRECISION IS NULL OR accuracy <= $5) \
             ORDER BY recorded_at DESC, id DESC \
             LIMIT $6"
        );
        sqlx::query_as::<_, LocationSample>(&query)
            .bind(device_id)
            .bind(filter.start)
            .bind(filter.end)
            .bind(&filter.source)
            .bind(filter.max_accuracy)
            .bind(filter.effective_limit())
            .fetch_all(pool)
            .await
    }

    pub async fn latest(pool: &PgPool, device_id: &str) -> Result<Option<LocationSample>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM locations \
             WHERE device_id = $1 \
             ORDER BY recorded_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, LocationSample>(&query)
            .bind(device_id)
            .fetch_optional(pool)
            .await
    }
}
