//! Location ingest: validation, storage, owner notification and history.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tether_core::error::CoreError;
use tether_core::geo::{path_distance_km, validate_accuracy, Coordinates};
use tether_core::types::{DbId, Timestamp};
use tether_db::models::device::DeviceView;
use tether_db::models::location::{
    LocationFilter, LocationSample, NewLocation, DEFAULT_LOCATION_SOURCE,
};
use tether_db::Store;
use tether_events::{names, EventBus, RoomKey};

use crate::engine::geofence::GeofenceEvaluator;
use crate::engine::registry::DeviceRegistry;
use crate::error::AppResult;

/// A sample as reported by a device, before validation.
#[derive(Debug, Clone, Default)]
pub struct LocationReport {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub altitude: Option<f64>,
    pub bearing: Option<f64>,
    pub speed: Option<f64>,
    pub source: Option<String>,
    pub address: Option<String>,
    pub timestamp: Option<Timestamp>,
    pub battery_level: Option<i16>,
}

/// Aggregate figures over the samples returned by a history query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub total_points: usize,
    /// Haversine path length over adjacent samples, in returned order.
    pub total_distance_km: f64,
    /// Oldest sample time.
    pub start_time: Option<Timestamp>,
    /// Newest sample time.
    pub end_time: Option<Timestamp>,
}

impl HistorySummary {
    /// Summarize samples ordered newest first.
    pub fn of(samples: &[LocationSample]) -> Self {
        let points: Vec<Coordinates> = samples.iter().map(LocationSample::coordinates).collect();
        Self {
            total_points: samples.len(),
            total_distance_km: path_distance_km(&points),
            start_time: samples.last().map(|s| s.timestamp),
            end_time: samples.first().map(|s| s.timestamp),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationHistory {
    pub locations: Vec<LocationSample>,
    pub summary: HistorySummary,
}

/// One owned device on the map: presence plus its most recent sample.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntry {
    #[serde(flatten)]
    pub device: DeviceView,
    pub location: Option<LocationSample>,
}

pub struct LocationIngest {
    store: Arc<dyn Store>,
    event_bus: Arc<EventBus>,
    registry: Arc<DeviceRegistry>,
    geofence: Arc<dyn GeofenceEvaluator>,
}

impl LocationIngest {
    pub fn new(
        store: Arc<dyn Store>,
        event_bus: Arc<EventBus>,
        registry: Arc<DeviceRegistry>,
        geofence: Arc<dyn GeofenceEvaluator>,
    ) -> Self {
        Self {
            store,
            event_bus,
            registry,
            geofence,
        }
    }

    /// Validate and store a sample reported by an owned device.
    ///
    /// Also refreshes the device's `lastSeen` (and battery, when reported),
    /// notifies the owner room and triggers geofence evaluation.
    pub async fn record(
        &self,
        user_id: DbId,
        device_id: &str,
        report: LocationReport,
    ) -> AppResult<LocationSample> {
        let coordinates = Coordinates::parse(report.latitude, report.longitude)?;
        validate_accuracy(report.accuracy)?;
        if let Some(level) = report.battery_level {
            tether_core::device::validate_battery_level(level)?;
        }
        self.registry.get_owned(user_id, device_id).await?;

        let source = report
            .source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION_SOURCE.to_string());

        let sample = self
            .store
            .insert_location(&NewLocation {
                device_id: device_id.to_string(),
                coordinates,
                accuracy: report.accuracy,
                altitude: report.altitude,
                bearing: report.bearing,
                speed: report.speed,
                source,
                address: report.address,
                timestamp: report.timestamp.unwrap_or_else(Utc::now),
            })
            .await?;

        self.registry.touch_last_seen(device_id).await?;
        if let Some(level) = report.battery_level {
            self.registry.set_battery_level(device_id, level).await?;
        }

        tracing::debug!(
            location_id = sample.id,
            device_id,
            accuracy = ?sample.accuracy,
            "Location recorded",
        );

        self.event_bus
            .publish(
                &RoomKey::owner(user_id),
                names::LOCATION_UPDATE,
                json!({ "deviceId": device_id, "location": sample }),
            )
            .await;

        let geofence = Arc::clone(&self.geofence);
        let spawned = sample.clone();
        tokio::spawn(async move {
            if let Err(e) = geofence.evaluate(user_id, &spawned).await {
                tracing::warn!(device_id = %spawned.device_id, error = %e, "Geofence evaluation failed");
            }
        });

        Ok(sample)
    }

    /// Filtered history for an owned device, newest first, with a summary.
    pub async fn history(
        &self,
        user_id: DbId,
        device_id: &str,
        filter: &LocationFilter,
    ) -> AppResult<LocationHistory> {
        if let (Some(start), Some(end)) = (filter.start, filter.end) {
            if start > end {
                return Err(
                    CoreError::Validation("startDate must not be after endDate".into()).into(),
                );
            }
        }
        if let Some(max) = filter.max_accuracy {
            validate_accuracy(Some(max))?;
        }
        self.registry.get_owned(user_id, device_id).await?;

        let locations = self.store.list_locations(device_id, filter).await?;
        let summary = HistorySummary::of(&locations);
        Ok(LocationHistory { locations, summary })
    }

    pub async fn latest(
        &self,
        user_id: DbId,
        device_id: &str,
    ) -> AppResult<Option<LocationSample>> {
        self.registry.get_owned(user_id, device_id).await?;
        Ok(self.store.latest_location(device_id).await?)
    }

    /// Every device the user owns with presence and its latest sample.
    pub async fn map(&self, user_id: DbId) -> AppResult<Vec<MapEntry>> {
        let now = Utc::now();
        let devices = self.registry.list_by_owner(user_id).await?;
        let mut entries = Vec::with_capacity(devices.len());
        for device in devices {
            let location = self.store.latest_location(&device.device_id).await?;
            entries.push(MapEntry {
                device: DeviceView::at(device, now),
                location,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::Duration;
    use tether_db::MemoryStore;
    use tokio::sync::Notify;

    use crate::engine::geofence::LoggingGeofence;
    use crate::engine::registry::Registration;
    use crate::error::AppError;

    #[derive(Default)]
    struct CountingGeofence {
        calls: AtomicUsize,
        notify: Notify,
    }

    #[async_trait]
    impl GeofenceEvaluator for CountingGeofence {
        async fn evaluate(&self, _user_id: DbId, _sample: &LocationSample) -> Result<(), CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.notify.notify_one();
            Ok(())
        }
    }

    async fn ingest_with(
        geofence: Arc<dyn GeofenceEvaluator>,
    ) -> (LocationIngest, Arc<DeviceRegistry>, Arc<EventBus>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::new());
        let registry = Arc::new(DeviceRegistry::new(Arc::clone(&store), Arc::clone(&bus)));
        registry
            .register(
                1,
                Registration {
                    device_id: "d1".into(),
                    name: "Phone".into(),
                    model: None,
                    platform_version: None,
                },
            )
            .await
            .unwrap();
        let ingest = LocationIngest::new(store, Arc::clone(&bus), Arc::clone(&registry), geofence);
        (ingest, registry, bus)
    }

    fn report(lat: f64, lon: f64) -> LocationReport {
        LocationReport {
            latitude: Some(lat),
            longitude: Some(lon),
            accuracy: Some(12.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn record_publishes_and_triggers_geofence() {
        let geofence = Arc::new(CountingGeofence::default());
        let (ingest, _registry, bus) = ingest_with(geofence.clone()).await;
        let mut rx = bus.connect("dash", Some(1)).await;
        bus.subscribe("dash", RoomKey::owner(1)).await;

        let sample = ingest.record(1, "d1", report(48.85, 2.35)).await.unwrap();
        assert_eq!(sample.source, DEFAULT_LOCATION_SOURCE);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, names::LOCATION_UPDATE);
        assert_eq!(event.data["deviceId"], "d1");
        assert_eq!(event.data["location"]["id"], sample.id);

        geofence.notify.notified().await;
        assert_eq!(geofence.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn record_requires_valid_coordinates() {
        let (ingest, _registry, _bus) = ingest_with(Arc::new(LoggingGeofence)).await;
        let missing = LocationReport {
            latitude: Some(10.0),
            ..Default::default()
        };
        assert_matches!(
            ingest.record(1, "d1", missing).await,
            Err(AppError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            ingest.record(1, "d1", report(91.0, 0.0)).await,
            Err(AppError::Core(CoreError::Validation(_)))
        );
        assert!(ingest.latest(1, "d1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_updates_battery_and_presence_inputs() {
        let (ingest, registry, _bus) = ingest_with(Arc::new(LoggingGeofence)).await;
        let before = registry.get_owned(1, "d1").await.unwrap().last_seen;

        let mut r = report(1.0, 1.0);
        r.battery_level = Some(33);
        ingest.record(1, "d1", r).await.unwrap();

        let device = registry.get_owned(1, "d1").await.unwrap();
        assert_eq!(device.battery_level, Some(33));
        assert!(device.last_seen >= before);
    }

    #[tokio::test]
    async fn record_for_foreign_device_is_not_found() {
        let (ingest, _registry, _bus) = ingest_with(Arc::new(LoggingGeofence)).await;
        assert_matches!(
            ingest.record(2, "d1", report(1.0, 1.0)).await,
            Err(AppError::Core(CoreError::NotFound { .. }))
        );
    }

    #[tokio::test]
    async fn history_summary_covers_returned_samples() {
        let (ingest, _registry, _bus) = ingest_with(Arc::new(LoggingGeofence)).await;
        let now = Utc::now();
        for (i, lon) in [0.0, 1.0, 2.0].into_iter().enumerate() {
            let mut r = report(0.0, lon);
            r.timestamp = Some(now - Duration::minutes(30 - 10 * i as i64));
            ingest.record(1, "d1", r).await.unwrap();
        }

        let history = ingest
            .history(1, "d1", &LocationFilter::default())
            .await
            .unwrap();
        assert_eq!(history.summary.total_points, 3);
        assert_eq!(history.locations[0].longitude, 2.0);
        assert_eq!(history.summary.end_time, Some(history.locations[0].timestamp));
        assert_eq!(history.summary.start_time, Some(history.locations[2].timestamp));

        let one_degree = path_distance_km(&[
            Coordinates { latitude: 0.0, longitude: 0.0 },
            Coordinates { latitude: 0.0, longitude: 1.0 },
        ]);
        assert!((history.summary.total_distance_km - 2.0 * one_degree).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_history_has_empty_summary() {
        let (ingest, _registry, _bus) = ingest_with(Arc::new(LoggingGeofence)).await;
        let history = ingest
            .history(1, "d1", &LocationFilter::default())
            .await
            .unwrap();
        assert_eq!(history.summary.total_points, 0);
        assert_eq!(history.summary.total_distance_km, 0.0);
        assert!(history.summary.start_time.is_none());
    }

    #[tokio::test]
    async fn history_rejects_inverted_range() {
        let (ingest, _registry, _bus) = ingest_with(Arc::new(LoggingGeofence)).await;
        let now = Utc::now();
        let filter = LocationFilter {
            start: Some(now),
            end: Some(now - Duration::hours(1)),
            ..Default::default()
        };
        assert_matches!(
            ingest.history(1, "d1", &filter).await,
            Err(AppError::Core(CoreError::Validation(_)))
        );
    }

    #[tokio::test]
    async fn map_lists_owned_devices_with_latest_sample() {
        let (ingest, _registry, _bus) = ingest_with(Arc::new(LoggingGeofence)).await;
        ingest.record(1, "d1", report(5.0, 5.0)).await.unwrap();

        let entries = ingest.map(1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].device.is_online);
        assert_eq!(entries[0].location.as_ref().unwrap().latitude, 5.0);
        assert!(ingest.map(2).await.unwrap().is_empty());
    }
}
