//! Handlers for location ingest, history and map data.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tether_core::types::{DbId, Timestamp};
use tether_db::models::location::{LocationFilter, LocationSample};

use crate::engine::ingest::{LocationHistory, LocationReport, MapEntry};
use crate::error::AppResult;
use crate::middleware::auth::{AuthUser, DeviceAuth};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdateRequest {
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

impl From<LocationUpdateRequest> for LocationReport {
    fn from(r: LocationUpdateRequest) -> Self {
        LocationReport {
            latitude: r.latitude,
            longitude: r.longitude,
            accuracy: r.accuracy,
            altitude: r.altitude,
            bearing: r.bearing,
            speed: r.speed,
            source: r.source,
            address: r.address,
            timestamp: r.timestamp,
            battery_level: r.battery_level,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdateResponse {
    pub location_id: DbId,
}

/// `?startDate=&endDate=&source=&maxAccuracy=&limit=`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub source: Option<String>,
    pub max_accuracy: Option<f64>,
    pub limit: Option<i64>,
}

impl From<HistoryQuery> for LocationFilter {
    fn from(q: HistoryQuery) -> Self {
        LocationFilter {
            start: q.start_date,
            end: q.end_date,
            source: q.source.filter(|s| !s.is_empty()),
            max_accuracy: q.max_accuracy,
            limit: q.limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LatestResponse {
    pub location: Option<LocationSample>,
}

#[derive(Debug, Serialize)]
pub struct MapResponse {
    pub devices: Vec<MapEntry>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /location/{id}/update
pub async fn update(
    State(state): State<AppState>,
    auth: DeviceAuth,
    Path(device_id): Path<String>,
    Json(input): Json<LocationUpdateRequest>,
) -> AppResult<Json<LocationUpdateResponse>> {
    let sample = state
        .ingest
        .record(auth.user_id, &device_id, input.into())
        .await?;
    Ok(Json(LocationUpdateResponse {
        location_id: sample.id,
    }))
}

/// GET /location/{id}/history
pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<LocationHistory>> {
    let filter = LocationFilter::from(query);
    let history = state
        .ingest
        .history(user.user_id, &device_id, &filter)
        .await?;
    Ok(Json(history))
}

/// GET /location/{id}/latest
pub async fn latest(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
) -> AppResult<Json<LatestResponse>> {
    let location = state.ingest.latest(user.user_id, &device_id).await?;
    Ok(Json(LatestResponse { location }))
}

/// GET /location/map
pub async fn map(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<MapResponse>> {
    let devices = state.ingest.map(user.user_id).await?;
    Ok(Json(MapResponse { devices }))
}
