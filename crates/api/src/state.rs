use std::sync::Arc;

use tether_db::Store;
use tether_events::EventBus;

use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::engine::geofence::GeofenceEvaluator;
use crate::engine::{CommandDispatcher, DeviceRegistry, LocationIngest};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Persistence backend (Postgres or in-memory).
    pub store: Arc<dyn Store>,
    /// Room-based push fan-out shared with the WebSocket handler.
    pub event_bus: Arc<EventBus>,
    /// Credential verification for owners and devices.
    pub authenticator: Arc<dyn Authenticator>,
    pub registry: Arc<DeviceRegistry>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub ingest: Arc<LocationIngest>,
}

impl AppState {
    /// Wire the engine components over the injected collaborators.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn Store>,
        event_bus: Arc<EventBus>,
        authenticator: Arc<dyn Authenticator>,
        geofence: Arc<dyn GeofenceEvaluator>,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new(
            Arc::clone(&store),
            Arc::clone(&event_bus),
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&event_bus),
            Arc::clone(&registry),
        ));
        let ingest = Arc::new(LocationIngest::new(
            Arc::clone(&store),
            Arc::clone(&event_bus),
            Arc::clone(&registry),
            geofence,
        ));

        Self {
            config: Arc::new(config),
            store,
            event_bus,
            authenticator,
            registry,
            dispatcher,
            ingest,
        }
    }
}
