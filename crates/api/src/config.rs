use std::collections::HashMap;

use tether_core::types::DbId;

use crate::auth::jwt::JwtConfig;

/// Default Postgres pool size.
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;

/// A configuration value that could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in the environment")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on post-shutdown cleanup, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Postgres URL. The in-memory store is used when unset.
    pub database_url: Option<String>,
    /// Maximum pooled Postgres connections (default: `20`).
    pub db_max_connections: u32,
    /// JWT token configuration for owner sessions.
    pub jwt: JwtConfig,
    /// Device API keys in plaintext, mapped to the owning user id.
    pub device_api_keys: HashMap<String, DbId>,
    /// Emit logs as JSON lines (`LOG_FORMAT=json`).
    pub log_json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `DATABASE_URL`          | unset (in-memory store)    |
    /// | `DB_MAX_CONNECTIONS`    | `20`                       |
    /// | `JWT_SECRET`            | **required**               |
    /// | `JWT_ACCESS_EXPIRY_MINS`| `60`                       |
    /// | `DEVICE_API_KEYS`       | empty (`key=userId,...`)   |
    /// | `LOG_FORMAT`            | `text`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "0.0.0.0");
        let port = parse_var("PORT", &var("PORT", "3000"))?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_var(
            "REQUEST_TIMEOUT_SECS",
            &var("REQUEST_TIMEOUT_SECS", "30"),
        )?;
        let shutdown_timeout_secs = parse_var(
            "SHUTDOWN_TIMEOUT_SECS",
            &var("SHUTDOWN_TIMEOUT_SECS", "30"),
        )?;

        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());
        let db_max_connections = parse_var(
            "DB_MAX_CONNECTIONS",
            &var("DB_MAX_CONNECTIONS", &DEFAULT_DB_MAX_CONNECTIONS.to_string()),
        )?;

        let jwt = JwtConfig::from_lookup(&lookup)?;
        let device_api_keys = parse_api_keys(&var("DEVICE_API_KEYS", ""))?;
        let log_json = var("LOG_FORMAT", "text").eq_ignore_ascii_case("json");

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url,
            db_max_connections,
            jwt,
            device_api_keys,
            log_json,
        })
    }
}

pub(crate) fn parse_var<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: format!("'{raw}': {e}"),
    })
}

/// Parse `key=userId,key=userId` into a map. Empty entries are skipped.
fn parse_api_keys(raw: &str) -> Result<HashMap<String, DbId>, ConfigError> {
    let mut keys = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, user) = entry.split_once('=').ok_or_else(|| ConfigError::Invalid {
            name: "DEVICE_API_KEYS",
            reason: format!("entry '{entry}' is not of the form key=userId"),
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::Invalid {
                name: "DEVICE_API_KEYS",
                reason: "empty key".to_string(),
            });
        }
        let user_id: DbId = parse_var("DEVICE_API_KEYS", user)?;
        keys.insert(key.to_string(), user_id);
    }
    Ok(keys)
}
