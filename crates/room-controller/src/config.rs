//! Room Controller configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults; `from_vars` exists so tests can construct configs without
//! touching the process environment.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default bound on channel setup during join, in seconds.
pub const DEFAULT_JOIN_TIMEOUT_SECONDS: u64 = 5;

/// Default per-room participant bound.
///
/// Mesh topology costs O(N^2) connections, so rooms are capped well below
/// anything an SFU would allow.
pub const DEFAULT_MAX_ROOM_SIZE: usize = 16;

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "rc";

/// Room Controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Unique identifier for this controller instance.
    pub instance_id: String,

    /// Bound on channel setup during join.
    pub join_timeout: Duration,

    /// Maximum participants per room.
    pub max_room_size: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let health_bind_address = vars
            .get("RC_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let join_timeout_seconds = match vars.get("RC_JOIN_TIMEOUT_SECONDS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue("RC_JOIN_TIMEOUT_SECONDS", e.to_string()))?,
            None => DEFAULT_JOIN_TIMEOUT_SECONDS,
        };

        let max_room_size = match vars.get("RC_MAX_ROOM_SIZE") {
            Some(raw) => {
                let parsed = raw
                    .parse::<usize>()
                    .map_err(|e| ConfigError::InvalidValue("RC_MAX_ROOM_SIZE", e.to_string()))?;
                if parsed < 2 {
                    return Err(ConfigError::InvalidValue(
                        "RC_MAX_ROOM_SIZE",
                        format!("must be at least 2, got {parsed}"),
                    ));
                }
                parsed
            }
            None => DEFAULT_MAX_ROOM_SIZE,
        };

        // Generate an instance ID when none is pinned
        let instance_id = vars.get("RC_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000").to_string();
            format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            health_bind_address,
            instance_id,
            join_timeout: Duration::from_secs(join_timeout_seconds),
            max_room_size,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            health_bind_address: DEFAULT_HEALTH_BIND_ADDRESS.to_string(),
            instance_id: format!("{DEFAULT_INSTANCE_ID_PREFIX}-default"),
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECONDS),
            max_room_size: DEFAULT_MAX_ROOM_SIZE,
        }
    }
}
