//! Reader configuration parsed from a flat string-keyed map.
//!
//! The host engine hands options through as plain strings, so parsing and
//! validation happen here, eagerly, before anything touches the network.
//!
//! | Key                           | Description                              | Default  |
//! |-------------------------------|------------------------------------------|----------|
//! | `sls.project`                 | Log service project name                 | required |
//! | `sls.store`                   | Log store name within the project        | required |
//! | `access.key.id`               | Credential id (client cache key)         | required |
//! | `access.key.secret`           | Credential secret (used at creation only)| required |
//! | `endpoint`                    | Service endpoint                         | required |
//! | `fetchOffset.numRetries`      | Attempts per remote operation            | `3`      |
//! | `fetchOffset.retryIntervalMs` | Fixed delay between attempts             | `1000`   |

use std::collections::HashMap;
use std::time::Duration;

use loghub_core::{Error, Result};

pub const PROJECT_KEY: &str = "sls.project";
pub const STORE_KEY: &str = "sls.store";
pub const ACCESS_KEY_ID_KEY: &str = "access.key.id";
pub const ACCESS_KEY_SECRET_KEY: &str = "access.key.secret";
pub const ENDPOINT_KEY: &str = "endpoint";
pub const NUM_RETRIES_KEY: &str = "fetchOffset.numRetries";
pub const RETRY_INTERVAL_MS_KEY: &str = "fetchOffset.retryIntervalMs";

const DEFAULT_NUM_RETRIES: u32 = 3;
const DEFAULT_RETRY_INTERVAL_MS: u64 = 1000;

/// Validated reader configuration.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Log service project name.
    pub project: String,
    /// Log store name within the project.
    pub store: String,
    /// Credential id; together with `endpoint` it keys the client cache.
    pub access_key_id: String,
    /// Credential secret; consumed once at client creation.
    pub access_key_secret: String,
    /// Service endpoint.
    pub endpoint: String,
    /// Total attempts per remote operation (not additional retries).
    pub max_offset_fetch_attempts: u32,
    /// Fixed delay between attempts.
    pub offset_fetch_retry_interval: Duration,
}

impl ReaderConfig {
    /// Parse a configuration from a flat string-keyed map.
    ///
    /// Required keys: `sls.project`, `sls.store`, `access.key.id`,
    /// `access.key.secret`, `endpoint`. A missing or empty required key is
    /// a [`Error::Config`] naming that key.
    pub fn from_config_map(map: &HashMap<String, String>) -> Result<Self> {
        let max_offset_fetch_attempts = map
            .get(NUM_RETRIES_KEY)
            .map(|raw| {
                raw.parse::<u32>().map_err(|e| {
                    Error::Config(format!("invalid '{NUM_RETRIES_KEY}' value '{raw}': {e}"))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_NUM_RETRIES);

        let retry_interval_ms = map
            .get(RETRY_INTERVAL_MS_KEY)
            .map(|raw| {
                raw.parse::<u64>().map_err(|e| {
                    Error::Config(format!(
                        "invalid '{RETRY_INTERVAL_MS_KEY}' value '{raw}': {e}"
                    ))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_RETRY_INTERVAL_MS);

        Ok(Self {
            project: required(map, PROJECT_KEY)?,
            store: required(map, STORE_KEY)?,
            access_key_id: required(map, ACCESS_KEY_ID_KEY)?,
            access_key_secret: required(map, ACCESS_KEY_SECRET_KEY)?,
            endpoint: required(map, ENDPOINT_KEY)?,
            max_offset_fetch_attempts,
            offset_fetch_retry_interval: Duration::from_millis(retry_interval_ms),
        })
    }

    /// Re-check the required fields of an already-built configuration.
    ///
    /// Used when a caller constructs [`ReaderConfig`] directly instead of
    /// going through [`ReaderConfig::from_config_map`].
    pub fn validate(&self) -> Result<()> {
        for (value, key) in [
            (&self.project, PROJECT_KEY),
            (&self.store, STORE_KEY),
            (&self.access_key_id, ACCESS_KEY_ID_KEY),
            (&self.access_key_secret, ACCESS_KEY_SECRET_KEY),
            (&self.endpoint, ENDPOINT_KEY),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("missing required '{key}'")));
            }
        }
        Ok(())
    }
}

fn required(map: &HashMap<String, String>, key: &str) -> Result<String> {
    match map.get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(Error::Config(format!("missing required '{key}'"))),
    }
}
