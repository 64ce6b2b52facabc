//! Static configuration for the token and webhook verifiers.
//!
//! Everything is read once at startup. A missing required value or an
//! unparsable number fails startup rather than falling back silently.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::key_source::DEFAULT_KEYS_URL;
use crate::sigv4::{API_GATEWAY_SERVICE, DEFAULT_REPLAY_WINDOW};
use crate::token::DEFAULT_ISSUER_BASE;

pub const DEFAULT_WEBHOOK_REGION: &str = "eu-central-1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Tenant id. Also the audience tokens must carry.
    pub project_id: String,
    pub issuer_base: String,
    pub keys_url: String,
    pub key_cache_ttl_secs: u64,
    pub key_fetch_timeout_secs: u64,
    pub webhook_region: String,
    pub webhook_service: String,
    pub replay_window_secs: u64,
}

impl AuthConfig {
    /// Defaults for everything except the project id.
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            issuer_base: DEFAULT_ISSUER_BASE.to_string(),
            keys_url: DEFAULT_KEYS_URL.to_string(),
            key_cache_ttl_secs: 60 * 60,
            key_fetch_timeout_secs: 5,
            webhook_region: DEFAULT_WEBHOOK_REGION.to_string(),
            webhook_service: API_GATEWAY_SERVICE.to_string(),
            replay_window_secs: DEFAULT_REPLAY_WINDOW.as_secs(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &'static str, default: u64| match get(key) {
            Some(v) => v.parse::<u64>().map_err(|_| ConfigError::Invalid(key)),
            None => Ok(default),
        };

        let project_id =
            get("FIREBASE_PROJECT_ID").ok_or(ConfigError::Missing("FIREBASE_PROJECT_ID"))?;
        let defaults = Self::for_project(project_id);

        let key_fetch_timeout_secs =
            number("AUTH_KEY_FETCH_TIMEOUT_SECS", defaults.key_fetch_timeout_secs)?;
        if key_fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("AUTH_KEY_FETCH_TIMEOUT_SECS"));
        }

        Ok(Self {
            issuer_base: get("AUTH_ISSUER_BASE").unwrap_or(defaults.issuer_base),
            keys_url: get("AUTH_KEYS_URL").unwrap_or(defaults.keys_url),
            key_cache_ttl_secs: number("AUTH_KEY_CACHE_TTL_SECS", defaults.key_cache_ttl_secs)?,
            key_fetch_timeout_secs,
            webhook_region: get("WEBHOOK_REGION").unwrap_or(defaults.webhook_region),
            webhook_service: get("WEBHOOK_SERVICE").unwrap_or(defaults.webhook_service),
            replay_window_secs: number("WEBHOOK_REPLAY_WINDOW_SECS", defaults.replay_window_secs)?,
            project_id: defaults.project_id,
        })
    }

    pub fn key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.key_cache_ttl_secs)
    }

    pub fn key_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.key_fetch_timeout_secs)
    }

    pub fn replay_window(&self) -> Duration {
        Duration::from_secs(self.replay_window_secs)
    }
}
