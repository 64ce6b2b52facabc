//! Shared fixtures and helpers for unit tests.
//!
//! The PEM fixtures under `tests/fixtures/` were generated once with OpenSSL:
//! `cert_v1.pem` and `cert_v3.pem` wrap the same RSA key (`signing_key.pem`),
//! the former without the explicit `[0]` version element. `signing_spki.pem`
//! is the reference `SubjectPublicKeyInfo` for that key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::Error;
use crate::key_source::KeySetFetcher;

#[path = "../tests/common/tokens.rs"]
mod tokens;

pub use tokens::*;

/// In-memory [`KeySetFetcher`] that counts fetches.
pub struct StaticFetcher {
    keys: Option<HashMap<String, String>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(keys: HashMap<String, String>) -> Self {
        Self {
            keys: Some(keys),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            keys: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl KeySetFetcher for StaticFetcher {
    async fn fetch(&self) -> Result<HashMap<String, String>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.keys
            .clone()
            .ok_or_else(|| Error::KeySourceUnavailable("HTTP 503 fetching keys".to_string()))
    }
}
