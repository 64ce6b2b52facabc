//! Signing keys for identity tokens, fetched from the provider and cached.
//!
//! The provider publishes a JSON object mapping key ids to PEM-encoded X.509
//! certificates. [`PublicKeySource`] keeps the whole set for a fixed TTL
//! (one hour by default, shorter than the provider's rotation period) and
//! refetches once it lapses. Concurrent callers that miss the cache wait on a
//! single in-flight refresh and share its outcome: if that refresh fails,
//! everyone queued behind it gets the same error instead of fetching again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::certificate::PublicKeyHandle;
use crate::error::Error;
use crate::key_cache::{KeySet, PublicKeyCache};

/// Published x509 key set for Firebase Auth ID tokens.
pub const DEFAULT_KEYS_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of the raw `kid -> PEM certificate` mapping.
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    async fn fetch(&self) -> Result<HashMap<String, String>, Error>;
}

/// Reject responses that must not replace the cached set.
pub fn validate_key_set(keys: &HashMap<String, String>) -> Result<(), Error> {
    if keys.is_empty() {
        return Err(Error::KeySourceUnavailable(
            "published key set is empty".to_string(),
        ));
    }
    for (kid, pem) in keys {
        if kid.is_empty() {
            return Err(Error::KeySourceUnavailable(
                "published key set contains an empty kid".to_string(),
            ));
        }
        if !pem.contains("-----BEGIN CERTIFICATE-----") {
            return Err(Error::KeySourceUnavailable(format!(
                "value for kid {} is not a PEM certificate",
                kid
            )));
        }
    }
    Ok(())
}

/// Fetches the key set with a single HTTPS GET.
#[cfg(feature = "fetch")]
pub struct HttpKeySetFetcher {
    client: reqwest::Client,
    url: String,
}

#[cfg(feature = "fetch")]
impl HttpKeySetFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::KeySourceUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(feature = "fetch")]
#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    async fn fetch(&self) -> Result<HashMap<String, String>, Error> {
        let resp = self.client.get(&self.url).send().await.map_err(|e| {
            Error::KeySourceUnavailable(format!("Failed to fetch {}: {}", self.url, e))
        })?;

        if !resp.status().is_success() {
            return Err(Error::KeySourceUnavailable(format!(
                "HTTP {} fetching {}",
                resp.status(),
                self.url
            )));
        }

        resp.json::<HashMap<String, String>>().await.map_err(|e| {
            Error::KeySourceUnavailable(format!("Invalid JSON from {}: {}", self.url, e))
        })
    }
}

/// Resolves a token's `kid` to a verification key.
pub struct PublicKeySource {
    fetcher: Arc<dyn KeySetFetcher>,
    cache: PublicKeyCache,
    ttl: Duration,
    fetch_timeout: Duration,
    refresh_lock: Mutex<()>,
    /// Bumped each time a refresh completes, successfully or not.
    refreshes: AtomicU64,
    last_failure: StdMutex<Option<String>>,
}

impl PublicKeySource {
    pub fn new(fetcher: Arc<dyn KeySetFetcher>) -> Self {
        Self {
            fetcher,
            cache: PublicKeyCache::new(),
            ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            refresh_lock: Mutex::new(()),
            refreshes: AtomicU64::new(0),
            last_failure: StdMutex::new(None),
        }
    }

    /// Source backed by [`HttpKeySetFetcher`] for `url`.
    #[cfg(feature = "fetch")]
    pub fn from_url(url: &str, fetch_timeout: Duration) -> Result<Self, Error> {
        let fetcher = HttpKeySetFetcher::new(url, fetch_timeout)?;
        Ok(Self::new(Arc::new(fetcher)).with_fetch_timeout(fetch_timeout))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn cache(&self) -> &PublicKeyCache {
        &self.cache
    }

    /// Verification key for `kid`.
    ///
    /// Fails with [`Error::KeySourceUnavailable`] when a needed refresh fails
    /// and [`Error::UnknownSigningKey`] when the current set lacks `kid`.
    pub async fn get_key(&self, kid: &str) -> Result<Arc<PublicKeyHandle>, Error> {
        let keys = self.current_keys().await?;
        keys.handle(kid)
    }

    /// Fetch now and replace the cache, regardless of expiry.
    pub async fn refresh(&self) -> Result<Arc<KeySet>, Error> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn current_keys(&self) -> Result<Arc<KeySet>, Error> {
        if let Some(keys) = self.cache.get(Instant::now()) {
            tracing::debug!(keys = keys.len(), "signing key cache hit");
            return Ok(keys);
        }

        let seen = self.refreshes.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;
        // Another caller may have finished a refresh while we waited.
        if let Some(keys) = self.cache.get(Instant::now()) {
            return Ok(keys);
        }
        if self.refreshes.load(Ordering::Acquire) != seen {
            // The refresh we queued behind failed; share its outcome.
            let failure = self.lock_last_failure().clone();
            if let Some(reason) = failure {
                return Err(Error::KeySourceUnavailable(reason));
            }
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<Arc<KeySet>, Error> {
        let result = self.fetch_and_store().await;
        *self.lock_last_failure() = match &result {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(code = %e.code(), error = %e, "signing key refresh failed");
                Some(match e {
                    Error::KeySourceUnavailable(reason) => reason.clone(),
                    other => other.to_string(),
                })
            }
        };
        self.refreshes.fetch_add(1, Ordering::Release);
        result
    }

    async fn fetch_and_store(&self) -> Result<Arc<KeySet>, Error> {
        let started = Instant::now();
        let certificates = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch())
            .await
            .map_err(|_| {
                Error::KeySourceUnavailable(format!(
                    "key set fetch timed out after {:?}",
                    self.fetch_timeout
                ))
            })??;

        validate_key_set(&certificates)?;

        let keys = Arc::new(KeySet::new(certificates));
        self.cache.set(Arc::clone(&keys), started + self.ttl);
        tracing::info!(
            keys = keys.len(),
            ttl_secs = self.ttl.as_secs(),
            "refreshed signing key set"
        );
        Ok(keys)
    }

    fn lock_last_failure(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
