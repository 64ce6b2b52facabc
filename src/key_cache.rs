//! Cache for the identity provider's published signing keys.
//!
//! One [`KeySet`] is cached at a time together with a single expiry for the
//! whole set. A refresh replaces the set; nothing is merged. Derived
//! [`PublicKeyHandle`]s are memoized inside the set they came from, so they
//! are dropped together with it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use crate::certificate::{extract_public_key, PublicKeyHandle};
use crate::error::Error;

/// A fetched `kid -> PEM certificate` mapping.
pub struct KeySet {
    certificates: HashMap<String, String>,
    handles: Mutex<HashMap<String, Arc<PublicKeyHandle>>>,
}

impl KeySet {
    pub fn new(certificates: HashMap<String, String>) -> Self {
        Self {
            certificates,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    pub fn certificate(&self, kid: &str) -> Option<&str> {
        self.certificates.get(kid).map(String::as_str)
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.certificates.keys().map(String::as_str)
    }

    /// Verification key for `kid`, parsed from its certificate on first use.
    pub fn handle(&self, kid: &str) -> Result<Arc<PublicKeyHandle>, Error> {
        if let Some(handle) = self.lock_handles().get(kid) {
            return Ok(Arc::clone(handle));
        }

        let pem = self
            .certificate(kid)
            .ok_or_else(|| Error::UnknownSigningKey(kid.to_string()))?;
        let handle = Arc::new(extract_public_key(pem)?);

        self.lock_handles()
            .insert(kid.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<PublicKeyHandle>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kids: Vec<&str> = self.key_ids().collect();
        kids.sort_unstable();
        f.debug_struct("KeySet").field("kids", &kids).finish()
    }
}

struct CacheEntry {
    keys: Arc<KeySet>,
    expires_at: Instant,
}

/// Holds at most one [`KeySet`] and the instant it stops being served.
#[derive(Default)]
pub struct PublicKeyCache {
    entry: RwLock<Option<CacheEntry>>,
}

impl PublicKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached set, unless the cache is empty or `now` has reached the expiry.
    pub fn get(&self, now: Instant) -> Option<Arc<KeySet>> {
        let entry = self.entry.read().unwrap_or_else(PoisonError::into_inner);
        entry
            .as_ref()
            .filter(|e| now < e.expires_at)
            .map(|e| Arc::clone(&e.keys))
    }

    /// Replace the cached set.
    pub fn set(&self, keys: Arc<KeySet>, expires_at: Instant) {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        *entry = Some(CacheEntry { keys, expires_at });
    }

    pub fn clear(&self) {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        *entry = None;
    }

    pub fn expires_at(&self) -> Option<Instant> {
        let entry = self.entry.read().unwrap_or_else(PoisonError::into_inner);
        entry.as_ref().map(|e| e.expires_at)
    }
}
