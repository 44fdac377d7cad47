//! TTL cache store over durable storage.
//!
//! Freshness is evaluated at read time, never by eviction: an expired entry
//! stays on disk so it can serve as the offline fallback after network
//! retries are exhausted. Storage failures are logged and collapsed to a
//! miss; the cache must never be the reason a read fails.

use chrono::{Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::key::{Resource, ScopeKey};
use crate::storage::Storage;

/// Local cache store, namespaced by scope key.
pub struct CacheStore<S: Storage> {
  storage: Arc<S>,
  /// Freshness window for `get_fresh`
  ttl: Duration,
}

impl<S: Storage> CacheStore<S> {
  /// Create a cache store with the default 30 minute freshness window.
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      storage,
      ttl: Duration::minutes(30),
    }
  }

  /// Set the freshness window.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  /// Write a payload under the key, stamped with the current time.
  ///
  /// Overwrites unconditionally. Failures are swallowed: the cache is
  /// best-effort, never a correctness dependency.
  pub fn put<T: Serialize>(&self, key: &ScopeKey, payload: &T) {
    let storage_key = key.storage_key();
    let json = match serde_json::to_string(payload) {
      Ok(json) => json,
      Err(e) => {
        warn!(key = %storage_key, error = %e, "Failed to serialize cache payload");
        return;
      }
    };

    if let Err(e) = self.storage.put_entry(&storage_key, &json, Utc::now()) {
      warn!(key = %storage_key, error = %e, "Failed to write cache entry");
    } else {
      debug!(key = %storage_key, "Cache set");
    }
  }

  /// Read the payload if present and younger than the freshness window.
  ///
  /// Expired entries return `None` but are retained on disk.
  pub fn get_fresh<T: DeserializeOwned>(&self, key: &ScopeKey) -> Option<T> {
    let storage_key = key.storage_key();
    let entry = self.read_entry(&storage_key)?;

    if Utc::now() - entry.written_at > self.ttl {
      debug!(key = %storage_key, "Cache expired");
      return None;
    }

    debug!(key = %storage_key, "Cache hit");
    self.parse_payload(&storage_key, &entry.payload)
  }

  /// Read the payload regardless of age. Last-resort fallback only.
  pub fn get_allow_stale<T: DeserializeOwned>(&self, key: &ScopeKey) -> Option<T> {
    let storage_key = key.storage_key();
    let entry = self.read_entry(&storage_key)?;

    debug!(key = %storage_key, "Returning cached data (possibly expired)");
    self.parse_payload(&storage_key, &entry.payload)
  }

  /// Remove one entry.
  pub fn invalidate(&self, key: &ScopeKey) {
    let storage_key = key.storage_key();
    if let Err(e) = self.storage.remove_entry(&storage_key) {
      warn!(key = %storage_key, error = %e, "Failed to clear cache entry");
    }
  }

  /// Remove every entry under a known resource prefix, leaving unrelated
  /// storage untouched.
  pub fn invalidate_all(&self) {
    for resource in Resource::ALL {
      if let Err(e) = self.storage.remove_entries_with_prefix(resource.prefix()) {
        warn!(prefix = resource.prefix(), error = %e, "Failed to clear cache entries");
      }
    }
  }

  fn read_entry(&self, storage_key: &str) -> Option<crate::storage::StoredEntry> {
    match self.storage.get_entry(storage_key) {
      Ok(entry) => entry,
      Err(e) => {
        warn!(key = %storage_key, error = %e, "Failed to read cache entry");
        None
      }
    }
  }

  fn parse_payload<T: DeserializeOwned>(&self, storage_key: &str, payload: &str) -> Option<T> {
    match serde_json::from_str(payload) {
      Ok(value) => Some(value),
      Err(e) => {
        // Corrupt entry reads as a miss; the next successful fetch rewrites it
        warn!(key = %storage_key, error = %e, "Failed to parse cache entry");
        None
      }
    }
  }
}

impl<S: Storage> Clone for CacheStore<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      ttl: self.ttl,
    }
  }
}
