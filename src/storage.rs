//! Durable key-value persistence: cache entries and session state.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// A persisted cache slot: serialized payload plus write time.
#[derive(Debug, Clone)]
pub struct StoredEntry {
  /// JSON-serialized payload
  pub payload: String,
  /// When the entry was last written
  pub written_at: DateTime<Utc>,
}

/// Trait for storage backends.
///
/// One durable namespace with two halves: timestamped cache entries keyed by
/// scope key, and plain session/preference strings with no expiry.
pub trait Storage: Send + Sync {
  /// Upsert a cache entry. Replaces any prior entry under the key wholesale.
  fn put_entry(&self, key: &str, payload: &str, written_at: DateTime<Utc>) -> Result<()>;

  /// Read a cache entry, age included. `None` if absent.
  fn get_entry(&self, key: &str) -> Result<Option<StoredEntry>>;

  /// Remove a single cache entry.
  fn remove_entry(&self, key: &str) -> Result<()>;

  /// Remove every cache entry whose key starts with `prefix`.
  fn remove_entries_with_prefix(&self, prefix: &str) -> Result<()>;

  /// Set a session/preference value.
  fn put_state(&self, key: &str, value: &str) -> Result<()>;

  /// Read a session/preference value. `None` if absent.
  fn get_state(&self, key: &str) -> Result<Option<String>>;

  /// Remove the given session/preference keys.
  fn remove_state(&self, keys: &[&str]) -> Result<()>;
}

/// SQLite-backed storage at a fixed path, surviving process restarts.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

/// Schema for the client database.
const SCHEMA: &str = r#"
-- Cached resource payloads (one row per scope key)
CREATE TABLE IF NOT EXISTS resource_cache (
    scope_key TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    written_at TEXT NOT NULL
);

-- Session state and preferences (no expiry)
CREATE TABLE IF NOT EXISTS app_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

impl SqliteStorage {
  /// Open or create the database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the database at an explicit path.
  pub fn open_at(path: &std::path::Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open client database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("sava").join("client.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run storage migrations: {}", e))?;

    Ok(())
  }
}

impl Storage for SqliteStorage {
  fn put_entry(&self, key: &str, payload: &str, written_at: DateTime<Utc>) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO resource_cache (scope_key, payload, written_at)
         VALUES (?, ?, ?)",
        params![key, payload, written_at.to_rfc3339()],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn get_entry(&self, key: &str) -> Result<Option<StoredEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT payload, written_at FROM resource_cache WHERE scope_key = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(String, String)> = stmt
      .query_row(params![key], |row| Ok((row.get(0)?, row.get(1)?)))
      .ok();

    match row {
      Some((payload, written_at_str)) => {
        let written_at = parse_timestamp(&written_at_str)?;
        Ok(Some(StoredEntry {
          payload,
          written_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn remove_entry(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM resource_cache WHERE scope_key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove cache entry: {}", e))?;

    Ok(())
  }

  fn remove_entries_with_prefix(&self, prefix: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // Escape LIKE wildcards so a literal prefix match is performed
    let pattern = format!(
      "{}%",
      prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
    );
    conn
      .execute(
        "DELETE FROM resource_cache WHERE scope_key LIKE ? ESCAPE '\\'",
        params![pattern],
      )
      .map_err(|e| eyre!("Failed to remove cache entries: {}", e))?;

    Ok(())
  }

  fn put_state(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO app_state (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to store state: {}", e))?;

    Ok(())
  }

  fn get_state(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT value FROM app_state WHERE key = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let value: Option<String> = stmt.query_row(params![key], |row| row.get(0)).ok();

    Ok(value)
  }

  fn remove_state(&self, keys: &[&str]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    for key in keys {
      conn
        .execute("DELETE FROM app_state WHERE key = ?", params![key])
        .map_err(|e| eyre!("Failed to remove state: {}", e))?;
    }

    Ok(())
  }
}

/// In-memory storage for tests. Same contract, nothing durable.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, StoredEntry>>,
  state: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Storage for MemoryStorage {
  fn put_entry(&self, key: &str, payload: &str, written_at: DateTime<Utc>) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert(
      key.to_string(),
      StoredEntry {
        payload: payload.to_string(),
        written_at,
      },
    );
    Ok(())
  }

  fn get_entry(&self, key: &str) -> Result<Option<StoredEntry>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(key).cloned())
  }

  fn remove_entry(&self, key: &str) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.remove(key);
    Ok(())
  }

  fn remove_entries_with_prefix(&self, prefix: &str) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.retain(|key, _| !key.starts_with(prefix));
    Ok(())
  }

  fn put_state(&self, key: &str, value: &str) -> Result<()> {
    let mut state = self
      .state
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    state.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn get_state(&self, key: &str) -> Result<Option<String>> {
    let state = self
      .state
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(state.get(key).cloned())
  }

  fn remove_state(&self, keys: &[&str]) -> Result<()> {
    let mut state = self
      .state
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    for key in keys {
      state.remove(*key);
    }
    Ok(())
  }
}

/// Parse an RFC 3339 timestamp written by `put_entry`.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse timestamp '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn open_temp() -> (SqliteStorage, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let storage = SqliteStorage::open_at(&dir.path().join("client.db")).expect("open storage");
    (storage, dir)
  }

  #[test]
  fn test_entry_roundtrip_preserves_timestamp() {
    let (storage, _dir) = open_temp();
    let written_at = Utc::now();

    storage
      .put_entry("savings_data_u1", r#"{"total_amount":100.0}"#, written_at)
      .unwrap();

    let entry = storage.get_entry("savings_data_u1").unwrap().unwrap();
    assert_eq!(entry.payload, r#"{"total_amount":100.0}"#);
    assert_eq!(entry.written_at, written_at);
  }

  #[test]
  fn test_missing_entry_is_none() {
    let (storage, _dir) = open_temp();
    assert!(storage.get_entry("nope").unwrap().is_none());
  }

  #[test]
  fn test_put_entry_replaces_wholesale() {
    let (storage, _dir) = open_temp();
    let first = Utc::now();
    let second = first + chrono::Duration::seconds(5);

    storage.put_entry("home_data_u1", "1", first).unwrap();
    storage.put_entry("home_data_u1", "2", second).unwrap();

    let entry = storage.get_entry("home_data_u1").unwrap().unwrap();
    assert_eq!(entry.payload, "2");
    assert_eq!(entry.written_at, second);
  }

  #[test]
  fn test_remove_entries_with_prefix_spares_others() {
    let (storage, _dir) = open_temp();
    let now = Utc::now();
    storage.put_entry("loans_data_u1", "a", now).unwrap();
    storage.put_entry("loans_data_u2", "b", now).unwrap();
    storage.put_entry("home_data_u1", "c", now).unwrap();

    storage.remove_entries_with_prefix("loans_data").unwrap();

    assert!(storage.get_entry("loans_data_u1").unwrap().is_none());
    assert!(storage.get_entry("loans_data_u2").unwrap().is_none());
    assert!(storage.get_entry("home_data_u1").unwrap().is_some());
  }

  #[test]
  fn test_prefix_underscore_is_literal() {
    let (storage, _dir) = open_temp();
    let now = Utc::now();
    // `_` must not act as a single-character wildcard
    storage.put_entry("loans_data_u1", "a", now).unwrap();
    storage.put_entry("loansXdataXu1", "b", now).unwrap();

    storage.remove_entries_with_prefix("loans_data").unwrap();

    assert!(storage.get_entry("loans_data_u1").unwrap().is_none());
    assert!(storage.get_entry("loansXdataXu1").unwrap().is_some());
  }

  #[test]
  fn test_state_roundtrip_and_removal() {
    let (storage, _dir) = open_temp();
    storage.put_state("access_token", "tok123").unwrap();
    storage.put_state("user_id", "u1").unwrap();

    assert_eq!(
      storage.get_state("access_token").unwrap().as_deref(),
      Some("tok123")
    );

    storage.remove_state(&["access_token", "user_id"]).unwrap();
    assert!(storage.get_state("access_token").unwrap().is_none());
    assert!(storage.get_state("user_id").unwrap().is_none());
  }

  #[test]
  fn test_persists_across_reopen() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("client.db");
    let written_at = Utc::now();

    {
      let storage = SqliteStorage::open_at(&path).unwrap();
      storage.put_entry("dashboard_data_u1", "42", written_at).unwrap();
      storage.put_state("theme_preference", "dark").unwrap();
    }

    let storage = SqliteStorage::open_at(&path).unwrap();
    let entry = storage.get_entry("dashboard_data_u1").unwrap().unwrap();
    assert_eq!(entry.payload, "42");
    assert_eq!(entry.written_at, written_at);
    assert_eq!(
      storage.get_state("theme_preference").unwrap().as_deref(),
      Some("dark")
    );
  }

  #[test]
  fn test_memory_storage_matches_contract() {
    let storage = MemoryStorage::new();
    let now = Utc::now();

    storage.put_entry("penalties_data_u1", "x", now).unwrap();
    assert!(storage.get_entry("penalties_data_u1").unwrap().is_some());

    storage.remove_entry("penalties_data_u1").unwrap();
    assert!(storage.get_entry("penalties_data_u1").unwrap().is_none());
  }
}
