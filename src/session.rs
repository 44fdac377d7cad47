//! Durable session state and preferences.
//!
//! Replaces the ambient auth/theme state of earlier builds with an explicit
//! store created at process start and mutated only through the operations
//! below. Session values live outside the cache TTL mechanism and never
//! expire.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::warn;

use crate::api::types::UserInfo;
use crate::storage::Storage;

const KEY_VERIFIED: &str = "is_user_verified";
const KEY_PHONE_NUMBER: &str = "user_phone_number";
const KEY_USER_ID: &str = "user_id";
const KEY_ACCESS_TOKEN: &str = "access_token";
const KEY_USER_INFO: &str = "user_info";
const KEY_THEME: &str = "theme_preference";

/// Snapshot of the persisted session, loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct Session {
  pub verified: bool,
  pub phone_number: Option<String>,
  pub user_id: Option<String>,
  pub access_token: Option<String>,
  pub user_info: Option<UserInfo>,
}

impl Session {
  pub fn is_logged_in(&self) -> bool {
    self.access_token.is_some()
  }
}

/// Theme preference, stored as a plain string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThemePreference {
  #[default]
  System,
  Light,
  Dark,
}

impl ThemePreference {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::System => "system",
      Self::Light => "light",
      Self::Dark => "dark",
    }
  }

  fn from_str(s: &str) -> Option<Self> {
    match s {
      "system" => Some(Self::System),
      "light" => Some(Self::Light),
      "dark" => Some(Self::Dark),
      _ => None,
    }
  }
}

/// Persisted session store.
///
/// Mutations return `Result`: a login that fails to persist must surface.
/// Reads absorb storage errors to defaults, like the cache does.
pub struct SessionStore<S: Storage> {
  storage: Arc<S>,
}

impl<S: Storage> SessionStore<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  /// Load the persisted session. Read failures degrade to a logged-out
  /// default rather than blocking startup.
  pub fn load(&self) -> Session {
    let verified = self.read(KEY_VERIFIED).as_deref() == Some("true");
    let phone_number = self.read(KEY_PHONE_NUMBER);

    // A verification flag without a phone number is meaningless
    if !verified || phone_number.is_none() {
      return Session::default();
    }

    let user_info = self.read(KEY_USER_INFO).and_then(|json| {
      serde_json::from_str(&json)
        .map_err(|e| warn!(error = %e, "Failed to parse stored user info"))
        .ok()
    });

    Session {
      verified,
      phone_number,
      user_id: self.read(KEY_USER_ID),
      access_token: self.read(KEY_ACCESS_TOKEN),
      user_info,
    }
  }

  /// Record a successful phone verification.
  pub fn set_verified(&self, phone_number: &str, user_id: Option<&str>) -> Result<()> {
    self.storage.put_state(KEY_VERIFIED, "true")?;
    self.storage.put_state(KEY_PHONE_NUMBER, phone_number)?;
    if let Some(id) = user_id {
      self.storage.put_state(KEY_USER_ID, id)?;
    }
    Ok(())
  }

  /// Record a successful login.
  pub fn set_logged_in(&self, access_token: &str, user_info: &UserInfo) -> Result<()> {
    let json = serde_json::to_string(user_info)
      .map_err(|e| eyre!("Failed to serialize user info: {}", e))?;
    self.storage.put_state(KEY_ACCESS_TOKEN, access_token)?;
    self.storage.put_state(KEY_USER_INFO, &json)?;
    Ok(())
  }

  /// Drop the login session but keep the verified phone number for easy
  /// re-login.
  pub fn logout(&self) -> Result<()> {
    self
      .storage
      .remove_state(&[KEY_USER_ID, KEY_ACCESS_TOKEN, KEY_USER_INFO])
  }

  /// Drop everything, including the verified phone number.
  pub fn logout_completely(&self) -> Result<()> {
    self.storage.remove_state(&[
      KEY_VERIFIED,
      KEY_PHONE_NUMBER,
      KEY_USER_ID,
      KEY_ACCESS_TOKEN,
      KEY_USER_INFO,
    ])
  }

  /// Stored theme preference, defaulting to following the device.
  pub fn theme_preference(&self) -> ThemePreference {
    self
      .read(KEY_THEME)
      .and_then(|s| ThemePreference::from_str(&s))
      .unwrap_or_default()
  }

  pub fn set_theme_preference(&self, preference: ThemePreference) -> Result<()> {
    self.storage.put_state(KEY_THEME, preference.as_str())
  }

  fn read(&self, key: &str) -> Option<String> {
    match self.storage.get_state(key) {
      Ok(value) => value,
      Err(e) => {
        warn!(key, error = %e, "Failed to read session state");
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStorage;

  fn store() -> SessionStore<MemoryStorage> {
    SessionStore::new(Arc::new(MemoryStorage::new()))
  }

  fn user() -> UserInfo {
    UserInfo {
      id: "u1".to_string(),
      username: "claudine".to_string(),
      phone_number: Some("250788000111".to_string()),
    }
  }

  #[test]
  fn test_fresh_store_loads_default_session() {
    let session = store().load();
    assert!(!session.verified);
    assert!(!session.is_logged_in());
    assert!(session.phone_number.is_none());
  }

  #[test]
  fn test_verify_then_login_roundtrips() {
    let store = store();
    store.set_verified("250788000111", Some("u1")).unwrap();
    store.set_logged_in("tok123", &user()).unwrap();

    let session = store.load();
    assert!(session.verified);
    assert!(session.is_logged_in());
    assert_eq!(session.phone_number.as_deref(), Some("250788000111"));
    assert_eq!(session.user_id.as_deref(), Some("u1"));
    assert_eq!(session.access_token.as_deref(), Some("tok123"));
    assert_eq!(session.user_info.unwrap().username, "claudine");
  }

  #[test]
  fn test_logout_keeps_verified_phone() {
    let store = store();
    store.set_verified("250788000111", Some("u1")).unwrap();
    store.set_logged_in("tok123", &user()).unwrap();

    store.logout().unwrap();

    let session = store.load();
    assert!(session.verified);
    assert_eq!(session.phone_number.as_deref(), Some("250788000111"));
    assert!(session.user_id.is_none());
    assert!(session.access_token.is_none());
    assert!(session.user_info.is_none());
  }

  #[test]
  fn test_logout_completely_clears_everything() {
    let store = store();
    store.set_verified("250788000111", Some("u1")).unwrap();
    store.set_logged_in("tok123", &user()).unwrap();

    store.logout_completely().unwrap();

    let session = store.load();
    assert!(!session.verified);
    assert!(session.phone_number.is_none());
    assert!(session.access_token.is_none());
  }

  #[test]
  fn test_theme_preference_roundtrips() {
    let store = store();
    assert_eq!(store.theme_preference(), ThemePreference::System);

    store.set_theme_preference(ThemePreference::Dark).unwrap();
    assert_eq!(store.theme_preference(), ThemePreference::Dark);
  }

  #[test]
  fn test_corrupt_user_info_degrades_to_none() {
    let store = store();
    store.set_verified("250788000111", Some("u1")).unwrap();
    store.storage.put_state(KEY_USER_INFO, "not json {").unwrap();

    let session = store.load();
    assert!(session.verified);
    assert!(session.user_info.is_none());
  }
}
