use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client configuration: endpoints, network policy, cache freshness.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub network: NetworkConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// REST base, including the `/api` prefix
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Bare server base, used to resolve relative photo links
  #[serde(default = "default_server_base_url")]
  pub server_base_url: String,
  /// WebSocket base for live updates
  #[serde(default = "default_ws_base_url")]
  pub ws_base_url: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NetworkConfig {
  /// Physical attempts per logical request, including the first
  #[serde(default = "default_retry_attempts")]
  pub retry_attempts: u32,
  /// Pause between failed attempts
  #[serde(default = "default_retry_delay_ms")]
  pub retry_delay_ms: u64,
  /// Per-attempt timeout; a hung request is aborted and counts as a failure
  #[serde(default = "default_request_timeout_ms")]
  pub request_timeout_ms: u64,
  /// Pause before re-establishing a dropped live connection
  #[serde(default = "default_reconnect_delay_ms")]
  pub reconnect_delay_ms: u64,
  /// How the pause grows across consecutive failures
  #[serde(default)]
  pub backoff: BackoffMode,
}

/// Delay growth policy for retries and reconnects.
///
/// The deployed backend sees a flat delay; exponential growth is selectable
/// per deployment without code changes.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffMode {
  #[default]
  Fixed,
  Exponential,
}

impl BackoffMode {
  /// Delay to wait after the `failures`-th consecutive failure (1-based).
  pub fn delay_for_attempt(&self, base: Duration, failures: u32) -> Duration {
    match self {
      Self::Fixed => base,
      Self::Exponential => base.saturating_mul(1u32 << failures.saturating_sub(1).min(16)),
    }
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CacheConfig {
  /// Freshness window for cached reads; stale entries are kept as an
  /// offline fallback
  #[serde(default = "default_ttl_minutes")]
  pub ttl_minutes: i64,
}

fn default_base_url() -> String {
  "https://saving-api.mababa.app/api".to_string()
}

fn default_server_base_url() -> String {
  "https://saving-api.mababa.app".to_string()
}

fn default_ws_base_url() -> String {
  "wss://saving-api.mababa.app/api".to_string()
}

fn default_retry_attempts() -> u32 {
  3
}

fn default_retry_delay_ms() -> u64 {
  1000
}

fn default_request_timeout_ms() -> u64 {
  10_000
}

fn default_reconnect_delay_ms() -> u64 {
  2000
}

fn default_ttl_minutes() -> i64 {
  30
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      server_base_url: default_server_base_url(),
      ws_base_url: default_ws_base_url(),
    }
  }
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      retry_attempts: default_retry_attempts(),
      retry_delay_ms: default_retry_delay_ms(),
      request_timeout_ms: default_request_timeout_ms(),
      reconnect_delay_ms: default_reconnect_delay_ms(),
      backoff: BackoffMode::default(),
    }
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_minutes: default_ttl_minutes(),
    }
  }
}

impl NetworkConfig {
  pub fn retry_delay(&self) -> Duration {
    Duration::from_millis(self.retry_delay_ms)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_millis(self.request_timeout_ms)
  }

  pub fn reconnect_delay(&self) -> Duration {
    Duration::from_millis(self.reconnect_delay_ms)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./sava.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/sava/config.yaml
  /// 4. ~/.config/sava/config.yaml
  ///
  /// Without an explicit path, a missing file falls back to the built-in
  /// development defaults.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("sava.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("sava").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}
