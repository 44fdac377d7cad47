//! Client core for the Sava savings app.
//!
//! This crate is the data layer a front end links against: a retrying HTTP
//! client for the saving API, a durable TTL cache that keeps the app usable
//! offline, persisted session state, and a reconnecting WebSocket channel
//! for live home-summary updates.
//!
//! Typical wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//! use sava_client::{CachedApiClient, Config, SessionStore, SqliteStorage};
//!
//! # async fn wire() -> color_eyre::Result<()> {
//! let config = Config::load(None)?;
//! let storage = Arc::new(SqliteStorage::open()?);
//!
//! let session = SessionStore::new(Arc::clone(&storage));
//! let mut client = CachedApiClient::new(&config, storage)?;
//! client.set_bearer(session.load().access_token);
//!
//! let home = client.home("u1").await?;
//! # let _ = home;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod live;
pub mod session;
pub mod storage;

pub use api::{ApiClient, CachedApiClient};
pub use cache::{CacheStore, Resource, ScopeKey};
pub use config::{BackoffMode, Config};
pub use live::{LiveChannel, LiveEvent};
pub use session::{Session, SessionStore, ThemePreference};
pub use storage::{MemoryStorage, SqliteStorage, Storage};
