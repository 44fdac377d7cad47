//! Local caching layer for offline support.
//!
//! Resource payloads are cached under composite scope keys with a write
//! timestamp. Reads come in two flavors: fresh (miss once older than the
//! TTL) and stale-allowed (age ignored, used only after network retries are
//! exhausted). Expired entries are never evicted, so an offline client can
//! still render the last known data.

mod key;
mod store;

pub use key::{Resource, ScopeKey};
pub use store::CacheStore;
