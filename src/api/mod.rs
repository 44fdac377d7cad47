//! Saving API access: transport client, wire types, and the cached wrapper
//! most callers should use.

mod cached_client;
mod client;
pub mod types;

pub use cached_client::CachedApiClient;
pub use client::ApiClient;
