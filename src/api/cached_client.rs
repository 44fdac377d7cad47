//! Cached API client: cache-first reads with offline fallback.

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;
use url::Url;

use crate::cache::{CacheStore, Resource, ScopeKey};
use crate::config::Config;
use crate::storage::{SqliteStorage, Storage};

use super::client::ApiClient;
use super::types::{
  CreateSavingRequest, CreateSavingResponse, DashboardSummary, HomeSummary, LoansLedger,
  LoginResponse, PaymentsLedger, PenaltiesLedger, PhoneVerification, ProfilePhotoRef,
  SavingsLedger, UploadPhotoResponse,
};

/// API client with transparent caching.
///
/// Read accessors follow one path: a fresh cache hit returns with no
/// network call; otherwise fetch (with the client's internal retries),
/// write the cache on success, and fall back to a stale entry only once
/// retries are exhausted. Write operations never touch the cache.
pub struct CachedApiClient<S: Storage> {
  inner: ApiClient,
  cache: CacheStore<S>,
  bearer: Option<String>,
}

impl CachedApiClient<SqliteStorage> {
  /// Create a cached client over the default on-disk storage.
  pub fn open(config: &Config) -> Result<Self> {
    Self::new(config, Arc::new(SqliteStorage::open()?))
  }
}

impl<S: Storage> CachedApiClient<S> {
  pub fn new(config: &Config, storage: Arc<S>) -> Result<Self> {
    let cache =
      CacheStore::new(storage).with_ttl(chrono::Duration::minutes(config.cache.ttl_minutes));

    Ok(Self {
      inner: ApiClient::new(config)?,
      cache,
      bearer: None,
    })
  }

  /// Attach a bearer token to subsequent requests.
  pub fn set_bearer(&mut self, token: Option<String>) {
    self.bearer = token;
  }

  pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
    self.bearer = Some(token.into());
    self
  }

  /// Home screen summary, cache-first.
  pub async fn home(&self, user_id: &str) -> Result<HomeSummary> {
    let key = ScopeKey::for_owner(Resource::Home, user_id);
    self
      .fetch_with_cache(key, || {
        let inner = self.inner.clone();
        let user_id = user_id.to_string();
        let bearer = self.bearer.clone();
        async move { inner.get_home(&user_id, bearer.as_deref()).await }
      })
      .await
  }

  /// Dashboard totals, cache-first.
  pub async fn dashboard(&self, user_id: &str) -> Result<DashboardSummary> {
    let key = ScopeKey::for_owner(Resource::Dashboard, user_id);
    self
      .fetch_with_cache(key, || {
        let inner = self.inner.clone();
        let user_id = user_id.to_string();
        let bearer = self.bearer.clone();
        async move { inner.get_dashboard(&user_id, bearer.as_deref()).await }
      })
      .await
  }

  /// Savings ledger, cache-first.
  pub async fn savings(&self, user_id: &str) -> Result<SavingsLedger> {
    let key = ScopeKey::for_owner(Resource::Savings, user_id);
    self
      .fetch_with_cache(key, || {
        let inner = self.inner.clone();
        let user_id = user_id.to_string();
        let bearer = self.bearer.clone();
        async move { inner.get_savings(&user_id, bearer.as_deref()).await }
      })
      .await
  }

  /// Loans ledger, cache-first.
  pub async fn loans(&self, user_id: &str) -> Result<LoansLedger> {
    let key = ScopeKey::for_owner(Resource::Loans, user_id);
    self
      .fetch_with_cache(key, || {
        let inner = self.inner.clone();
        let user_id = user_id.to_string();
        let bearer = self.bearer.clone();
        async move { inner.get_loans(&user_id, bearer.as_deref()).await }
      })
      .await
  }

  /// Repayments for one loan, cache-first (scoped by loan id).
  pub async fn loan_payments(&self, loan_id: &str) -> Result<PaymentsLedger> {
    let key = ScopeKey::for_loan(Resource::Payments, loan_id);
    self
      .fetch_with_cache(key, || {
        let inner = self.inner.clone();
        let loan_id = loan_id.to_string();
        let bearer = self.bearer.clone();
        async move { inner.get_loan_payments(&loan_id, bearer.as_deref()).await }
      })
      .await
  }

  /// Penalties ledger, cache-first.
  pub async fn penalties(&self, user_id: &str) -> Result<PenaltiesLedger> {
    let key = ScopeKey::for_owner(Resource::Penalties, user_id);
    self
      .fetch_with_cache(key, || {
        let inner = self.inner.clone();
        let user_id = user_id.to_string();
        let bearer = self.bearer.clone();
        async move { inner.get_penalties(&user_id, bearer.as_deref()).await }
      })
      .await
  }

  /// Profile photo reference, cache-first.
  pub async fn profile_photo(&self, user_id: &str) -> Result<ProfilePhotoRef> {
    let key = ScopeKey::for_owner(Resource::ProfilePhoto, user_id);
    self
      .fetch_with_cache(key, || {
        let inner = self.inner.clone();
        let user_id = user_id.to_string();
        let bearer = self.bearer.clone();
        async move { inner.get_profile_photo(&user_id, bearer.as_deref()).await }
      })
      .await
  }

  /// Phone verification (write-type: never cached).
  pub async fn verify_phone(&self, phone_number: &str) -> Result<PhoneVerification> {
    self.inner.verify_phone(phone_number).await
  }

  /// Login (write-type: never cached).
  pub async fn login_by_id(&self, user_id: &str) -> Result<LoginResponse> {
    self.inner.login_by_id(user_id).await
  }

  /// Create a saving deposit (write-type: never cached).
  pub async fn create_saving(&self, request: &CreateSavingRequest) -> Result<CreateSavingResponse> {
    self.inner.create_saving(request).await
  }

  /// Upload a profile photo (write-type: never cached).
  pub async fn upload_profile_photo(
    &self,
    user_id: &str,
    file_name: &str,
    bytes: Vec<u8>,
  ) -> Result<UploadPhotoResponse> {
    self
      .inner
      .upload_profile_photo(user_id, file_name, bytes, self.bearer.as_deref())
      .await
  }

  /// Resolve an `image_preview_link` to an absolute URL.
  pub fn photo_url(&self, link: &str) -> Result<Url> {
    self.inner.photo_url(link)
  }

  /// Download the photo behind an `image_preview_link` (never cached).
  pub async fn fetch_photo(&self, link: &str) -> Result<Vec<u8>> {
    self.inner.fetch_photo(link, self.bearer.as_deref()).await
  }

  /// Drop one cached entry.
  pub fn invalidate(&self, key: &ScopeKey) {
    self.cache.invalidate(key);
  }

  /// Drop every cached resource entry (session state is untouched).
  pub fn invalidate_all(&self) {
    self.cache.invalidate_all();
  }

  /// The read path: fresh cache hit, else network, else stale fallback.
  ///
  /// At most one cache write happens per completed call. Concurrent calls
  /// for the same key are not coalesced; each runs its own retry loop and
  /// the last completed write wins.
  async fn fetch_with_cache<T, F, Fut>(&self, key: ScopeKey, fetch: F) -> Result<T>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    if let Some(cached) = self.cache.get_fresh::<T>(&key) {
      // Fresh hit: no network call, no cache write
      return Ok(cached);
    }

    match fetch().await {
      Ok(data) => {
        self.cache.put(&key, &data);
        Ok(data)
      }
      Err(network_error) => match self.cache.get_allow_stale::<T>(&key) {
        Some(stale) => {
          warn!(key = %key, "Network unavailable, serving cached data");
          Ok(stale)
        }
        None => Err(network_error),
      },
    }
  }
}
