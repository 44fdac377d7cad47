//! HTTP client for the saving API: bounded retries, per-attempt timeouts,
//! server error messages surfaced to the caller.

use color_eyre::{eyre::eyre, Result};
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ApiConfig, Config, NetworkConfig};

use super::types::{
  CreateSavingRequest, CreateSavingResponse, DashboardSummary, HomeSummary, LoansLedger,
  LoginResponse, PaymentsLedger, PenaltiesLedger, PhoneVerification, ProfilePhotoRef,
  SavingsLedger, UploadPhotoResponse,
};

/// Error payload shape shared by all endpoints.
#[derive(Debug, Deserialize)]
struct ErrorBody {
  message: Option<String>,
}

/// Saving API client.
///
/// Every operation runs the same loop: up to `retry_attempts` physical
/// requests, each bounded by `request_timeout_ms`, with a pause between
/// failed attempts. Non-success statuses count as failures and carry the
/// server's `message` field when one is present.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  api: ApiConfig,
  network: NetworkConfig,
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      api: config.api.clone(),
      network: config.network,
    })
  }

  /// Check whether a phone number belongs to a registered member.
  ///
  /// The number is stripped to digits before sending.
  pub async fn verify_phone(&self, phone_number: &str) -> Result<PhoneVerification> {
    let clean = normalize_phone(phone_number);
    let url = self.endpoint("/verify-phone");

    self
      .execute("verify_phone", || {
        self.http.post(url.clone()).json(&json!({ "phone_number": clean }))
      })
      .await
  }

  /// Log in with a member id, returning the access token and user info.
  pub async fn login_by_id(&self, user_id: &str) -> Result<LoginResponse> {
    let url = self.endpoint("/login-by-id");

    self
      .execute("login_by_id", || {
        self.http.post(url.clone()).json(&json!({ "user_id": user_id }))
      })
      .await
  }

  /// Record a new saving deposit.
  pub async fn create_saving(&self, request: &CreateSavingRequest) -> Result<CreateSavingResponse> {
    let url = self.endpoint("/create-saving");

    self
      .execute("create_saving", || self.http.post(url.clone()).json(request))
      .await
  }

  /// Upload a profile photo as a multipart form with a named file part.
  ///
  /// No explicit content-type header is set; the transport supplies the
  /// multipart boundary. The form is rebuilt per attempt (multipart bodies
  /// are single-use).
  pub async fn upload_profile_photo(
    &self,
    user_id: &str,
    file_name: &str,
    bytes: Vec<u8>,
    bearer: Option<&str>,
  ) -> Result<UploadPhotoResponse> {
    let url = self.endpoint("/profile-photo");

    self
      .execute("upload_profile_photo", || {
        let part = multipart::Part::bytes(bytes.clone()).file_name(file_name.to_string());
        let form = multipart::Form::new()
          .text("user_id", user_id.to_string())
          .part("photo", part);
        with_bearer(self.http.post(url.clone()), bearer).multipart(form)
      })
      .await
  }

  /// Home screen summary for one member.
  pub async fn get_home(&self, user_id: &str, bearer: Option<&str>) -> Result<HomeSummary> {
    self
      .get_json("get_home", &format!("/home/{}", user_id), bearer)
      .await
  }

  /// Dashboard totals for one member.
  pub async fn get_dashboard(
    &self,
    user_id: &str,
    bearer: Option<&str>,
  ) -> Result<DashboardSummary> {
    self
      .get_json("get_dashboard", &format!("/dashboard/{}", user_id), bearer)
      .await
  }

  /// Savings ledger for one member.
  pub async fn get_savings(&self, user_id: &str, bearer: Option<&str>) -> Result<SavingsLedger> {
    self
      .get_json("get_savings", &format!("/savings/{}", user_id), bearer)
      .await
  }

  /// Loans ledger for one member.
  pub async fn get_loans(&self, user_id: &str, bearer: Option<&str>) -> Result<LoansLedger> {
    self
      .get_json("get_loans", &format!("/loans/{}", user_id), bearer)
      .await
  }

  /// Repayments against one loan.
  pub async fn get_loan_payments(
    &self,
    loan_id: &str,
    bearer: Option<&str>,
  ) -> Result<PaymentsLedger> {
    self
      .get_json(
        "get_loan_payments",
        &format!("/loan-payments/{}", loan_id),
        bearer,
      )
      .await
  }

  /// Penalties ledger for one member.
  pub async fn get_penalties(
    &self,
    user_id: &str,
    bearer: Option<&str>,
  ) -> Result<PenaltiesLedger> {
    self
      .get_json("get_penalties", &format!("/penalties/{}", user_id), bearer)
      .await
  }

  /// Stored profile photo reference for one member.
  pub async fn get_profile_photo(
    &self,
    user_id: &str,
    bearer: Option<&str>,
  ) -> Result<ProfilePhotoRef> {
    self
      .get_json(
        "get_profile_photo",
        &format!("/profile-photo/{}", user_id),
        bearer,
      )
      .await
  }

  /// Resolve an `image_preview_link` to an absolute URL.
  ///
  /// Absolute links pass through; relative paths are normalized (the server
  /// emits Windows-style separators) and joined onto the server base.
  pub fn photo_url(&self, link: &str) -> Result<Url> {
    if link.starts_with("http://") || link.starts_with("https://") {
      return Url::parse(link).map_err(|e| eyre!("Invalid photo link '{}': {}", link, e));
    }

    let clean = link.replace('\\', "/");
    let base = Url::parse(&self.api.server_base_url)
      .map_err(|e| eyre!("Invalid server base url '{}': {}", self.api.server_base_url, e))?;

    base
      .join(clean.trim_start_matches('/'))
      .map_err(|e| eyre!("Invalid photo link '{}': {}", link, e))
  }

  /// Download the photo behind an `image_preview_link`.
  pub async fn fetch_photo(&self, link: &str, bearer: Option<&str>) -> Result<Vec<u8>> {
    let url = self.photo_url(link)?;

    self
      .execute_bytes("fetch_photo", || {
        with_bearer(self.http.get(url.clone()), bearer)
      })
      .await
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}{}", self.api.base_url, path)
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    op: &'static str,
    path: &str,
    bearer: Option<&str>,
  ) -> Result<T> {
    let url = self.endpoint(path);
    self
      .execute(op, || with_bearer(self.http.get(url.clone()), bearer))
      .await
  }

  /// Run the retry loop around one logical operation.
  ///
  /// `build` is invoked once per physical attempt.
  async fn execute<T: DeserializeOwned>(
    &self,
    op: &'static str,
    build: impl Fn() -> reqwest::RequestBuilder,
  ) -> Result<T> {
    let response = self.execute_raw(op, build).await?;
    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse {} response: {}", op, e))
  }

  async fn execute_bytes(
    &self,
    op: &'static str,
    build: impl Fn() -> reqwest::RequestBuilder,
  ) -> Result<Vec<u8>> {
    let response = self.execute_raw(op, build).await?;
    let bytes = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read {} response: {}", op, e))?;
    Ok(bytes.to_vec())
  }

  async fn execute_raw(
    &self,
    op: &'static str,
    build: impl Fn() -> reqwest::RequestBuilder,
  ) -> Result<reqwest::Response> {
    let max_attempts = self.network.retry_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
      debug!(op, attempt, max_attempts, "Issuing request");

      match self.attempt(build()).await {
        Ok(response) => return Ok(response),
        Err(e) => {
          warn!(op, attempt, max_attempts, error = %e, "Request attempt failed");
          last_error = Some(e);

          // Don't wait after the last attempt
          if attempt < max_attempts {
            let delay = self
              .network
              .backoff
              .delay_for_attempt(self.network.retry_delay(), attempt);
            tokio::time::sleep(delay).await;
          }
        }
      }
    }

    Err(last_error.unwrap_or_else(|| eyre!("{} failed", op)))
  }

  /// One physical attempt: bounded by the per-request timeout, non-success
  /// statuses surfaced with the server's message when present.
  async fn attempt(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let response = request
      .timeout(self.network.request_timeout())
      .send()
      .await
      .map_err(|e| eyre!("Request failed: {}", e))?;

    let status = response.status();
    if !status.is_success() {
      let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
      return Err(eyre!(message));
    }

    Ok(response)
  }
}

fn with_bearer(builder: reqwest::RequestBuilder, bearer: Option<&str>) -> reqwest::RequestBuilder {
  match bearer {
    Some(token) => builder.bearer_auth(token),
    None => builder,
  }
}

/// Strip a phone number down to its digits.
fn normalize_phone(phone: &str) -> String {
  phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;

  fn client() -> ApiClient {
    ApiClient::new(&Config::default()).unwrap()
  }

  #[test]
  fn test_normalize_phone_strips_formatting() {
    assert_eq!(normalize_phone("+250 788 000-111"), "250788000111");
    assert_eq!(normalize_phone("0788000111"), "0788000111");
  }

  #[test]
  fn test_photo_url_passes_absolute_links_through() {
    let url = client()
      .photo_url("https://cdn.example.com/media/u1.jpg")
      .unwrap();
    assert_eq!(url.as_str(), "https://cdn.example.com/media/u1.jpg");
  }

  #[test]
  fn test_photo_url_joins_relative_paths() {
    let url = client().photo_url("media/u1.jpg").unwrap();
    assert_eq!(url.as_str(), "https://saving-api.mababa.app/media/u1.jpg");
  }

  #[test]
  fn test_photo_url_normalizes_backslashes() {
    let url = client().photo_url(r"media\photos\u1.jpg").unwrap();
    assert_eq!(
      url.as_str(),
      "https://saving-api.mababa.app/media/photos/u1.jpg"
    );
  }

  #[test]
  fn test_photo_url_tolerates_leading_slash() {
    let url = client().photo_url("/media/u1.jpg").unwrap();
    assert_eq!(url.as_str(), "https://saving-api.mababa.app/media/u1.jpg");
  }
}
