//! Wire types for the saving API.
//!
//! Ids (`user_id`, loan ids) are opaque strings passed through; amounts are
//! JSON numbers. Unknown fields are ignored so server-side additions don't
//! break deserialization.

use serde::{Deserialize, Serialize};

/// Result of checking a phone number against registered members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneVerification {
  pub exists: bool,
  pub message: String,
  pub user_id: Option<String>,
  pub phone_number: Option<String>,
}

/// Session established by logging in with a member id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
  pub access_token: String,
  pub user_info: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
  pub id: String,
  pub username: String,
  pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSavingRequest {
  pub user_id: String,
  pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSavingResponse {
  pub message: Option<String>,
  pub current_balance: Option<f64>,
}

/// One saving deposit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingRecord {
  pub id: String,
  pub amount: f64,
  pub created_at: String,
}

/// Savings ledger for one member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsLedger {
  pub savings: Vec<SavingRecord>,
  pub total_amount: f64,
}

/// One issued loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRecord {
  pub id: String,
  pub amount: f64,
  pub issued_date: String,
  pub deadline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoansLedger {
  pub loans: Vec<LoanRecord>,
  pub total_amount: f64,
}

/// One repayment against a loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
  pub id: String,
  pub amount: f64,
  pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsLedger {
  pub payments: Vec<PaymentRecord>,
  pub total_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PenaltyStatus {
  Paid,
  Unpaid,
}

/// One late-payment penalty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyRecord {
  pub id: String,
  pub amount: f64,
  pub reason: String,
  pub status: PenaltyStatus,
  pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltiesLedger {
  pub penalties: Vec<PenaltyRecord>,
  pub total_unpaid: f64,
  pub total_paid: f64,
}

/// Totals shown on the dashboard screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
  pub total_saving: f64,
  pub total_loan: f64,
  pub total_penalty: f64,
}

/// Most recent deposit, as surfaced on the home screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestSaving {
  pub amount: f64,
  pub month: u32,
  pub year: i32,
}

/// Home screen summary; also the payload pushed over the live channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeSummary {
  pub total_saving: f64,
  pub total_loan: f64,
  pub latest_saving_info: Option<LatestSaving>,
  pub image_preview_link: Option<String>,
}

/// Stored profile photo location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilePhotoRef {
  pub image_preview_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPhotoResponse {
  pub message: Option<String>,
  pub image_preview_link: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_home_summary_parses_without_optionals() {
    let summary: HomeSummary =
      serde_json::from_str(r#"{"total_saving": 100, "total_loan": 0}"#).unwrap();
    assert_eq!(summary.total_saving, 100.0);
    assert!(summary.latest_saving_info.is_none());
    assert!(summary.image_preview_link.is_none());
  }

  #[test]
  fn test_penalty_status_is_lowercase_on_the_wire() {
    let record: PenaltyRecord = serde_json::from_str(
      r#"{"id": "p1", "amount": 1200, "reason": "late payment", "status": "unpaid", "created_at": "2025-06-01T00:00:00Z"}"#,
    )
    .unwrap();
    assert_eq!(record.status, PenaltyStatus::Unpaid);
    assert_eq!(serde_json::to_string(&PenaltyStatus::Paid).unwrap(), "\"paid\"");
  }

  #[test]
  fn test_unknown_fields_are_ignored() {
    let verification: PhoneVerification = serde_json::from_str(
      r#"{"exists": true, "message": "ok", "user_id": "u1", "phone_number": "250788000111", "extra": 1}"#,
    )
    .unwrap();
    assert!(verification.exists);
    assert_eq!(verification.user_id.as_deref(), Some("u1"));
  }
}
