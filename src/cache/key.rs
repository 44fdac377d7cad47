//! Scope keys naming the cache slot for one resource.

use std::fmt;

/// Resource types with a cache slot, one per REST resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
  Verification,
  Login,
  Dashboard,
  Savings,
  Loans,
  Payments,
  Penalties,
  Home,
  ProfilePhoto,
}

impl Resource {
  /// Every resource type, used for full-cache wipes.
  pub const ALL: [Resource; 9] = [
    Resource::Verification,
    Resource::Login,
    Resource::Dashboard,
    Resource::Savings,
    Resource::Loans,
    Resource::Payments,
    Resource::Penalties,
    Resource::Home,
    Resource::ProfilePhoto,
  ];

  /// Storage name this resource's keys start with.
  pub fn prefix(&self) -> &'static str {
    match self {
      Resource::Verification => "verification_data",
      Resource::Login => "login_data",
      Resource::Dashboard => "dashboard_data",
      Resource::Savings => "savings_data",
      Resource::Loans => "loans_data",
      Resource::Payments => "payments_data",
      Resource::Penalties => "penalties_data",
      Resource::Home => "home_data",
      Resource::ProfilePhoto => "profile_photo",
    }
  }
}

/// Composite cache key: resource type plus optional owner and secondary ids.
///
/// Renders as `prefix[_owner][_secondary]`; at most one cache entry exists
/// per rendered key at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeKey {
  pub resource: Resource,
  pub owner_id: Option<String>,
  pub secondary_id: Option<String>,
}

impl ScopeKey {
  /// Key with no owning entity.
  pub fn of(resource: Resource) -> Self {
    Self {
      resource,
      owner_id: None,
      secondary_id: None,
    }
  }

  /// Key owned by a user.
  pub fn for_owner(resource: Resource, owner_id: impl Into<String>) -> Self {
    Self {
      resource,
      owner_id: Some(owner_id.into()),
      secondary_id: None,
    }
  }

  /// Key scoped to a loan (payments are per-loan, not per-user).
  pub fn for_loan(resource: Resource, loan_id: impl Into<String>) -> Self {
    Self {
      resource,
      owner_id: None,
      secondary_id: Some(loan_id.into()),
    }
  }

  /// The rendered storage key.
  pub fn storage_key(&self) -> String {
    let mut key = self.resource.prefix().to_string();
    if let Some(owner) = &self.owner_id {
      key.push('_');
      key.push_str(owner);
    }
    if let Some(secondary) = &self.secondary_id {
      key.push('_');
      key.push_str(secondary);
    }
    key
  }
}

impl fmt::Display for ScopeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.storage_key())
  }
}
