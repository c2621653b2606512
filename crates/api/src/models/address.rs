//! Address domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bullet_cloud_core::{AddressId, UserId};

/// A user's shipping address.
///
/// For a given user at most one address has `is_default` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new address. The owner comes from the caller's identity,
/// never from the request body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Partial update of an address. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AddressPatch {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub is_default: Option<bool>,
}

impl AddressPatch {
    /// Whether applying this patch makes the address the user's default.
    #[must_use]
    pub fn sets_default(&self) -> bool {
        self.is_default == Some(true)
    }
}
