//! Address book service.

use bullet_cloud_core::{AddressId, UserId};

use super::ServiceError;
use crate::db::AddressStore;
use crate::models::{Address, AddressPatch, NewAddress};

const MAX_FIELD_LENGTH: usize = 255;

/// Address operations for an authenticated user.
pub struct AddressService<S> {
    store: S,
}

impl<S: AddressStore> AddressService<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the store fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, ServiceError> {
        self.store
            .list_for_user(user_id)
            .await
            .map_err(ServiceError::from_repository("address"))
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the address does not exist or
    /// belongs to another user.
    pub async fn get(&self, user_id: UserId, id: AddressId) -> Result<Address, ServiceError> {
        self.store
            .find(user_id, id)
            .await
            .map_err(ServiceError::from_repository("address"))?
            .ok_or(ServiceError::NotFound("address"))
    }

    /// Create an address; `is_default` un-defaults every other address.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidArgument` if a field is blank or too long.
    #[tracing::instrument(skip_all, fields(user_id = %user_id))]
    pub async fn create(&self, user_id: UserId, address: NewAddress) -> Result<Address, ServiceError> {
        let address = NewAddress {
            street: required_field("street", &address.street)?,
            city: required_field("city", &address.city)?,
            state: required_field("state", &address.state)?,
            postal_code: required_field("postal_code", &address.postal_code)?,
            country: required_field("country", &address.country)?,
            is_default: address.is_default,
        };

        let created = self
            .store
            .create(user_id, &address)
            .await
            .map_err(ServiceError::from_repository("user"))?;
        tracing::info!(address_id = %created.id, is_default = created.is_default, "address created");
        Ok(created)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidArgument` for blank fields and
    /// `ServiceError::NotFound` if the address is not the caller's.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        patch: AddressPatch,
    ) -> Result<Address, ServiceError> {
        let patch = AddressPatch {
            street: optional_field("street", patch.street.as_deref())?,
            city: optional_field("city", patch.city.as_deref())?,
            state: optional_field("state", patch.state.as_deref())?,
            postal_code: optional_field("postal_code", patch.postal_code.as_deref())?,
            country: optional_field("country", patch.country.as_deref())?,
            is_default: patch.is_default,
        };

        self.store
            .update(user_id, id, &patch)
            .await
            .map_err(ServiceError::from_repository("address"))
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the address is not the caller's,
    /// or `ServiceError::InUse` if an order still ships to it.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), ServiceError> {
        self.store
            .delete(user_id, id)
            .await
            .map_err(ServiceError::from_repository("address"))?;
        tracing::info!(address_id = %id, "address deleted");
        Ok(())
    }

    /// Make `id` the caller's only default address.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the address is not the caller's;
    /// the previous default is kept in that case.
    pub async fn set_default(&self, user_id: UserId, id: AddressId) -> Result<Address, ServiceError> {
        self.store
            .set_default(user_id, id)
            .await
            .map_err(ServiceError::from_repository("address"))
    }
}

fn required_field(name: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidArgument(format!("{name} is required")));
    }
    if trimmed.chars().count() > MAX_FIELD_LENGTH {
        return Err(ServiceError::InvalidArgument(format!(
            "{name} must be at most {MAX_FIELD_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

fn optional_field(name: &str, value: Option<&str>) -> Result<Option<String>, ServiceError> {
    value.map(|v| required_field(name, v)).transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_required_field_trims() {
        assert_eq!(required_field("city", "  Lisbon ").unwrap(), "Lisbon");
    }

    #[test]
    fn test_required_field_rejects_blank() {
        let err = required_field("city", "   ").unwrap_err();
        assert_eq!(err.to_string(), "city is required");
    }

    #[test]
    fn test_required_field_rejects_long() {
        assert!(required_field("street", &"x".repeat(MAX_FIELD_LENGTH + 1)).is_err());
        assert!(required_field("street", &"x".repeat(MAX_FIELD_LENGTH)).is_ok());
    }

    #[test]
    fn test_optional_field_passes_none() {
        assert_eq!(optional_field("state", None).unwrap(), None);
        assert!(optional_field("state", Some("")).is_err());
    }
}
