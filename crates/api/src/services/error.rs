//! Service error taxonomy.

use thiserror::Error;

use bullet_cloud_core::OrderStatus;

use crate::db::RepositoryError;

/// Every service failure maps to exactly one of these.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Entity absent, or not owned by the caller.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Entity exists but belongs to someone else.
    #[error("forbidden")]
    Forbidden,

    /// Malformed input, rejected before any storage call.
    #[error("{0}")]
    InvalidArgument(String),

    /// Valid input that the current data does not allow.
    #[error("{0}")]
    InvalidState(String),

    #[error("product not in cart")]
    ProductNotInCart,

    #[error("order cannot be cancelled (current status: {0})")]
    OrderCannotBeCancelled(OrderStatus),

    /// Lost a race with a concurrent request. Retryable.
    #[error("{0}")]
    Conflict(String),

    /// The entity is still referenced and cannot be removed.
    #[error("{0}")]
    InUse(String),

    /// Storage failure. The message is never shown to clients.
    #[error("storage error: {0}")]
    Storage(RepositoryError),
}

impl ServiceError {
    /// Classify a repository error, naming `entity` if it was not found.
    ///
    /// ```rust,ignore
    /// store.find(user, id).await.map_err(ServiceError::from_repository("address"))?;
    /// ```
    pub fn from_repository(entity: &'static str) -> impl FnOnce(RepositoryError) -> Self {
        move |err| match err {
            RepositoryError::NotFound => Self::NotFound(entity),
            RepositoryError::ProductNotInCart => Self::ProductNotInCart,
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::InUse(msg) => Self::InUse(msg),
            RepositoryError::OutOfRange(_) => {
                Self::InvalidArgument(format!("{entity} value out of range"))
            }
            RepositoryError::EmptyCart => Self::InvalidState(err.to_string()),
            RepositoryError::InvalidReference(_) => {
                Self::InvalidState(format!("{entity} references a record that no longer exists"))
            }
            RepositoryError::InvalidTransition { from, to } => {
                if to == OrderStatus::Cancelled {
                    Self::OrderCannotBeCancelled(from)
                } else {
                    Self::InvalidState(format!("cannot move order from {from} to {to}"))
                }
            }
            RepositoryError::Database(_) => Self::Storage(err),
        }
    }

    /// Whether the caller may retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
