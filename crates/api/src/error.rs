//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Every error body has the shape `{"error": "<message>"}`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::ServiceError;
use crate::services::auth::AuthError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Service operation failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Authentication failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Request could not be parsed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Service(err) => match err {
                ServiceError::NotFound(_) | ServiceError::ProductNotInCart => StatusCode::NOT_FOUND,
                ServiceError::Forbidden => StatusCode::FORBIDDEN,
                ServiceError::InvalidArgument(_) | ServiceError::InvalidState(_) => {
                    StatusCode::BAD_REQUEST
                }
                ServiceError::OrderCannotBeCancelled(_)
                | ServiceError::Conflict(_)
                | ServiceError::InUse(_) => StatusCode::CONFLICT,
                ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(AuthError::Repository(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if let Self::Auth(err) = &self {
            tracing::warn!(error = %err, "authentication failed");
        }

        let retryable = matches!(&self, Self::Service(err) if err.is_retryable());
        if retryable {
            tracing::info!(error = %self, "request lost a concurrent write");
        }

        // Don't expose internal error details to clients
        let message = match &self {
            _ if status.is_server_error() => "Internal server error".to_string(),
            Self::Auth(_) => "Unauthorized".to_string(),
            Self::Service(err) => err.to_string(),
            _ => self.to_string(),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bullet_cloud_core::OrderStatus;

    use crate::db::RepositoryError;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    async fn body_of(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_service_error_status_codes() {
        assert_eq!(get_status(ServiceError::NotFound("order")), StatusCode::NOT_FOUND);
        assert_eq!(get_status(ServiceError::ProductNotInCart), StatusCode::NOT_FOUND);
        assert_eq!(get_status(ServiceError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            get_status(ServiceError::InvalidArgument("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(ServiceError::InvalidState("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(ServiceError::OrderCannotBeCancelled(OrderStatus::Shipped)),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(ServiceError::Conflict("race".into())), StatusCode::CONFLICT);
        assert_eq!(get_status(ServiceError::InUse("in use".into())), StatusCode::CONFLICT);
        assert_eq!(
            get_status(ServiceError::Storage(RepositoryError::Database(sqlx::Error::PoolTimedOut))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(get_status(AuthError::MissingToken), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AuthError::Expired), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AuthError::UnknownUser), StatusCode::UNAUTHORIZED);
        assert_eq!(
            get_status(AuthError::Repository(RepositoryError::NotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_body_is_json_error() {
        let body = body_of(ServiceError::NotFound("address").into()).await;
        assert_eq!(body, json!({ "error": "address not found" }));
    }

    #[tokio::test]
    async fn test_storage_details_hidden() {
        let err = ServiceError::Storage(RepositoryError::Database(sqlx::Error::Protocol(
            "unexpected message from row 42".into(),
        )));
        let body = body_of(err.into()).await;
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }

    #[test]
    fn test_only_retryable_conflicts_get_retry_after() {
        let race = AppError::from(ServiceError::Conflict("cart changed".into())).into_response();
        assert_eq!(race.headers().get(header::RETRY_AFTER).unwrap(), "1");

        let in_use = AppError::from(ServiceError::InUse("address is used".into())).into_response();
        assert_eq!(in_use.status(), StatusCode::CONFLICT);
        assert!(!in_use.headers().contains_key(header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn test_auth_details_hidden() {
        let body = body_of(AuthError::InvalidToken("InvalidSignature".into()).into()).await;
        assert_eq!(body, json!({ "error": "Unauthorized" }));
    }
}
