//! Authentication extractor.
//!
//! Every `/api` route that touches user data takes an [`AuthUser`]. The
//! extractor verifies the bearer token and checks that its subject still
//! exists; handlers never see unauthenticated requests.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::Span;

use bullet_cloud_core::UserId;

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(AuthUser(user_id): AuthUser) -> impl IntoResponse {
///     format!("Hello, {user_id}!")
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let users = UserRepository::new(state.pool());
        let user_id = state.jwt().authenticate(&users, header).await?;

        Span::current().record("user_id", tracing::field::display(user_id));
        set_sentry_user(&user_id);

        Ok(Self(user_id))
    }
}
