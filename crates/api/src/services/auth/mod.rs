//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs issued by the account service. This crate only
//! verifies them: signature, expiry, and that the subject still exists.

mod error;

pub use error::AuthError;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bullet_cloud_core::UserId;

use crate::db::UserDirectory;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID (subject)
    pub sub: Uuid,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Issued at, seconds since the epoch
    pub iat: i64,
}

/// Verifies access tokens against the shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithm", &"HS256")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl JwtVerifier {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }

    /// Validate a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Expired` for an expired token and
    /// `AuthError::InvalidToken` for anything else that fails validation.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }

    /// Extract the token from an `Authorization` header value.
    #[must_use]
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Authenticate a request from its `Authorization` header.
    ///
    /// # Errors
    ///
    /// Returns an `AuthError` if the header is missing or malformed, the
    /// token is invalid, or its subject no longer exists.
    pub async fn authenticate<U: UserDirectory>(
        &self,
        users: &U,
        header: Option<&str>,
    ) -> Result<UserId, AuthError> {
        let header = header.ok_or(AuthError::MissingToken)?;
        let token = Self::extract_from_header(header).ok_or(AuthError::MalformedHeader)?;
        let claims = self.verify(token)?;

        let user_id = UserId::new(claims.sub);
        if !users.exists(user_id).await? {
            return Err(AuthError::UnknownUser);
        }
        Ok(user_id)
    }
}
