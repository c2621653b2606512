//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, one transaction per request)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (add unique ID to each request)
//! 4. Timeout (408 after `API_REQUEST_TIMEOUT_SECS`)
//!
//! Authentication is not a layer: handlers opt in with the [`AuthUser`]
//! extractor.

pub mod auth;
pub mod request_id;

pub use auth::AuthUser;
pub use request_id::request_id_middleware;
