//! Request ID middleware for request tracing and correlation.
//!
//! Clients and proxies may send their own `x-request-id`; anything missing,
//! non-ASCII or longer than [`MAX_REQUEST_ID_LENGTH`] is replaced with a
//! fresh UUID v4. The ID is recorded on the `http_request` span, tagged on
//! the Sentry scope and echoed back in the response headers.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied request ID that is kept as is.
pub const MAX_REQUEST_ID_LENGTH: usize = 128;

fn incoming_request_id(request: &Request) -> Option<String> {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LENGTH)
        .map(String::from)
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = incoming_request_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(id: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/health");
        if let Some(id) = id {
            builder = builder.header(REQUEST_ID_HEADER, id);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_keeps_client_request_id() {
        assert_eq!(
            incoming_request_id(&request_with(Some("abc-123"))).as_deref(),
            Some("abc-123")
        );
    }

    #[test]
    fn test_replaces_missing_or_oversized_id() {
        assert_eq!(incoming_request_id(&request_with(None)), None);
        assert_eq!(incoming_request_id(&request_with(Some("  "))), None);
        let long = "r".repeat(MAX_REQUEST_ID_LENGTH + 1);
        assert_eq!(incoming_request_id(&request_with(Some(&long))), None);
    }
}
