//! Static token check for the webhook routes.
//!
//! The provider sends the configured token in the `Authorization` header,
//! either bare or as `Bearer <token>`. Failures answer 400 to match what
//! provider webhook targets expect.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{handlers::error_response, server::AppState};

/// Errors that can occur during token authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// The Authorization header is missing from the request.
    MissingHeader,
    /// The presented token does not match.
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            Self::MissingHeader => "Missing Authorization header",
            Self::InvalidToken => "Invalid authorization token",
        };

        error_response(StatusCode::BAD_REQUEST, "unauthorized", message)
    }
}

/// Extracts the presented token, stripping an optional `Bearer ` prefix.
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s))
}

/// Checks the presented token against `expected`.
fn check_token(headers: &HeaderMap, expected: &str) -> Result<(), AuthError> {
    let presented = extract_token(headers).ok_or(AuthError::MissingHeader)?;
    if presented == expected {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}

/// Axum middleware enforcing the configured webhook token.
///
/// Passes every request through when no token is configured.
pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(expected) = state.auth_token.as_deref() {
        if let Err(e) = check_token(req.headers(), expected) {
            warn!(reason = ?e, "Rejected unauthenticated webhook");
            return Err(e);
        }
    }

    Ok(next.run(req).await)
}
