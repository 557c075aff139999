//! Bearer-token authentication for the admin surface.
//!
//! With `ADMIN_TOKEN` set, requests must carry `Authorization: Bearer
//! <token>`; the token is compared in constant time. Without a token the
//! admin surface is open and every request acts as the local admin.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::permissions::Actor;
use crate::state::AppState;

/// Actor id for token-authenticated and open-mode requests.
pub const ADMIN_ACTOR: &str = "admin";

fn unauthorized(message: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        message,
    )
        .into_response()
}

/// Whether `presented` matches `expected` without leaking the position of
/// the first difference.
pub fn token_matches(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// Install an admin [`Actor`] or reject the request.
pub async fn authenticate_admin(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(expected) = state.config().admin_token.as_deref() {
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let Some(presented) = presented else {
            return unauthorized("Missing bearer token");
        };
        if !token_matches(expected, presented.trim()) {
            debug!(path = %request.uri().path(), "invalid admin token");
            return unauthorized("Invalid token");
        }
    }

    request.extensions_mut().insert(Actor::admin(ADMIN_ACTOR));
    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cret", "s3cre"));
        assert!(!token_matches("s3cret", "S3cret"));
        assert!(!token_matches("s3cret", ""));
    }
}
