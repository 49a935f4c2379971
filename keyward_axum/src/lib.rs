//! Axum extractors that require a verified bearer token
//!
//! Add an [`Authority`] to your router state and take [`Authenticated`] as
//! a handler argument. Requests without a valid token never reach the
//! handler; they are answered with `401 Unauthorized` and a
//! `www-authenticate` challenge instead.
//!
//! ```no_run
//! use axum::{routing::get, Json, Router};
//! use keyward::jwt::Claims;
//! use keyward_axum::Authenticated;
//! use keyward_oidc::{Authority, AuthorityConfig};
//!
//! async fn whoami(Authenticated(claims): Authenticated) -> Json<Claims> {
//!     Json(claims)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuthorityConfig::new("tenant-abc", "api-client-123");
//!     let authority = Authority::from_config(&config)?;
//!
//!     let router = Router::new()
//!         .route("/whoami", get(whoami))
//!         .with_state(authority);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::{error::Error, fmt};

use async_trait::async_trait;
use axum_core::{
    extract::{FromRef, FromRequestParts},
    response::{IntoResponse, Response},
};
use http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode};
use keyward::{
    jwt::{Claims, CoreClaims},
    JwtRef,
};
use keyward_oidc::{Authority, VerificationError};
use serde::de::DeserializeOwned;

/// Extracts the token from an `Authorization: Bearer <token>` header
///
/// The scheme is matched case-insensitively and surrounding whitespace is
/// ignored. Returns `None` when the header is absent, uses another scheme,
/// is not valid UTF-8, or carries an empty token.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&JwtRef> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    if auth.len() <= 7 || !auth[..7].eq_ignore_ascii_case("bearer ") {
        return None;
    }

    let token = auth[7..].trim();
    if token.is_empty() {
        return None;
    }

    Some(JwtRef::from_str(token))
}

/// The claims of a verified bearer token
///
/// Extracting this type verifies the request's bearer token with the
/// [`Authority`] held in the router state.
#[derive(Debug, Clone)]
pub struct Authenticated<C = Claims>(pub C);

impl<C> Authenticated<C> {
    /// Unwraps the claims
    pub fn into_inner(self) -> C {
        self.0
    }
}

impl<C> std::ops::Deref for Authenticated<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.0
    }
}

#[async_trait]
impl<S, C> FromRequestParts<S> for Authenticated<C>
where
    Authority: FromRef<S>,
    S: Send + Sync,
    C: DeserializeOwned + CoreClaims + Send + 'static,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            tracing::debug!("request carried no bearer token");
            return Err(AuthRejection::MissingToken);
        };

        let authority = Authority::from_ref(state);
        let claims = authority
            .verify_as::<C>(token)
            .await
            .map_err(AuthRejection::Invalid)?;

        Ok(Self(claims))
    }
}

/// The request could not be authenticated
///
/// Converts into a `401 Unauthorized` response. The reason for rejecting a
/// token is deliberately left out of the response.
#[derive(Debug)]
pub enum AuthRejection {
    /// No bearer token was presented
    MissingToken,

    /// The bearer token was rejected
    Invalid(VerificationError),
}

impl AuthRejection {
    /// The stable reason code for logs and metrics
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::Invalid(err) => err.reason(),
        }
    }
}

impl fmt::Display for AuthRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingToken => f.write_str("bearer token missing"),
            Self::Invalid(_) => f.write_str("bearer token invalid"),
        }
    }
}

impl Error for AuthRejection {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MissingToken => None,
            Self::Invalid(err) => Some(err),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let challenge = match self {
            Self::MissingToken => HeaderValue::from_static("Bearer"),
            Self::Invalid(_) => HeaderValue::from_static(r#"Bearer error="invalid_token""#),
        };

        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, challenge)],
        )
            .into_response()
    }
}
