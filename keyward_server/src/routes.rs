use axum::{routing::get, Json, Router};
use keyward::jwt::Claims;
use keyward_axum::Authenticated;
use keyward_oidc::Authority;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Greeting {
    message: &'static str,
    user: Claims,
}

pub fn app(authority: Authority) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/secure-api", get(secure_api))
        .with_state(authority)
}

async fn health() -> Json<Health> {
    Json(Health { status: "running" })
}

async fn secure_api(Authenticated(claims): Authenticated) -> Json<Greeting> {
    tracing::debug!(sub = ?claims.sub(), "serving authenticated request");
    Json(Greeting {
        message: "You are authenticated!",
        user: claims,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use keyward::{jwa, jwt::CoreValidator, test_util::TestSigner, Jwks};
    use keyward_clock::{TestClock, UnixTime};
    use keyward_oidc::{FetchError, JwksCache, JwksFetcher};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    const NOW: UnixTime = UnixTime(1_700_000_000);
    const API: &str = "api-client-123";
    const ISSUER: &str = "https://login.provider.example/tenant-abc/v2.0";

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl JwksFetcher for Unreachable {
        async fn fetch(&self) -> Result<Jwks, FetchError> {
            Err(FetchError::network("provider unreachable"))
        }
    }

    fn authority(preloaded: bool) -> Authority {
        let cache = JwksCache::with_clock(
            Unreachable,
            Duration::from_secs(300),
            TestClock::new(NOW),
        );
        if preloaded {
            cache.set_jwks(TestSigner::primary().jwks());
        }

        let validator = CoreValidator::default()
            .add_approved_algorithm(jwa::Algorithm::RS256)
            .add_allowed_audience(API)
            .require_issuer(ISSUER);

        Authority::new(cache, validator)
    }

    async fn call(app: Router, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::get(uri);
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let response: Response = app
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };

        (status, value)
    }

    fn claims() -> Claims {
        Claims::new()
            .with_audience(API)
            .with_issuer(ISSUER)
            .with_subject("user-1")
            .with_expiration(NOW.saturating_add(Duration::from_secs(3600)))
            .with_claim("name", "Ada")
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let (status, body) = call(app(authority(false)), "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "running" }));
    }

    #[tokio::test]
    async fn secure_api_echoes_verified_claims() {
        let token = TestSigner::primary().sign(&claims());
        let (status, body) = call(app(authority(true)), "/secure-api", Some(token.as_str())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "You are authenticated!");
        assert_eq!(body["user"]["sub"], "user-1");
        assert_eq!(body["user"]["aud"], API);
        assert_eq!(body["user"]["name"], "Ada");
    }

    #[tokio::test]
    async fn secure_api_requires_a_token() {
        let (status, body) = call(app(authority(true)), "/secure-api", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn secure_api_rejects_foreign_signer() {
        let token = TestSigner::rogue().with_key_id("K1").sign(&claims());
        let (status, _) = call(app(authority(true)), "/secure-api", Some(token.as_str())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn secure_api_rejects_when_keys_are_unavailable() {
        let token = TestSigner::primary().sign(&claims());
        let (status, _) = call(app(authority(false)), "/secure-api", Some(token.as_str())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
