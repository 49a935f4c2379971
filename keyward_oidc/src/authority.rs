use std::sync::Arc;

use keyward::{
    jwt::{self, Claims, CoreClaims},
    JwtRef,
};
use serde::de::DeserializeOwned;

use crate::{cache::JwksCache, error::VerificationError, resolver};

#[derive(Debug)]
struct Inner {
    cache: JwksCache,
    validator: jwt::CoreValidator,
}

/// Verifies bearer tokens against a provider's published key set
///
/// An authority pairs a [`JwksCache`] with the claims a token must satisfy.
/// Clones share the same cache, so one authority can be handed to every
/// request handler.
#[derive(Debug, Clone)]
#[must_use]
pub struct Authority {
    inner: Arc<Inner>,
}

impl Authority {
    /// Constructs an authority over an existing cache
    ///
    /// Time is read from the cache's clock.
    pub fn new(cache: JwksCache, validator: jwt::CoreValidator) -> Self {
        Self {
            inner: Arc::new(Inner { cache, validator }),
        }
    }

    /// Constructs an authority that fetches keys over HTTP as configured
    ///
    /// Nothing is fetched until the first token is verified.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is unusable or the HTTP client cannot be
    /// constructed.
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub fn from_config(config: &crate::AuthorityConfig) -> Result<Self, crate::ConfigError> {
        config.validate()?;

        let location = config.jwks_location();
        let fetcher = crate::HttpFetcher::new(location.clone(), config.fetch_timeout())?;
        let cache = JwksCache::new(fetcher, config.freshness());
        let validator = config.validator();

        tracing::info!(
            jwks.location = %location,
            jwt.iss = %config.issuer(),
            jwt.aud = %config.audience(),
            "authority configured",
        );

        Ok(Self::new(cache, validator))
    }

    /// The key set cache
    pub fn cache(&self) -> &JwksCache {
        &self.inner.cache
    }

    /// The claims a token must satisfy
    pub fn validator(&self) -> &jwt::CoreValidator {
        &self.inner.validator
    }

    /// Verifies a token and returns its claims
    ///
    /// # Errors
    ///
    /// Returns the reason the token was rejected.
    pub async fn verify(&self, token: &JwtRef) -> Result<Claims, VerificationError> {
        self.verify_as(token).await
    }

    /// Verifies a token and deserializes its claims into `C`
    ///
    /// Each outcome is logged at `debug` along with the token's key ID and
    /// algorithm. The token itself is never logged.
    ///
    /// # Errors
    ///
    /// Returns the reason the token was rejected.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(jwt.kid = tracing::field::Empty, jwt.alg = tracing::field::Empty),
    )]
    pub async fn verify_as<C>(&self, token: &JwtRef) -> Result<C, VerificationError>
    where
        C: DeserializeOwned + CoreClaims,
    {
        let outcome = self.check(token).await;

        match &outcome {
            Ok(_) => tracing::debug!(reason = "accepted", "token accepted"),
            Err(err) => {
                let error: &dyn std::error::Error = err;
                tracing::debug!(reason = err.reason(), error, "token rejected");
            }
        }

        outcome
    }

    async fn check<C>(&self, token: &JwtRef) -> Result<C, VerificationError>
    where
        C: DeserializeOwned + CoreClaims,
    {
        let span = tracing::Span::current();

        let decomposed = token.decompose()?;
        let header = decomposed.untrusted_header();
        span.record("jwt.alg", header.alg());

        // The allow-list is enforced before anything else in the header is
        // trusted, including whether it names a key.
        self.inner.validator.approve_algorithm(header.alg())?;

        let kid = header
            .kid()
            .ok_or_else(VerificationError::missing_key_id)?
            .to_owned();
        span.record("jwt.kid", kid.as_str());

        let mut document = self.inner.cache.get().await?;
        if resolver::resolve(&kid, &document).is_err() {
            tracing::debug!("key ID not in key set; refetching");
            self.inner.cache.invalidate();
            document = self.inner.cache.get().await?;
        }

        let key = resolver::resolve(&kid, &document)?;

        let validated: jwt::Validated<C> =
            decomposed.verify_with_clock(key, &self.inner.validator, self.inner.cache.clock())?;

        Ok(validated.into_claims())
    }
}
