//! Retrieval of a provider's JSON Web Key Set
//!
//! [`JwksFetcher`] is the seam between the cache and the network. The
//! cache only ever asks for "the current key set"; where that comes from
//! is up to the implementation. [`HttpFetcher`] is the production
//! implementation.

use std::{error::Error as StdError, fmt, sync::Arc};

use async_trait::async_trait;
use keyward::Jwks;
use thiserror::Error;

/// An error encountered while retrieving a key set
///
/// Fetch errors are shared between every caller waiting on the same
/// fetch, so the underlying cause is reference counted.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The endpoint could not be reached, timed out, or answered with a
    /// non-success status
    #[error("JWKS endpoint could not be reached")]
    Network(#[source] Arc<dyn StdError + Send + Sync>),

    /// The endpoint answered, but not with a key set document
    #[error("JWKS endpoint returned a malformed document")]
    Malformed(#[source] Arc<dyn StdError + Send + Sync>),
}

impl FetchError {
    /// Wraps a transport-level failure
    pub fn network(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Network(Arc::from(err.into()))
    }

    /// Wraps a failure to interpret the response body
    pub fn malformed(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Malformed(Arc::from(err.into()))
    }

    /// A stable code identifying the kind of failure
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Network(_) => "fetch.network",
            Self::Malformed(_) => "fetch.malformed",
        }
    }
}

/// Where a provider publishes its signing keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwksLocation {
    /// The URL of the JWKS document itself
    Direct(String),

    /// The URL of an OpenID Connect discovery document whose `jwks_uri`
    /// names the JWKS document
    Discovery(String),
}

impl JwksLocation {
    /// The URL requested first
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Direct(url) | Self::Discovery(url) => url,
        }
    }
}

impl fmt::Display for JwksLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(url) => f.write_str(url),
            Self::Discovery(url) => write!(f, "{url} (discovery)"),
        }
    }
}

/// A source of the provider's current key set
///
/// Implementations must not cache; [`JwksCache`](crate::JwksCache) takes
/// care of that.
#[async_trait]
pub trait JwksFetcher: Send + Sync + fmt::Debug {
    /// Retrieves the key set
    async fn fetch(&self) -> Result<Jwks, FetchError>;
}

#[async_trait]
impl<F: JwksFetcher + ?Sized> JwksFetcher for Arc<F> {
    async fn fetch(&self) -> Result<Jwks, FetchError> {
        (**self).fetch().await
    }
}

#[cfg(feature = "reqwest")]
pub use self::http::HttpFetcher;

#[cfg(feature = "reqwest")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use keyward::Jwks;
    use reqwest::{Client, StatusCode};
    use serde::de::DeserializeOwned;
    use thiserror::Error;

    use super::{FetchError, JwksFetcher, JwksLocation};
    use crate::oidc::OidcConfiguration;

    #[derive(Debug, Error)]
    #[error("unexpected response status: {status}")]
    struct UnexpectedStatus {
        status: StatusCode,
    }

    /// Fetches key sets over HTTP(S)
    ///
    /// Whether HTTPS works depends on the TLS features enabled on
    /// `reqwest`; see the crate documentation.
    #[derive(Debug, Clone)]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub struct HttpFetcher {
        client: Client,
        location: JwksLocation,
    }

    impl HttpFetcher {
        /// Constructs a fetcher with its own client, applying `timeout` to
        /// every request
        ///
        /// # Errors
        ///
        /// Fails if the HTTP client cannot be initialized.
        pub fn new(location: JwksLocation, timeout: Duration) -> Result<Self, reqwest::Error> {
            let client = Client::builder()
                .user_agent(concat!("keyward_oidc/", env!("CARGO_PKG_VERSION")))
                .timeout(timeout)
                .build()?;

            Ok(Self::with_client(client, location))
        }

        /// Constructs a fetcher that shares an existing client
        #[must_use]
        pub fn with_client(client: Client, location: JwksLocation) -> Self {
            Self { client, location }
        }

        /// Where keys are fetched from
        #[must_use]
        pub fn location(&self) -> &JwksLocation {
            &self.location
        }

        async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
            let response = self.client.get(url).send().await.map_err(|err| {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "JWKS fetch failed; request error");
                FetchError::network(err)
            })?;

            let status = response.status();
            if !status.is_success() {
                tracing::warn!(
                    http.status_code = status.as_u16(),
                    "JWKS fetch failed; unexpected response status",
                );
                return Err(FetchError::network(UnexpectedStatus { status }));
            }

            let body = response.bytes().await.map_err(FetchError::network)?;

            serde_json::from_slice(&body).map_err(|err| {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "JWKS fetch failed; unexpected document");
                FetchError::malformed(err)
            })
        }
    }

    #[async_trait]
    impl JwksFetcher for HttpFetcher {
        #[tracing::instrument(skip(self), fields(jwks.url = tracing::field::Empty))]
        async fn fetch(&self) -> Result<Jwks, FetchError> {
            let span = tracing::Span::current();

            let jwks_url = match &self.location {
                JwksLocation::Direct(url) => url.clone(),
                JwksLocation::Discovery(url) => {
                    tracing::debug!(oidc.url = %url, "reading discovery document");
                    let config: OidcConfiguration = self.get_json(url).await?;
                    config.jwks_uri
                }
            };

            span.record("jwks.url", jwks_url.as_str());
            tracing::debug!("fetching JWKS");

            let jwks: Jwks = self.get_json(&jwks_url).await?;
            tracing::debug!(jwks.keys = jwks.len(), "JWKS fetched");
            Ok(jwks)
        }
    }
}
