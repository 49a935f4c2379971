//! Provider configuration
//!
//! URLs are built from templates in which `{authority}` and `{tenant}` are
//! replaced by the authority host and tenant identifier. A template with
//! neither placeholder is used verbatim, which is how an explicit URL or
//! issuer is configured.

use std::time::Duration;

use keyward::{
    jwa,
    jwt::{self, Audience, Issuer},
};
use thiserror::Error;

use crate::{cache::DEFAULT_FRESHNESS, fetch::JwksLocation};

/// The Microsoft identity platform authority host
pub const MICROSOFT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Default location of the key set relative to the authority and tenant
pub const DEFAULT_JWKS_URL_TEMPLATE: &str = "{authority}/{tenant}/discovery/v2.0/keys";

/// Default issuer relative to the authority and tenant
pub const DEFAULT_ISSUER_TEMPLATE: &str = "{authority}/{tenant}/v2.0";

/// Default OpenID Connect discovery document relative to the authority and
/// tenant
pub const DEFAULT_DISCOVERY_URL_TEMPLATE: &str =
    "{authority}/{tenant}/v2.0/.well-known/openid-configuration";

/// Default timeout for a single key set request
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The configuration is unusable
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No tenant identifier was given
    #[error("tenant identifier must not be empty")]
    EmptyTenant,

    /// No expected audience was given
    #[error("expected audience must not be empty")]
    EmptyAudience,

    /// The algorithm allow-list is empty, so no token could ever verify
    #[error("at least one signing algorithm must be allowed")]
    NoAllowedAlgorithms,

    /// The HTTP client could not be constructed
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    #[error("unable to construct HTTP client")]
    HttpClient(#[from] reqwest::Error),
}

/// Everything needed to verify tokens issued to one API by one tenant
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct AuthorityConfig {
    tenant: String,
    audience: Audience,
    authority_host: String,
    jwks_url_template: String,
    issuer_template: String,
    discovery_url_template: Option<String>,
    allowed_algorithms: Vec<jwa::Algorithm>,
    freshness: Duration,
    leeway: Duration,
    fetch_timeout: Duration,
}

impl AuthorityConfig {
    /// Configuration for `tenant` with tokens issued to `audience`, using
    /// the Microsoft identity platform defaults
    pub fn new(tenant: impl Into<String>, audience: impl Into<Audience>) -> Self {
        Self {
            tenant: tenant.into(),
            audience: audience.into(),
            authority_host: MICROSOFT_AUTHORITY.to_owned(),
            jwks_url_template: DEFAULT_JWKS_URL_TEMPLATE.to_owned(),
            issuer_template: DEFAULT_ISSUER_TEMPLATE.to_owned(),
            discovery_url_template: None,
            allowed_algorithms: vec![jwa::Algorithm::RS256],
            freshness: DEFAULT_FRESHNESS,
            leeway: jwt::DEFAULT_LEEWAY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Replaces the authority host
    pub fn with_authority_host(self, host: impl Into<String>) -> Self {
        Self {
            authority_host: host.into(),
            ..self
        }
    }

    /// Replaces the key set URL template
    pub fn with_jwks_url(self, template: impl Into<String>) -> Self {
        Self {
            jwks_url_template: template.into(),
            ..self
        }
    }

    /// Replaces the issuer template
    pub fn with_issuer(self, template: impl Into<String>) -> Self {
        Self {
            issuer_template: template.into(),
            ..self
        }
    }

    /// Locates the key set through the default OpenID Connect discovery
    /// document instead of the key set URL
    pub fn with_oidc_discovery(self) -> Self {
        self.with_discovery_url(DEFAULT_DISCOVERY_URL_TEMPLATE)
    }

    /// Locates the key set through the given discovery document template
    pub fn with_discovery_url(self, template: impl Into<String>) -> Self {
        Self {
            discovery_url_template: Some(template.into()),
            ..self
        }
    }

    /// Replaces the algorithm allow-list
    pub fn with_allowed_algorithms<I>(self, algorithms: I) -> Self
    where
        I: IntoIterator<Item = jwa::Algorithm>,
    {
        let mut allowed: Vec<jwa::Algorithm> = Vec::new();
        for alg in algorithms {
            if !allowed.contains(&alg) {
                allowed.push(alg);
            }
        }

        Self {
            allowed_algorithms: allowed,
            ..self
        }
    }

    /// Sets how long a fetched key set is trusted before refetching
    pub fn with_freshness(self, freshness: Duration) -> Self {
        Self { freshness, ..self }
    }

    /// Sets the clock skew tolerated when checking `exp` and `nbf`
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// Sets the timeout applied to each key set request
    pub fn with_fetch_timeout(self, fetch_timeout: Duration) -> Self {
        Self {
            fetch_timeout,
            ..self
        }
    }

    /// The tenant identifier
    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// The expected audience
    #[must_use]
    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    /// The algorithm allow-list
    #[must_use]
    pub fn allowed_algorithms(&self) -> &[jwa::Algorithm] {
        &self.allowed_algorithms
    }

    /// The freshness window
    #[must_use]
    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// The tolerated clock skew
    #[must_use]
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// The per-request fetch timeout
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// The expected issuer
    #[must_use]
    pub fn issuer(&self) -> Issuer {
        Issuer::new(self.expand(&self.issuer_template))
    }

    /// Where the key set is fetched from
    #[must_use]
    pub fn jwks_location(&self) -> JwksLocation {
        match &self.discovery_url_template {
            Some(template) => JwksLocation::Discovery(self.expand(template)),
            None => JwksLocation::Direct(self.expand(&self.jwks_url_template)),
        }
    }

    /// A claims validator enforcing this configuration
    pub fn validator(&self) -> jwt::CoreValidator {
        jwt::CoreValidator::default()
            .extend_approved_algorithms(self.allowed_algorithms.iter().copied())
            .add_allowed_audience(self.audience.clone())
            .require_issuer(self.issuer())
            .with_leeway(self.leeway)
    }

    /// Checks that the configuration can verify anything at all
    ///
    /// # Errors
    ///
    /// Rejects an empty tenant, an empty audience, or an empty algorithm
    /// allow-list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant.trim().is_empty() {
            return Err(ConfigError::EmptyTenant);
        }

        if self.audience.as_str().trim().is_empty() {
            return Err(ConfigError::EmptyAudience);
        }

        if self.allowed_algorithms.is_empty() {
            return Err(ConfigError::NoAllowedAlgorithms);
        }

        Ok(())
    }

    fn expand(&self, template: &str) -> String {
        template
            .replace("{authority}", self.authority_host.trim_end_matches('/'))
            .replace("{tenant}", &self.tenant)
    }
}
