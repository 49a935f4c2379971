use std::{net::SocketAddr, time::Duration};

use clap::Parser;
use keyward::jwa;
use keyward_oidc::{AuthorityConfig, MICROSOFT_AUTHORITY};

/// Serves an API whose protected endpoints require a verified bearer token
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Opts {
    /// The tenant whose tokens are accepted
    #[arg(long, env = "TENANT_ID")]
    pub tenant_id: String,

    /// The client ID of this API, expected in each token's audience
    #[arg(long, env = "API_CLIENT_ID")]
    pub api_client_id: String,

    /// The identity provider's authority host
    #[arg(long, env = "AUTHORITY_HOST", default_value = MICROSOFT_AUTHORITY)]
    pub authority_host: String,

    /// Key set URL, may contain `{authority}` and `{tenant}` placeholders
    #[arg(long, env = "JWKS_URL")]
    pub jwks_url: Option<String>,

    /// Expected issuer, may contain `{authority}` and `{tenant}` placeholders
    #[arg(long, env = "ISSUER")]
    pub issuer: Option<String>,

    /// Locate the key set through the OpenID Connect discovery document
    #[arg(long, env = "OIDC_DISCOVERY")]
    pub oidc_discovery: bool,

    /// Comma-separated signing algorithms to accept
    #[arg(
        long,
        env = "ALLOWED_ALGORITHMS",
        value_delimiter = ',',
        default_value = "RS256"
    )]
    pub allowed_algorithms: Vec<jwa::Algorithm>,

    /// Seconds a fetched key set is trusted before refetching
    #[arg(long, env = "JWKS_FRESHNESS_SECS", default_value_t = 300)]
    pub jwks_freshness_secs: u64,

    /// Seconds of clock skew tolerated when checking `exp` and `nbf`
    #[arg(long, env = "CLOCK_SKEW_SECS", default_value_t = 120)]
    pub clock_skew_secs: u64,

    /// Seconds before a key set request is abandoned
    #[arg(long, env = "JWKS_FETCH_TIMEOUT_SECS", default_value_t = 10)]
    pub jwks_fetch_timeout_secs: u64,

    /// The address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind_addr: SocketAddr,
}

impl Opts {
    pub fn authority_config(&self) -> AuthorityConfig {
        let mut config = AuthorityConfig::new(self.tenant_id.clone(), self.api_client_id.clone())
            .with_authority_host(self.authority_host.clone())
            .with_allowed_algorithms(self.allowed_algorithms.iter().copied())
            .with_freshness(Duration::from_secs(self.jwks_freshness_secs))
            .with_leeway(Duration::from_secs(self.clock_skew_secs))
            .with_fetch_timeout(Duration::from_secs(self.jwks_fetch_timeout_secs));

        if let Some(url) = &self.jwks_url {
            config = config.with_jwks_url(url.clone());
        }

        if let Some(issuer) = &self.issuer {
            config = config.with_issuer(issuer.clone());
        }

        if self.oidc_discovery {
            config = config.with_oidc_discovery();
        }

        config
    }
}
