//! Bearer token verification against an OpenID Connect provider
//!
//! An [`Authority`] answers one question: was this token issued by the
//! configured provider, for this API, and is it still valid? It fetches the
//! provider's JSON Web Key Set on demand, keeps it in a [`JwksCache`], and
//! checks the token's signature and claims with [`keyward`].
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use keyward::JwtRef;
//! use keyward_oidc::{Authority, AuthorityConfig};
//!
//! let config = AuthorityConfig::new("tenant-abc", "api-client-123");
//! let authority = Authority::from_config(&config)?;
//!
//! let token = JwtRef::from_str("eyJhbGciOi...");
//! match authority.verify(token).await {
//!     Ok(claims) => println!("hello, {:?}", claims.sub()),
//!     Err(err) => println!("rejected: {}", err.reason()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! The `reqwest` feature provides [`HttpFetcher`] and
//! [`Authority::from_config`]. This crate does not automatically enable
//! TLS support in `reqwest` itself. If your application already uses
//! `reqwest` with some TLS settings (native/OpenSSL/rustls), then this
//! crate will use those settings automatically. Otherwise, enable the
//! `default-tls` or `rustls-tls` feature to be able to call out to an
//! HTTPS endpoint.
//!
//! The `tokio` feature provides [`JwksCache::spawn_refresh`].

#![cfg_attr(docsrs, feature(doc_cfg))]
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

mod authority;
mod cache;
mod config;
mod error;
pub mod fetch;
pub mod oidc;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use authority::Authority;
pub use cache::{JwksCache, JwksDocument, DEFAULT_FRESHNESS};
pub use config::{
    AuthorityConfig, ConfigError, DEFAULT_DISCOVERY_URL_TEMPLATE, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_ISSUER_TEMPLATE, DEFAULT_JWKS_URL_TEMPLATE, MICROSOFT_AUTHORITY,
};
pub use error::VerificationError;
#[cfg(feature = "reqwest")]
pub use fetch::HttpFetcher;
pub use fetch::{FetchError, JwksFetcher, JwksLocation};
pub use resolver::KeyNotFound;
