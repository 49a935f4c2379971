//! OpenID Connect provider metadata

use serde::{Deserialize, Serialize};

/// The subset of an OpenID Connect discovery document needed to locate
/// the provider's signing keys
///
/// Served from `{issuer}/.well-known/openid-configuration`. Members other
/// than these two are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OidcConfiguration {
    /// The issuer identifier the provider places in `iss`
    pub issuer: String,

    /// Where the provider publishes its JSON Web Key Set
    pub jwks_uri: String,
}
