use serde::{Deserialize, Serialize};

/// The intended use of a JWK, as given by its `use` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[must_use]
pub enum Usage {
    /// The key is meant for signing and verification
    #[serde(rename = "sig")]
    Signing,

    /// The key is meant for encryption
    #[serde(rename = "enc")]
    Encryption,
}
