//! Key lookup by identifier

use keyward::{
    jwk::{KeyId, KeyIdRef},
    Jwk,
};
use thiserror::Error;

use crate::cache::JwksDocument;

/// No key in the key set carries the requested identifier
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("no key found with key ID '{kid}'")]
pub struct KeyNotFound {
    kid: KeyId,
}

impl KeyNotFound {
    pub(crate) fn new(kid: KeyId) -> Self {
        Self { kid }
    }

    /// The key ID that was looked up
    #[must_use]
    pub fn kid(&self) -> &KeyIdRef {
        &self.kid
    }
}

/// Finds the first key in `document` whose `kid` equals `kid` exactly
///
/// # Errors
///
/// Returns [`KeyNotFound`] if there is no such key. Refreshing the key set
/// is left to the caller.
pub fn resolve<'a>(kid: &KeyIdRef, document: &'a JwksDocument) -> Result<&'a Jwk, KeyNotFound> {
    document
        .jwks()
        .get_key_by_id(kid)
        .ok_or_else(|| KeyNotFound::new(kid.to_owned()))
}
