//! Signature verification in the style of JSON Web Signature (JWS)
//!
//! The specifications for this standard can be found in [RFC7515][].
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515

use std::error::Error as StdError;

use crate::jwa;

/// A JWS verifier
pub trait Verifier {
    /// The error returned on a failure to verify
    type Error: StdError + Send + Sync + 'static;

    /// Whether the specific algorithm provided is compatible
    /// with this verifier
    fn can_verify(&self, alg: jwa::Algorithm) -> bool;

    /// Attempts to verify the data against the signature using the
    /// specified algorithm
    fn verify(&self, alg: jwa::Algorithm, data: &[u8], signature: &[u8])
        -> Result<(), Self::Error>;
}

impl<V: Verifier + ?Sized> Verifier for &'_ V {
    type Error = V::Error;

    #[inline]
    fn can_verify(&self, alg: jwa::Algorithm) -> bool {
        V::can_verify(self, alg)
    }

    #[inline]
    fn verify(
        &self,
        alg: jwa::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        V::verify(self, alg, data, signature)
    }
}

/// A JWS signer
///
/// Only used to mint tokens for tests. Verification never needs it.
#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub trait Signer {
    /// The error returned on failure to sign
    type Error: StdError + Send + Sync + 'static;

    /// Whether the specific algorithm provided is compatible
    /// with this signer
    fn can_sign(&self, alg: jwa::Algorithm) -> bool;

    /// Attempts to sign the data provided using the specified algorithm
    fn sign(&self, alg: jwa::Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error>;
}
