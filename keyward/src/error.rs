//! Why a key, token, or claim set was refused
//!
//! The leaf errors are opaque structs. They are only built inside this
//! crate and carry just enough to describe the refusal without repeating
//! key material or token contents.

#![allow(missing_copy_implementations)]

use std::error::Error as StdError;

use thiserror::Error;

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// A key was asked to verify a signature made with another algorithm
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("key cannot verify '{alg}' signatures")]
pub struct IncompatibleAlgorithm {
    alg: crate::jwa::Algorithm,
}

#[inline]
pub(crate) fn incompatible_algorithm(alg: crate::jwa::Algorithm) -> IncompatibleAlgorithm {
    IncompatibleAlgorithm { alg }
}

/// The token's `alg` header names something this verifier refuses
///
/// Refused names include `none`, the HMAC family, anything unrecognized,
/// and recognized algorithms left off the validator's allow-list.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("'{alg}' is not an approved signing algorithm")]
pub struct UnsupportedAlgorithm {
    alg: String,
}

impl UnsupportedAlgorithm {
    /// The `alg` value exactly as the token declared it
    #[must_use]
    pub fn declared(&self) -> &str {
        &self.alg
    }
}

#[inline]
pub(crate) fn unsupported_algorithm(alg: impl Into<String>) -> UnsupportedAlgorithm {
    UnsupportedAlgorithm { alg: alg.into() }
}

/// The key's `use` parameter reserves it for something other than signing
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("key is not published for signature verification")]
pub struct JwkUsageMismatch {
    _p: (),
}

pub(crate) const fn jwk_usage_mismatch() -> JwkUsageMismatch {
    JwkUsageMismatch { _p: () }
}

/// The token is not three dot-separated segments
#[derive(Clone, Copy, Debug, Error)]
#[error("token is not in compact serialization")]
pub struct MalformedJwt {
    _p: (),
}

pub(crate) fn malformed_jwt() -> MalformedJwt {
    MalformedJwt { _p: () }
}

/// The first segment does not decode to a JSON header
#[derive(Debug, Error)]
#[error("token header could not be decoded")]
pub struct MalformedJwtHeader {
    #[from]
    source: BoxedSource,
}

pub(crate) fn malformed_jwt_header(source: impl Into<BoxedSource>) -> MalformedJwtHeader {
    MalformedJwtHeader {
        source: source.into(),
    }
}

/// The second segment does not decode to the expected claims
#[derive(Debug, Error)]
#[error("token payload could not be decoded")]
pub struct MalformedJwtPayload {
    #[from]
    source: BoxedSource,
}

pub(crate) fn malformed_jwt_payload(source: impl Into<BoxedSource>) -> MalformedJwtPayload {
    MalformedJwtPayload {
        source: source.into(),
    }
}

/// The third segment is not base64url
#[derive(Debug, Error)]
#[error("token signature could not be decoded")]
pub struct MalformedJwtSignature {
    #[from]
    source: BoxedSource,
}

pub(crate) fn malformed_jwt_signature(source: impl Into<BoxedSource>) -> MalformedJwtSignature {
    MalformedJwtSignature {
        source: source.into(),
    }
}

/// The signature does not verify under the selected key
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("signature does not verify")]
pub struct SignatureMismatch {
    _p: (),
}

pub(crate) const fn signature_mismatch() -> SignatureMismatch {
    SignatureMismatch { _p: () }
}

/// Published key parameters do not form a usable public key
#[derive(Debug, Error)]
#[error("unusable key parameters")]
pub struct KeyRejected {
    #[from]
    source: BoxedSource,
}

pub(crate) fn key_rejected(source: impl Into<BoxedSource>) -> KeyRejected {
    KeyRejected {
        source: source.into(),
    }
}

/// A published key refused to vouch for a signature
#[derive(Debug, Error)]
pub enum JwkVerifyError {
    /// Key type or declared `alg` does not fit the token's algorithm
    #[error(transparent)]
    IncompatibleAlgorithm(#[from] IncompatibleAlgorithm),

    /// Key is reserved for encryption
    #[error(transparent)]
    JwkUsageMismatch(#[from] JwkUsageMismatch),

    /// Key fits, signature does not
    #[error(transparent)]
    SignatureMismatch(#[from] SignatureMismatch),
}

impl JwkVerifyError {
    /// Whether the key could not be used with the token's algorithm
    #[must_use]
    pub fn is_incompatible_alg(&self) -> bool {
        matches!(self, Self::IncompatibleAlgorithm(_))
    }

    /// Whether the key is not meant for signatures
    #[must_use]
    pub fn is_usage_mismatch(&self) -> bool {
        matches!(self, Self::JwkUsageMismatch(_))
    }

    /// Whether the signature itself was wrong
    #[must_use]
    pub fn is_signature_mismatch(&self) -> bool {
        matches!(self, Self::SignatureMismatch(_))
    }
}

/// A token failed one of the checks between parsing and accepted claims
#[derive(Debug, Error)]
pub enum JwtVerifyError {
    /// `alg` is refused
    #[error(transparent)]
    UnsupportedAlgorithm(#[from] UnsupportedAlgorithm),

    /// The selected key did not verify the signature
    #[error("signature check failed")]
    JwkVerifyError(#[from] JwkVerifyError),

    /// Wrong number of segments
    #[error(transparent)]
    MalformedToken(#[from] MalformedJwt),

    /// Undecodable header
    #[error(transparent)]
    MalformedTokenHeader(#[from] MalformedJwtHeader),

    /// Undecodable payload
    #[error(transparent)]
    MalformedTokenPayload(#[from] MalformedJwtPayload),

    /// Undecodable signature
    #[error(transparent)]
    MalformedTokenSignature(#[from] MalformedJwtSignature),

    /// Signature verified, claims did not pass
    #[error("claims check failed")]
    ClaimsRejected(#[from] ClaimsRejected),
}

impl JwtVerifyError {
    /// Whether the token could not be parsed at all
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken(_)
                | Self::MalformedTokenHeader(_)
                | Self::MalformedTokenPayload(_)
                | Self::MalformedTokenSignature(_)
        )
    }
}

/// The first claim check a verified token failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum ClaimsRejected {
    /// `aud` is absent or names none of the allowed audiences
    #[error("audience not accepted")]
    InvalidAudience,

    /// `iss` is absent or differs from the required issuer
    #[error("issuer not accepted")]
    InvalidIssuer,

    /// `exp` plus leeway is in the past
    #[error("token has expired")]
    TokenExpired,

    /// `nbf` minus leeway is in the future
    #[error("token is not valid yet")]
    TokenNotYetValid,

    /// A claim the validator always needs is absent
    #[error("'{_0}' claim is missing")]
    MissingRequiredClaim(&'static str),
}
