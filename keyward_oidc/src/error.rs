use keyward::error::{ClaimsRejected, JwkVerifyError, JwtVerifyError, UnsupportedAlgorithm};
use thiserror::Error;

use crate::{fetch::FetchError, resolver::KeyNotFound};

/// The reason a token was rejected
///
/// Neither the token nor any key material is carried by these errors, so
/// they are safe to log. [`reason()`](Self::reason) gives a stable code for
/// logs and metrics.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The token is not a well-formed JWS compact serialization, its header
    /// or payload could not be decoded, or its header lacks a key ID
    #[error("malformed token: {detail}")]
    Malformed {
        /// What was wrong
        detail: &'static str,
        /// The underlying decoding failure, if any
        #[source]
        source: Option<JwtVerifyError>,
    },

    /// No key in the provider's key set matches the token's key ID, even
    /// after refreshing the key set
    #[error(transparent)]
    KeyNotFound(#[from] KeyNotFound),

    /// The token declares an algorithm outside of the allow-list
    #[error(transparent)]
    UnsupportedAlgorithm(#[from] UnsupportedAlgorithm),

    /// The signature does not verify with the resolved key
    #[error("token signature is invalid")]
    BadSignature(#[source] JwkVerifyError),

    /// The signature is valid, but the claims are not acceptable
    #[error("token claims rejected")]
    ClaimInvalid(#[from] ClaimsRejected),

    /// The key set is unavailable and no earlier copy exists
    #[error("unable to obtain the provider's key set")]
    Fetch(#[from] FetchError),
}

impl VerificationError {
    pub(crate) fn missing_key_id() -> Self {
        Self::Malformed {
            detail: "header has no key ID",
            source: None,
        }
    }

    /// A stable, machine-readable code for this rejection
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "malformed",
            Self::KeyNotFound(_) => "key_not_found",
            Self::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            Self::BadSignature(_) => "bad_signature",
            Self::ClaimInvalid(c) => match c {
                ClaimsRejected::TokenExpired => "claim_invalid.expired",
                ClaimsRejected::TokenNotYetValid => "claim_invalid.not_yet_valid",
                ClaimsRejected::InvalidAudience => "claim_invalid.audience",
                ClaimsRejected::InvalidIssuer => "claim_invalid.issuer",
                ClaimsRejected::MissingRequiredClaim(_) => "claim_invalid.missing_claim",
            },
            Self::Fetch(f) => f.reason(),
        }
    }

    /// Whether the rejection says nothing about the token itself
    ///
    /// True only when the provider's key set could not be obtained.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

impl From<JwtVerifyError> for VerificationError {
    fn from(err: JwtVerifyError) -> Self {
        let detail = match err {
            JwtVerifyError::UnsupportedAlgorithm(e) => return Self::UnsupportedAlgorithm(e),
            JwtVerifyError::JwkVerifyError(e) => return Self::BadSignature(e),
            JwtVerifyError::ClaimsRejected(e) => return Self::ClaimInvalid(e),
            JwtVerifyError::MalformedToken(_) => "expected three dot-separated segments",
            JwtVerifyError::MalformedTokenHeader(_) => "header could not be decoded",
            JwtVerifyError::MalformedTokenPayload(_) => "payload could not be decoded",
            JwtVerifyError::MalformedTokenSignature(_) => "signature could not be decoded",
        };

        Self::Malformed {
            detail,
            source: Some(err),
        }
    }
}
