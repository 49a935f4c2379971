//! Elliptic curve public keys and the ES* signature algorithms

use ring::signature::{self, EcdsaVerificationAlgorithm, UnparsedPublicKey};
use serde::{Deserialize, Serialize};

use crate::{b64::Base64Url, error, jwa, jws};

/// A named elliptic curve
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Curve {
    /// NIST P-256
    #[serde(rename = "P-256")]
    P256,

    /// NIST P-384
    #[serde(rename = "P-384")]
    P384,
}

impl Curve {
    /// Size of a single coordinate in bytes
    #[must_use]
    pub const fn coordinate_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
        }
    }

    /// The signature algorithm that pairs with this curve
    #[must_use]
    pub const fn algorithm(self) -> jwa::Algorithm {
        match self {
            Self::P256 => jwa::Algorithm::ES256,
            Self::P384 => jwa::Algorithm::ES384,
        }
    }

    fn verification_alg(self) -> &'static EcdsaVerificationAlgorithm {
        match self {
            Self::P256 => &signature::ECDSA_P256_SHA256_FIXED,
            Self::P384 => &signature::ECDSA_P384_SHA384_FIXED,
        }
    }
}

/// An elliptic curve public key
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EllipticCurveDto")]
pub struct EllipticCurve {
    #[serde(rename = "crv")]
    curve: Curve,
    x: Base64Url,
    y: Base64Url,
}

impl EllipticCurve {
    /// Constructs a public key from its affine coordinates
    ///
    /// # Errors
    ///
    /// Rejects coordinates whose length does not match the curve.
    pub fn from_coordinates(
        curve: Curve,
        x: impl Into<Base64Url>,
        y: impl Into<Base64Url>,
    ) -> Result<Self, error::KeyRejected> {
        let x = x.into();
        let y = y.into();
        let len = curve.coordinate_len();

        if x.len() != len || y.len() != len {
            return Err(error::key_rejected(format!(
                "coordinates for {curve:?} must be {len} bytes"
            )));
        }

        Ok(Self { curve, x, y })
    }

    /// Constructs a public key from an uncompressed SEC1 point
    ///
    /// # Errors
    ///
    /// Rejects anything other than `0x04 || x || y` of the right length.
    pub fn from_uncompressed_point(curve: Curve, point: &[u8]) -> Result<Self, error::KeyRejected> {
        let len = curve.coordinate_len();
        match point.split_first() {
            Some((0x04, rest)) if rest.len() == 2 * len => {
                let (x, y) = rest.split_at(len);
                Self::from_coordinates(curve, x, y)
            }
            _ => Err(error::key_rejected("expected an uncompressed curve point")),
        }
    }

    /// The curve this key lives on
    #[must_use]
    pub fn curve(&self) -> Curve {
        self.curve
    }

    fn uncompressed_point(&self) -> Vec<u8> {
        let mut point = Vec::with_capacity(1 + self.x.len() + self.y.len());
        point.push(0x04);
        point.extend_from_slice(self.x.as_slice());
        point.extend_from_slice(self.y.as_slice());
        point
    }
}

impl jws::Verifier for EllipticCurve {
    type Error = error::JwkVerifyError;

    fn can_verify(&self, alg: jwa::Algorithm) -> bool {
        self.curve.algorithm() == alg
    }

    fn verify(
        &self,
        alg: jwa::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        if !self.can_verify(alg) {
            return Err(error::incompatible_algorithm(alg).into());
        }

        UnparsedPublicKey::new(self.curve.verification_alg(), self.uncompressed_point())
            .verify(data, signature)
            .map_err(|_| error::signature_mismatch().into())
    }
}

impl TryFrom<EllipticCurveDto> for EllipticCurve {
    type Error = error::KeyRejected;

    fn try_from(dto: EllipticCurveDto) -> Result<Self, Self::Error> {
        Self::from_coordinates(dto.curve, dto.x, dto.y)
    }
}

#[derive(Deserialize)]
struct EllipticCurveDto {
    #[serde(rename = "crv")]
    curve: Curve,
    x: Base64Url,
    y: Base64Url,
}
