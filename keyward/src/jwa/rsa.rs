//! RSA public keys and the RS*/PS* signature algorithms

use ring::signature::{self, RsaParameters, RsaPublicKeyComponents};
use serde::{Deserialize, Serialize};

use crate::{b64::Base64Url, error, jwa, jws};

const MIN_MODULUS_LEN: usize = 256;
const MAX_MODULUS_LEN: usize = 1024;

/// An RSA public key
///
/// The modulus must be between 2048 and 8192 bits long. Leading zero
/// bytes in either component are stripped on construction.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RsaDto")]
pub struct Rsa {
    /// The public modulus
    #[serde(rename = "n")]
    modulus: Base64Url,

    /// The public exponent
    #[serde(rename = "e")]
    exponent: Base64Url,
}

impl Rsa {
    /// Constructs a public key from the modulus and exponent
    ///
    /// # Errors
    ///
    /// Rejects moduli outside of the 2048 to 8192 bit range and empty
    /// exponents.
    pub fn from_components(
        modulus: impl Into<Base64Url>,
        exponent: impl Into<Base64Url>,
    ) -> Result<Self, error::KeyRejected> {
        let modulus = strip_leading_zeros(modulus.into());
        let exponent = strip_leading_zeros(exponent.into());

        if modulus.len() < MIN_MODULUS_LEN {
            return Err(error::key_rejected("RSA modulus must be at least 2048 bits"));
        }

        if modulus.len() > MAX_MODULUS_LEN {
            return Err(error::key_rejected("RSA modulus must be at most 8192 bits"));
        }

        if exponent.is_empty() {
            return Err(error::key_rejected("RSA exponent must be non-zero"));
        }

        Ok(Self { modulus, exponent })
    }

    /// The public modulus
    #[must_use]
    pub fn modulus(&self) -> &Base64Url {
        &self.modulus
    }

    /// The public exponent
    #[must_use]
    pub fn exponent(&self) -> &Base64Url {
        &self.exponent
    }
}

fn strip_leading_zeros(value: Base64Url) -> Base64Url {
    match value.as_slice().iter().position(|&b| b != 0) {
        Some(0) => value,
        Some(idx) => Base64Url::from_raw(&value.as_slice()[idx..]),
        None => Base64Url::default(),
    }
}

fn verification_params(alg: jwa::Algorithm) -> Option<&'static RsaParameters> {
    #[allow(unreachable_patterns)]
    match alg {
        jwa::Algorithm::RS256 => Some(&signature::RSA_PKCS1_2048_8192_SHA256),
        jwa::Algorithm::RS384 => Some(&signature::RSA_PKCS1_2048_8192_SHA384),
        jwa::Algorithm::RS512 => Some(&signature::RSA_PKCS1_2048_8192_SHA512),
        jwa::Algorithm::PS256 => Some(&signature::RSA_PSS_2048_8192_SHA256),
        jwa::Algorithm::PS384 => Some(&signature::RSA_PSS_2048_8192_SHA384),
        jwa::Algorithm::PS512 => Some(&signature::RSA_PSS_2048_8192_SHA512),
        _ => None,
    }
}

impl jws::Verifier for Rsa {
    type Error = error::JwkVerifyError;

    fn can_verify(&self, alg: jwa::Algorithm) -> bool {
        verification_params(alg).is_some()
    }

    fn verify(
        &self,
        alg: jwa::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        let params = verification_params(alg).ok_or_else(|| error::incompatible_algorithm(alg))?;

        let pk = RsaPublicKeyComponents {
            n: self.modulus.as_slice(),
            e: self.exponent.as_slice(),
        };

        pk.verify(params, data, signature)
            .map_err(|_| error::signature_mismatch().into())
    }
}

impl TryFrom<RsaDto> for Rsa {
    type Error = error::KeyRejected;

    fn try_from(dto: RsaDto) -> Result<Self, Self::Error> {
        Self::from_components(dto.modulus, dto.exponent)
    }
}

#[derive(Deserialize)]
struct RsaDto {
    #[serde(rename = "n")]
    modulus: Base64Url,

    #[serde(rename = "e")]
    exponent: Base64Url,
}

#[cfg(all(test, feature = "ec"))]
mod tests {
    use color_eyre::Result;

    use super::*;
    use crate::{jws::Verifier, test_util::TestSigner};

    const PRIMARY_JWK: &str = include_str!("../../data/rsa/primary.jwk.json");

    #[test]
    fn deserializes_from_jwk_members() -> Result<()> {
        let key: Rsa = serde_json::from_str(PRIMARY_JWK)?;
        assert_eq!(key.modulus().len(), 256);
        assert_eq!(key.exponent().as_slice(), &[1, 0, 1]);
        Ok(())
    }

    #[test]
    fn leading_zero_bytes_are_stripped() -> Result<()> {
        let key: Rsa = serde_json::from_str(PRIMARY_JWK)?;
        let mut padded = vec![0u8, 0u8];
        padded.extend_from_slice(key.modulus().as_slice());

        let rebuilt = Rsa::from_components(padded, vec![0u8, 1, 0, 1])?;
        assert_eq!(rebuilt, key);
        Ok(())
    }

    #[test]
    fn short_modulus_is_rejected() {
        assert!(Rsa::from_components(vec![0xffu8; 128], vec![1u8, 0, 1]).is_err());
    }

    #[test]
    fn empty_exponent_is_rejected() {
        assert!(Rsa::from_components(vec![0xffu8; 256], vec![0u8]).is_err());
    }

    #[test]
    fn only_rsa_algorithms_are_verifiable() -> Result<()> {
        let key: Rsa = serde_json::from_str(PRIMARY_JWK)?;
        assert!(key.can_verify(jwa::Algorithm::RS256));
        assert!(key.can_verify(jwa::Algorithm::PS512));
        assert!(!key.can_verify(jwa::Algorithm::ES256));
        Ok(())
    }

    #[test]
    fn verifies_pkcs1_and_pss_signatures() -> Result<()> {
        let key: Rsa = serde_json::from_str(PRIMARY_JWK)?;
        for alg in [jwa::Algorithm::RS256, jwa::Algorithm::RS512, jwa::Algorithm::PS256] {
            let signer = TestSigner::primary().with_algorithm(alg);
            let sig = signer.sign_bytes(b"payload");
            key.verify(alg, b"payload", &sig)?;
            assert!(key.verify(alg, b"tampered", &sig).is_err());
        }
        Ok(())
    }

    #[test]
    fn rogue_signature_is_a_mismatch() -> Result<()> {
        let key: Rsa = serde_json::from_str(PRIMARY_JWK)?;
        let sig = TestSigner::rogue().sign_bytes(b"payload");
        let err = key
            .verify(jwa::Algorithm::RS256, b"payload", &sig)
            .unwrap_err();
        assert!(err.is_signature_mismatch());
        Ok(())
    }
}
