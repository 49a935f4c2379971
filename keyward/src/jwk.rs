//! JSON Web Keys (JWK) as published by an identity provider
//!
//! The specifications for JSON Web Keys can be found in [RFC7517][].
//!
//! [RFC7517]: https://tools.ietf.org/html/rfc7517

use aliri_braid::braid;
use serde::{Deserialize, Serialize, Serializer};

use crate::{error, jwa, jws::Verifier};

/// An identifier for a JWK
#[braid(serde, ref_doc = "A borrowed reference to a JWK identifier ([`KeyId`])")]
pub struct KeyId;

/// An identified JSON Web Key holding public key material
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "JwkDto")]
#[must_use]
pub struct Jwk {
    key_id: Option<KeyId>,
    usage: Option<jwa::Usage>,
    algorithm: Option<jwa::Algorithm>,
    key: Key,
}

impl Jwk {
    /// The key ID
    #[must_use]
    pub fn key_id(&self) -> Option<&KeyIdRef> {
        self.key_id.as_deref()
    }

    /// The intended usage of the key
    #[must_use]
    pub fn usage(&self) -> Option<jwa::Usage> {
        self.usage
    }

    /// The algorithm pinned to this JWK, if any
    #[must_use]
    pub fn algorithm(&self) -> Option<jwa::Algorithm> {
        self.algorithm
    }

    /// The `kty` of the underlying key material
    #[must_use]
    pub fn key_type(&self) -> &'static str {
        self.key.key_type()
    }

    /// Sets the key ID
    pub fn with_key_id(self, kid: impl Into<KeyId>) -> Self {
        Self {
            key_id: Some(kid.into()),
            ..self
        }
    }

    /// Sets the key's usage
    pub fn with_usage(self, usage: jwa::Usage) -> Self {
        Self {
            usage: Some(usage),
            ..self
        }
    }

    /// Pins the key to an algorithm and marks it for signing
    ///
    /// # Errors
    ///
    /// Fails if the key material cannot be used with `alg`.
    pub fn with_algorithm(self, alg: jwa::Algorithm) -> Result<Self, error::IncompatibleAlgorithm> {
        if !self.key.can_verify(alg) {
            return Err(error::incompatible_algorithm(alg));
        }

        Ok(Self {
            algorithm: Some(alg),
            usage: Some(jwa::Usage::Signing),
            ..self
        })
    }
}

#[cfg(feature = "rsa")]
#[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
impl From<jwa::Rsa> for Jwk {
    fn from(key: jwa::Rsa) -> Self {
        Self {
            key_id: None,
            usage: None,
            algorithm: None,
            key: Key::Rsa(key),
        }
    }
}

#[cfg(feature = "ec")]
#[cfg_attr(docsrs, doc(cfg(feature = "ec")))]
impl From<jwa::EllipticCurve> for Jwk {
    fn from(key: jwa::EllipticCurve) -> Self {
        Self {
            key_id: None,
            usage: None,
            algorithm: None,
            key: Key::EllipticCurve(key),
        }
    }
}

impl Verifier for Jwk {
    type Error = error::JwkVerifyError;

    fn can_verify(&self, alg: jwa::Algorithm) -> bool {
        let usable = self.usage.map_or(true, |u| u == jwa::Usage::Signing);
        let pinned = self.algorithm.map_or(true, |a| a == alg);
        usable && pinned && self.key.can_verify(alg)
    }

    fn verify(
        &self,
        alg: jwa::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        if let Some(u) = self.usage {
            if u != jwa::Usage::Signing {
                return Err(error::jwk_usage_mismatch().into());
            }
        }

        match self.algorithm {
            Some(key_alg) if key_alg == alg => {}
            Some(_) => {
                return Err(error::incompatible_algorithm(alg).into());
            }
            None => {}
        }

        self.key.verify(alg, data, signature)
    }
}

#[derive(Deserialize)]
struct JwkDto {
    #[serde(rename = "kid", default)]
    key_id: Option<KeyId>,

    #[serde(rename = "use", default)]
    usage: Option<jwa::Usage>,

    #[serde(rename = "alg", default)]
    algorithm: Option<jwa::Algorithm>,

    #[serde(flatten)]
    key: Key,
}

impl TryFrom<JwkDto> for Jwk {
    type Error = error::IncompatibleAlgorithm;

    fn try_from(dto: JwkDto) -> Result<Self, Self::Error> {
        if let Some(alg) = dto.algorithm {
            if !dto.key.can_verify(alg) {
                return Err(error::incompatible_algorithm(alg));
            }
        }

        Ok(Self {
            key_id: dto.key_id,
            usage: dto.usage,
            algorithm: dto.algorithm,
            key: dto.key,
        })
    }
}

#[derive(Serialize)]
struct JwkDtoRef<'a> {
    #[serde(rename = "kid", skip_serializing_if = "Option::is_none")]
    key_id: Option<&'a KeyIdRef>,

    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    usage: Option<jwa::Usage>,

    #[serde(rename = "alg", skip_serializing_if = "Option::is_none")]
    algorithm: Option<jwa::Algorithm>,

    #[serde(flatten)]
    key: &'a Key,
}

impl Serialize for Jwk {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let dto = JwkDtoRef {
            key_id: self.key_id(),
            usage: self.usage(),
            algorithm: self.algorithm(),
            key: &self.key,
        };

        dto.serialize(serializer)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kty")]
enum Key {
    #[cfg(feature = "rsa")]
    #[serde(rename = "RSA")]
    Rsa(jwa::Rsa),

    #[cfg(feature = "ec")]
    #[serde(rename = "EC")]
    EllipticCurve(jwa::EllipticCurve),
}

impl Key {
    fn key_type(&self) -> &'static str {
        match self {
            #[cfg(feature = "rsa")]
            Self::Rsa(_) => "RSA",
            #[cfg(feature = "ec")]
            Self::EllipticCurve(_) => "EC",
        }
    }
}

impl Verifier for Key {
    type Error = error::JwkVerifyError;

    fn can_verify(&self, alg: jwa::Algorithm) -> bool {
        match self {
            #[cfg(feature = "rsa")]
            Self::Rsa(p) => p.can_verify(alg),
            #[cfg(feature = "ec")]
            Self::EllipticCurve(p) => p.can_verify(alg),
        }
    }

    fn verify(
        &self,
        alg: jwa::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        match self {
            #[cfg(feature = "rsa")]
            Self::Rsa(p) => p.verify(alg, data, signature),
            #[cfg(feature = "ec")]
            Self::EllipticCurve(p) => p.verify(alg, data, signature),
        }
    }
}

#[cfg(all(test, feature = "rsa", feature = "ec"))]
mod tests {
    use color_eyre::Result;

    use super::*;
    use crate::test_util::TestSigner;

    const PRIMARY: &str = include_str!("../data/rsa/primary.jwk.json");
    const PRIMARY_MIN: &str = include_str!("../data/rsa/primary-min.jwk.json");

    #[test]
    fn deserialize() -> Result<()> {
        let jwk: Jwk = serde_json::from_str(PRIMARY)?;
        assert_eq!(jwk.key_id(), Some(KeyIdRef::from_static("K1")));
        assert_eq!(jwk.usage(), Some(jwa::Usage::Signing));
        assert_eq!(jwk.algorithm(), Some(jwa::Algorithm::RS256));
        assert_eq!(jwk.key_type(), "RSA");
        Ok(())
    }

    #[test]
    fn deserialize_minimal() -> Result<()> {
        let jwk: Jwk = serde_json::from_str(PRIMARY_MIN)?;
        assert_eq!(jwk.key_id(), Some(KeyIdRef::from_static("K1")));
        assert_eq!(jwk.usage(), None);
        assert_eq!(jwk.algorithm(), None);
        Ok(())
    }

    #[test]
    fn serialization_preserves_members() -> Result<()> {
        let jwk: Jwk = serde_json::from_str(PRIMARY)?;
        let value = serde_json::to_value(&jwk)?;
        assert_eq!(value["kty"], "RSA");
        assert_eq!(value["kid"], "K1");
        assert_eq!(value["alg"], "RS256");
        assert_eq!(serde_json::from_value::<Jwk>(value)?, jwk);
        Ok(())
    }

    #[test]
    fn rejects_symmetric_keys() {
        let json = r#"{"kty":"oct","kid":"S1","k":"c2VjcmV0","alg":"HS256"}"#;
        assert!(serde_json::from_str::<Jwk>(json).is_err());
    }

    #[test]
    fn rejects_algorithm_incompatible_with_key() {
        let mut value: serde_json::Value = serde_json::from_str(PRIMARY_MIN).unwrap();
        value["alg"] = "ES256".into();
        assert!(serde_json::from_value::<Jwk>(value).is_err());
    }

    #[test]
    fn error_using_encryption_key_for_signing() {
        let signer = TestSigner::primary();
        let sig = signer.sign_bytes(b"data");
        let jwk = signer.jwk().clone().with_usage(jwa::Usage::Encryption);

        assert!(!jwk.can_verify(jwa::Algorithm::RS256));
        let err = jwk.verify(jwa::Algorithm::RS256, b"data", &sig).unwrap_err();
        assert!(err.is_usage_mismatch());
    }

    #[test]
    fn error_verifying_with_other_pinned_algorithm() {
        let signer = TestSigner::primary().with_algorithm(jwa::Algorithm::PS256);
        let sig = signer.sign_bytes(b"data");
        let pinned_rs256: Jwk = serde_json::from_str(PRIMARY).unwrap();

        let err = pinned_rs256
            .verify(jwa::Algorithm::PS256, b"data", &sig)
            .unwrap_err();
        assert!(err.is_incompatible_alg());
    }

    #[test]
    fn verifies_with_unpinned_key() -> Result<()> {
        let signer = TestSigner::primary().with_algorithm(jwa::Algorithm::RS384);
        let sig = signer.sign_bytes(b"data");
        let jwk: Jwk = serde_json::from_str(PRIMARY_MIN)?;

        jwk.verify(jwa::Algorithm::RS384, b"data", &sig)?;
        Ok(())
    }
}
