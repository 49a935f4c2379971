//! Helpers for minting real tokens in tests
//!
//! Two RSA key pairs ship with the crate. `primary` is published as `K1`
//! and `rogue` as `K2`, so a token signed by one and labelled with the
//! other's key ID exercises the signature-mismatch path. Elliptic curve
//! keys are generated on demand.
//!
//! Nothing here is used outside of tests, so failures panic.

use ring::{
    rand::SystemRandom,
    signature::{self, EcdsaKeyPair, KeyPair, RsaKeyPair},
};
use serde::Serialize;

use crate::{b64::Base64Url, error, jwa, jwk, jws, jwt::BasicHeaders, Jwk, Jwks, Jwt};

const PRIMARY_PEM: &str = include_str!("../data/rsa/primary.pem");
const PRIMARY_JWK: &str = include_str!("../data/rsa/primary.jwk.json");
const ROGUE_PEM: &str = include_str!("../data/rsa/rogue.pem");
const ROGUE_JWK: &str = include_str!("../data/rsa/rogue.jwk.json");

/// A JWKS document with the primary key, the rogue key, and two keys of
/// unsupported types that must be skipped
pub const MIXED_JWKS: &str = include_str!("../data/jwks.json");

enum SigningKey {
    Rsa(RsaKeyPair),
    Ec(EcdsaKeyPair),
}

/// A private key paired with the public JWK that verifies its signatures
pub struct TestSigner {
    key: SigningKey,
    alg: jwa::Algorithm,
    jwk: Jwk,
}

impl std::fmt::Debug for TestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSigner")
            .field("alg", &self.alg)
            .field("jwk", &self.jwk)
            .finish_non_exhaustive()
    }
}

impl TestSigner {
    /// The RS256 signer whose public key is published as `K1`
    #[must_use]
    pub fn primary() -> Self {
        Self::rsa_from_pem(PRIMARY_PEM, PRIMARY_JWK).expect("primary fixture is valid")
    }

    /// An RS256 signer whose public key is published as `K2`
    #[must_use]
    pub fn rogue() -> Self {
        Self::rsa_from_pem(ROGUE_PEM, ROGUE_JWK).expect("rogue fixture is valid")
    }

    /// Loads an RSA signer from a PKCS#8 PEM and its public JWK
    ///
    /// # Errors
    ///
    /// Fails if either document cannot be parsed.
    pub fn rsa_from_pem(pem: &str, jwk_json: &str) -> Result<Self, error::KeyRejected> {
        let der = pem_body(pem)?;
        let key = RsaKeyPair::from_pkcs8(&der).map_err(|e| error::key_rejected(e.to_string()))?;
        let jwk: Jwk = serde_json::from_str(jwk_json).map_err(error::key_rejected)?;

        Ok(Self {
            key: SigningKey::Rsa(key),
            alg: jwk.algorithm().unwrap_or(jwa::Algorithm::RS256),
            jwk,
        })
    }

    /// Generates a fresh elliptic curve signer for `ES256` or `ES384`
    ///
    /// # Panics
    ///
    /// Panics for any other algorithm.
    #[must_use]
    pub fn generate_ec(alg: jwa::Algorithm, kid: &str) -> Self {
        let (signing_alg, curve) = match alg {
            jwa::Algorithm::ES256 => (&signature::ECDSA_P256_SHA256_FIXED_SIGNING, jwa::Curve::P256),
            jwa::Algorithm::ES384 => (&signature::ECDSA_P384_SHA384_FIXED_SIGNING, jwa::Curve::P384),
            _ => panic!("{alg} is not an elliptic curve algorithm"),
        };

        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(signing_alg, &rng).expect("key generation");
        let key = EcdsaKeyPair::from_pkcs8(signing_alg, pkcs8.as_ref(), &rng).expect("generated key");

        let public = jwa::EllipticCurve::from_uncompressed_point(curve, key.public_key().as_ref())
            .expect("ring emits uncompressed points");
        let jwk = Jwk::from(public)
            .with_key_id(kid)
            .with_algorithm(alg)
            .expect("curve matches algorithm");

        Self {
            key: SigningKey::Ec(key),
            alg,
            jwk,
        }
    }

    /// Switches to another algorithm the same key can produce
    ///
    /// The public JWK is re-pinned to the new algorithm.
    #[must_use]
    pub fn with_algorithm(self, alg: jwa::Algorithm) -> Self {
        let jwk = self.jwk.with_algorithm(alg).expect("key supports algorithm");
        Self { alg, jwk, ..self }
    }

    /// Publishes the public key under a different key ID
    ///
    /// Signed tokens carry the new key ID in their header.
    #[must_use]
    pub fn with_key_id(self, kid: &str) -> Self {
        Self {
            jwk: self.jwk.with_key_id(kid),
            ..self
        }
    }

    /// The algorithm used for signing
    #[must_use]
    pub fn algorithm(&self) -> jwa::Algorithm {
        self.alg
    }

    /// The public JWK
    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }

    /// A key set containing only this signer's public JWK
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        std::iter::once(self.jwk.clone()).collect()
    }

    /// Signs raw bytes
    #[must_use]
    pub fn sign_bytes(&self, data: &[u8]) -> Vec<u8> {
        jws::Signer::sign(self, self.alg, data).expect("signing succeeds")
    }

    /// Signs `claims` under a header naming this signer's algorithm and key ID
    pub fn sign<P: Serialize>(&self, claims: &P) -> Jwt {
        self.sign_with_header(&self.header(), claims)
    }

    /// Signs `claims` under an arbitrary header
    pub fn sign_with_header<H: Serialize, P: Serialize>(&self, header: &H, claims: &P) -> Jwt {
        let payload = serde_json::to_vec(claims).expect("claims serialize");
        self.sign_parts(header, &payload)
    }

    /// Signs a payload that is not necessarily JSON
    pub fn sign_raw_payload(&self, payload: &[u8]) -> Jwt {
        self.sign_parts(&self.header(), payload)
    }

    fn header(&self) -> BasicHeaders {
        match self.jwk.key_id() {
            Some(kid) => BasicHeaders::with_key_id(self.alg, kid),
            None => BasicHeaders::new(self.alg),
        }
    }

    fn sign_parts<H: Serialize>(&self, header: &H, payload: &[u8]) -> Jwt {
        let header = serde_json::to_vec(header).expect("header serializes");
        let message = format!("{}.{}", encode_segment(&header), encode_segment(payload));
        let signature = Base64Url::from_raw(self.sign_bytes(message.as_bytes()));
        Jwt::new(format!("{message}.{signature}"))
    }
}

impl jws::Signer for TestSigner {
    type Error = error::SignatureMismatch;

    fn can_sign(&self, alg: jwa::Algorithm) -> bool {
        match &self.key {
            SigningKey::Rsa(_) => rsa_padding(alg).is_some(),
            SigningKey::Ec(_) => alg == self.alg,
        }
    }

    fn sign(&self, alg: jwa::Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error> {
        let rng = SystemRandom::new();
        match &self.key {
            SigningKey::Rsa(key) => {
                let padding = rsa_padding(alg).ok_or_else(error::signature_mismatch)?;
                let mut sig = vec![0; key.public().modulus_len()];
                key.sign(padding, &rng, data, &mut sig)
                    .map_err(|_| error::signature_mismatch())?;
                Ok(sig)
            }
            SigningKey::Ec(key) if alg == self.alg => key
                .sign(&rng, data)
                .map(|sig| sig.as_ref().to_vec())
                .map_err(|_| error::signature_mismatch()),
            SigningKey::Ec(_) => Err(error::signature_mismatch()),
        }
    }
}

fn rsa_padding(alg: jwa::Algorithm) -> Option<&'static dyn signature::RsaEncoding> {
    #[allow(unreachable_patterns)]
    match alg {
        jwa::Algorithm::RS256 => Some(&signature::RSA_PKCS1_SHA256),
        jwa::Algorithm::RS384 => Some(&signature::RSA_PKCS1_SHA384),
        jwa::Algorithm::RS512 => Some(&signature::RSA_PKCS1_SHA512),
        jwa::Algorithm::PS256 => Some(&signature::RSA_PSS_SHA256),
        jwa::Algorithm::PS384 => Some(&signature::RSA_PSS_SHA384),
        jwa::Algorithm::PS512 => Some(&signature::RSA_PSS_SHA512),
        _ => None,
    }
}

fn pem_body(pem: &str) -> Result<Vec<u8>, error::KeyRejected> {
    use base64::Engine;

    let body: String = pem
        .lines()
        .filter(|l| !l.starts_with("-----"))
        .map(str::trim)
        .collect();

    base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(error::key_rejected)
}

/// Encodes bytes as an unpadded base64url token segment
#[must_use]
pub fn encode_segment(raw: &[u8]) -> String {
    Base64Url::from_raw(raw).to_string()
}

/// Builds a token with an empty signature segment
pub fn unsigned<H: Serialize, P: Serialize>(header: &H, claims: &P) -> Jwt {
    let header = serde_json::to_vec(header).expect("header serializes");
    let payload = serde_json::to_vec(claims).expect("claims serialize");
    Jwt::new(format!(
        "{}.{}.",
        encode_segment(&header),
        encode_segment(&payload)
    ))
}

/// Parses the bundled mixed JWKS document
#[must_use]
pub fn mixed_jwks() -> Jwks {
    serde_json::from_str(MIXED_JWKS).expect("fixture JWKS parses")
}

/// The key ID of the primary fixture key
#[must_use]
pub fn primary_kid() -> jwk::KeyId {
    jwk::KeyId::from_static("K1")
}
