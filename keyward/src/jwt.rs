//! JSON Web Tokens (JWT) in compact serialization
//!
//! The specifications for this standard can be found in [RFC7519][].
//!
//! A compact JWT is three base64url segments joined by `.`:
//!
//! ```text
//! <header>.<payload>.<signature>
//! ```
//!
//! The header names the signature algorithm and the identifier of the key
//! that produced the signature. Nothing in it is trustworthy. It is only
//! consulted to decide which key to try, and the declared algorithm must
//! pass the validator's allow-list before any key is touched.
//!
//! The payload carries the claims. It is decoded only after the signature
//! over the exact `header.payload` bytes has been verified.
//!
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! ```
//! use keyward::{jwa, jwt, JwtRef};
//!
//! let token = JwtRef::from_str(concat!(
//!     "eyJhbGciOiJub25lIiwia2lkIjoiSzEifQ.",
//!     "eyJzdWIiOiJtYWxsb3J5In0.",
//! ));
//!
//! let decomposed = token.decompose().unwrap();
//! assert_eq!(decomposed.untrusted_header().alg(), "none");
//!
//! let validator = jwt::CoreValidator::default()
//!     .add_approved_algorithm(jwa::Algorithm::RS256);
//!
//! let err = validator
//!     .approve_algorithm(decomposed.untrusted_header().alg())
//!     .unwrap_err();
//! assert_eq!(err.declared(), "none");
//! ```

use std::{fmt, time::Duration};

use aliri_braid::braid;
use keyward_clock::{Clock, System, UnixTime};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{b64::Base64Url, error, jwa, jwk, jws};

/// Clock skew tolerated when checking `exp` and `nbf`
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(120);

/// An audience
#[braid(serde, ref_doc = "A borrowed reference to an [`Audience`]")]
pub struct Audience;

/// An issuer of JWTs
#[braid(serde, ref_doc = "A borrowed reference to an [`Issuer`]")]
pub struct Issuer;

/// A subject
#[braid(serde, ref_doc = "A borrowed reference to a [`Subject`]")]
pub struct Subject;

/// A JSON Web Token
///
/// The [`Display`][JwtRef#impl-Display] and [`Debug`][JwtRef#impl-Debug]
/// implementations never reveal the signature, and reveal nothing at all
/// unless the alternate flag is given.
#[braid(
    serde,
    debug = "owned",
    display = "owned",
    ord = "omit",
    ref_doc = "\
    A borrowed reference to a JSON Web Token ([`Jwt`])\n\
    \n\
    The [`Display`][Self#impl-Display] and [`Debug`][Self#impl-Debug] \
    implementations never reveal the signature, and reveal nothing at all \
    unless the alternate flag is given.
    "
)]
#[must_use]
pub struct Jwt;

/// Prints `***JWT***`, or with `{:#?}` the quoted header and payload
/// followed by an elided signature.
///
/// ```
/// # use keyward::JwtRef;
/// let token = JwtRef::from_str("eyJhbGciOiJSUzI1NiJ9.e30.c2lnbmF0dXJl");
///
/// assert_eq!(format!("{:?}", token), "***JWT***");
/// assert_eq!(format!("{:#?}", token), "\"eyJhbGciOiJSUzI1NiJ9.e30.…\"");
/// ```
impl fmt::Debug for JwtRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str("\"")?;
            write_unsigned_part(self.as_str(), f)?;
            f.write_str("\"")
        } else {
            f.write_str("***JWT***")
        }
    }
}

/// Prints `***JWT***`, or with `{:#}` the header and payload followed by an
/// elided signature.
///
/// ```
/// # use keyward::JwtRef;
/// let token = JwtRef::from_str("eyJhbGciOiJSUzI1NiJ9.e30.c2lnbmF0dXJl");
///
/// assert_eq!(format!("{}", token), "***JWT***");
/// assert_eq!(format!("{:#}", token), "eyJhbGciOiJSUzI1NiJ9.e30.…");
/// ```
impl fmt::Display for JwtRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write_unsigned_part(self.as_str(), f)
        } else {
            f.write_str("***JWT***")
        }
    }
}

fn write_unsigned_part(token: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match token.rfind('.') {
        Some(idx) => {
            f.write_str(&token[..=idx])?;
            f.write_str("…")
        }
        None => f.write_str("…"),
    }
}

/// Header parameters used to select a verification key
///
/// `alg` is kept as declared so that `none`, HMAC, and other unknown
/// names surface as an unsupported algorithm instead of a malformed header.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct BasicHeaders {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<jwk::KeyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

impl BasicHeaders {
    /// Headers declaring the given algorithm
    pub fn new(alg: jwa::Algorithm) -> Self {
        Self {
            alg: alg.name().to_owned(),
            kid: None,
            typ: Some("JWT".to_owned()),
        }
    }

    /// Headers declaring the given algorithm and key ID
    pub fn with_key_id(alg: jwa::Algorithm, kid: impl Into<jwk::KeyId>) -> Self {
        Self {
            kid: Some(kid.into()),
            ..Self::new(alg)
        }
    }

    /// The declared algorithm name
    #[must_use]
    pub fn alg(&self) -> &str {
        &self.alg
    }

    /// The declared key ID
    #[must_use]
    pub fn kid(&self) -> Option<&jwk::KeyIdRef> {
        self.kid.as_deref()
    }

    /// The declared token type
    #[must_use]
    pub fn typ(&self) -> Option<&str> {
        self.typ.as_deref()
    }
}

/// A JWT split into its parts, with only the header decoded
///
/// This structure is suitable for inspection to determine which key
/// should be used to validate the JWT.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Decomposed<'a> {
    header: BasicHeaders,
    message: &'a str,
    payload: &'a str,
    signature: Base64Url,
}

impl<'a> Decomposed<'a> {
    /// Verifies the decomposed JWT against the given key and validator
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm is not approved, the signature does
    /// not verify, the payload cannot be decoded, or the claims are rejected.
    pub fn verify<C, V>(
        self,
        key: &V,
        validator: &CoreValidator,
    ) -> Result<Validated<C>, error::JwtVerifyError>
    where
        C: DeserializeOwned + CoreClaims,
        V: jws::Verifier,
        error::JwtVerifyError: From<V::Error>,
    {
        self.verify_with_clock(key, validator, &System)
    }

    /// Verifies the decomposed JWT, judging time-based claims against `clock`
    ///
    /// # Errors
    ///
    /// See [`verify()`](Self::verify).
    pub fn verify_with_clock<C, V, K>(
        self,
        key: &V,
        validator: &CoreValidator,
        clock: &K,
    ) -> Result<Validated<C>, error::JwtVerifyError>
    where
        C: DeserializeOwned + CoreClaims,
        V: jws::Verifier,
        error::JwtVerifyError: From<V::Error>,
        K: Clock + ?Sized,
    {
        let alg = validator.approve_algorithm(self.header.alg())?;

        key.verify(alg, self.message.as_bytes(), self.signature.as_slice())?;

        let p_raw = Base64Url::from_encoded(self.payload).map_err(error::malformed_jwt_payload)?;
        let claims: C =
            serde_json::from_slice(p_raw.as_slice()).map_err(error::malformed_jwt_payload)?;

        validator.validate_with_clock(&claims, clock)?;

        Ok(Validated {
            header: self.header,
            claims,
        })
    }

    /// The untrusted header of the JWT
    ///
    /// **WARNING:** *This header has not been validated and should not be trusted.*
    /// Only use it to select the key for [`verify()`](Self::verify).
    pub fn untrusted_header(&self) -> &BasicHeaders {
        &self.header
    }

    /// The signing input: the encoded header and payload, separated by a `.`
    #[must_use]
    pub fn signing_input(&self) -> &'a str {
        self.message
    }

    /// The raw signature of the JWT
    pub fn signature(&self) -> &Base64Url {
        &self.signature
    }
}

impl JwtRef {
    /// Decomposes the JWT into its parts, decoding only the header
    ///
    /// # Errors
    ///
    /// Returns an error if the JWT does not have exactly three segments,
    /// or if the header or signature segments cannot be decoded.
    pub fn decompose(&self) -> Result<Decomposed<'_>, error::JwtVerifyError> {
        let token = self.as_str();
        let mut parts = token.split('.');
        let (h_str, p_str, s_str) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(error::malformed_jwt().into()),
        };

        let message = &token[..h_str.len() + 1 + p_str.len()];

        let h_raw = Base64Url::from_encoded(h_str).map_err(error::malformed_jwt_header)?;
        let header: BasicHeaders =
            serde_json::from_slice(h_raw.as_slice()).map_err(error::malformed_jwt_header)?;
        let signature = Base64Url::from_encoded(s_str).map_err(error::malformed_jwt_signature)?;

        Ok(Decomposed {
            header,
            message,
            payload: p_str,
            signature,
        })
    }

    /// Verifies a token against a particular key and validator
    ///
    /// If the token must be inspected first to determine which key to
    /// use, use [`decompose()`](Self::decompose) instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid according to the validator.
    pub fn verify<C, V>(
        &self,
        key: &V,
        validator: &CoreValidator,
    ) -> Result<Validated<C>, error::JwtVerifyError>
    where
        C: DeserializeOwned + CoreClaims,
        V: jws::Verifier,
        error::JwtVerifyError: From<V::Error>,
    {
        self.decompose()?.verify(key, validator)
    }
}

/// A token whose signature and claims have been verified
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Validated<C = Claims> {
    header: BasicHeaders,
    claims: C,
}

impl<C> Validated<C> {
    /// Extracts the header and claims from the token
    pub fn extract(self) -> (BasicHeaders, C) {
        (self.header, self.claims)
    }

    /// The validated token header
    pub fn header(&self) -> &BasicHeaders {
        &self.header
    }

    /// The validated token claims
    pub fn claims(&self) -> &C {
        &self.claims
    }

    /// Takes the claims, dropping the header
    pub fn into_claims(self) -> C {
        self.claims
    }
}

/// Claims that the [`CoreValidator`] knows how to check
pub trait CoreClaims {
    /// `nbf`: the token is not valid before this time
    fn nbf(&self) -> Option<UnixTime> {
        None
    }

    /// `exp`: the token is not valid at or after this time
    fn exp(&self) -> Option<UnixTime> {
        None
    }

    /// `aud`: the audiences the token was issued for
    fn aud(&self) -> &Audiences {
        Audiences::EMPTY_AUD
    }

    /// `iss`: the authority that issued the token
    fn iss(&self) -> Option<&IssuerRef> {
        None
    }
}

/// A set of zero or more [`Audience`]s
///
/// Serialized as a bare string when there is exactly one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany<Audience>", into = "OneOrMany<Audience>")]
#[repr(transparent)]
#[must_use]
pub struct Audiences(Vec<Audience>);

impl Audiences {
    /// An empty audience set
    #[inline]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// An audience set with a single audience
    #[inline]
    pub fn single(aud: impl Into<Audience>) -> Self {
        Self(vec![aud.into()])
    }

    /// An empty audience set
    pub const EMPTY_AUD: &'static Audiences = &Audiences::empty();

    /// Indicates whether the audience set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `aud` is a member of the set
    #[must_use]
    pub fn contains(&self, aud: &AudienceRef) -> bool {
        self.iter().any(|a| a == aud)
    }

    /// Iterates through references to the audiences in the set
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &AudienceRef> {
        self.0.iter().map(AsRef::as_ref)
    }
}

impl From<OneOrMany<Audience>> for Audiences {
    #[inline]
    fn from(vals: OneOrMany<Audience>) -> Self {
        match vals {
            OneOrMany::One(x) => Self(vec![x]),
            OneOrMany::Many(v) => Self(v),
        }
    }
}

impl From<Audiences> for OneOrMany<Audience> {
    #[inline]
    fn from(mut auds: Audiences) -> Self {
        match (auds.0.pop(), auds.0.is_empty()) {
            (Some(only), true) => Self::One(only),
            (Some(last), false) => {
                auds.0.push(last);
                Self::Many(auds.0)
            }
            (None, _) => Self::Many(Vec::new()),
        }
    }
}

impl From<Vec<Audience>> for Audiences {
    #[inline]
    fn from(vals: Vec<Audience>) -> Self {
        Self(vals)
    }
}

impl From<Audience> for Audiences {
    #[inline]
    fn from(aud: Audience) -> Self {
        Self::single(aud)
    }
}

impl From<&'_ str> for Audiences {
    #[inline]
    fn from(aud: &str) -> Self {
        Self::single(aud)
    }
}

/// One item or an array of items, primarily for serialization
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single item
    One(T),

    /// Zero or more items, serialized as an array
    Many(Vec<T>),
}

/// The claims of a verified token
///
/// Registered claims are available through accessors. Every other claim
/// the provider included is retained as JSON and available through
/// [`get()`](Self::get).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Audiences::is_empty")]
    aud: Audiences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<Issuer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nbf: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<UnixTime>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Claims {
    /// An empty claims set
    pub fn new() -> Self {
        Self::default()
    }

    /// The audiences
    pub fn aud(&self) -> &Audiences {
        &self.aud
    }

    /// The issuer
    #[must_use]
    pub fn iss(&self) -> Option<&IssuerRef> {
        self.iss.as_deref()
    }

    /// The subject
    #[must_use]
    pub fn sub(&self) -> Option<&SubjectRef> {
        self.sub.as_deref()
    }

    /// The expiration time
    #[must_use]
    pub fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    /// The not-before time
    #[must_use]
    pub fn nbf(&self) -> Option<UnixTime> {
        self.nbf
    }

    /// The issued-at time
    #[must_use]
    pub fn iat(&self) -> Option<UnixTime> {
        self.iat
    }

    /// A claim outside of the registered set, such as `scp` or `oid`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// All claims outside of the registered set
    #[must_use]
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Sets the `aud` claim to a single audience
    pub fn with_audience(mut self, aud: impl Into<Audience>) -> Self {
        self.aud = Audiences::single(aud);
        self
    }

    /// Sets the `aud` claim
    pub fn with_audiences(mut self, aud: impl Into<Audiences>) -> Self {
        self.aud = aud.into();
        self
    }

    /// Sets the `iss` claim
    pub fn with_issuer(mut self, iss: impl Into<Issuer>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// Sets the `sub` claim
    pub fn with_subject(mut self, sub: impl Into<Subject>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Sets the `exp` claim
    pub fn with_expiration(mut self, time: UnixTime) -> Self {
        self.exp = Some(time);
        self
    }

    /// Sets the `nbf` claim
    pub fn with_not_before(mut self, time: UnixTime) -> Self {
        self.nbf = Some(time);
        self
    }

    /// Sets the `iat` claim
    pub fn with_issued_at(mut self, time: UnixTime) -> Self {
        self.iat = Some(time);
        self
    }

    /// Adds a claim outside of the registered set
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

impl CoreClaims for Claims {
    fn nbf(&self) -> Option<UnixTime> {
        self.nbf
    }

    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    fn aud(&self) -> &Audiences {
        &self.aud
    }

    fn iss(&self) -> Option<&IssuerRef> {
        self.iss.as_deref()
    }
}

/// Checks the declared algorithm and the registered claims of a token
///
/// A default validator approves no algorithms, expects no particular
/// audience or issuer, and tolerates [`DEFAULT_LEEWAY`] of clock skew.
/// `exp` is always required.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct CoreValidator {
    approved_algorithms: Vec<jwa::Algorithm>,
    leeway: Duration,
    allowed_audiences: Vec<Audience>,
    issuer: Option<Issuer>,
}

impl Default for CoreValidator {
    fn default() -> Self {
        Self {
            approved_algorithms: Vec::new(),
            leeway: DEFAULT_LEEWAY,
            allowed_audiences: Vec::new(),
            issuer: None,
        }
    }
}

impl CoreValidator {
    /// Sets the clock skew tolerated for `exp` and `nbf`
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// Sets the clock skew tolerated for `exp` and `nbf`, in seconds
    pub fn with_leeway_secs(self, leeway: u64) -> Self {
        self.with_leeway(Duration::from_secs(leeway))
    }

    /// Adds an audience to the set of acceptable audiences
    pub fn add_allowed_audience(mut self, audience: impl Into<Audience>) -> Self {
        self.allowed_audiences.push(audience.into());
        self
    }

    /// Adds an algorithm to the allow-list
    pub fn add_approved_algorithm(mut self, alg: jwa::Algorithm) -> Self {
        if !self.approved_algorithms.contains(&alg) {
            self.approved_algorithms.push(alg);
        }
        self
    }

    /// Adds several algorithms to the allow-list
    pub fn extend_approved_algorithms<I: IntoIterator<Item = jwa::Algorithm>>(
        self,
        algs: I,
    ) -> Self {
        algs.into_iter()
            .fold(self, |v, alg| v.add_approved_algorithm(alg))
    }

    /// Requires the token to carry exactly this issuer
    pub fn require_issuer(self, issuer: impl Into<Issuer>) -> Self {
        Self {
            issuer: Some(issuer.into()),
            ..self
        }
    }

    /// The algorithms on the allow-list
    #[must_use]
    pub fn approved_algorithms(&self) -> &[jwa::Algorithm] {
        &self.approved_algorithms
    }

    /// The tolerated clock skew
    #[must_use]
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Checks a declared algorithm name against the allow-list
    ///
    /// # Errors
    ///
    /// Returns an error for names that are unknown (including `none` and the
    /// HMAC family) or not on the allow-list.
    pub fn approve_algorithm(
        &self,
        declared: &str,
    ) -> Result<jwa::Algorithm, error::UnsupportedAlgorithm> {
        let alg = jwa::Algorithm::try_from(declared)?;
        if self.approved_algorithms.contains(&alg) {
            Ok(alg)
        } else {
            Err(error::unsupported_algorithm(declared))
        }
    }

    /// Validates the registered claims against `clock`
    ///
    /// Checks run in order `exp`, `nbf`, `aud`, `iss`, and the first
    /// failure is reported.
    ///
    /// # Errors
    ///
    /// Returns the first claim that fails.
    pub fn validate_with_clock<T, K>(&self, claims: &T, clock: &K) -> Result<(), error::ClaimsRejected>
    where
        T: CoreClaims + ?Sized,
        K: Clock + ?Sized,
    {
        let now = clock.now();

        match claims.exp() {
            Some(exp) if now < exp.saturating_add(self.leeway) => {}
            Some(_) => return Err(error::ClaimsRejected::TokenExpired),
            None => return Err(error::ClaimsRejected::MissingRequiredClaim("exp")),
        }

        if let Some(nbf) = claims.nbf() {
            if now.saturating_add(self.leeway) < nbf {
                return Err(error::ClaimsRejected::TokenNotYetValid);
            }
        }

        if !self.allowed_audiences.is_empty() {
            let found = self
                .allowed_audiences
                .iter()
                .any(|e| claims.aud().contains(e));
            if !found {
                return Err(error::ClaimsRejected::InvalidAudience);
            }
        }

        if let Some(expected) = &self.issuer {
            if claims.iss() != Some(&**expected) {
                return Err(error::ClaimsRejected::InvalidIssuer);
            }
        }

        Ok(())
    }
}

#[cfg(all(test, feature = "rsa", feature = "ec"))]
mod tests {
    use color_eyre::Result;
    use keyward_clock::TestClock;

    use super::*;
    use crate::test_util::{self, TestSigner};

    const NOW: UnixTime = UnixTime(1_700_000_000);
    const API: &str = "api-client-123";
    const ISSUER: &str = "https://login.provider.example/tenant-abc";

    fn validator() -> CoreValidator {
        CoreValidator::default()
            .add_approved_algorithm(jwa::Algorithm::RS256)
            .add_allowed_audience(API)
            .require_issuer(ISSUER)
    }

    fn claims() -> Claims {
        Claims::new()
            .with_audience(API)
            .with_issuer(ISSUER)
            .with_subject("user-1")
            .with_expiration(NOW.saturating_add(Duration::from_secs(3600)))
    }

    fn check(claims: &Claims, at: UnixTime) -> Result<(), error::ClaimsRejected> {
        validator().validate_with_clock(claims, &TestClock::new(at))
    }

    #[test]
    fn decomposes_into_three_segments() -> Result<()> {
        let token = TestSigner::primary().sign(&claims());
        let decomposed = token.decompose()?;

        assert_eq!(decomposed.untrusted_header().alg(), "RS256");
        assert_eq!(
            decomposed.untrusted_header().kid(),
            Some(jwk::KeyIdRef::from_static("K1"))
        );
        assert_eq!(decomposed.untrusted_header().typ(), Some("JWT"));
        assert!(token.as_str().starts_with(decomposed.signing_input()));
        assert_eq!(decomposed.signature().len(), 256);
        Ok(())
    }

    #[test]
    fn wrong_segment_counts_are_malformed() {
        for raw in ["", "abc", "a.b", "a.b.c.d", "eyJhbGciOiJSUzI1NiJ9.e30.sig.extra"] {
            let err = JwtRef::from_str(raw).decompose().unwrap_err();
            assert!(err.is_malformed(), "{raw}");
        }
    }

    #[test]
    fn undecodable_header_is_malformed() {
        let not_json = test_util::encode_segment(b"not json");
        let no_alg = test_util::encode_segment(br#"{"kid":"K1"}"#);
        for header in ["!!!", not_json.as_str(), no_alg.as_str()] {
            let raw = format!("{header}.e30.c2ln");
            let err = JwtRef::from_str(&raw).decompose().unwrap_err();
            assert!(matches!(err, error::JwtVerifyError::MalformedTokenHeader(_)));
        }
    }

    #[test]
    fn none_and_hmac_are_never_approved() -> Result<()> {
        let validator = validator().extend_approved_algorithms([
            jwa::Algorithm::RS384,
            jwa::Algorithm::PS256,
        ]);
        for alg in ["none", "HS256", "HS512"] {
            let token = test_util::unsigned(&serde_json::json!({ "alg": alg, "kid": "K1" }), &claims());
            let err = token
                .decompose()?
                .verify::<Claims, _>(TestSigner::primary().jwk(), &validator)
                .unwrap_err();
            assert!(matches!(err, error::JwtVerifyError::UnsupportedAlgorithm(_)));
        }
        Ok(())
    }

    #[test]
    fn known_but_unlisted_algorithm_is_unsupported() {
        let err = validator().approve_algorithm("PS256").unwrap_err();
        assert_eq!(err.declared(), "PS256");
        assert_eq!(validator().approve_algorithm("RS256").unwrap(), jwa::Algorithm::RS256);
    }

    #[test]
    fn default_validator_approves_nothing() {
        assert!(CoreValidator::default().approve_algorithm("RS256").is_err());
    }

    #[test]
    fn verifies_signed_token() -> Result<()> {
        let signer = TestSigner::primary();
        let expected = claims().with_claim("scp", "read write");
        let token = signer.sign(&expected);

        let validated: Validated = token
            .decompose()?
            .verify_with_clock(signer.jwk(), &validator(), &TestClock::new(NOW))?;

        assert_eq!(validated.claims(), &expected);
        assert_eq!(validated.claims().get("scp"), Some(&Value::from("read write")));
        assert_eq!(validated.header().alg(), "RS256");
        Ok(())
    }

    #[test]
    fn same_token_yields_identical_claims() -> Result<()> {
        let signer = TestSigner::primary();
        let token = signer.sign(&claims());
        let clock = TestClock::new(NOW);

        let first: Validated = token.decompose()?.verify_with_clock(signer.jwk(), &validator(), &clock)?;
        let second: Validated = token.decompose()?.verify_with_clock(signer.jwk(), &validator(), &clock)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn rogue_signature_is_rejected_before_claims() -> Result<()> {
        let expired = claims().with_expiration(UnixTime(1));
        let token = TestSigner::rogue().with_key_id("K1").sign(&expired);

        let err = token
            .decompose()?
            .verify_with_clock::<Claims, _, _>(TestSigner::primary().jwk(), &validator(), &TestClock::new(NOW))
            .unwrap_err();
        assert!(matches!(err, error::JwtVerifyError::JwkVerifyError(e) if e.is_signature_mismatch()));
        Ok(())
    }

    #[test]
    fn tampered_payload_fails_signature() -> Result<()> {
        let signer = TestSigner::primary();
        let token = signer.sign(&claims());
        let forged = signer.sign(&claims().with_subject("admin"));

        let mut parts: Vec<&str> = token.as_str().split('.').collect();
        parts[1] = forged.as_str().split('.').nth(1).unwrap();
        let spliced = Jwt::new(parts.join("."));

        let err = spliced
            .decompose()?
            .verify_with_clock::<Claims, _, _>(signer.jwk(), &validator(), &TestClock::new(NOW))
            .unwrap_err();
        assert!(matches!(err, error::JwtVerifyError::JwkVerifyError(_)));
        Ok(())
    }

    #[test]
    fn signed_garbage_payload_is_malformed() -> Result<()> {
        let signer = TestSigner::primary();
        let token = signer.sign_raw_payload(b"[1, 2");

        let err = token
            .decompose()?
            .verify_with_clock::<Claims, _, _>(signer.jwk(), &validator(), &TestClock::new(NOW))
            .unwrap_err();
        assert!(matches!(err, error::JwtVerifyError::MalformedTokenPayload(_)));
        Ok(())
    }

    #[test]
    fn expiry_respects_leeway() {
        let exp = NOW;
        let c = claims().with_expiration(exp);

        assert_eq!(check(&c, UnixTime(exp.0 + 119)), Ok(()));
        assert_eq!(
            check(&c, UnixTime(exp.0 + 120)),
            Err(error::ClaimsRejected::TokenExpired)
        );
        assert_eq!(
            check(&c, UnixTime(exp.0 + 3600)),
            Err(error::ClaimsRejected::TokenExpired)
        );
    }

    #[test]
    fn zero_leeway_expires_at_exp() {
        let c = claims().with_expiration(NOW);
        let strict = validator().with_leeway_secs(0);
        assert_eq!(
            strict.validate_with_clock(&c, &TestClock::new(NOW)),
            Err(error::ClaimsRejected::TokenExpired)
        );
    }

    #[test]
    fn missing_exp_is_rejected() {
        let c = Claims::new().with_audience(API).with_issuer(ISSUER);
        assert_eq!(
            check(&c, NOW),
            Err(error::ClaimsRejected::MissingRequiredClaim("exp"))
        );
    }

    #[test]
    fn not_before_respects_leeway() {
        let c = claims().with_not_before(UnixTime(NOW.0 + 120));
        assert_eq!(check(&c, NOW), Ok(()));

        let c = claims().with_not_before(UnixTime(NOW.0 + 121));
        assert_eq!(check(&c, NOW), Err(error::ClaimsRejected::TokenNotYetValid));
    }

    #[test]
    fn audience_must_match() {
        let other = claims().with_audience("other-client");
        assert_eq!(check(&other, NOW), Err(error::ClaimsRejected::InvalidAudience));

        let missing = claims().with_audiences(Audiences::empty());
        assert_eq!(check(&missing, NOW), Err(error::ClaimsRejected::InvalidAudience));

        let many = claims().with_audiences(vec![
            Audience::from_static("other-client"),
            Audience::from_static(API),
        ]);
        assert_eq!(check(&many, NOW), Ok(()));
    }

    #[test]
    fn issuer_must_match_exactly() {
        let trailing = claims().with_issuer(format!("{ISSUER}/"));
        assert_eq!(check(&trailing, NOW), Err(error::ClaimsRejected::InvalidIssuer));

        let mut missing = claims();
        missing.iss = None;
        assert_eq!(check(&missing, NOW), Err(error::ClaimsRejected::InvalidIssuer));
    }

    #[test]
    fn expiry_is_checked_before_audience() {
        let c = claims()
            .with_expiration(UnixTime(1))
            .with_audience("other-client");
        assert_eq!(check(&c, NOW), Err(error::ClaimsRejected::TokenExpired));
    }

    #[test]
    fn audience_serializes_as_string_or_array() -> Result<()> {
        let one = serde_json::to_value(claims())?;
        assert_eq!(one["aud"], API);

        let many: Claims = serde_json::from_str(r#"{"aud":["a","b"],"exp":1.5}"#)?;
        assert_eq!(many.aud().iter().count(), 2);
        assert_eq!(many.exp(), Some(UnixTime(1)));
        assert_eq!(serde_json::to_value(&many)?["aud"], serde_json::json!(["a", "b"]));
        Ok(())
    }

    #[test]
    fn token_is_redacted_in_logs() {
        let token = TestSigner::primary().sign(&claims());
        let signature = token.as_str().rsplit('.').next().unwrap().to_owned();

        assert_eq!(format!("{token}"), "***JWT***");
        assert_eq!(format!("{token:?}"), "***JWT***");
        assert!(!format!("{token:#}").contains(&signature));
        assert!(!format!("{token:#?}").contains(&signature));
    }
}
