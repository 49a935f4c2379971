//! JOSE primitives for verifying bearer tokens against a published key set
//!
//! This crate covers the verification half of the JOSE standards:
//!
//! * JSON Web Signature (JWS): [RFC7515][]
//! * JSON Web Key (JWK): [RFC7517][]
//! * JSON Web Algorithms (JWA): [RFC7518][]
//! * JSON Web Token (JWT): [RFC7519][]
//!
//! Only asymmetric algorithms are implemented (`RS*`, `PS*`, `ES256`,
//! `ES384`). `none` and the HMAC family are rejected wherever they appear.
//! Fetching and caching key sets lives in `keyward_oidc`.
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515
//! [RFC7517]: https://tools.ietf.org/html/rfc7517
//! [RFC7518]: https://tools.ietf.org/html/rfc7518
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! # Example
//!
//! ```
//! use keyward::{jwa, jwt, Jwks, JwtRef};
//!
//! let jwks: Jwks = serde_json::from_str(r#"{
//!     "keys": [{
//!         "kty": "EC",
//!         "kid": "docs",
//!         "use": "sig",
//!         "crv": "P-256",
//!         "x": "577jKwDl5pfE0GDH5aO2mbodk8P5qIB-RRrEHsBgkog",
//!         "y": "WegycMjgCmp5lO3BonpbUThj979ziM8scjJO1ekpvso"
//!     }]
//! }"#).unwrap();
//!
//! let token = JwtRef::from_str(concat!(
//!     "eyJhbGciOiJFUzI1NiIsImtpZCI6ImRvY3MiLCJ0eXAiOiJKV1QifQ.",
//!     "eyJhdWQiOiJhcGktY2xpZW50LTEyMyIsImlzcyI6Imh0dHBzOi8vbG9naW4ucHJvdmlkZXIuZXhhbXBsZS",
//!     "90ZW5hbnQtYWJjIiwic3ViIjoidXNlci0xIiwiZXhwIjo0MTAyNDQ0ODAwfQ.",
//!     "jkElJZto34oQF2dxD-Sxw2GKIcgq6TtbCv3McIcpzfCUohHKOxMZl8D6iShhPSpP0Ch5HI-U_e9GPBK8FzJsHQ",
//! ));
//!
//! let validator = jwt::CoreValidator::default()
//!     .add_approved_algorithm(jwa::Algorithm::ES256)
//!     .add_allowed_audience("api-client-123")
//!     .require_issuer("https://login.provider.example/tenant-abc");
//!
//! let decomposed = token.decompose().unwrap();
//! let kid = decomposed.untrusted_header().kid().unwrap();
//! let key = jwks.get_key_by_id(kid).unwrap();
//!
//! let data: jwt::Validated = decomposed.verify(key, &validator).unwrap();
//! assert_eq!(data.claims().sub().unwrap().as_str(), "user-1");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod b64;
pub mod error;
pub mod jwa;
pub mod jwk;
mod jwks;
pub mod jws;
pub mod jwt;

#[cfg(all(any(test, feature = "test-util"), feature = "rsa", feature = "ec"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_util;

#[doc(inline)]
pub use jwk::Jwk;
#[doc(inline)]
pub use jwks::Jwks;
#[doc(inline)]
pub use jwt::{Jwt, JwtRef};
