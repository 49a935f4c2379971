//! JSON Web Algorithms (JWA) used to verify token signatures
//!
//! Only asymmetric signature algorithms are implemented. The algorithms
//! are described in [RFC7518][].
//!
//! [RFC7518]: https://tools.ietf.org/html/rfc7518

#[cfg(feature = "ec")]
#[cfg_attr(docsrs, doc(cfg(feature = "ec")))]
pub mod ec;
#[cfg(feature = "rsa")]
#[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
pub mod rsa;

#[cfg(feature = "ec")]
#[cfg_attr(docsrs, doc(cfg(feature = "ec")))]
#[doc(inline)]
pub use ec::{Curve, EllipticCurve};
#[cfg(feature = "rsa")]
#[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
#[doc(inline)]
pub use rsa::Rsa;

mod algorithm;
mod usage;

pub use algorithm::Algorithm;
pub use usage::Usage;
