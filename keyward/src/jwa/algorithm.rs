use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error;

/// An asymmetric signature algorithm
///
/// `none` and the HMAC family are deliberately absent. Parsing either
/// yields [`UnsupportedAlgorithm`](error::UnsupportedAlgorithm).
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum Algorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256
    #[cfg(feature = "rsa")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    #[cfg(feature = "rsa")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    #[cfg(feature = "rsa")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
    RS512,
    /// RSASSA-PSS using SHA-256 and MGF1 with SHA-256
    #[cfg(feature = "rsa")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
    PS256,
    /// RSASSA-PSS using SHA-384 and MGF1 with SHA-384
    #[cfg(feature = "rsa")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
    PS384,
    /// RSASSA-PSS using SHA-512 and MGF1 with SHA-512
    #[cfg(feature = "rsa")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
    PS512,
    /// ECDSA using P-256 and SHA-256
    #[cfg(feature = "ec")]
    #[cfg_attr(docsrs, doc(cfg(feature = "ec")))]
    ES256,
    /// ECDSA using P-384 and SHA-384
    #[cfg(feature = "ec")]
    #[cfg_attr(docsrs, doc(cfg(feature = "ec")))]
    ES384,
}

impl Algorithm {
    /// The registered JOSE name of the algorithm
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            #[cfg(feature = "rsa")]
            Self::RS256 => "RS256",
            #[cfg(feature = "rsa")]
            Self::RS384 => "RS384",
            #[cfg(feature = "rsa")]
            Self::RS512 => "RS512",
            #[cfg(feature = "rsa")]
            Self::PS256 => "PS256",
            #[cfg(feature = "rsa")]
            Self::PS384 => "PS384",
            #[cfg(feature = "rsa")]
            Self::PS512 => "PS512",
            #[cfg(feature = "ec")]
            Self::ES256 => "ES256",
            #[cfg(feature = "ec")]
            Self::ES384 => "ES384",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&'_ str> for Algorithm {
    type Error = error::UnsupportedAlgorithm;

    #[inline]
    fn try_from(value: &'_ str) -> Result<Self, Self::Error> {
        match value {
            #[cfg(feature = "rsa")]
            "RS256" => Ok(Self::RS256),
            #[cfg(feature = "rsa")]
            "RS384" => Ok(Self::RS384),
            #[cfg(feature = "rsa")]
            "RS512" => Ok(Self::RS512),
            #[cfg(feature = "rsa")]
            "PS256" => Ok(Self::PS256),
            #[cfg(feature = "rsa")]
            "PS384" => Ok(Self::PS384),
            #[cfg(feature = "rsa")]
            "PS512" => Ok(Self::PS512),
            #[cfg(feature = "ec")]
            "ES256" => Ok(Self::ES256),
            #[cfg(feature = "ec")]
            "ES384" => Ok(Self::ES384),
            _ => Err(error::unsupported_algorithm(value)),
        }
    }
}

impl FromStr for Algorithm {
    type Err = error::UnsupportedAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Self::try_from(s.as_ref()).map_err(serde::de::Error::custom)
    }
}
