use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

const FORMAT_JWT: &str = "jwt";
const FORMAT_JWT_VC: &str = "jwt_vc";
const FORMAT_JWT_VP: &str = "jwt_vp";
const FORMAT_JWT_VC_JSON: &str = "jwt_vc_json";
const FORMAT_JWT_VP_JSON: &str = "jwt_vp_json";
const FORMAT_LDP: &str = "ldp";
const FORMAT_LDP_VC: &str = "ldp_vc";
const FORMAT_LDP_VP: &str = "ldp_vp";
const FORMAT_MSO_MDOC: &str = "mso_mdoc";
const FORMAT_SD_JWT_VC: &str = "vc+sd-jwt";

/// A JSON object keyed by claim format designation, e.g.
/// `{"jwt_vp": {"alg": ["ES256"]}}`.
///
/// Backed by an insertion-ordered map so that the "first declared format" is
/// well defined.
pub type ClaimFormatMap = Map<String, Json>;

/// Registered claim format designations.
///
/// See the [claim format registry](https://identity.foundation/claim-format-registry/#registry).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClaimFormatDesignation {
    /// A JSON Web Token, submitted as a JWT encoded string.
    Jwt,
    /// A W3C Verifiable Credential secured as a JWT.
    JwtVc,
    /// A W3C Verifiable Presentation secured as a JWT.
    JwtVp,
    JwtVcJson,
    JwtVpJson,
    /// A Linked-Data Proof, submitted as an object.
    Ldp,
    LdpVc,
    LdpVp,
    /// ISO/IEC 18013-5 mobile document.
    MsoMDoc,
    /// IETF SD-JWT VC.
    SdJwtVc,
    /// Any designation not known to this library.
    Other(String),
}

impl ClaimFormatDesignation {
    /// Designations declared by a format map, in declaration order.
    pub fn declared_in(map: &ClaimFormatMap) -> impl Iterator<Item = ClaimFormatDesignation> + '_ {
        map.keys().map(|key| ClaimFormatDesignation::from(key.as_str()))
    }
}

impl From<&str> for ClaimFormatDesignation {
    fn from(s: &str) -> Self {
        match s {
            FORMAT_JWT => Self::Jwt,
            FORMAT_JWT_VC => Self::JwtVc,
            FORMAT_JWT_VP => Self::JwtVp,
            FORMAT_JWT_VC_JSON => Self::JwtVcJson,
            FORMAT_JWT_VP_JSON => Self::JwtVpJson,
            FORMAT_LDP => Self::Ldp,
            FORMAT_LDP_VC => Self::LdpVc,
            FORMAT_LDP_VP => Self::LdpVp,
            FORMAT_MSO_MDOC => Self::MsoMDoc,
            FORMAT_SD_JWT_VC => Self::SdJwtVc,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for ClaimFormatDesignation {
    fn from(s: String) -> Self {
        s.as_str().into()
    }
}

impl FromStr for ClaimFormatDesignation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl AsRef<str> for ClaimFormatDesignation {
    fn as_ref(&self) -> &str {
        match self {
            Self::Jwt => FORMAT_JWT,
            Self::JwtVc => FORMAT_JWT_VC,
            Self::JwtVp => FORMAT_JWT_VP,
            Self::JwtVcJson => FORMAT_JWT_VC_JSON,
            Self::JwtVpJson => FORMAT_JWT_VP_JSON,
            Self::Ldp => FORMAT_LDP,
            Self::LdpVc => FORMAT_LDP_VC,
            Self::LdpVp => FORMAT_LDP_VP,
            Self::MsoMDoc => FORMAT_MSO_MDOC,
            Self::SdJwtVc => FORMAT_SD_JWT_VC,
            Self::Other(s) => s,
        }
    }
}

impl From<ClaimFormatDesignation> for String {
    fn from(format: ClaimFormatDesignation) -> Self {
        match format {
            ClaimFormatDesignation::Other(s) => s,
            known => known.as_ref().to_owned(),
        }
    }
}

impl fmt::Display for ClaimFormatDesignation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(f)
    }
}

impl Serialize for ClaimFormatDesignation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_ref())
    }
}

impl<'de> Deserialize<'de> for ClaimFormatDesignation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Into::into)
    }
}
