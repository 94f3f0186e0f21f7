use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{bail, Context, Error, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use josekit::{
    jwk::Jwk,
    jws::{self, JwsHeader, JwsSigner, JwsVerifier},
    jwt::{self, JwtPayload},
};
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use sha2::{Digest, Sha256};

/// JWS algorithms this library can sign and verify with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum SigningAlgorithm {
    Es256,
    Es384,
    Es512,
    Rs256,
    Rs384,
    Rs512,
    Ps256,
    Ps384,
    Ps512,
    EdDsa,
}

impl SigningAlgorithm {
    pub const ALL: [SigningAlgorithm; 10] = [
        SigningAlgorithm::Es256,
        SigningAlgorithm::Es384,
        SigningAlgorithm::Es512,
        SigningAlgorithm::Rs256,
        SigningAlgorithm::Rs384,
        SigningAlgorithm::Rs512,
        SigningAlgorithm::Ps256,
        SigningAlgorithm::Ps384,
        SigningAlgorithm::Ps512,
        SigningAlgorithm::EdDsa,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SigningAlgorithm::Es256 => "ES256",
            SigningAlgorithm::Es384 => "ES384",
            SigningAlgorithm::Es512 => "ES512",
            SigningAlgorithm::Rs256 => "RS256",
            SigningAlgorithm::Rs384 => "RS384",
            SigningAlgorithm::Rs512 => "RS512",
            SigningAlgorithm::Ps256 => "PS256",
            SigningAlgorithm::Ps384 => "PS384",
            SigningAlgorithm::Ps512 => "PS512",
            SigningAlgorithm::EdDsa => "EdDSA",
        }
    }

    /// Whether `jwk` has the key type and curve this algorithm works with.
    pub fn fits(self, jwk: &Jwk) -> bool {
        let curve = jwk.curve();
        match self {
            SigningAlgorithm::Es256 => jwk.key_type() == "EC" && curve == Some("P-256"),
            SigningAlgorithm::Es384 => jwk.key_type() == "EC" && curve == Some("P-384"),
            SigningAlgorithm::Es512 => jwk.key_type() == "EC" && curve == Some("P-521"),
            SigningAlgorithm::Rs256
            | SigningAlgorithm::Rs384
            | SigningAlgorithm::Rs512
            | SigningAlgorithm::Ps256
            | SigningAlgorithm::Ps384
            | SigningAlgorithm::Ps512 => jwk.key_type() == "RSA",
            SigningAlgorithm::EdDsa => {
                jwk.key_type() == "OKP" && matches!(curve, Some("Ed25519") | Some("Ed448"))
            }
        }
    }

    /// Algorithms usable with `jwk`, honouring its `alg` parameter if set.
    pub fn usable_with(jwk: &Jwk) -> impl Iterator<Item = SigningAlgorithm> + '_ {
        Self::ALL.into_iter().filter(move |alg| {
            alg.fits(jwk) && jwk.algorithm().map_or(true, |declared| declared == alg.name())
        })
    }

    pub fn signer(self, jwk: &Jwk) -> Result<Box<dyn JwsSigner>> {
        let signer: Box<dyn JwsSigner> = match self {
            SigningAlgorithm::Es256 => Box::new(jws::ES256.signer_from_jwk(jwk)?),
            SigningAlgorithm::Es384 => Box::new(jws::ES384.signer_from_jwk(jwk)?),
            SigningAlgorithm::Es512 => Box::new(jws::ES512.signer_from_jwk(jwk)?),
            SigningAlgorithm::Rs256 => Box::new(jws::RS256.signer_from_jwk(jwk)?),
            SigningAlgorithm::Rs384 => Box::new(jws::RS384.signer_from_jwk(jwk)?),
            SigningAlgorithm::Rs512 => Box::new(jws::RS512.signer_from_jwk(jwk)?),
            SigningAlgorithm::Ps256 => Box::new(jws::PS256.signer_from_jwk(jwk)?),
            SigningAlgorithm::Ps384 => Box::new(jws::PS384.signer_from_jwk(jwk)?),
            SigningAlgorithm::Ps512 => Box::new(jws::PS512.signer_from_jwk(jwk)?),
            SigningAlgorithm::EdDsa => Box::new(jws::EdDSA.signer_from_jwk(jwk)?),
        };
        Ok(signer)
    }

    pub fn verifier(self, jwk: &Jwk) -> Result<Box<dyn JwsVerifier>> {
        let verifier: Box<dyn JwsVerifier> = match self {
            SigningAlgorithm::Es256 => Box::new(jws::ES256.verifier_from_jwk(jwk)?),
            SigningAlgorithm::Es384 => Box::new(jws::ES384.verifier_from_jwk(jwk)?),
            SigningAlgorithm::Es512 => Box::new(jws::ES512.verifier_from_jwk(jwk)?),
            SigningAlgorithm::Rs256 => Box::new(jws::RS256.verifier_from_jwk(jwk)?),
            SigningAlgorithm::Rs384 => Box::new(jws::RS384.verifier_from_jwk(jwk)?),
            SigningAlgorithm::Rs512 => Box::new(jws::RS512.verifier_from_jwk(jwk)?),
            SigningAlgorithm::Ps256 => Box::new(jws::PS256.verifier_from_jwk(jwk)?),
            SigningAlgorithm::Ps384 => Box::new(jws::PS384.verifier_from_jwk(jwk)?),
            SigningAlgorithm::Ps512 => Box::new(jws::PS512.verifier_from_jwk(jwk)?),
            SigningAlgorithm::EdDsa => Box::new(jws::EdDSA.verifier_from_jwk(jwk)?),
        };
        Ok(verifier)
    }
}

/// Case-insensitive lookup of the canonical algorithm.
impl FromStr for SigningAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(s))
            .with_context(|| format!("unsupported signing algorithm '{s}'"))
    }
}

impl TryFrom<String> for SigningAlgorithm {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

/// Sign `claims` as a compact JWT.
pub fn sign_claims(claims: Map<String, Json>, alg: SigningAlgorithm, key: &Jwk) -> Result<String> {
    let mut header = JwsHeader::new();
    header.set_token_type("JWT");
    if let Some(kid) = key.key_id() {
        header.set_key_id(kid);
    }

    let payload = JwtPayload::from_map(claims).context("claims are not a valid JWT payload")?;
    let signer = alg.signer(key)?;
    jwt::encode_with_signer(&payload, &header, &*signer).context("unable to sign JWT")
}

/// Verify a compact JWT against a set of candidate keys and return its claims.
///
/// Keys are narrowed by the header's `kid` (when present), then by key type
/// and `use`. The first key that verifies the signature wins.
pub fn verify_claims(token: &str, keys: &[Jwk]) -> Result<Map<String, Json>> {
    let header = peek_header(token)?;
    let alg: SigningAlgorithm = header
        .get("alg")
        .and_then(Json::as_str)
        .context("token header has no 'alg'")?
        .parse()?;
    let kid = header.get("kid").and_then(Json::as_str);

    let candidates = keys
        .iter()
        .filter(|key| kid.map_or(true, |kid| key.key_id() == Some(kid)))
        .filter(|key| alg.fits(key))
        .filter(|key| key.key_use().map_or(true, |u| u == "sig"));

    let mut tried = 0;
    for key in candidates {
        tried += 1;
        let verifier = alg.verifier(key)?;
        match jwt::decode_with_verifier(token, &*verifier) {
            Ok((payload, _)) => return Ok(payload.claims_set().clone()),
            Err(e) => tracing::debug!("signature verification with key {:?} failed: {e}", key.key_id()),
        }
    }

    if tried == 0 {
        bail!("no key in the client's key set can verify a {alg} signature")
    }
    bail!("signature could not be verified with any of the client's keys")
}

/// Decode the claims of an unsecured (`alg: none`) JWT.
pub fn decode_unsecured_claims(token: &str) -> Result<Map<String, Json>> {
    let (payload, _) = jwt::decode_unsecured(token).context("invalid unsecured JWT")?;
    Ok(payload.claims_set().clone())
}

/// Decode the protected header of a compact JWS or JWE without verifying it.
pub(crate) fn peek_header(token: &str) -> Result<Map<String, Json>> {
    decode_segment(token, 0).context("invalid token header")
}

/// Decode the payload of a compact JWS without verifying it.
///
/// Only for locating verification material; the result is not trusted.
pub(crate) fn peek_claims(token: &str) -> Result<Map<String, Json>> {
    decode_segment(token, 1).context("invalid token payload")
}

fn decode_segment(token: &str, index: usize) -> Result<Map<String, Json>> {
    let encoded = token
        .split('.')
        .nth(index)
        .context("token has too few segments")?;
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .context("segment is not base64url encoded")?;
    serde_json::from_slice(&bytes).context("segment is not a JSON object")
}

/// Whether `s` has the shape of a compact JWS: three base64url segments, the
/// last one possibly empty.
pub fn is_compact_jws(s: &str) -> bool {
    let parts: Vec<&str> = s.trim().split('.').collect();
    let is_b64url = |p: &str| {
        p.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    };
    parts.len() == 3
        && !parts[0].is_empty()
        && !parts[1].is_empty()
        && parts.iter().all(|p| is_b64url(p))
}

/// RFC 7638 JWK thumbprint (SHA-256, base64url).
pub fn jwk_thumbprint(jwk: &Jwk) -> Result<String> {
    let required: &[&str] = match jwk.key_type() {
        "EC" => &["crv", "kty", "x", "y"],
        "RSA" => &["e", "kty", "n"],
        "OKP" => &["crv", "kty", "x"],
        "oct" => &["k", "kty"],
        other => bail!("cannot compute a thumbprint for key type '{other}'"),
    };

    let mut members = BTreeMap::new();
    for name in required {
        let value = jwk
            .parameter(name)
            .with_context(|| format!("JWK is missing '{name}'"))?;
        members.insert(*name, value);
    }

    let canonical = serde_json::to_vec(&members)?;
    Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(canonical)))
}
