use std::{fmt, str::FromStr};

use anyhow::{bail, Context, Error, Result};
use josekit::{
    jwe::{self, JweEncrypter, JweHeader},
    jwk::Jwk,
};
use serde::Deserialize;

/// JWE key management algorithms this library can encrypt to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum KeyManagementAlgorithm {
    EcdhEs,
    EcdhEsA128Kw,
    EcdhEsA192Kw,
    EcdhEsA256Kw,
    RsaOaep,
    RsaOaep256,
}

impl KeyManagementAlgorithm {
    pub const ALL: [KeyManagementAlgorithm; 6] = [
        KeyManagementAlgorithm::EcdhEs,
        KeyManagementAlgorithm::EcdhEsA128Kw,
        KeyManagementAlgorithm::EcdhEsA192Kw,
        KeyManagementAlgorithm::EcdhEsA256Kw,
        KeyManagementAlgorithm::RsaOaep,
        KeyManagementAlgorithm::RsaOaep256,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KeyManagementAlgorithm::EcdhEs => "ECDH-ES",
            KeyManagementAlgorithm::EcdhEsA128Kw => "ECDH-ES+A128KW",
            KeyManagementAlgorithm::EcdhEsA192Kw => "ECDH-ES+A192KW",
            KeyManagementAlgorithm::EcdhEsA256Kw => "ECDH-ES+A256KW",
            KeyManagementAlgorithm::RsaOaep => "RSA-OAEP",
            KeyManagementAlgorithm::RsaOaep256 => "RSA-OAEP-256",
        }
    }

    /// Whether `jwk` has a key type and curve this algorithm can encrypt to.
    pub fn fits(self, jwk: &Jwk) -> bool {
        match self {
            KeyManagementAlgorithm::EcdhEs
            | KeyManagementAlgorithm::EcdhEsA128Kw
            | KeyManagementAlgorithm::EcdhEsA192Kw
            | KeyManagementAlgorithm::EcdhEsA256Kw => match jwk.key_type() {
                "EC" => matches!(jwk.curve(), Some("P-256") | Some("P-384") | Some("P-521")),
                "OKP" => matches!(jwk.curve(), Some("X25519") | Some("X448")),
                _ => false,
            },
            KeyManagementAlgorithm::RsaOaep | KeyManagementAlgorithm::RsaOaep256 => {
                jwk.key_type() == "RSA"
            }
        }
    }

    /// A fresh encrypter; ECDH variants generate a new ephemeral key on every
    /// encryption.
    pub fn encrypter(self, jwk: &Jwk) -> Result<Box<dyn JweEncrypter>> {
        let encrypter: Box<dyn JweEncrypter> = match self {
            KeyManagementAlgorithm::EcdhEs => Box::new(jwe::ECDH_ES.encrypter_from_jwk(jwk)?),
            KeyManagementAlgorithm::EcdhEsA128Kw => {
                Box::new(jwe::ECDH_ES_A128KW.encrypter_from_jwk(jwk)?)
            }
            KeyManagementAlgorithm::EcdhEsA192Kw => {
                Box::new(jwe::ECDH_ES_A192KW.encrypter_from_jwk(jwk)?)
            }
            KeyManagementAlgorithm::EcdhEsA256Kw => {
                Box::new(jwe::ECDH_ES_A256KW.encrypter_from_jwk(jwk)?)
            }
            KeyManagementAlgorithm::RsaOaep => Box::new(jwe::RSA_OAEP.encrypter_from_jwk(jwk)?),
            KeyManagementAlgorithm::RsaOaep256 => {
                Box::new(jwe::RSA_OAEP_256.encrypter_from_jwk(jwk)?)
            }
        };
        Ok(encrypter)
    }
}

impl FromStr for KeyManagementAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(s))
            .with_context(|| format!("unsupported key management algorithm '{s}'"))
    }
}

impl TryFrom<String> for KeyManagementAlgorithm {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for KeyManagementAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

/// JWE content encryption algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ContentEncryption {
    A128CbcHs256,
    A192CbcHs384,
    A256CbcHs512,
    A128Gcm,
    A192Gcm,
    A256Gcm,
}

impl ContentEncryption {
    pub const ALL: [ContentEncryption; 6] = [
        ContentEncryption::A128CbcHs256,
        ContentEncryption::A192CbcHs384,
        ContentEncryption::A256CbcHs512,
        ContentEncryption::A128Gcm,
        ContentEncryption::A192Gcm,
        ContentEncryption::A256Gcm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ContentEncryption::A128CbcHs256 => "A128CBC-HS256",
            ContentEncryption::A192CbcHs384 => "A192CBC-HS384",
            ContentEncryption::A256CbcHs512 => "A256CBC-HS512",
            ContentEncryption::A128Gcm => "A128GCM",
            ContentEncryption::A192Gcm => "A192GCM",
            ContentEncryption::A256Gcm => "A256GCM",
        }
    }
}

impl FromStr for ContentEncryption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|enc| enc.name().eq_ignore_ascii_case(s))
            .with_context(|| format!("unsupported content encryption algorithm '{s}'"))
    }
}

impl TryFrom<String> for ContentEncryption {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for ContentEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

/// Builder for compact JWE authorization responses.
///
/// The plaintext is either a compact JWS (nested JWT, `cty: JWT`) or the JSON
/// serialization of the response claims.
#[derive(Debug, Clone, Default)]
pub struct JweBuilder {
    plaintext: Option<Vec<u8>>,
    nested_jwt: bool,
    recipient_key: Option<Jwk>,
    alg: Option<KeyManagementAlgorithm>,
    enc: Option<ContentEncryption>,
}

impl JweBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt a signed JWT.
    pub fn nested_jwt(mut self, jws: &str) -> Self {
        self.plaintext = Some(jws.as_bytes().to_vec());
        self.nested_jwt = true;
        self
    }

    /// Encrypt a set of claims directly.
    pub fn claims(mut self, claims: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        self.plaintext = Some(serde_json::to_vec(claims).context("unable to serialize claims")?);
        self.nested_jwt = false;
        Ok(self)
    }

    pub fn recipient_key(mut self, jwk: Jwk) -> Self {
        self.recipient_key = Some(jwk);
        self
    }

    pub fn alg(mut self, alg: KeyManagementAlgorithm) -> Self {
        self.alg = Some(alg);
        self
    }

    pub fn enc(mut self, enc: ContentEncryption) -> Self {
        self.enc = Some(enc);
        self
    }

    /// Encrypts and returns the five-part compact serialization.
    ///
    /// If the recipient key has a `kid`, the JWE header carries it.
    pub fn build(self) -> Result<String> {
        let plaintext = self.plaintext.context("plaintext is required")?;
        let recipient_key = self.recipient_key.context("recipient_key is required")?;
        let alg = self.alg.context("alg is required")?;
        let enc = self.enc.context("enc is required")?;

        let mut header = JweHeader::new();
        header.set_content_encryption(enc.name());
        if self.nested_jwt {
            header.set_content_type("JWT");
        } else {
            header.set_token_type("JWT");
        }
        if let Some(kid) = recipient_key.key_id() {
            header.set_key_id(kid);
        }

        let encrypter = alg.encrypter(&recipient_key)?;
        jwe::serialize_compact(&plaintext, &header, &*encrypter).context("encryption failed")
    }
}

/// Select the verifier key to encrypt to.
///
/// A key qualifies when its `use` is `enc` (or absent), its type fits `alg`,
/// and its own `alg`, if declared, equals `alg`. The first qualifying key in
/// set order is returned.
pub fn find_encryption_jwk<'a>(keys: &'a [Jwk], alg: KeyManagementAlgorithm) -> Result<&'a Jwk> {
    for jwk in keys {
        match jwk.key_use() {
            Some("enc") => {}
            Some(other) => {
                tracing::debug!("JWK has use='{other}', not suitable for encryption");
                continue;
            }
            None => {
                tracing::warn!("JWK missing 'use' parameter, assuming it can be used for encryption");
            }
        }

        if let Some(declared) = jwk.algorithm() {
            if declared != alg.name() {
                tracing::debug!("JWK has alg '{declared}', looking for '{alg}', skipping");
                continue;
            }
        }

        if !alg.fits(jwk) {
            tracing::debug!(
                "JWK of type {} ({:?}) cannot be used with {alg}, skipping",
                jwk.key_type(),
                jwk.curve()
            );
            continue;
        }

        tracing::debug!("Selected encryption key: alg={alg}, kid={:?}", jwk.key_id());
        return Ok(jwk);
    }

    bail!("no suitable encryption key found in JWKS for {alg}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use josekit::jwk::alg::ec::EcCurve;
    use serde_json::{json, Map, Value as Json};

    fn encryption_key() -> (Jwk, Jwk) {
        let private = Jwk::generate_ec_key(EcCurve::P256).unwrap();
        let mut public = private.to_public_key().unwrap();
        public.set_key_use("enc");
        public.set_key_id("enc-key-1");
        (private, public)
    }

    #[test]
    fn jwe_builder_encrypts_claims() {
        let (private, public) = encryption_key();
        let Json::Object(claims) = json!({"vp_token": "token", "state": "abc123"}) else {
            unreachable!()
        };

        let token = JweBuilder::new()
            .claims(&claims)
            .unwrap()
            .recipient_key(public)
            .alg(KeyManagementAlgorithm::EcdhEs)
            .enc(ContentEncryption::A128CbcHs256)
            .build()
            .unwrap();

        assert_eq!(token.split('.').count(), 5);

        let decrypter = jwe::ECDH_ES.decrypter_from_jwk(&private).unwrap();
        let (plaintext, header) = jwe::deserialize_compact(&token, &decrypter).unwrap();
        assert_eq!(header.key_id(), Some("enc-key-1"));
        let decrypted: Map<String, Json> = serde_json::from_slice(&plaintext).unwrap();
        assert_eq!(decrypted, claims);
    }

    #[test]
    fn ephemeral_keys_are_fresh() {
        let (_, public) = encryption_key();
        let build = || {
            JweBuilder::new()
                .nested_jwt("a.b.c")
                .recipient_key(public.clone())
                .alg(KeyManagementAlgorithm::EcdhEs)
                .enc(ContentEncryption::A256Gcm)
                .build()
                .unwrap()
        };

        let header = |token: &str| crate::core::jws::peek_header(token).unwrap();
        let (first, second) = (header(&build()), header(&build()));
        assert_eq!(first.get("cty"), Some(&json!("JWT")));
        assert_ne!(first.get("epk"), second.get("epk"));
    }

    #[test]
    fn jwe_builder_missing_key() {
        let result = JweBuilder::new()
            .nested_jwt("a.b.c")
            .alg(KeyManagementAlgorithm::EcdhEs)
            .enc(ContentEncryption::A128Gcm)
            .build();

        assert!(result.unwrap_err().to_string().contains("recipient_key"));
    }

    #[test]
    fn find_encryption_jwk_skips_signing_keys() {
        let (_, enc) = encryption_key();
        let mut sig = Jwk::generate_ec_key(EcCurve::P256)
            .unwrap()
            .to_public_key()
            .unwrap();
        sig.set_key_use("sig");

        let keys = vec![sig, enc];
        let selected = find_encryption_jwk(&keys, KeyManagementAlgorithm::EcdhEs).unwrap();
        assert_eq!(selected.key_id(), Some("enc-key-1"));
    }

    #[test]
    fn find_encryption_jwk_respects_key_type() {
        let (_, enc) = encryption_key();
        assert!(find_encryption_jwk(&[enc], KeyManagementAlgorithm::RsaOaep256).is_err());
    }

    #[test]
    fn algorithm_lookup_is_case_insensitive() {
        assert_eq!(
            "ecdh-es+a128kw".parse::<KeyManagementAlgorithm>().unwrap(),
            KeyManagementAlgorithm::EcdhEsA128Kw
        );
        assert_eq!(
            "a128cbc-hs256".parse::<ContentEncryption>().unwrap(),
            ContentEncryption::A128CbcHs256
        );
        assert!("dir".parse::<KeyManagementAlgorithm>().is_err());
    }
}
