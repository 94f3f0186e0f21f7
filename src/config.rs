use std::{collections::BTreeMap, fmt};

use anyhow::{anyhow, bail, Context, Error};
use josekit::jwk::Jwk;
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use ssi::dids::DIDBuf;

use crate::{
    core::{
        authorization_request::parameters::{ClientId, ClientIdScheme},
        credential_format::ClaimFormatMap,
        jwe::{ContentEncryption, KeyManagementAlgorithm},
        jws::SigningAlgorithm,
        metadata::{parameters::verifier::JWKs, SubjectSyntaxType},
    },
    utils::NonEmptyVec,
};

/// Static configuration of a wallet.
///
/// Loaded from JSON:
///
/// ```
/// # use siop_openid4vp::config::WalletConfiguration;
/// let config: WalletConfiguration = serde_json::from_value(serde_json::json!({
///     "subject_syntax_types_supported": ["did:example", "urn:ietf:params:oauth:jwk-thumbprint"],
///     "decentralized_identifier": "did:example:123",
///     "signing_key": {
///         "kty": "EC",
///         "crv": "P-256",
///         "x": "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
///         "y": "x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0",
///         "d": "jpsQnnGQmL-YBIffH1136cspYG6-0iY7X1fCE9-E9LI"
///     },
///     "supported_client_id_schemes": ["pre-registered", "did"]
/// }))
/// .unwrap();
///
/// assert_eq!(config.decentralized_identifier.method(), "example");
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct WalletConfiguration {
    /// The first entry is the preferred one.
    pub subject_syntax_types_supported: NonEmptyVec<SubjectSyntaxType>,
    pub decentralized_identifier: DecentralizedIdentifier,
    pub signing_key: SigningKey,
    /// Public keys published by the wallet. Defaults to the public part of
    /// the signing key.
    #[serde(default)]
    pub signing_key_set: Option<KeySet>,
    /// Accepted client id schemes, every scheme when empty.
    #[serde(default)]
    pub supported_client_id_schemes: Vec<ClientIdScheme>,
    /// Request object keys of the clients known to the wallet.
    #[serde(default)]
    pub preregistered_clients: PreRegisteredClients,
    #[serde(default)]
    pub vp_formats_supported: ClaimFormatMap,
    /// Restricts the signing algorithms, otherwise derived from the signing key.
    #[serde(default)]
    pub signing_alg_values_supported: Vec<SigningAlgorithm>,
    #[serde(default)]
    pub authorization_encryption_alg_values_supported: Vec<KeyManagementAlgorithm>,
    #[serde(default)]
    pub authorization_encryption_enc_values_supported: Vec<ContentEncryption>,
}

impl WalletConfiguration {
    /// Algorithms the wallet signs with, in preference order.
    pub fn signing_algorithms(&self) -> Vec<SigningAlgorithm> {
        if self.signing_alg_values_supported.is_empty() {
            return SigningAlgorithm::usable_with(self.signing_key.as_ref()).collect();
        }
        self.signing_alg_values_supported
            .iter()
            .copied()
            .filter(|alg| alg.fits(self.signing_key.as_ref()))
            .collect()
    }

    pub fn supports_key_management(&self, alg: KeyManagementAlgorithm) -> bool {
        self.authorization_encryption_alg_values_supported.is_empty()
            || self.authorization_encryption_alg_values_supported.contains(&alg)
    }

    pub fn supports_content_encryption(&self, enc: ContentEncryption) -> bool {
        self.authorization_encryption_enc_values_supported.is_empty()
            || self.authorization_encryption_enc_values_supported.contains(&enc)
    }

    /// The public key matching the signing key: from the key set by `kid`,
    /// otherwise derived from the signing key.
    pub fn public_signing_key(&self) -> Result<Jwk, Error> {
        let kid = self.signing_key.as_ref().key_id();
        if let (Some(set), Some(kid)) = (&self.signing_key_set, kid) {
            if let Some(key) = set.0.iter().find(|key| key.key_id() == Some(kid)) {
                return Ok(key.clone());
            }
        }
        self.signing_key.public_key()
    }
}

/// A DID of the form `did:<method>:<method-specific-id>`.
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct DecentralizedIdentifier(DIDBuf);

impl DecentralizedIdentifier {
    pub fn method(&self) -> &str {
        self.0.method_name()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for DecentralizedIdentifier {
    type Error = Error;

    fn try_from(did: String) -> Result<Self, Self::Error> {
        DIDBuf::from_string(did.clone())
            .map(Self)
            .map_err(|_| anyhow!("'{did}' is not a DID"))
    }
}

impl fmt::Display for DecentralizedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

/// A private JWK usable for at least one [SigningAlgorithm].
#[derive(Deserialize, Debug, Clone)]
#[serde(try_from = "Map<String, Json>")]
pub struct SigningKey(Jwk);

impl SigningKey {
    pub fn public_key(&self) -> Result<Jwk, Error> {
        self.0
            .to_public_key()
            .context("unable to derive the public signing key")
    }
}

impl AsRef<Jwk> for SigningKey {
    fn as_ref(&self) -> &Jwk {
        &self.0
    }
}

impl TryFrom<Jwk> for SigningKey {
    type Error = Error;

    fn try_from(jwk: Jwk) -> Result<Self, Self::Error> {
        if jwk.parameter("d").is_none() {
            bail!("signing key must be a private key")
        }
        if SigningAlgorithm::usable_with(&jwk).next().is_none() {
            bail!(
                "no supported signing algorithm works with a '{}' key",
                jwk.key_type()
            )
        }
        Ok(Self(jwk))
    }
}

impl TryFrom<Map<String, Json>> for SigningKey {
    type Error = Error;

    fn try_from(map: Map<String, Json>) -> Result<Self, Self::Error> {
        Jwk::from_map(map)
            .context("signing key is not a valid JWK")?
            .try_into()
    }
}

/// A set of public JWKs, `{"keys": [...]}`.
#[derive(Deserialize, Debug, Clone)]
#[serde(try_from = "JWKs")]
pub struct KeySet(pub Vec<Jwk>);

impl TryFrom<JWKs> for KeySet {
    type Error = Error;

    fn try_from(jwks: JWKs) -> Result<Self, Self::Error> {
        jwks.keys
            .into_iter()
            .map(|map| {
                let jwk = Jwk::from_map(map).context("key set holds an invalid JWK")?;
                if jwk.parameter("d").is_some() {
                    bail!("key set must only hold public keys")
                }
                Ok(jwk)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// Public keys of pre-registered clients, by `client_id`:
/// `{"<client_id>": {"keys": [...]}}`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct PreRegisteredClients(BTreeMap<String, KeySet>);

impl PreRegisteredClients {
    pub fn keys(&self, client_id: &ClientId) -> Option<&[Jwk]> {
        self.0.get(&client_id.0).map(|set| set.0.as_slice())
    }
}
