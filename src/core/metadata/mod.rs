use std::fmt;

use josekit::jwk::Jwk;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use self::parameters::verifier::{
    AuthorizationEncryptedResponseAlg, AuthorizationEncryptedResponseEnc,
    AuthorizationSignedResponseAlg, IdTokenEncryptedResponseAlg, IdTokenEncryptedResponseEnc,
    IdTokenSignedResponseAlg, JwksUri, SubjectSyntaxTypesSupported, VpFormats, JWKs,
};

use super::{
    credential_format::ClaimFormatMap,
    jwe::{ContentEncryption, KeyManagementAlgorithm},
    jws::SigningAlgorithm,
    object::{TypedParameter, UntypedObject},
    util::{Transport, TransportError},
};

pub mod parameters;

const DID: &str = "did";
const JWK_THUMBPRINT: &str = "urn:ietf:params:oauth:jwk-thumbprint";

/// Identifier scheme of the holder's `iss`/`sub` claim.
///
/// `did` accepts any DID method, `did:<method>` only that method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SubjectSyntaxType {
    Did { method: Option<String> },
    JwkThumbprint,
    Other(String),
}

impl From<String> for SubjectSyntaxType {
    fn from(s: String) -> Self {
        if s == DID {
            return SubjectSyntaxType::Did { method: None };
        }
        if let Some(method) = s.strip_prefix("did:") {
            return SubjectSyntaxType::Did {
                method: Some(method.to_owned()),
            };
        }
        if s == JWK_THUMBPRINT {
            return SubjectSyntaxType::JwkThumbprint;
        }
        SubjectSyntaxType::Other(s)
    }
}

impl From<SubjectSyntaxType> for String {
    fn from(value: SubjectSyntaxType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SubjectSyntaxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectSyntaxType::Did { method: None } => f.write_str(DID),
            SubjectSyntaxType::Did {
                method: Some(method),
            } => write!(f, "{DID}:{method}"),
            SubjectSyntaxType::JwkThumbprint => f.write_str(JWK_THUMBPRINT),
            SubjectSyntaxType::Other(other) => f.write_str(other),
        }
    }
}

/// Key management and content encryption algorithm declared for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseEncryption {
    pub alg: KeyManagementAlgorithm,
    pub enc: ContentEncryption,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientMetaDataError {
    #[error("invalid client metadata: {0}")]
    InvalidClientMetaData(String),
    #[error("unable to retrieve client metadata: {0}")]
    Unreachable(#[from] TransportError),
}

fn invalid(reason: impl fmt::Display) -> ClientMetaDataError {
    ClientMetaDataError::InvalidClientMetaData(reason.to_string())
}

/// Client metadata that passed validation.
///
/// Algorithm names are canonical, the key set is resolved, and empty
/// algorithm lists mean "not declared".
#[derive(Debug, Clone, Default)]
pub struct ValidatedClientMetaData {
    jwks: Vec<Jwk>,
    id_token_signed_response_alg: Vec<SigningAlgorithm>,
    id_token_encryption: Option<ResponseEncryption>,
    authorization_signed_response_alg: Vec<SigningAlgorithm>,
    authorization_encryption: Option<ResponseEncryption>,
    subject_syntax_types_supported: Vec<SubjectSyntaxType>,
    vp_formats: ClaimFormatMap,
}

impl ValidatedClientMetaData {
    pub fn jwks(&self) -> &[Jwk] {
        &self.jwks
    }

    pub fn id_token_signed_response_alg(&self) -> &[SigningAlgorithm] {
        &self.id_token_signed_response_alg
    }

    pub fn id_token_encryption(&self) -> Option<ResponseEncryption> {
        self.id_token_encryption
    }

    /// Signing algorithms for the authorization response, in verifier preference order.
    pub fn authorization_signed_response_alg(&self) -> &[SigningAlgorithm] {
        &self.authorization_signed_response_alg
    }

    pub fn authorization_encryption(&self) -> Option<ResponseEncryption> {
        self.authorization_encryption
    }

    pub fn subject_syntax_types_supported(&self) -> &[SubjectSyntaxType] {
        &self.subject_syntax_types_supported
    }

    pub fn vp_formats(&self) -> &ClaimFormatMap {
        &self.vp_formats
    }
}

/// Validates raw `client_metadata` into [ValidatedClientMetaData].
///
/// The only suspension point is the retrieval of `jwks_uri`, which happens
/// after every other check passed.
pub struct ClientMetaDataValidator<'a> {
    transport: &'a dyn Transport,
}

impl<'a> ClientMetaDataValidator<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    pub async fn validate(
        &self,
        raw: &UntypedObject,
    ) -> Result<ValidatedClientMetaData, ClientMetaDataError> {
        let jwks = parameter::<JWKs>(raw)?;
        let jwks_uri = parameter::<JwksUri>(raw)?;
        if jwks.is_some() && jwks_uri.is_some() {
            return Err(invalid("both 'jwks' and 'jwks_uri' are present"));
        }

        let authorization_encryption = encryption(
            parameter::<AuthorizationEncryptedResponseAlg>(raw)?.map(|p| p.0),
            parameter::<AuthorizationEncryptedResponseEnc>(raw)?.map(|p| p.0),
            "authorization",
        )?;
        let id_token_encryption = encryption(
            parameter::<IdTokenEncryptedResponseAlg>(raw)?.map(|p| p.0),
            parameter::<IdTokenEncryptedResponseEnc>(raw)?.map(|p| p.0),
            "id_token",
        )?;

        if (authorization_encryption.is_some() || id_token_encryption.is_some())
            && jwks.is_none()
            && jwks_uri.is_none()
        {
            return Err(invalid(
                "encrypted responses are requested but neither 'jwks' nor 'jwks_uri' is given",
            ));
        }

        let authorization_signed_response_alg = signing_algorithms(
            parameter::<AuthorizationSignedResponseAlg>(raw)?.map(|p| p.0),
        )?;
        let id_token_signed_response_alg =
            signing_algorithms(parameter::<IdTokenSignedResponseAlg>(raw)?.map(|p| p.0))?;

        let subject_syntax_types_supported = parameter::<SubjectSyntaxTypesSupported>(raw)?
            .map(|p| p.0.into_iter().map(SubjectSyntaxType::from).collect())
            .unwrap_or_default();

        let vp_formats = parameter::<VpFormats>(raw)?
            .map(|p| p.0)
            .unwrap_or_default();

        let keys = match (jwks, jwks_uri) {
            (Some(JWKs { keys }), _) => keys,
            (None, Some(JwksUri(uri))) => {
                tracing::debug!("fetching client key set from {uri}");
                let body = self.transport.fetch(&uri).await?;
                serde_json::from_slice::<JWKs>(&body)
                    .map_err(|e| invalid(format!("'jwks_uri' did not resolve to a key set: {e}")))?
                    .keys
            }
            (None, None) => Vec::new(),
        };
        let jwks = keys
            .into_iter()
            .map(parse_jwk)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedClientMetaData {
            jwks,
            id_token_signed_response_alg,
            id_token_encryption,
            authorization_signed_response_alg,
            authorization_encryption,
            subject_syntax_types_supported,
            vp_formats,
        })
    }
}

fn parameter<T: TypedParameter>(raw: &UntypedObject) -> Result<Option<T>, ClientMetaDataError> {
    raw.get::<T>()
        .transpose()
        .map_err(|e| invalid(format!("'{}' could not be parsed: {e:#}", T::KEY)))
}

fn encryption(
    alg: Option<String>,
    enc: Option<String>,
    artifact: &str,
) -> Result<Option<ResponseEncryption>, ClientMetaDataError> {
    match (alg, enc) {
        (None, None) => Ok(None),
        (Some(alg), Some(enc)) => Ok(Some(ResponseEncryption {
            alg: alg.parse().map_err(invalid)?,
            enc: enc.parse().map_err(invalid)?,
        })),
        (Some(_), None) => Err(invalid(format!(
            "'{artifact}_encrypted_response_alg' is declared without '{artifact}_encrypted_response_enc'"
        ))),
        (None, Some(_)) => Err(invalid(format!(
            "'{artifact}_encrypted_response_enc' is declared without '{artifact}_encrypted_response_alg'"
        ))),
    }
}

fn signing_algorithms(
    declared: Option<Vec<String>>,
) -> Result<Vec<SigningAlgorithm>, ClientMetaDataError> {
    declared
        .unwrap_or_default()
        .iter()
        .map(|alg| alg.parse().map_err(invalid))
        .collect()
}

fn parse_jwk(map: Map<String, Json>) -> Result<Jwk, ClientMetaDataError> {
    Jwk::from_map(map).map_err(|e| invalid(format!("invalid JWK in key set: {e}")))
}
