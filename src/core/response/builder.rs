//! Construction of authorization responses.
//!
//! The verifier's client metadata decides the shape of the response:
//!
//! | `*_signed_response_alg` | `*_encrypted_response_*` | payload                  |
//! |-------------------------|--------------------------|--------------------------|
//! | absent                  | absent                   | plain parameters         |
//! | declared                | absent                   | JWS                      |
//! | absent                  | declared                 | JWE over the JWT claims  |
//! | declared                | declared                 | JWE over the JWS         |
//!
//! `direct_post.jwt` with nothing declared is answered with a JWS signed
//! with the wallet's preferred algorithm.

use std::time::{SystemTime, UNIX_EPOCH};

use josekit::jwk::Jwk;
use serde_json::{Map, Value as Json};

use super::{
    parameters::{ErrorDescription, IdToken, ResponseError, VpToken},
    AuthorizationResponse, ClientConsent, ResponsePayload,
};
use crate::{
    config::WalletConfiguration,
    core::{
        authorization_request::{
            parameters::IdTokenKind,
            resolved::{RequestContext, ResolvedRequestData},
        },
        jwe::{find_encryption_jwk, JweBuilder, KeyManagementAlgorithm},
        jws::{jwk_thumbprint, sign_claims, SigningAlgorithm},
        metadata::{ResponseEncryption, SubjectSyntaxType, ValidatedClientMetaData},
        object::UntypedObject,
    },
};

/// Lifetime of signed artifacts, in seconds.
const EXPIRY: u64 = 600;

const JWK_THUMBPRINT_PREFIX: &str = "urn:ietf:params:oauth:jwk-thumbprint:sha-256:";

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{consent} consent does not answer a {request} request")]
    ConsentMismatch {
        request: &'static str,
        consent: &'static str,
    },
    #[error("no signing algorithm is shared with the verifier, which accepts: {0}")]
    NoCompatibleAlgorithm(String),
    #[error("the verifier declares no key usable with {0}")]
    MissingEncryptionKey(KeyManagementAlgorithm),
    #[error("none of the wallet's subject syntax types is accepted by the verifier")]
    SubjectSyntaxTypeMismatch,
    #[error("the request does not ask for an id_token")]
    IdTokenNotRequested,
    #[error("only subject signed id tokens can be issued")]
    UnsupportedIdTokenType,
    #[error("unable to sign: {0:#}")]
    Signing(anyhow::Error),
    #[error("unable to encrypt: {0:#}")]
    Encryption(anyhow::Error),
    #[error("unable to encode response parameters: {0:#}")]
    Encoding(anyhow::Error),
}

fn request_kind(resolved: &ResolvedRequestData) -> &'static str {
    match resolved {
        ResolvedRequestData::IdToken(_) => "id_token",
        ResolvedRequestData::VpToken(_) => "vp_token",
        ResolvedRequestData::IdAndVpToken(_) => "vp_token id_token",
        ResolvedRequestData::NotSecured(_) => "unsecured",
    }
}

fn consent_kind(consent: &ClientConsent) -> &'static str {
    match consent {
        ClientConsent::Negative { .. } => "negative",
        ClientConsent::IdToken { .. } => "id_token",
        ClientConsent::VpToken { .. } => "vp_token",
        ClientConsent::IdAndVpToken { .. } => "vp_token id_token",
    }
}

/// Builds [AuthorizationResponse]s and self-issued id tokens on behalf of a wallet.
pub struct ResponseBuilder<'a> {
    config: &'a WalletConfiguration,
}

impl<'a> ResponseBuilder<'a> {
    pub fn new(config: &'a WalletConfiguration) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        resolved: &ResolvedRequestData,
        consent: ClientConsent,
    ) -> Result<AuthorizationResponse, BuildError> {
        let params = response_parameters(resolved, consent)?;
        let context = resolved.context();
        let metadata = context.client_metadata();
        let response_mode = context.response_mode();

        let encryption = metadata.authorization_encryption();
        let signing = match metadata.authorization_signed_response_alg() {
            [] if response_mode.is_jwt() && encryption.is_none() => {
                Some(self.preferred_algorithm()?)
            }
            [] => None,
            declared => Some(self.negotiate(declared)?),
        };

        if signing.is_none() && encryption.is_none() {
            tracing::debug!("responding with plain parameters");
            return Ok(AuthorizationResponse::new(
                ResponsePayload::Params(params),
                response_mode,
                context.return_uri().cloned(),
            ));
        }

        let claims = self.jwt_claims(params.into_inner(), context, metadata)?;
        let payload = self.secure(claims, signing, encryption, metadata.jwks())?;

        Ok(AuthorizationResponse::new(
            payload,
            response_mode,
            context.return_uri().cloned(),
        ))
    }

    /// Issue a self-issued id token (SIOPv2) for the request.
    ///
    /// `holder_claims` (e.g. `email`, `name`) are included as given; the
    /// registered claims are set by the builder.
    pub fn id_token(
        &self,
        resolved: &ResolvedRequestData,
        holder_claims: Map<String, Json>,
    ) -> Result<IdToken, BuildError> {
        let id_token_type = match resolved {
            ResolvedRequestData::IdToken(data) => data.id_token_type(),
            ResolvedRequestData::IdAndVpToken(data) => data.id_token_type(),
            _ => return Err(BuildError::IdTokenNotRequested),
        };
        if !id_token_type.0.contains(&IdTokenKind::SubjectSigned) {
            return Err(BuildError::UnsupportedIdTokenType);
        }

        let context = resolved.context();
        let metadata = context.client_metadata();
        let alg = match metadata.id_token_signed_response_alg() {
            [] => self.preferred_algorithm()?,
            declared => self.negotiate(declared)?,
        };

        let mut claims = self.jwt_claims(holder_claims, context, metadata)?;
        if let Some(Json::String(subject)) = claims.get("iss").cloned() {
            if subject.starts_with(JWK_THUMBPRINT_PREFIX) {
                let public = self.public_signing_key()?;
                claims.insert("sub_jwk".into(), public.as_ref().clone().into());
            }
            claims.insert("sub".into(), subject.into());
        }

        let jws = sign_claims(claims, alg, self.config.signing_key.as_ref())
            .map_err(BuildError::Signing)?;
        let token = match metadata.id_token_encryption() {
            Some(encryption) => {
                let builder = JweBuilder::new().nested_jwt(&jws);
                self.encrypt(builder, encryption, metadata.jwks())?
            }
            None => jws,
        };
        Ok(IdToken(token))
    }

    fn secure(
        &self,
        claims: Map<String, Json>,
        signing: Option<SigningAlgorithm>,
        encryption: Option<ResponseEncryption>,
        verifier_keys: &[Jwk],
    ) -> Result<ResponsePayload, BuildError> {
        let jws = signing
            .map(|alg| {
                tracing::debug!("signing response with {alg}");
                sign_claims(claims.clone(), alg, self.config.signing_key.as_ref())
                    .map_err(BuildError::Signing)
            })
            .transpose()?;

        let Some(encryption) = encryption else {
            return jws
                .map(ResponsePayload::Jwt)
                .ok_or_else(|| BuildError::Signing(anyhow::anyhow!("no signing algorithm")));
        };

        let builder = match &jws {
            Some(jws) => JweBuilder::new().nested_jwt(jws),
            None => JweBuilder::new()
                .claims(&claims)
                .map_err(BuildError::Encoding)?,
        };
        self.encrypt(builder, encryption, verifier_keys)
            .map(ResponsePayload::Jwe)
    }

    fn encrypt(
        &self,
        builder: JweBuilder,
        ResponseEncryption { alg, enc }: ResponseEncryption,
        verifier_keys: &[Jwk],
    ) -> Result<String, BuildError> {
        if !self.config.supports_key_management(alg) {
            return Err(BuildError::NoCompatibleAlgorithm(alg.to_string()));
        }
        if !self.config.supports_content_encryption(enc) {
            return Err(BuildError::NoCompatibleAlgorithm(enc.to_string()));
        }

        let key = find_encryption_jwk(verifier_keys, alg)
            .map_err(|_| BuildError::MissingEncryptionKey(alg))?;
        tracing::debug!("encrypting response with {alg} and {enc}");

        builder
            .recipient_key(key.clone())
            .alg(alg)
            .enc(enc)
            .build()
            .map_err(BuildError::Encryption)
    }

    /// `claims` plus the registered claims binding them to the request.
    fn jwt_claims(
        &self,
        mut claims: Map<String, Json>,
        context: &RequestContext,
        metadata: &ValidatedClientMetaData,
    ) -> Result<Map<String, Json>, BuildError> {
        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();

        claims.insert("iss".into(), self.subject_identity(metadata)?.into());
        claims.insert("aud".into(), context.client().id.0.clone().into());
        claims.insert("iat".into(), issued_at.into());
        claims.insert("exp".into(), (issued_at + EXPIRY).into());
        claims.insert("nonce".into(), context.nonce().0.clone().into());
        Ok(claims)
    }

    /// First wallet subject syntax type the verifier accepts, or the
    /// wallet's preferred one if the verifier declares none.
    fn subject_identity(&self, metadata: &ValidatedClientMetaData) -> Result<String, BuildError> {
        let declared = metadata.subject_syntax_types_supported();
        let did_method = self.config.decentralized_identifier.method();

        let accepts = |wallet: &SubjectSyntaxType| {
            declared.is_empty()
                || declared.iter().any(|verifier| match (verifier, wallet) {
                    (SubjectSyntaxType::Did { method: None }, SubjectSyntaxType::Did { .. }) => true,
                    (
                        SubjectSyntaxType::Did {
                            method: Some(method),
                        },
                        SubjectSyntaxType::Did { .. },
                    ) => method == did_method,
                    (SubjectSyntaxType::JwkThumbprint, SubjectSyntaxType::JwkThumbprint) => true,
                    _ => false,
                })
        };

        let chosen = self
            .config
            .subject_syntax_types_supported
            .iter()
            .filter(|wallet| !matches!(wallet, SubjectSyntaxType::Other(_)))
            .find(|wallet| accepts(wallet))
            .ok_or(BuildError::SubjectSyntaxTypeMismatch)?;
        tracing::debug!("using subject syntax type {chosen}");

        match chosen {
            SubjectSyntaxType::JwkThumbprint => {
                let thumbprint =
                    jwk_thumbprint(&self.public_signing_key()?).map_err(BuildError::Signing)?;
                Ok(format!("{JWK_THUMBPRINT_PREFIX}{thumbprint}"))
            }
            _ => Ok(self.config.decentralized_identifier.to_string()),
        }
    }

    fn public_signing_key(&self) -> Result<Jwk, BuildError> {
        self.config
            .public_signing_key()
            .map_err(BuildError::Signing)
    }

    /// First verifier-declared algorithm the wallet can sign with.
    fn negotiate(&self, declared: &[SigningAlgorithm]) -> Result<SigningAlgorithm, BuildError> {
        let supported = self.config.signing_algorithms();
        declared
            .iter()
            .copied()
            .find(|alg| supported.contains(alg))
            .ok_or_else(|| {
                let names: Vec<&str> = declared.iter().map(|alg| alg.name()).collect();
                BuildError::NoCompatibleAlgorithm(names.join(", "))
            })
    }

    fn preferred_algorithm(&self) -> Result<SigningAlgorithm, BuildError> {
        self.config
            .signing_algorithms()
            .first()
            .copied()
            .ok_or_else(|| BuildError::NoCompatibleAlgorithm("none".into()))
    }
}

/// The response parameters for a consent, `state` echoed.
fn response_parameters(
    resolved: &ResolvedRequestData,
    consent: ClientConsent,
) -> Result<UntypedObject, BuildError> {
    let mismatch = BuildError::ConsentMismatch {
        request: request_kind(resolved),
        consent: consent_kind(&consent),
    };

    let mut params = UntypedObject::default();
    let result = match (resolved, consent) {
        (_, ClientConsent::Negative { reason }) => params
            .insert(ResponseError(ResponseError::ACCESS_DENIED.into()))
            .and_then(|_| params.insert(ErrorDescription(reason))),
        (ResolvedRequestData::IdToken(_), ClientConsent::IdToken { id_token }) => {
            params.insert(id_token)
        }
        (
            ResolvedRequestData::VpToken(_),
            ClientConsent::VpToken {
                vp_token,
                presentation_submission,
            },
        ) => insert_vp_token(&mut params, vp_token)
            .and_then(|_| params.insert(presentation_submission)),
        (
            ResolvedRequestData::IdAndVpToken(_),
            ClientConsent::IdAndVpToken {
                id_token,
                vp_token,
                presentation_submission,
            },
        ) => params
            .insert(id_token)
            .and_then(|_| insert_vp_token(&mut params, vp_token))
            .and_then(|_| params.insert(presentation_submission)),
        _ => return Err(mismatch),
    };
    result.map_err(BuildError::Encoding)?;

    if let Some(state) = resolved.state() {
        params
            .insert(state.clone())
            .map_err(BuildError::Encoding)?;
    }
    Ok(params)
}

fn insert_vp_token(params: &mut UntypedObject, vp_token: VpToken) -> anyhow::Result<()> {
    params.insert(vp_token)
}
