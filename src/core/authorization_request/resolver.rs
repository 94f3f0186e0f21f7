//! Resolution of raw authorization requests into [ResolvedRequestData].
//!
//! Resolution is atomic: either every parameter resolves, or an error is
//! returned and nothing is kept.

use std::collections::BTreeMap;

use serde_json::Value as Json;
use url::Url;

use super::{
    parameters::{
        ClientId, ClientIdScheme, ClientMetadata, ClientMetadataUri, IdTokenType, Nonce,
        PresentationDefinition as PresentationDefinitionParameter, PresentationDefinitionUri,
        RedirectUri, ResponseMode, ResponseType, ResponseUri, Scope, State,
    },
    resolved::{
        Client, IdAndVpTokenData, IdTokenData, RequestContext, ResolvedRequestData,
        UnsecuredRequest, VpTokenData,
    },
    verification::{self, RequestVerifier},
    AuthorizationRequest, RequestIndirection,
};
use crate::core::{
    jws::is_compact_jws,
    metadata::{ClientMetaDataError, ClientMetaDataValidator, ValidatedClientMetaData},
    object::{TypedParameter, UntypedObject},
    presentation_definition::PresentationDefinition,
    util::{Transport, TransportError},
};

/// Presentation definitions known in advance, by `scope` value.
pub type PredefinedDefinitions = BTreeMap<String, PresentationDefinition>;

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("required parameter '{0}' is missing")]
    MissingParameter(&'static str),
    #[error("parameter '{parameter}' is invalid: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },
    #[error("unsupported response_type '{0}'")]
    UnsupportedResponseType(String),
    #[error("{0}")]
    UnsupportedResponseMode(String),
    #[error("unsupported client_id_scheme '{0}'")]
    UnsupportedClientIdScheme(ClientIdScheme),
    #[error("client_id '{outer}' does not match the request object's client_id '{inner}'")]
    ClientIdMismatch { outer: ClientId, inner: ClientId },
    #[error("invalid request object: {0}")]
    InvalidRequestObject(String),
    #[error("request object could not be retrieved: {0}")]
    RequestObjectUnreachable(#[source] TransportError),
    #[error("both 'presentation_definition' and 'presentation_definition_uri' are present")]
    AmbiguousDefinitionSource,
    #[error("presentation definition could not be resolved: {0}")]
    PresentationDefinitionResolution(String),
    #[error(transparent)]
    ClientMetaData(#[from] ClientMetaDataError),
}

/// Where the presentation definition of a request comes from.
enum DefinitionSource {
    Inline(Json),
    Reference(Url),
    Predefined(PresentationDefinition),
}

type SourceRule =
    fn(&UntypedObject, &PredefinedDefinitions) -> Option<Result<DefinitionSource, ResolutionError>>;

/// Evaluated in order; the first rule that applies decides.
const DEFINITION_SOURCES: &[(&str, SourceRule)] = &[
    ("ambiguous", ambiguous_source),
    ("inline", inline_source),
    ("by reference", reference_source),
    ("predefined scope", predefined_source),
];

fn ambiguous_source(
    params: &UntypedObject,
    _: &PredefinedDefinitions,
) -> Option<Result<DefinitionSource, ResolutionError>> {
    (params.contains::<PresentationDefinitionParameter>()
        && params.contains::<PresentationDefinitionUri>())
    .then(|| Err(ResolutionError::AmbiguousDefinitionSource))
}

fn inline_source(
    params: &UntypedObject,
    _: &PredefinedDefinitions,
) -> Option<Result<DefinitionSource, ResolutionError>> {
    params
        .get::<PresentationDefinitionParameter>()
        .map(|parameter| {
            parameter
                .map(|p| DefinitionSource::Inline(p.0))
                .map_err(definition_error)
        })
}

fn reference_source(
    params: &UntypedObject,
    _: &PredefinedDefinitions,
) -> Option<Result<DefinitionSource, ResolutionError>> {
    params.get::<PresentationDefinitionUri>().map(|parameter| {
        parameter
            .map(|p| DefinitionSource::Reference(p.0))
            .map_err(definition_error)
    })
}

fn predefined_source(
    params: &UntypedObject,
    predefined: &PredefinedDefinitions,
) -> Option<Result<DefinitionSource, ResolutionError>> {
    let scope = match params.get::<Scope>()? {
        Ok(scope) => scope,
        Err(e) => return Some(Err(invalid_parameter::<Scope>(e))),
    };
    let definition = scope
        .values()
        .find_map(|value| predefined.get(value))
        .cloned();
    definition.map(|definition| Ok(DefinitionSource::Predefined(definition)))
}

fn definition_error(e: impl std::fmt::Display) -> ResolutionError {
    ResolutionError::PresentationDefinitionResolution(e.to_string())
}

fn invalid_parameter<T: TypedParameter>(e: anyhow::Error) -> ResolutionError {
    ResolutionError::InvalidParameter {
        parameter: T::KEY,
        reason: format!("{e:#}"),
    }
}

fn optional<T: TypedParameter>(params: &UntypedObject) -> Result<Option<T>, ResolutionError> {
    params
        .get::<T>()
        .transpose()
        .map_err(invalid_parameter::<T>)
}

fn required<T: TypedParameter>(params: &UntypedObject) -> Result<T, ResolutionError> {
    optional::<T>(params)?.ok_or(ResolutionError::MissingParameter(T::KEY))
}

fn parse_definition(value: Json) -> Result<PresentationDefinition, ResolutionError> {
    serde_json::from_value(value)
        .map_err(|e| definition_error(format!("malformed presentation definition: {e}")))
}

/// Validated client metadata, given inline or by reference.
///
/// Absent metadata validates as empty.
async fn resolve_client_metadata(
    params: &UntypedObject,
    transport: &dyn Transport,
) -> Result<ValidatedClientMetaData, ResolutionError> {
    let raw = match (
        optional::<ClientMetadata>(params)?,
        optional::<ClientMetadataUri>(params)?,
    ) {
        (Some(_), Some(_)) => {
            return Err(ResolutionError::InvalidParameter {
                parameter: ClientMetadataUri::KEY,
                reason: "'client_metadata' and 'client_metadata_uri' are mutually exclusive"
                    .into(),
            })
        }
        (Some(ClientMetadata(raw)), None) => raw,
        (None, Some(ClientMetadataUri(uri))) => {
            tracing::debug!("fetching client metadata from {uri}");
            let body = transport
                .fetch(&uri)
                .await
                .map_err(ClientMetaDataError::from)?;
            serde_json::from_slice::<UntypedObject>(&body).map_err(|e| {
                ClientMetaDataError::InvalidClientMetaData(format!(
                    "'client_metadata_uri' did not resolve to a JSON object: {e}"
                ))
            })?
        }
        (None, None) => UntypedObject::default(),
    };

    Ok(ClientMetaDataValidator::new(transport)
        .validate(&raw)
        .await?)
}

/// A request object as obtained from `request` or `request_uri`.
enum RequestObject {
    Token(String),
    Params(UntypedObject),
}

/// Turns [AuthorizationRequest]s into [ResolvedRequestData].
///
/// Signed request objects are verified with the keys `verifier` holds for
/// the client, before anything they reference is fetched.
pub struct Resolver<'a> {
    transport: &'a dyn Transport,
    predefined_definitions: &'a PredefinedDefinitions,
    verifier: &'a dyn RequestVerifier,
    supported_client_id_schemes: &'a [ClientIdScheme],
}

impl<'a> Resolver<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        predefined_definitions: &'a PredefinedDefinitions,
        verifier: &'a dyn RequestVerifier,
    ) -> Self {
        Self {
            transport,
            predefined_definitions,
            verifier,
            supported_client_id_schemes: &[],
        }
    }

    /// Restrict the accepted client id schemes. An empty list accepts any.
    pub fn with_supported_client_id_schemes(mut self, schemes: &'a [ClientIdScheme]) -> Self {
        self.supported_client_id_schemes = schemes;
        self
    }

    pub async fn resolve(
        &self,
        request: AuthorizationRequest,
    ) -> Result<ResolvedRequestData, ResolutionError> {
        let (client_id, indirection) = match request {
            AuthorizationRequest::Params(params) => return self.resolve_params(params).await,
            AuthorizationRequest::RequestObject {
                client_id,
                indirection,
            } => (client_id, indirection),
        };

        let request_object = match indirection {
            RequestIndirection::ByValue(jwt) => RequestObject::Token(jwt),
            RequestIndirection::ByReference(uri) => self.fetch_request_object(&uri).await?,
        };

        match request_object {
            RequestObject::Params(params) => {
                check_client_id(&client_id, &params)?;
                self.resolve_params(params).await
            }
            RequestObject::Token(jwt) if verification::is_unsecured(&jwt)? => {
                let params = verification::decode_unsecured_request_object(&jwt)?;
                check_client_id(&client_id, &params)?;
                self.unsecured(&params).map(ResolvedRequestData::NotSecured)
            }
            RequestObject::Token(jwt) => {
                let params = verification::verify_request_object(&jwt, self.verifier).await?;
                check_client_id(&client_id, &params)?;
                self.resolve_params(params).await
            }
        }
    }

    async fn fetch_request_object(&self, uri: &Url) -> Result<RequestObject, ResolutionError> {
        tracing::debug!("fetching request object from {uri}");
        let body = self
            .transport
            .fetch(uri)
            .await
            .map_err(ResolutionError::RequestObjectUnreachable)?;

        let body = String::from_utf8(body).map_err(|_| {
            ResolutionError::InvalidRequestObject("request_uri body is not UTF-8".into())
        })?;
        let body = body.trim();

        if is_compact_jws(body) {
            return Ok(RequestObject::Token(body.to_owned()));
        }
        serde_json::from_str::<UntypedObject>(body)
            .map(RequestObject::Params)
            .map_err(|_| {
                ResolutionError::InvalidRequestObject(
                    "request_uri body is neither a compact JWS nor a JSON object".into(),
                )
            })
    }

    fn client(&self, params: &UntypedObject) -> Result<Client, ResolutionError> {
        let id: ClientId = required(params)?;
        let scheme = optional::<ClientIdScheme>(params)?
            .unwrap_or_else(|| ClientIdScheme::implied_by(&id));

        if !self.supported_client_id_schemes.is_empty()
            && !self.supported_client_id_schemes.contains(&scheme)
        {
            return Err(ResolutionError::UnsupportedClientIdScheme(scheme));
        }
        Ok(Client { id, scheme })
    }

    /// Everything but the client metadata, which is left empty.
    fn context(&self, params: &UntypedObject) -> Result<RequestContext, ResolutionError> {
        let client = self.client(params)?;
        let nonce: Nonce = required(params)?;
        let (response_mode, return_uri) = return_target(params, &client)?;
        let state = optional::<State>(params)?;

        Ok(RequestContext {
            client,
            client_metadata: ValidatedClientMetaData::default(),
            nonce,
            response_mode,
            return_uri,
            state,
        })
    }

    fn unsecured(&self, params: &UntypedObject) -> Result<UnsecuredRequest, ResolutionError> {
        Ok(UnsecuredRequest {
            context: self.context(params)?,
        })
    }

    async fn resolve_params(
        &self,
        params: UntypedObject,
    ) -> Result<ResolvedRequestData, ResolutionError> {
        let response_type: ResponseType = required(&params)?;
        if let ResponseType::Unsupported(response_type) = response_type {
            return Err(ResolutionError::UnsupportedResponseType(response_type));
        }
        let context = self.context(&params)?;

        let client_metadata = resolve_client_metadata(&params, self.transport).await?;
        let context = RequestContext {
            client_metadata,
            ..context
        };
        let presentation_definition = self.presentation_definition(&params).await?;

        let resolved = match response_type {
            ResponseType::IdToken => ResolvedRequestData::IdToken(IdTokenData {
                context,
                id_token_type: id_token_type(&params)?,
                presentation_definition,
                scope: optional(&params)?,
            }),
            ResponseType::VpToken => ResolvedRequestData::VpToken(VpTokenData {
                context,
                presentation_definition: presentation_definition.ok_or_else(missing_definition)?,
            }),
            ResponseType::VpTokenIdToken => ResolvedRequestData::IdAndVpToken(IdAndVpTokenData {
                context,
                id_token_type: id_token_type(&params)?,
                presentation_definition: presentation_definition.ok_or_else(missing_definition)?,
                scope: optional(&params)?,
            }),
            ResponseType::Unsupported(response_type) => {
                return Err(ResolutionError::UnsupportedResponseType(response_type))
            }
        };

        tracing::debug!(
            "resolved request from client '{}' ({})",
            resolved.client().id,
            resolved.client().scheme
        );
        Ok(resolved)
    }

    async fn presentation_definition(
        &self,
        params: &UntypedObject,
    ) -> Result<Option<PresentationDefinition>, ResolutionError> {
        let source = DEFINITION_SOURCES
            .iter()
            .find_map(|(name, rule)| {
                let source = rule(params, self.predefined_definitions)?;
                tracing::debug!("presentation definition source: {name}");
                Some(source)
            })
            .transpose()?;

        match source {
            None => Ok(None),
            Some(DefinitionSource::Inline(value)) => parse_definition(value).map(Some),
            Some(DefinitionSource::Reference(uri)) => {
                let body = self.transport.fetch(&uri).await.map_err(definition_error)?;
                let value = serde_json::from_slice(&body).map_err(|e| {
                    definition_error(format!("'{uri}' did not resolve to JSON: {e}"))
                })?;
                parse_definition(value).map(Some)
            }
            Some(DefinitionSource::Predefined(definition)) => Ok(Some(definition)),
        }
    }
}

fn missing_definition() -> ResolutionError {
    ResolutionError::PresentationDefinitionResolution(
        "no presentation definition is given and no scope maps to one".into(),
    )
}

fn id_token_type(params: &UntypedObject) -> Result<IdTokenType, ResolutionError> {
    params
        .get_or_default::<IdTokenType>()
        .map_err(invalid_parameter::<IdTokenType>)
}

fn check_client_id(outer: &ClientId, params: &UntypedObject) -> Result<(), ResolutionError> {
    let inner: ClientId = required(params)?;
    if inner != *outer {
        return Err(ResolutionError::ClientIdMismatch {
            outer: outer.clone(),
            inner,
        });
    }
    Ok(())
}

/// The response mode and the URI the response goes to.
fn return_target(
    params: &UntypedObject,
    client: &Client,
) -> Result<(ResponseMode, Option<Url>), ResolutionError> {
    let response_mode = match params.get::<ResponseMode>() {
        None => ResponseMode::default(),
        Some(Ok(response_mode)) => response_mode,
        Some(Err(e)) => return Err(ResolutionError::UnsupportedResponseMode(format!("{e:#}"))),
    };

    let response_uri = optional::<ResponseUri>(params)?;
    let redirect_uri = optional::<RedirectUri>(params)?;

    if response_mode.is_direct_post() {
        if redirect_uri.is_some() {
            return Err(ResolutionError::InvalidParameter {
                parameter: RedirectUri::KEY,
                reason: format!("not allowed with response_mode '{response_mode}'"),
            });
        }
        let ResponseUri(uri) = response_uri.ok_or(ResolutionError::MissingParameter(ResponseUri::KEY))?;
        return Ok((response_mode, Some(uri)));
    }

    if response_uri.is_some() {
        return Err(ResolutionError::InvalidParameter {
            parameter: ResponseUri::KEY,
            reason: format!("not allowed with response_mode '{response_mode}'"),
        });
    }

    let return_uri = match (redirect_uri, &client.scheme) {
        (Some(RedirectUri(uri)), ClientIdScheme::RedirectUri) if uri.as_str() != client.id.0 => {
            return Err(ResolutionError::InvalidParameter {
                parameter: RedirectUri::KEY,
                reason: "must equal the client_id for the redirect_uri client id scheme".into(),
            })
        }
        (Some(RedirectUri(uri)), _) => Some(uri),
        (None, ClientIdScheme::RedirectUri) => {
            Some(client.id.0.parse().map_err(|e| ResolutionError::InvalidParameter {
                parameter: ClientId::KEY,
                reason: format!("not a valid URI: {e}"),
            })?)
        }
        (None, _) => None,
    };
    Ok((response_mode, return_uri))
}
