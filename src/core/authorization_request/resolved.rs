//! Authorization requests after resolution and validation.

use url::Url;

use super::parameters::{ClientId, ClientIdScheme, IdTokenType, Nonce, ResponseMode, Scope, State};
use crate::core::{
    credential_format::ClaimFormatMap, metadata::ValidatedClientMetaData,
    presentation_definition::PresentationDefinition,
};

/// The verifier as identified by the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: ClientId,
    pub scheme: ClientIdScheme,
}

/// Parameters every resolved request carries.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub(crate) client: Client,
    pub(crate) client_metadata: ValidatedClientMetaData,
    pub(crate) nonce: Nonce,
    pub(crate) response_mode: ResponseMode,
    pub(crate) return_uri: Option<Url>,
    pub(crate) state: Option<State>,
}

impl RequestContext {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_metadata(&self) -> &ValidatedClientMetaData {
        &self.client_metadata
    }

    /// Echoed unmodified in every signed artifact.
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    pub fn response_mode(&self) -> ResponseMode {
        self.response_mode
    }

    /// `response_uri` for direct post modes, `redirect_uri` otherwise.
    pub fn return_uri(&self) -> Option<&Url> {
        self.return_uri.as_ref()
    }

    pub fn state(&self) -> Option<&State> {
        self.state.as_ref()
    }
}

/// A SIOPv2 request.
#[derive(Debug, Clone)]
pub struct IdTokenData {
    pub(crate) context: RequestContext,
    pub(crate) id_token_type: IdTokenType,
    pub(crate) presentation_definition: Option<PresentationDefinition>,
    pub(crate) scope: Option<Scope>,
}

impl IdTokenData {
    pub fn id_token_type(&self) -> &IdTokenType {
        &self.id_token_type
    }

    pub fn presentation_definition(&self) -> Option<&PresentationDefinition> {
        self.presentation_definition.as_ref()
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }
}

/// An OpenID4VP request.
#[derive(Debug, Clone)]
pub struct VpTokenData {
    pub(crate) context: RequestContext,
    pub(crate) presentation_definition: PresentationDefinition,
}

impl VpTokenData {
    pub fn presentation_definition(&self) -> &PresentationDefinition {
        &self.presentation_definition
    }
}

/// A combined SIOPv2 and OpenID4VP request.
#[derive(Debug, Clone)]
pub struct IdAndVpTokenData {
    pub(crate) context: RequestContext,
    pub(crate) id_token_type: IdTokenType,
    pub(crate) presentation_definition: PresentationDefinition,
    pub(crate) scope: Option<Scope>,
}

impl IdAndVpTokenData {
    pub fn id_token_type(&self) -> &IdTokenType {
        &self.id_token_type
    }

    pub fn presentation_definition(&self) -> &PresentationDefinition {
        &self.presentation_definition
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    /// Formats the verifier accepts, as declared in its metadata.
    pub fn vp_formats(&self) -> &ClaimFormatMap {
        self.context.client_metadata.vp_formats()
    }
}

/// A request object secured with `alg: none`.
///
/// Its origin cannot be established, so it can only be declined. The client
/// metadata is left empty.
#[derive(Debug, Clone)]
pub struct UnsecuredRequest {
    pub(crate) context: RequestContext,
}

/// The outcome of resolving an authorization request.
#[derive(Debug, Clone)]
pub enum ResolvedRequestData {
    IdToken(IdTokenData),
    VpToken(VpTokenData),
    IdAndVpToken(IdAndVpTokenData),
    NotSecured(UnsecuredRequest),
}

impl ResolvedRequestData {
    pub fn context(&self) -> &RequestContext {
        match self {
            ResolvedRequestData::IdToken(data) => &data.context,
            ResolvedRequestData::VpToken(data) => &data.context,
            ResolvedRequestData::IdAndVpToken(data) => &data.context,
            ResolvedRequestData::NotSecured(data) => &data.context,
        }
    }

    pub fn client(&self) -> &Client {
        self.context().client()
    }

    pub fn nonce(&self) -> &Nonce {
        self.context().nonce()
    }

    pub fn state(&self) -> Option<&State> {
        self.context().state()
    }

    pub fn response_mode(&self) -> ResponseMode {
        self.context().response_mode()
    }

    pub fn return_uri(&self) -> Option<&Url> {
        self.context().return_uri()
    }

    pub fn client_metadata(&self) -> &ValidatedClientMetaData {
        self.context().client_metadata()
    }

    /// The definition to match claims against, if the request asks for one.
    pub fn presentation_definition(&self) -> Option<&PresentationDefinition> {
        match self {
            ResolvedRequestData::IdToken(data) => data.presentation_definition(),
            ResolvedRequestData::VpToken(data) => Some(data.presentation_definition()),
            ResolvedRequestData::IdAndVpToken(data) => Some(data.presentation_definition()),
            ResolvedRequestData::NotSecured(_) => None,
        }
    }
}
