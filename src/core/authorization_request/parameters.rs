use std::fmt;

use crate::core::object::{TypedParameter, UntypedObject};
use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use url::Url;

const DID: &str = "did";
const ENTITY_ID: &str = "entity_id";
const PREREGISTERED: &str = "pre-registered";
const REDIRECT_URI: &str = "redirect_uri";
const X509_SAN_DNS: &str = "x509_san_dns";
const X509_SAN_URI: &str = "x509_san_uri";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ClientIdScheme {
    Did,
    EntityId,
    PreRegistered,
    RedirectUri,
    X509SanDns,
    X509SanUri,
    Other(String),
}

impl TypedParameter for ClientId {
    const KEY: &'static str = "client_id";
}

impl TryFrom<Json> for ClientId {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<ClientId> for Json {
    fn from(value: ClientId) -> Self {
        Json::String(value.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TypedParameter for ClientIdScheme {
    const KEY: &'static str = "client_id_scheme";
}

impl ClientIdScheme {
    /// The scheme a client id implies when no `client_id_scheme` is sent.
    pub fn implied_by(client_id: &ClientId) -> Self {
        if client_id.0.starts_with("did:") {
            ClientIdScheme::Did
        } else {
            ClientIdScheme::PreRegistered
        }
    }
}

impl From<String> for ClientIdScheme {
    fn from(s: String) -> Self {
        match s.as_str() {
            DID => ClientIdScheme::Did,
            ENTITY_ID => ClientIdScheme::EntityId,
            PREREGISTERED => ClientIdScheme::PreRegistered,
            REDIRECT_URI => ClientIdScheme::RedirectUri,
            X509_SAN_DNS => ClientIdScheme::X509SanDns,
            X509_SAN_URI => ClientIdScheme::X509SanUri,
            _ => ClientIdScheme::Other(s),
        }
    }
}

impl From<ClientIdScheme> for String {
    fn from(cis: ClientIdScheme) -> Self {
        match cis {
            ClientIdScheme::Other(u) => u,
            known => known.to_string(),
        }
    }
}

impl TryFrom<Json> for ClientIdScheme {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
            .map(String::into)
            .map_err(Error::from)
    }
}

impl From<ClientIdScheme> for Json {
    fn from(value: ClientIdScheme) -> Self {
        Json::String(value.into())
    }
}

impl fmt::Display for ClientIdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIdScheme::Did => DID,
            ClientIdScheme::EntityId => ENTITY_ID,
            ClientIdScheme::PreRegistered => PREREGISTERED,
            ClientIdScheme::RedirectUri => REDIRECT_URI,
            ClientIdScheme::X509SanDns => X509_SAN_DNS,
            ClientIdScheme::X509SanUri => X509_SAN_URI,
            ClientIdScheme::Other(o) => o,
        }
        .fmt(f)
    }
}

/// `client_metadata` field in the Authorization Request.
#[derive(Debug, Clone)]
pub struct ClientMetadata(pub UntypedObject);

impl TypedParameter for ClientMetadata {
    const KEY: &'static str = "client_metadata";
}

impl From<ClientMetadata> for Json {
    fn from(cm: ClientMetadata) -> Self {
        cm.0.into()
    }
}

impl TryFrom<Json> for ClientMetadata {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        UntypedObject::try_from(value).map(ClientMetadata)
    }
}

/// `client_metadata_uri` field in the Authorization Request.
#[derive(Debug, Clone)]
pub struct ClientMetadataUri(pub Url);

impl TypedParameter for ClientMetadataUri {
    const KEY: &'static str = "client_metadata_uri";
}

impl From<ClientMetadataUri> for Json {
    fn from(cmu: ClientMetadataUri) -> Self {
        cmu.0.to_string().into()
    }
}

impl TryFrom<Json> for ClientMetadataUri {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value).map(ClientMetadataUri)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce(pub String);

impl TypedParameter for Nonce {
    const KEY: &'static str = "nonce";
}

impl TryFrom<Json> for Nonce {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<Nonce> for Json {
    fn from(value: Nonce) -> Self {
        Json::String(value.0)
    }
}

/// `redirect_uri` field in the Authorization Request.
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectUri(pub Url);

impl TypedParameter for RedirectUri {
    const KEY: &'static str = "redirect_uri";
}

impl From<RedirectUri> for Json {
    fn from(cmu: RedirectUri) -> Self {
        cmu.0.to_string().into()
    }
}

impl TryFrom<Json> for RedirectUri {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value).map(RedirectUri)?)
    }
}

/// `response_uri` field in the Authorization Request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseUri(pub Url);

impl TypedParameter for ResponseUri {
    const KEY: &'static str = "response_uri";
}

impl From<ResponseUri> for Json {
    fn from(cmu: ResponseUri) -> Self {
        cmu.0.to_string().into()
    }
}

impl TryFrom<Json> for ResponseUri {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value).map(ResponseUri)?)
    }
}

const DIRECT_POST: &str = "direct_post";
const DIRECT_POST_JWT: &str = "direct_post.jwt";
const FRAGMENT: &str = "fragment";
const QUERY: &str = "query";
const FORM_POST: &str = "form_post";

/// How the authorization response travels back to the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ResponseMode {
    /// The `direct_post` response mode as defined in OID4VP.
    DirectPost,
    /// The `direct_post.jwt` response mode as defined in OID4VP.
    DirectPostJwt,
    /// Parameters in the fragment of the `redirect_uri`.
    #[default]
    Fragment,
    /// Parameters in the query of the `redirect_uri`.
    Query,
    /// An auto-submitting HTML form posted to the `redirect_uri`.
    FormPost,
}

impl ResponseMode {
    /// Whether the response is posted to a `response_uri` rather than
    /// delivered through the `redirect_uri`.
    pub fn is_direct_post(&self) -> bool {
        matches!(self, ResponseMode::DirectPost | ResponseMode::DirectPostJwt)
    }

    /// Whether the mode itself requires a JWT-secured response.
    pub fn is_jwt(&self) -> bool {
        matches!(self, ResponseMode::DirectPostJwt)
    }
}

impl TypedParameter for ResponseMode {
    const KEY: &'static str = "response_mode";
}

impl TryFrom<String> for ResponseMode {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ok(match s.as_str() {
            DIRECT_POST => ResponseMode::DirectPost,
            DIRECT_POST_JWT => ResponseMode::DirectPostJwt,
            FRAGMENT => ResponseMode::Fragment,
            QUERY => ResponseMode::Query,
            FORM_POST => ResponseMode::FormPost,
            _ => bail!("unsupported response mode '{s}'"),
        })
    }
}

impl From<ResponseMode> for String {
    fn from(s: ResponseMode) -> Self {
        s.to_string()
    }
}

impl TryFrom<Json> for ResponseMode {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        let s: String = serde_json::from_value(value)?;
        s.try_into()
    }
}

impl From<ResponseMode> for Json {
    fn from(rm: ResponseMode) -> Self {
        String::from(rm).into()
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::DirectPost => DIRECT_POST,
            ResponseMode::DirectPostJwt => DIRECT_POST_JWT,
            ResponseMode::Fragment => FRAGMENT,
            ResponseMode::Query => QUERY,
            ResponseMode::FormPost => FORM_POST,
        }
        .fmt(f)
    }
}

const ID_TOKEN: &str = "id_token";
const VP_TOKEN: &str = "vp_token";
const VP_TOKEN_ID_TOKEN: &str = "vp_token id_token";
const ID_TOKEN_VP_TOKEN: &str = "id_token vp_token";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(into = "String", from = "String")]
pub enum ResponseType {
    IdToken,
    VpToken,
    VpTokenIdToken,
    Unsupported(String),
}

impl From<ResponseType> for String {
    fn from(rt: ResponseType) -> Self {
        match rt {
            ResponseType::IdToken => ID_TOKEN.into(),
            ResponseType::VpToken => VP_TOKEN.into(),
            ResponseType::VpTokenIdToken => VP_TOKEN_ID_TOKEN.into(),
            ResponseType::Unsupported(s) => s,
        }
    }
}

impl From<String> for ResponseType {
    fn from(s: String) -> Self {
        match s.as_str() {
            ID_TOKEN => ResponseType::IdToken,
            VP_TOKEN => ResponseType::VpToken,
            VP_TOKEN_ID_TOKEN | ID_TOKEN_VP_TOKEN => ResponseType::VpTokenIdToken,
            _ => ResponseType::Unsupported(s),
        }
    }
}

impl TypedParameter for ResponseType {
    const KEY: &'static str = "response_type";
}

impl TryFrom<Json> for ResponseType {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        let s: String = serde_json::from_value(value)?;
        Ok(s.into())
    }
}

impl From<ResponseType> for Json {
    fn from(rt: ResponseType) -> Self {
        Json::String(rt.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State(pub String);

impl TypedParameter for State {
    const KEY: &'static str = "state";
}

impl TryFrom<Json> for State {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<State> for Json {
    fn from(value: State) -> Self {
        Json::String(value.0)
    }
}

/// `scope` field: a space separated list of scope values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope(pub Vec<String>);

impl Scope {
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl TypedParameter for Scope {
    const KEY: &'static str = "scope";
}

impl TryFrom<Json> for Scope {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        let s: String = serde_json::from_value(value)?;
        Ok(Self(s.split_whitespace().map(ToOwned::to_owned).collect()))
    }
}

impl From<Scope> for Json {
    fn from(value: Scope) -> Self {
        Json::String(value.0.join(" "))
    }
}

const SUBJECT_SIGNED_ID_TOKEN: &str = "subject_signed_id_token";
const ATTESTER_SIGNED_ID_TOKEN: &str = "attester_signed_id_token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdTokenKind {
    SubjectSigned,
    AttesterSigned,
}

/// `id_token_type` field: a space separated list, `subject_signed_id_token`
/// when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTokenType(pub Vec<IdTokenKind>);

impl Default for IdTokenType {
    fn default() -> Self {
        Self(vec![IdTokenKind::SubjectSigned])
    }
}

impl TypedParameter for IdTokenType {
    const KEY: &'static str = "id_token_type";
}

impl TryFrom<Json> for IdTokenType {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        let s: String = serde_json::from_value(value)?;
        let kinds = s
            .split_whitespace()
            .map(|kind| match kind {
                SUBJECT_SIGNED_ID_TOKEN => Ok(IdTokenKind::SubjectSigned),
                ATTESTER_SIGNED_ID_TOKEN => Ok(IdTokenKind::AttesterSigned),
                other => bail!("unknown id token type '{other}'"),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if kinds.is_empty() {
            bail!("id_token_type is empty")
        }
        Ok(Self(kinds))
    }
}

impl From<IdTokenType> for Json {
    fn from(value: IdTokenType) -> Self {
        let kinds: Vec<&str> = value
            .0
            .iter()
            .map(|kind| match kind {
                IdTokenKind::SubjectSigned => SUBJECT_SIGNED_ID_TOKEN,
                IdTokenKind::AttesterSigned => ATTESTER_SIGNED_ID_TOKEN,
            })
            .collect();
        Json::String(kinds.join(" "))
    }
}

#[derive(Debug, Clone)]
pub struct PresentationDefinition(pub Json);

impl TypedParameter for PresentationDefinition {
    const KEY: &'static str = "presentation_definition";
}

impl TryFrom<Json> for PresentationDefinition {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(value).map(Self)
    }
}

impl From<PresentationDefinition> for Json {
    fn from(value: PresentationDefinition) -> Self {
        value.0
    }
}

#[derive(Debug, Clone)]
pub struct PresentationDefinitionUri(pub Url);

impl TypedParameter for PresentationDefinitionUri {
    const KEY: &'static str = "presentation_definition_uri";
}

impl TryFrom<Json> for PresentationDefinitionUri {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value).map(Self)?)
    }
}

impl From<PresentationDefinitionUri> for Json {
    fn from(value: PresentationDefinitionUri) -> Self {
        value.0.to_string().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_type_accepts_both_orders() {
        for raw in ["vp_token id_token", "id_token vp_token"] {
            let rt = ResponseType::try_from(json!(raw)).unwrap();
            assert_eq!(rt, ResponseType::VpTokenIdToken);
        }
        assert_eq!(
            ResponseType::try_from(json!("code")).unwrap(),
            ResponseType::Unsupported("code".into())
        );
    }

    #[test]
    fn response_mode_is_closed() {
        assert_eq!(
            ResponseMode::try_from(json!("direct_post.jwt")).unwrap(),
            ResponseMode::DirectPostJwt
        );
        assert!(ResponseMode::try_from(json!("web_message")).is_err());
        assert_eq!(ResponseMode::default(), ResponseMode::Fragment);
    }

    #[test]
    fn id_token_type_is_space_separated() {
        let t = IdTokenType::try_from(json!("attester_signed_id_token subject_signed_id_token"))
            .unwrap();
        assert_eq!(
            t.0,
            vec![IdTokenKind::AttesterSigned, IdTokenKind::SubjectSigned]
        );
        assert!(IdTokenType::try_from(json!("")).is_err());
    }

    #[test]
    fn implied_client_id_scheme() {
        assert_eq!(
            ClientIdScheme::implied_by(&ClientId("did:example:verifier".into())),
            ClientIdScheme::Did
        );
        assert_eq!(
            ClientIdScheme::implied_by(&ClientId("https://client.example.org/cb".into())),
            ClientIdScheme::PreRegistered
        );
    }
}
