pub use crate::core::authorization_request::parameters::State;
pub use crate::core::presentation_submission::PresentationSubmission;
use crate::core::object::TypedParameter;

use anyhow::Error;
use serde_json::{Map, Value as Json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdToken(pub String);

impl TypedParameter for IdToken {
    const KEY: &'static str = "id_token";
}

impl TryFrom<Json> for IdToken {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        serde_json::from_value(value).map(Self).map_err(Into::into)
    }
}

impl From<IdToken> for Json {
    fn from(value: IdToken) -> Self {
        value.0.into()
    }
}

/// OpenID Connect for Verifiable Presentations specification defines `vp_token` parameter:
///
/// > JSON String or JSON object that MUST contain a single Verifiable Presentation or
/// > an array of JSON Strings and JSON objects each of them containing a Verifiable Presentations.
///
/// Strings are carried verbatim: the wallet already holds them in their wire encoding.
///
/// See: [OpenID.VP#section-6.1-2.2](https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6.1-2.2)
#[derive(Debug, Clone, PartialEq)]
pub enum VpToken {
    Single(String),
    SingleAsMap(Map<String, Json>),
    Many(Vec<VpToken>),
}

impl TypedParameter for VpToken {
    const KEY: &'static str = "vp_token";
}

impl TryFrom<Json> for VpToken {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        match value {
            Json::String(s) => Ok(Self::Single(s)),
            Json::Object(map) => Ok(Self::SingleAsMap(map)),
            Json::Array(arr) => arr
                .into_iter()
                .map(Self::try_from)
                .collect::<Result<Vec<Self>, Self::Error>>()
                .map(Self::Many),
            _ => Err(Error::msg("Invalid vp_token")),
        }
    }
}

impl From<VpToken> for Json {
    fn from(value: VpToken) -> Self {
        match value {
            VpToken::Single(s) => Json::String(s),
            VpToken::SingleAsMap(map) => Json::Object(map),
            VpToken::Many(tokens) => Self::Array(tokens.into_iter().map(Self::from).collect()),
        }
    }
}

impl From<String> for VpToken {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

/// `error` parameter of a negative response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseError(pub String);

impl ResponseError {
    pub const ACCESS_DENIED: &'static str = "access_denied";
}

impl TypedParameter for ResponseError {
    const KEY: &'static str = "error";
}

impl TryFrom<Json> for ResponseError {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        serde_json::from_value(value).map(Self).map_err(Into::into)
    }
}

impl From<ResponseError> for Json {
    fn from(value: ResponseError) -> Self {
        value.0.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDescription(pub String);

impl TypedParameter for ErrorDescription {
    const KEY: &'static str = "error_description";
}

impl TryFrom<Json> for ErrorDescription {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        serde_json::from_value(value).map(Self).map_err(Into::into)
    }
}

impl From<ErrorDescription> for Json {
    fn from(value: ErrorDescription) -> Self {
        value.0.into()
    }
}

/// The single form field carrying a signed or encrypted response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response(pub String);

impl TypedParameter for Response {
    const KEY: &'static str = "response";
}

impl TryFrom<Json> for Response {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        serde_json::from_value(value).map(Self).map_err(Into::into)
    }
}

impl From<Response> for Json {
    fn from(value: Response) -> Self {
        value.0.into()
    }
}
