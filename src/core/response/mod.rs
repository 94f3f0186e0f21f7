use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use self::parameters::{IdToken, PresentationSubmission, Response, VpToken};

use super::{authorization_request::parameters::ResponseMode, object::UntypedObject};

pub mod builder;
pub mod dispatcher;
pub mod parameters;

/// The holder's decision on a resolved request.
#[derive(Debug, Clone)]
pub enum ClientConsent {
    /// The holder declined; `reason` is sent as `error_description`.
    Negative { reason: String },
    IdToken {
        id_token: IdToken,
    },
    VpToken {
        vp_token: VpToken,
        presentation_submission: PresentationSubmission,
    },
    IdAndVpToken {
        id_token: IdToken,
        vp_token: VpToken,
        presentation_submission: PresentationSubmission,
    },
}

/// Body of an [AuthorizationResponse].
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// Plain response parameters.
    Params(UntypedObject),
    /// A compact JWS over the response parameters.
    Jwt(String),
    /// A compact JWE, wrapping either a JWS or the response parameters.
    Jwe(String),
}

/// A built response, ready to be dispatched once.
#[derive(Debug, Clone)]
pub struct AuthorizationResponse {
    payload: ResponsePayload,
    response_mode: ResponseMode,
    destination: Option<Url>,
}

impl AuthorizationResponse {
    pub(crate) fn new(
        payload: ResponsePayload,
        response_mode: ResponseMode,
        destination: Option<Url>,
    ) -> Self {
        Self {
            payload,
            response_mode,
            destination,
        }
    }

    pub fn payload(&self) -> &ResponsePayload {
        &self.payload
    }

    pub fn response_mode(&self) -> ResponseMode {
        self.response_mode
    }

    /// The `response_uri` for direct post modes, the `redirect_uri` otherwise.
    pub fn destination(&self) -> Option<&Url> {
        self.destination.as_ref()
    }

    /// Form fields of the response: the plain parameters, or a single
    /// `response` field holding the token.
    pub fn form_params(&self) -> Result<Vec<(String, String)>> {
        match &self.payload {
            ResponsePayload::Params(params) => params.flatten_for_form(),
            ResponsePayload::Jwt(token) | ResponsePayload::Jwe(token) => {
                let mut object = UntypedObject::default();
                object.insert(Response(token.clone()))?;
                object.flatten_for_form()
            }
        }
    }

    /// The form fields as an `application/x-www-form-urlencoded` body.
    pub fn as_query(&self) -> Result<String> {
        serde_urlencoded::to_string(self.form_params()?)
            .context("unable to encode authorization response")
    }
}

/// Body a verifier may answer a direct post with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRedirection {
    pub redirect_uri: Url,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_payload_is_a_single_field() {
        let response = AuthorizationResponse::new(
            ResponsePayload::Jwe("a.b.c.d.e".into()),
            ResponseMode::DirectPostJwt,
            None,
        );
        assert_eq!(response.as_query().unwrap(), "response=a.b.c.d.e");
    }

    #[test]
    fn plain_payload_is_flattened() {
        let params: UntypedObject = serde_json::from_value(json!({
            "vp_token": "token",
            "state": "a b"
        }))
        .unwrap();
        let response =
            AuthorizationResponse::new(ResponsePayload::Params(params), ResponseMode::Query, None);
        assert_eq!(response.as_query().unwrap(), "vp_token=token&state=a+b");
    }
}
