use anyhow::{bail, Context, Result};
use url::Url;

use self::parameters::ClientId;

use super::object::{ParsingErrorContext, UntypedObject};

pub mod parameters;
pub mod resolved;
pub mod resolver;
pub mod verification;

const REQUEST: &str = "request";
const REQUEST_URI: &str = "request_uri";

/// An Authorization Request as received by the wallet.
#[derive(Debug, Clone)]
pub enum AuthorizationRequest {
    /// Every parameter is carried by the request itself.
    Params(UntypedObject),
    /// A request object, passed by value or by reference, along with the
    /// outer `client_id`.
    RequestObject {
        client_id: ClientId,
        indirection: RequestIndirection,
    },
}

/// A RequestObject, passed by value or by reference.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestIndirection {
    ByValue(String),
    ByReference(Url),
}

impl AuthorizationRequest {
    /// Parse from a [Url], e.g. `openid4vp://?client_id=...&request_uri=...`.
    /// ```
    /// # use siop_openid4vp::core::authorization_request::{AuthorizationRequest, RequestIndirection};
    /// # use url::Url;
    /// let url: Url = "openid4vp://?client_id=xyz&request_uri=https%3A%2F%2Fverifier.example.org%2Frequest%2F1"
    ///     .parse()
    ///     .unwrap();
    ///
    /// let AuthorizationRequest::RequestObject { client_id, indirection } =
    ///     AuthorizationRequest::from_url(&url).unwrap()
    /// else {
    ///     panic!("expected a request object")
    /// };
    ///
    /// assert_eq!(client_id.0, "xyz");
    /// assert_eq!(
    ///     indirection,
    ///     RequestIndirection::ByReference("https://verifier.example.org/request/1".parse().unwrap())
    /// );
    /// ```
    pub fn from_url(url: &Url) -> Result<Self> {
        let query = url
            .query()
            .context("missing query params in Authorization Request uri")?;
        Self::from_query_params(query)
    }

    /// Parse from urlencoded query parameters.
    ///
    /// `presentation_definition` and `client_metadata` are decoded as JSON.
    pub fn from_query_params(query_params: &str) -> Result<Self> {
        let params = UntypedObject::from_query(query_params)
            .context("unable to parse Authorization Request from query params")?;

        let by_value = params.get_raw(REQUEST).cloned();
        let by_reference = params.get_raw(REQUEST_URI).cloned();

        let indirection = match (by_value, by_reference) {
            (None, None) => return Ok(Self::Params(params)),
            (Some(_), Some(_)) => bail!("'{REQUEST}' and '{REQUEST_URI}' are mutually exclusive"),
            (Some(jwt), None) => RequestIndirection::ByValue(
                serde_json::from_value(jwt).context("'request' is not a string")?,
            ),
            (None, Some(uri)) => RequestIndirection::ByReference(
                serde_json::from_value(uri).context("'request_uri' is not a valid URI")?,
            ),
        };

        let client_id = params.get().parsing_error()?;
        Ok(Self::RequestObject {
            client_id,
            indirection,
        })
    }
}
