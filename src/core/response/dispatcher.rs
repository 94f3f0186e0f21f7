use http::StatusCode;
use url::Url;

use super::{AuthorizationResponse, PostRedirection};
use crate::core::{
    authorization_request::parameters::ResponseMode,
    util::{Placement, Transport, TransportError},
};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const TEXT_HTML: &str = "text/html";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("the response has no destination to be delivered to")]
    MissingRedirectTarget,
    #[error("unable to encode the response: {0:#}")]
    Encoding(anyhow::Error),
}

/// What happened to a dispatched response.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The verifier took the response. For redirect based modes,
    /// `redirect_uri` is the URI carrying the response; for posted responses,
    /// the verifier may name one to continue with.
    Accepted { redirect_uri: Option<Url> },
    /// The verifier answered with a non-success status.
    Rejected(StatusCode),
    Error(DispatchError),
}

impl From<DispatchError> for DispatchOutcome {
    fn from(value: DispatchError) -> Self {
        DispatchOutcome::Error(value)
    }
}

/// Delivers [AuthorizationResponse]s according to their response mode.
///
/// Every response is sent at most once; nothing is retried.
pub struct Dispatcher<'a> {
    transport: &'a dyn Transport,
}

impl<'a> Dispatcher<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    pub async fn dispatch(&self, response: AuthorizationResponse) -> DispatchOutcome {
        match self.try_dispatch(response).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("authorization response could not be dispatched: {e}");
                e.into()
            }
        }
    }

    async fn try_dispatch(
        &self,
        response: AuthorizationResponse,
    ) -> Result<DispatchOutcome, DispatchError> {
        let destination = response
            .destination()
            .ok_or(DispatchError::MissingRedirectTarget)?;
        let params = response.form_params().map_err(DispatchError::Encoding)?;

        match response.response_mode() {
            ResponseMode::DirectPost | ResponseMode::DirectPostJwt => {
                let body = serde_urlencoded::to_string(&params)
                    .map_err(|e| DispatchError::Encoding(e.into()))?;
                self.post(destination, body, FORM_URLENCODED).await
            }
            ResponseMode::FormPost => {
                self.post(destination, auto_submitting_form(destination, &params), TEXT_HTML)
                    .await
            }
            ResponseMode::Fragment => Ok(self.redirect(destination, &params, Placement::Fragment)),
            ResponseMode::Query => Ok(self.redirect(destination, &params, Placement::Query)),
        }
    }

    fn redirect(
        &self,
        destination: &Url,
        params: &[(String, String)],
        placement: Placement,
    ) -> DispatchOutcome {
        let redirect_uri = self
            .transport
            .build_redirect_uri(destination, params, placement);
        tracing::debug!("responding through redirect to {destination}");
        DispatchOutcome::Accepted {
            redirect_uri: Some(redirect_uri),
        }
    }

    async fn post(
        &self,
        destination: &Url,
        body: String,
        content_type: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        tracing::debug!("posting authorization response to {destination}");
        let response = self
            .transport
            .post(destination, body.into_bytes(), content_type)
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("authorization response was rejected (status: {status})");
            return Ok(DispatchOutcome::Rejected(status));
        }

        let redirect_uri = serde_json::from_slice(response.body())
            .ok()
            .map(|PostRedirection { redirect_uri }| redirect_uri);
        Ok(DispatchOutcome::Accepted { redirect_uri })
    }
}

fn auto_submitting_form(action: &Url, params: &[(String, String)]) -> String {
    let inputs: String = params
        .iter()
        .map(|(name, value)| {
            format!(
                r#"<input type="hidden" name="{}" value="{}"/>"#,
                escape_html(name),
                escape_html(value)
            )
        })
        .collect();
    format!(
        r#"<html><head><title>Submit This Form</title></head><body onload="javascript:document.forms[0].submit()"><form method="post" action="{}">{inputs}</form></body></html>"#,
        escape_html(action.as_str())
    )
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use http::Response;
    use serde_json::json;

    use super::*;
    use crate::core::{
        object::UntypedObject, response::ResponsePayload, util::mock::MockTransport,
    };

    const RESPONSE_URI: &str = "https://verifier.example.org/post";

    fn response(mode: ResponseMode, payload: ResponsePayload) -> AuthorizationResponse {
        AuthorizationResponse::new(payload, mode, Some(Url::parse(RESPONSE_URI).unwrap()))
    }

    fn plain() -> ResponsePayload {
        let params: UntypedObject =
            serde_json::from_value(json!({"vp_token": "token", "state": "xyz"})).unwrap();
        ResponsePayload::Params(params)
    }

    #[tokio::test]
    async fn direct_post_sends_one_form() {
        let transport = MockTransport::default().answering_posts_with(
            StatusCode::OK,
            r#"{"redirect_uri": "https://verifier.example.org/done"}"#,
        );

        let outcome = Dispatcher::new(&transport)
            .dispatch(response(ResponseMode::DirectPost, plain()))
            .await;

        let DispatchOutcome::Accepted {
            redirect_uri: Some(redirect_uri),
        } = outcome
        else {
            panic!("unexpected outcome: {outcome:?}")
        };
        assert_eq!(redirect_uri.as_str(), "https://verifier.example.org/done");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, http::Method::POST);
        assert_eq!(requests[0].1.as_str(), RESPONSE_URI);
        assert_eq!(requests[0].2, b"vp_token=token&state=xyz");
    }

    #[tokio::test]
    async fn direct_post_jwt_sends_the_token_as_response() {
        let transport = MockTransport::default();

        let outcome = Dispatcher::new(&transport)
            .dispatch(response(
                ResponseMode::DirectPostJwt,
                ResponsePayload::Jwe("a.b.c.d.e".into()),
            ))
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Accepted { redirect_uri: None }
        ));
        assert_eq!(transport.requests()[0].2, b"response=a.b.c.d.e");
    }

    #[tokio::test]
    async fn rejection_keeps_the_status() {
        let transport =
            MockTransport::default().answering_posts_with(StatusCode::BAD_REQUEST, "invalid");

        let outcome = Dispatcher::new(&transport)
            .dispatch(response(ResponseMode::DirectPost, plain()))
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Rejected(StatusCode::BAD_REQUEST)
        ));
    }

    #[tokio::test]
    async fn fragment_needs_no_network() {
        let transport = MockTransport::default();

        let outcome = Dispatcher::new(&transport)
            .dispatch(response(ResponseMode::Fragment, plain()))
            .await;

        let DispatchOutcome::Accepted {
            redirect_uri: Some(redirect_uri),
        } = outcome
        else {
            panic!("unexpected outcome: {outcome:?}")
        };
        assert_eq!(redirect_uri.fragment(), Some("vp_token=token&state=xyz"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn query_needs_no_network() {
        let transport = MockTransport::default();

        let outcome = Dispatcher::new(&transport)
            .dispatch(response(ResponseMode::Query, plain()))
            .await;

        let DispatchOutcome::Accepted {
            redirect_uri: Some(redirect_uri),
        } = outcome
        else {
            panic!("unexpected outcome: {outcome:?}")
        };
        assert_eq!(redirect_uri.query(), Some("vp_token=token&state=xyz"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn form_post_sends_an_auto_submitting_page() {
        let transport = MockTransport::default();

        let outcome = Dispatcher::new(&transport)
            .dispatch(response(ResponseMode::FormPost, plain()))
            .await;
        assert!(matches!(outcome, DispatchOutcome::Accepted { .. }));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let page = String::from_utf8(requests[0].2.clone()).unwrap();
        assert!(page.contains(r#"action="https://verifier.example.org/post""#));
        assert!(page.contains(r#"<input type="hidden" name="state" value="xyz"/>"#));
    }

    #[tokio::test]
    async fn missing_destination() {
        let transport = MockTransport::default();

        let outcome = Dispatcher::new(&transport)
            .dispatch(AuthorizationResponse::new(
                plain(),
                ResponseMode::Fragment,
                None,
            ))
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Error(DispatchError::MissingRedirectTarget)
        ));
    }

    /// Fails every post, counting the attempts.
    #[derive(Default)]
    struct Unreachable {
        posts: AtomicUsize,
    }

    #[async_trait]
    impl Transport for Unreachable {
        async fn fetch(&self, uri: &Url) -> Result<Vec<u8>, TransportError> {
            Err(TransportError::Status {
                uri: uri.clone(),
                status: StatusCode::NOT_FOUND,
            })
        }

        async fn post(
            &self,
            uri: &Url,
            _body: Vec<u8>,
            _content_type: &str,
        ) -> Result<Response<Vec<u8>>, TransportError> {
            self.posts.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Unreachable {
                uri: uri.clone(),
                source: anyhow::anyhow!("connection refused"),
            })
        }
    }

    #[tokio::test]
    async fn transport_failure_is_reported_without_retry() {
        let transport = Unreachable::default();

        let outcome = Dispatcher::new(&transport)
            .dispatch(response(ResponseMode::DirectPost, plain()))
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Error(DispatchError::Transport(TransportError::Unreachable { .. }))
        ));
        assert_eq!(transport.posts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn form_values_are_escaped() {
        assert_eq!(
            escape_html(r#"<a href="x">&'"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;"
        );
    }
}
