use anyhow::Context;
use async_trait::async_trait;
use http::{header::CONTENT_TYPE, Response, StatusCode};
use url::Url;

/// Where response parameters are placed on a redirect URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Fragment,
    Query,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No response was received.
    #[error("request to {uri} failed: {source:#}")]
    Unreachable {
        uri: Url,
        #[source]
        source: anyhow::Error,
    },

    /// A fetch was answered with a non-success status.
    #[error("request to {uri} was unsuccessful (status: {status})")]
    Status { uri: Url, status: StatusCode },
}

/// The network collaborator of the engine.
///
/// Every method is a single suspension point: no retries and no caching
/// happen behind it. A trait is used so that hosts can plug in native
/// HTTP/TLS stacks, e.g. when compiled for mobile applications.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET` a resource; non-success statuses are errors.
    async fn fetch(&self, uri: &Url) -> Result<Vec<u8>, TransportError>;

    /// `POST` a body. Any received response is returned, whatever its status.
    async fn post(
        &self,
        uri: &Url,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<Response<Vec<u8>>, TransportError>;

    /// Append parameters to `base` as a fragment or a query string.
    ///
    /// No network call is involved.
    fn build_redirect_uri(
        &self,
        base: &Url,
        params: &[(String, String)],
        placement: Placement,
    ) -> Url {
        let mut uri = base.clone();
        match placement {
            Placement::Query => {
                uri.query_pairs_mut().extend_pairs(params);
            }
            Placement::Fragment => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(params)
                    .finish();
                uri.set_fragment(Some(&encoded));
            }
        }
        uri
    }
}

/// [Transport] backed by `reqwest` with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestTransport(reqwest::Client);

impl AsRef<reqwest::Client> for ReqwestTransport {
    fn as_ref(&self) -> &reqwest::Client {
        &self.0
    }
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .context("unable to build http client")
            .map(Self)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, uri: &Url) -> Result<Vec<u8>, TransportError> {
        let unreachable = |source: reqwest::Error| TransportError::Unreachable {
            uri: uri.clone(),
            source: source.into(),
        };

        let response = self
            .0
            .get(uri.clone())
            .send()
            .await
            .map_err(unreachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                uri: uri.clone(),
                status,
            });
        }

        Ok(response.bytes().await.map_err(unreachable)?.to_vec())
    }

    async fn post(
        &self,
        uri: &Url,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<Response<Vec<u8>>, TransportError> {
        let unreachable = |source: anyhow::Error| TransportError::Unreachable {
            uri: uri.clone(),
            source,
        };

        let response = self
            .0
            .post(uri.clone())
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .context("http request failed")
            .map_err(unreachable)?;

        let mut builder = Response::builder()
            .status(response.status())
            .version(response.version());

        if let Some(headers) = builder.headers_mut() {
            headers.extend(response.headers().clone());
        }

        let body = response
            .bytes()
            .await
            .context("failed to extract response body")
            .map_err(unreachable)?;

        builder
            .body(body.to_vec())
            .context("unable to construct response")
            .map_err(unreachable)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;

    /// In-memory [Transport] serving fixed resources and recording every request.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        resources: HashMap<String, Vec<u8>>,
        post_status: Option<StatusCode>,
        post_body: Vec<u8>,
        requests: Mutex<Vec<(http::Method, Url, Vec<u8>)>>,
    }

    impl MockTransport {
        pub(crate) fn with_resource(mut self, uri: &str, body: impl Into<Vec<u8>>) -> Self {
            self.resources.insert(uri.to_owned(), body.into());
            self
        }

        pub(crate) fn answering_posts_with(mut self, status: StatusCode, body: &str) -> Self {
            self.post_status = Some(status);
            self.post_body = body.as_bytes().to_vec();
            self
        }

        pub(crate) fn requests(&self) -> Vec<(http::Method, Url, Vec<u8>)> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }

        fn record(&self, method: http::Method, uri: &Url, body: Vec<u8>) {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push((method, uri.clone(), body));
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn fetch(&self, uri: &Url) -> Result<Vec<u8>, TransportError> {
            self.record(http::Method::GET, uri, Vec::new());
            self.resources
                .get(uri.as_str())
                .cloned()
                .ok_or_else(|| TransportError::Status {
                    uri: uri.clone(),
                    status: StatusCode::NOT_FOUND,
                })
        }

        async fn post(
            &self,
            uri: &Url,
            body: Vec<u8>,
            _content_type: &str,
        ) -> Result<Response<Vec<u8>>, TransportError> {
            self.record(http::Method::POST, uri, body);
            Response::builder()
                .status(self.post_status.unwrap_or(StatusCode::OK))
                .body(self.post_body.clone())
                .map_err(|e| TransportError::Unreachable {
                    uri: uri.clone(),
                    source: e.into(),
                })
        }
    }
}
