#![allow(dead_code)]

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use http::{Response, StatusCode};
use josekit::jwk::{alg::ec::EcCurve, Jwk};
use serde_json::{json, Value as Json};
use siop_openid4vp::{
    config::WalletConfiguration,
    core::{
        authorization_request::resolver::PredefinedDefinitions,
        util::{Transport, TransportError},
    },
    wallet::Wallet,
};
use url::Url;

pub const CLIENT_ID: &str = "https://client.example.org/cb";
pub const NONCE: &str = "0S6_WzA2Mj";
pub const WALLET_DID: &str = "did:example:123";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: http::Method,
    pub uri: Url,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Serves fixed resources, answers every post the same way and records
/// every request it sees.
#[derive(Default)]
pub struct MockTransport {
    resources: HashMap<String, Vec<u8>>,
    post_answer: Option<(StatusCode, String)>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn serving(mut self, uri: &str, body: impl Into<Vec<u8>>) -> Self {
        self.resources.insert(uri.to_owned(), body.into());
        self
    }

    pub fn answering_posts_with(mut self, status: StatusCode, body: impl Into<String>) -> Self {
        self.post_answer = Some((status, body.into()));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, method: http::Method, uri: &Url, content_type: Option<&str>, body: Vec<u8>) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            uri: uri.clone(),
            content_type: content_type.map(str::to_owned),
            body,
        });
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, uri: &Url) -> Result<Vec<u8>, TransportError> {
        self.record(http::Method::GET, uri, None, Vec::new());
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
        content_type: &str,
    ) -> Result<Response<Vec<u8>>, TransportError> {
        self.record(http::Method::POST, uri, Some(content_type), body);
        let (status, body) = self
            .post_answer
            .clone()
            .unwrap_or((StatusCode::OK, String::new()));
        Ok(Response::builder()
            .status(status)
            .body(body.into_bytes())
            .unwrap())
    }
}

pub struct TestWallet {
    pub config: WalletConfiguration,
    pub transport: MockTransport,
    pub definitions: PredefinedDefinitions,
}

impl Wallet for TestWallet {
    fn configuration(&self) -> &WalletConfiguration {
        &self.config
    }

    fn transport(&self) -> &dyn Transport {
        &self.transport
    }

    fn predefined_definitions(&self) -> &PredefinedDefinitions {
        &self.definitions
    }
}

/// A wallet identified by [WALLET_DID], with a fresh P-256 signing key.
pub fn wallet(transport: MockTransport, subject_syntax_types: Json) -> TestWallet {
    let signing_key = Jwk::generate_ec_key(EcCurve::P256).unwrap();
    let config = json!({
        "subject_syntax_types_supported": subject_syntax_types,
        "decentralized_identifier": WALLET_DID,
        "signing_key": Json::from(signing_key.as_ref().clone()),
    });
    let config: WalletConfiguration = serde_path_to_error::deserialize(config)
        .unwrap_or_else(|e| panic!("invalid wallet configuration at {}: {e}", e.path()));

    TestWallet {
        config,
        transport,
        definitions: PredefinedDefinitions::new(),
    }
}

/// A verifier key pair; the public half is tagged with `key_use`.
pub fn verifier_key(kid: &str, key_use: &str) -> (Jwk, Jwk) {
    let mut private = Jwk::generate_ec_key(EcCurve::P256).unwrap();
    private.set_key_id(kid);
    let mut public = private.to_public_key().unwrap();
    public.set_key_id(kid);
    public.set_key_use(key_use);
    (private, public)
}

/// A verifier identified by a `did:key`: its verification method and the
/// private key, with the verification method as `kid`.
pub fn did_key_verifier() -> (String, Jwk) {
    let mut private = Jwk::generate_ec_key(EcCurve::P256).unwrap();
    let public: ssi::JWK =
        serde_json::from_value(jwk_json(&private.to_public_key().unwrap())).unwrap();
    let vm = ssi::dids::DIDKey::generate_url(&public).unwrap().to_string();
    private.set_key_id(&vm);
    (vm, private)
}

pub fn jwk_json(jwk: &Jwk) -> Json {
    Json::from(jwk.as_ref().clone())
}

/// An authorization request URL carrying `params`, JSON values encoded as
/// strings.
pub fn request_url(params: Json) -> Url {
    let pairs: Vec<(String, String)> = params
        .as_object()
        .unwrap()
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Json::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect();
    let mut url = Url::parse("openid4vp://authorize").unwrap();
    url.set_query(Some(&serde_urlencoded::to_string(pairs).unwrap()));
    url
}

/// The form fields of a recorded post.
pub fn form_fields(request: &RecordedRequest) -> HashMap<String, String> {
    serde_urlencoded::from_bytes(&request.body).unwrap()
}
