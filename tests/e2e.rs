use http::StatusCode;
use josekit::jwe::{self, ECDH_ES};
use serde_json::{json, Map, Value as Json};
use siop_openid4vp::{
    core::{
        authorization_request::{
            resolved::ResolvedRequestData, resolver::ResolutionError, AuthorizationRequest,
        },
        jws::{sign_claims, verify_claims, SigningAlgorithm},
        presentation_submission::PresentationSubmission,
        response::{
            builder::BuildError,
            dispatcher::DispatchOutcome,
            parameters::VpToken,
            ClientConsent, ResponsePayload,
        },
    },
    wallet::Wallet,
};

mod common;

use common::{
    did_key_verifier, form_fields, jwk_json, request_url, verifier_key, wallet, MockTransport,
    CLIENT_ID, NONCE, WALLET_DID,
};

fn dummy_consent() -> ClientConsent {
    ClientConsent::VpToken {
        vp_token: VpToken::Single("dummy_vp_token".into()),
        presentation_submission: PresentationSubmission::new(
            "dummy-submission".into(),
            "dummy-id".into(),
            vec![],
        ),
    }
}

fn dummy_definition() -> Json {
    json!({"id": "dummy-id", "input_descriptors": []})
}

#[tokio::test]
async fn encrypted_vp_token_direct_post_jwt() {
    let (verifier_private, verifier_public) = verifier_key("verifier-enc", "enc");
    let wallet = wallet(MockTransport::default(), json!(["did:example"]));

    let url = request_url(json!({
        "response_type": "vp_token",
        "client_id": CLIENT_ID,
        "response_mode": "direct_post.jwt",
        "response_uri": CLIENT_ID,
        "nonce": NONCE,
        "presentation_definition": dummy_definition(),
        "client_metadata": {
            "jwks": {"keys": [jwk_json(&verifier_public)]},
            "authorization_encrypted_response_alg": "ECDH-ES",
            "authorization_encrypted_response_enc": "A128CBC-HS256"
        }
    }));

    let request = AuthorizationRequest::from_url(&url).unwrap();
    let resolved = wallet.resolve_request(request).await.unwrap();
    assert!(matches!(resolved, ResolvedRequestData::VpToken(_)));
    assert_eq!(resolved.nonce().0, NONCE);

    let response = wallet.build_response(&resolved, dummy_consent()).unwrap();
    let outcome = wallet.dispatch(response).await;
    assert!(matches!(outcome, DispatchOutcome::Accepted { .. }));

    let requests = wallet.transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].uri.as_str(), CLIENT_ID);
    assert_eq!(
        requests[0].content_type.as_deref(),
        Some("application/x-www-form-urlencoded")
    );

    let fields = form_fields(&requests[0]);
    let token = &fields["response"];
    assert_eq!(token.split('.').count(), 5);

    let decrypter = ECDH_ES.decrypter_from_jwk(&verifier_private).unwrap();
    let (plaintext, header) = jwe::deserialize_compact(token, &decrypter).unwrap();
    assert_eq!(header.algorithm(), Some("ECDH-ES"));
    assert_eq!(header.content_encryption(), Some("A128CBC-HS256"));
    assert_eq!(header.key_id(), Some("verifier-enc"));

    let claims: Map<String, Json> = serde_json::from_slice(&plaintext).unwrap();
    assert_eq!(claims["iss"], json!(WALLET_DID));
    assert_eq!(claims["aud"], json!(CLIENT_ID));
    assert_eq!(claims["nonce"], json!(NONCE));
    assert_eq!(claims["vp_token"], json!("dummy_vp_token"));
    assert_eq!(
        claims["presentation_submission"]["definition_id"],
        json!("dummy-id")
    );
}

#[tokio::test]
async fn signed_request_object_by_reference_and_signed_response() {
    const REQUEST_URI: &str = "https://verifier.example.org/request/1";

    let (vm, verifier_private) = did_key_verifier();
    let verifier_public = verifier_private.to_public_key().unwrap();
    let verifier = vm.split_once('#').unwrap().0;
    let claims = json!({
        "response_type": "vp_token",
        "client_id": verifier,
        "response_mode": "direct_post.jwt",
        "response_uri": "https://verifier.example.org/response",
        "nonce": NONCE,
        "state": "af0ifjsldkj",
        "presentation_definition": dummy_definition(),
        "client_metadata": {
            "jwks": {"keys": [jwk_json(&verifier_public)]},
            "authorization_signed_response_alg": ["ES256"]
        }
    });
    let request_object = sign_claims(
        claims.as_object().unwrap().clone(),
        SigningAlgorithm::Es256,
        &verifier_private,
    )
    .unwrap();

    let transport = MockTransport::default()
        .serving(REQUEST_URI, request_object)
        .answering_posts_with(
            StatusCode::OK,
            r#"{"redirect_uri": "https://verifier.example.org/done"}"#,
        );
    let wallet = wallet(transport, json!(["did"]));

    let url = request_url(json!({"client_id": verifier, "request_uri": REQUEST_URI}));
    let request = AuthorizationRequest::from_url(&url).unwrap();
    let resolved = wallet.resolve_request(request).await.unwrap();
    assert_eq!(resolved.client().id.0, verifier);

    let response = wallet.build_response(&resolved, dummy_consent()).unwrap();
    let ResponsePayload::Jwt(_) = response.payload() else {
        panic!("expected a signed response")
    };

    let DispatchOutcome::Accepted {
        redirect_uri: Some(redirect_uri),
    } = wallet.dispatch(response).await
    else {
        panic!("expected the verifier to redirect")
    };
    assert_eq!(redirect_uri.as_str(), "https://verifier.example.org/done");

    let requests = wallet.transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, http::Method::GET);
    assert_eq!(requests[1].method, http::Method::POST);

    let fields = form_fields(&requests[1]);
    let wallet_key = wallet.config.public_signing_key().unwrap();
    let claims = verify_claims(&fields["response"], &[wallet_key]).unwrap();
    assert_eq!(claims["iss"], json!(WALLET_DID));
    assert_eq!(claims["aud"], json!(verifier));
    assert_eq!(claims["state"], json!("af0ifjsldkj"));
}

#[tokio::test]
async fn self_signed_request_object_is_rejected() {
    const FORGED: &str = "did:web:bank.example.com";

    let (forger_private, forger_public) = verifier_key("did:web:bank.example.com#key-1", "sig");
    let claims = json!({
        "response_type": "vp_token",
        "client_id": FORGED,
        "response_mode": "direct_post",
        "response_uri": "https://attacker.example.org/collect",
        "nonce": NONCE,
        "presentation_definition": dummy_definition(),
        "client_metadata": {"jwks": {"keys": [jwk_json(&forger_public)]}}
    });
    let request_object = sign_claims(
        claims.as_object().unwrap().clone(),
        SigningAlgorithm::Es256,
        &forger_private,
    )
    .unwrap();
    let wallet = wallet(MockTransport::default(), json!(["did"]));

    let url = request_url(json!({"client_id": FORGED, "request": request_object}));
    let request = AuthorizationRequest::from_url(&url).unwrap();
    let err = wallet.resolve_request(request).await.unwrap_err();
    assert!(matches!(err, ResolutionError::InvalidRequestObject(_)));
    assert!(wallet.transport.requests().is_empty());
}

#[tokio::test]
async fn no_compatible_signing_algorithm() {
    let wallet = wallet(MockTransport::default(), json!(["did"]));

    let url = request_url(json!({
        "response_type": "vp_token",
        "client_id": CLIENT_ID,
        "response_mode": "direct_post.jwt",
        "response_uri": CLIENT_ID,
        "nonce": NONCE,
        "presentation_definition": dummy_definition(),
        "client_metadata": {"authorization_signed_response_alg": ["RS256", "PS256"]}
    }));
    let resolved = wallet
        .resolve_request(AuthorizationRequest::from_url(&url).unwrap())
        .await
        .unwrap();

    let err = wallet
        .build_response(&resolved, dummy_consent())
        .unwrap_err();
    assert!(matches!(err, BuildError::NoCompatibleAlgorithm(_)));
    assert!(wallet.transport.requests().is_empty());
}

#[tokio::test]
async fn fragment_response_makes_no_network_call() {
    let wallet = wallet(MockTransport::default(), json!(["did"]));

    let url = request_url(json!({
        "response_type": "vp_token",
        "client_id": CLIENT_ID,
        "redirect_uri": CLIENT_ID,
        "nonce": NONCE,
        "state": "xyz",
        "presentation_definition": dummy_definition()
    }));
    let resolved = wallet
        .resolve_request(AuthorizationRequest::from_url(&url).unwrap())
        .await
        .unwrap();
    let response = wallet.build_response(&resolved, dummy_consent()).unwrap();

    let DispatchOutcome::Accepted {
        redirect_uri: Some(redirect_uri),
    } = wallet.dispatch(response).await
    else {
        panic!("expected a redirect")
    };

    assert!(redirect_uri.as_str().starts_with(CLIENT_ID));
    let fragment: Vec<(String, String)> =
        serde_urlencoded::from_str(redirect_uri.fragment().unwrap()).unwrap();
    assert_eq!(fragment[0], ("vp_token".into(), "dummy_vp_token".into()));
    assert!(fragment.contains(&("state".into(), "xyz".into())));
    assert!(wallet.transport.requests().is_empty());
}

#[tokio::test]
async fn direct_post_sends_exactly_one_request() {
    let wallet = wallet(MockTransport::default(), json!(["did"]));

    let url = request_url(json!({
        "response_type": "vp_token",
        "client_id": CLIENT_ID,
        "response_mode": "direct_post",
        "response_uri": "https://client.example.org/post",
        "nonce": NONCE,
        "presentation_definition": dummy_definition()
    }));
    let resolved = wallet
        .resolve_request(AuthorizationRequest::from_url(&url).unwrap())
        .await
        .unwrap();
    let response = wallet.build_response(&resolved, dummy_consent()).unwrap();

    assert!(matches!(
        wallet.dispatch(response).await,
        DispatchOutcome::Accepted { redirect_uri: None }
    ));

    let requests = wallet.transport.requests();
    assert_eq!(requests.len(), 1);
    let fields = form_fields(&requests[0]);
    assert_eq!(fields["vp_token"], "dummy_vp_token");
    assert!(fields.contains_key("presentation_submission"));
}

#[tokio::test]
async fn verifier_rejection_is_reported() {
    let transport =
        MockTransport::default().answering_posts_with(StatusCode::BAD_REQUEST, "invalid_request");
    let wallet = wallet(transport, json!(["did"]));

    let url = request_url(json!({
        "response_type": "vp_token",
        "client_id": CLIENT_ID,
        "response_mode": "direct_post",
        "response_uri": "https://client.example.org/post",
        "nonce": NONCE,
        "presentation_definition": dummy_definition()
    }));
    let resolved = wallet
        .resolve_request(AuthorizationRequest::from_url(&url).unwrap())
        .await
        .unwrap();
    let response = wallet.build_response(&resolved, dummy_consent()).unwrap();

    assert!(matches!(
        wallet.dispatch(response).await,
        DispatchOutcome::Rejected(StatusCode::BAD_REQUEST)
    ));
}

#[tokio::test]
async fn self_issued_id_token_with_thumbprint_subject() {
    let wallet = wallet(
        MockTransport::default(),
        json!(["urn:ietf:params:oauth:jwk-thumbprint"]),
    );

    let url = request_url(json!({
        "response_type": "id_token",
        "client_id": CLIENT_ID,
        "redirect_uri": CLIENT_ID,
        "scope": "openid",
        "nonce": NONCE,
        "client_metadata": {
            "subject_syntax_types_supported": ["urn:ietf:params:oauth:jwk-thumbprint"],
            "id_token_signed_response_alg": "ES256"
        }
    }));
    let resolved = wallet
        .resolve_request(AuthorizationRequest::from_url(&url).unwrap())
        .await
        .unwrap();

    let id_token = wallet.issue_id_token(&resolved, Map::new()).unwrap();
    let wallet_key = wallet.config.public_signing_key().unwrap();
    let claims = verify_claims(&id_token.0, &[wallet_key]).unwrap();
    assert!(claims["sub"]
        .as_str()
        .unwrap()
        .starts_with("urn:ietf:params:oauth:jwk-thumbprint:sha-256:"));
    assert_eq!(claims["nonce"], json!(NONCE));

    let response = wallet
        .build_response(&resolved, ClientConsent::IdToken { id_token })
        .unwrap();
    let DispatchOutcome::Accepted {
        redirect_uri: Some(redirect_uri),
    } = wallet.dispatch(response).await
    else {
        panic!("expected a redirect")
    };
    assert!(redirect_uri.fragment().unwrap().starts_with("id_token="));
}

#[tokio::test]
async fn unsecured_request_object_can_only_be_declined() {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let claims = URL_SAFE_NO_PAD.encode(
        json!({
            "response_type": "vp_token",
            "client_id": CLIENT_ID,
            "redirect_uri": CLIENT_ID,
            "response_mode": "query",
            "nonce": NONCE
        })
        .to_string(),
    );
    let wallet = wallet(MockTransport::default(), json!(["did"]));

    let url = request_url(json!({
        "client_id": CLIENT_ID,
        "request": format!("{header}.{claims}.")
    }));
    let resolved = wallet
        .resolve_request(AuthorizationRequest::from_url(&url).unwrap())
        .await
        .unwrap();
    assert!(matches!(resolved, ResolvedRequestData::NotSecured(_)));

    assert!(matches!(
        wallet.build_response(&resolved, dummy_consent()),
        Err(BuildError::ConsentMismatch { .. })
    ));

    let response = wallet
        .build_response(
            &resolved,
            ClientConsent::Negative {
                reason: "untrusted request".into(),
            },
        )
        .unwrap();
    let DispatchOutcome::Accepted {
        redirect_uri: Some(redirect_uri),
    } = wallet.dispatch(response).await
    else {
        panic!("expected a redirect")
    };
    assert_eq!(
        redirect_uri.query(),
        Some("error=access_denied&error_description=untrusted+request")
    );
}

#[tokio::test]
async fn unreachable_request_uri_fails_resolution() {
    let wallet = wallet(MockTransport::default(), json!(["did"]));

    let url = request_url(json!({
        "client_id": CLIENT_ID,
        "request_uri": "https://verifier.example.org/gone"
    }));
    let err = wallet
        .resolve_request(AuthorizationRequest::from_url(&url).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolutionError::RequestObjectUnreachable(_)));
}
