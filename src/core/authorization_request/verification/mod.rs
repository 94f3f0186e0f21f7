use anyhow::{bail, Result};
use async_trait::async_trait;
use josekit::jwk::Jwk;
use serde_json::Value as Json;
use ssi::{
    dids::{DIDKey, VerificationMethodDIDResolver},
    verification_methods::AnyJwkMethod,
};

use crate::{
    config::PreRegisteredClients,
    core::{
        jws::{self, peek_claims, verify_claims},
        object::{TypedParameter, UntypedObject},
    },
};

use super::{
    parameters::{ClientId, ClientIdScheme},
    resolver::ResolutionError,
};

pub mod did;

fn invalid(e: anyhow::Error) -> ResolutionError {
    ResolutionError::InvalidRequestObject(format!("{e:#}"))
}

/// Supplies the keys request objects are verified with, by client id scheme.
///
/// Keys never come from the request object itself.
#[async_trait]
pub trait RequestVerifier: Send + Sync {
    /// Keys of a client using the `pre-registered` client id scheme.
    async fn preregistered(&self, client_id: &ClientId) -> Result<Vec<Jwk>>;

    /// Keys of a client using the `did` client id scheme, for the
    /// verification method named by the `kid` header.
    ///
    /// See default implementation [did::verification_key].
    async fn did(&self, client_id: &ClientId, kid: &str) -> Result<Vec<Jwk>>;

    /// Keys of a client using any other client id scheme.
    async fn other(&self, scheme: &ClientIdScheme, client_id: &ClientId) -> Result<Vec<Jwk>> {
        bail!("request objects of '{scheme}' client '{client_id}' cannot be verified")
    }
}

/// Keys are looked up in the configured registry; `did:key` clients are
/// resolved offline.
#[async_trait]
impl RequestVerifier for PreRegisteredClients {
    async fn preregistered(&self, client_id: &ClientId) -> Result<Vec<Jwk>> {
        match self.keys(client_id) {
            Some(keys) => Ok(keys.to_vec()),
            None => bail!("client '{client_id}' is not pre-registered"),
        }
    }

    async fn did(&self, client_id: &ClientId, kid: &str) -> Result<Vec<Jwk>> {
        let resolver: VerificationMethodDIDResolver<DIDKey, AnyJwkMethod> =
            VerificationMethodDIDResolver::new(DIDKey);
        let key = did::verification_key(client_id, kid, &resolver).await?;
        Ok(vec![key])
    }
}

/// Whether the request object is secured with `alg: none`.
pub(crate) fn is_unsecured(jwt: &str) -> Result<bool, ResolutionError> {
    let header = jws::peek_header(jwt).map_err(invalid)?;
    Ok(header.get("alg").and_then(|alg| alg.as_str()) == Some("none"))
}

/// Verify a signed request object against the keys `verifier` holds for its
/// client, and return the verified claims.
pub(crate) async fn verify_request_object(
    jwt: &str,
    verifier: &dyn RequestVerifier,
) -> Result<UntypedObject, ResolutionError> {
    let header = jws::peek_header(jwt).map_err(invalid)?;
    let unverified = UntypedObject::from(peek_claims(jwt).map_err(invalid)?);

    let client_id: ClientId = match unverified.get() {
        Some(client_id) => client_id.map_err(invalid)?,
        None => return Err(ResolutionError::MissingParameter(ClientId::KEY)),
    };
    let scheme = match unverified.get::<ClientIdScheme>() {
        Some(scheme) => scheme.map_err(invalid)?,
        None => ClientIdScheme::implied_by(&client_id),
    };

    let keys = match &scheme {
        ClientIdScheme::PreRegistered => verifier.preregistered(&client_id).await,
        ClientIdScheme::Did => {
            let Some(kid) = header.get("kid").and_then(Json::as_str) else {
                return Err(ResolutionError::InvalidRequestObject(
                    "'kid' was missing from the request object header".into(),
                ));
            };
            verifier.did(&client_id, kid).await
        }
        other => verifier.other(other, &client_id).await,
    }
    .map_err(invalid)?;

    if keys.is_empty() {
        return Err(ResolutionError::InvalidRequestObject(format!(
            "no key is known for client '{client_id}'"
        )));
    }

    let claims = verify_claims(jwt, &keys).map_err(invalid)?;
    tracing::debug!("request object signature of client '{client_id}' ({scheme}) verified");

    Ok(claims.into())
}

/// Decode the claims of an `alg: none` request object.
pub(crate) fn decode_unsecured_request_object(
    jwt: &str,
) -> Result<UntypedObject, ResolutionError> {
    tracing::warn!("request object is not secured");
    jws::decode_unsecured_claims(jwt)
        .map(UntypedObject::from)
        .map_err(invalid)
}
