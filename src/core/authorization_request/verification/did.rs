use anyhow::{bail, Context, Result};
use josekit::jwk::Jwk;
use serde_json::Value as Json;
use ssi::{
    dids::{DIDResolver, VerificationMethodDIDResolver},
    jwk::JWKResolver,
    verification_methods::{
        GenericVerificationMethod, InvalidVerificationMethod, MaybeJwkVerificationMethod,
        VerificationMethodSet,
    },
};

use crate::core::authorization_request::parameters::ClientId;

/// Default key lookup for the `did` client id scheme.
///
/// `kid` must be a DID URL on the client's own DID; the key comes from the
/// verification method it resolves to.
pub async fn verification_key<M>(
    client_id: &ClientId,
    kid: &str,
    resolver: &VerificationMethodDIDResolver<impl DIDResolver, M>,
) -> Result<Jwk>
where
    M: MaybeJwkVerificationMethod
        + VerificationMethodSet
        + TryFrom<GenericVerificationMethod, Error = InvalidVerificationMethod>,
{
    let (did, _fragment) = kid.split_once('#').context(format!(
        "expected a DID verification method in 'kid' header, received '{kid}'"
    ))?;

    if client_id.0 != did {
        bail!("DIDs from 'kid' ({did}) and 'client_id' ({client_id}) do not match")
    }

    let jwk = resolver
        .fetch_public_jwk(Some(kid))
        .await
        .context("unable to fetch JWK from 'kid' header")?;

    let Json::Object(map) =
        serde_json::to_value(&*jwk).context("unable to serialize the resolved JWK")?
    else {
        bail!("resolved JWK is not a JSON object")
    };
    let mut key = Jwk::from_map(map).context("resolved JWK is not usable")?;
    key.set_key_id(kid);
    Ok(key)
}
