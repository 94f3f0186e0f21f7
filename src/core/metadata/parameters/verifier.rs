use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use url::Url;

use crate::core::{credential_format::ClaimFormatMap, object::TypedParameter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpFormats(pub ClaimFormatMap);

impl TypedParameter for VpFormats {
    const KEY: &'static str = "vp_formats";
}

impl TryFrom<Json> for VpFormats {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        serde_json::from_value(value).map(Self).map_err(Into::into)
    }
}

impl TryFrom<VpFormats> for Json {
    type Error = Error;

    fn try_from(value: VpFormats) -> Result<Json, Self::Error> {
        serde_json::to_value(value.0).context("Failed to serialize VpFormats")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JWKs {
    pub keys: Vec<Map<String, Json>>,
}

impl TypedParameter for JWKs {
    const KEY: &'static str = "jwks";
}

impl TryFrom<Json> for JWKs {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        serde_json::from_value(value).map_err(Into::into)
    }
}

impl From<JWKs> for Json {
    fn from(value: JWKs) -> Json {
        let keys = value.keys.into_iter().map(Json::Object).collect();
        let mut obj = Map::default();
        obj.insert("keys".into(), Json::Array(keys));
        obj.into()
    }
}

#[derive(Debug, Clone)]
pub struct JwksUri(pub Url);

impl TypedParameter for JwksUri {
    const KEY: &'static str = "jwks_uri";
}

impl TryFrom<Json> for JwksUri {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<JwksUri> for Json {
    fn from(value: JwksUri) -> Json {
        value.0.to_string().into()
    }
}

/// A signing algorithm preference: a single name or a list in preference order.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationSignedResponseAlg(pub Vec<String>);

impl TypedParameter for AuthorizationSignedResponseAlg {
    const KEY: &'static str = "authorization_signed_response_alg";
}

impl TryFrom<Json> for AuthorizationSignedResponseAlg {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value::<OneOrMany>(value)?.into()))
    }
}

impl From<AuthorizationSignedResponseAlg> for Json {
    fn from(value: AuthorizationSignedResponseAlg) -> Json {
        value.0.into()
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationEncryptedResponseAlg(pub String);

impl TypedParameter for AuthorizationEncryptedResponseAlg {
    const KEY: &'static str = "authorization_encrypted_response_alg";
}

impl TryFrom<Json> for AuthorizationEncryptedResponseAlg {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<AuthorizationEncryptedResponseAlg> for Json {
    fn from(value: AuthorizationEncryptedResponseAlg) -> Json {
        Json::String(value.0)
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationEncryptedResponseEnc(pub String);

impl TypedParameter for AuthorizationEncryptedResponseEnc {
    const KEY: &'static str = "authorization_encrypted_response_enc";
}

impl TryFrom<Json> for AuthorizationEncryptedResponseEnc {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<AuthorizationEncryptedResponseEnc> for Json {
    fn from(value: AuthorizationEncryptedResponseEnc) -> Json {
        Json::String(value.0)
    }
}

#[derive(Debug, Clone)]
pub struct IdTokenSignedResponseAlg(pub Vec<String>);

impl TypedParameter for IdTokenSignedResponseAlg {
    const KEY: &'static str = "id_token_signed_response_alg";
}

impl TryFrom<Json> for IdTokenSignedResponseAlg {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value::<OneOrMany>(value)?.into()))
    }
}

impl From<IdTokenSignedResponseAlg> for Json {
    fn from(value: IdTokenSignedResponseAlg) -> Json {
        value.0.into()
    }
}

#[derive(Debug, Clone)]
pub struct IdTokenEncryptedResponseAlg(pub String);

impl TypedParameter for IdTokenEncryptedResponseAlg {
    const KEY: &'static str = "id_token_encrypted_response_alg";
}

impl TryFrom<Json> for IdTokenEncryptedResponseAlg {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<IdTokenEncryptedResponseAlg> for Json {
    fn from(value: IdTokenEncryptedResponseAlg) -> Json {
        Json::String(value.0)
    }
}

#[derive(Debug, Clone)]
pub struct IdTokenEncryptedResponseEnc(pub String);

impl TypedParameter for IdTokenEncryptedResponseEnc {
    const KEY: &'static str = "id_token_encrypted_response_enc";
}

impl TryFrom<Json> for IdTokenEncryptedResponseEnc {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<IdTokenEncryptedResponseEnc> for Json {
    fn from(value: IdTokenEncryptedResponseEnc) -> Json {
        Json::String(value.0)
    }
}

#[derive(Debug, Clone)]
pub struct SubjectSyntaxTypesSupported(pub Vec<String>);

impl TypedParameter for SubjectSyntaxTypesSupported {
    const KEY: &'static str = "subject_syntax_types_supported";
}

impl TryFrom<Json> for SubjectSyntaxTypesSupported {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<SubjectSyntaxTypesSupported> for Json {
    fn from(value: SubjectSyntaxTypesSupported) -> Json {
        value.0.into()
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::core::{credential_format::ClaimFormatDesignation, object::UntypedObject};

    use super::*;

    fn metadata() -> UntypedObject {
        serde_json::from_value(json!(
        {
            "jwks":{
               "keys":[
                  {
                     "kty":"EC",
                     "crv":"P-256",
                     "x":"MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
                     "y":"4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM",
                     "use":"enc",
                     "kid":"1"
                  }
               ]
            },
            "authorization_signed_response_alg":"ES256",
            "authorization_encrypted_response_alg":"ECDH-ES",
            "authorization_encrypted_response_enc":"A256GCM",
            "id_token_signed_response_alg":["EdDSA", "ES256"],
            "subject_syntax_types_supported":["did:example", "urn:ietf:params:oauth:jwk-thumbprint"],
            "vp_formats":{ "mso_mdoc":{} }
        }
        ))
        .unwrap()
    }

    #[test]
    fn vp_formats() {
        let VpFormats(formats) = metadata().get().unwrap().unwrap();
        let declared: Vec<_> = ClaimFormatDesignation::declared_in(&formats).collect();
        assert_eq!(declared, vec![ClaimFormatDesignation::MsoMDoc]);
    }

    #[test]
    fn jwks() {
        let JWKs { keys } = metadata().get().unwrap().unwrap();
        assert_eq!(keys.len(), 1);

        let jwk = &keys[0];
        assert_eq!(jwk.get("kty").unwrap(), "EC");
        assert_eq!(jwk.get("use").unwrap(), "enc");
        assert_eq!(jwk.get("kid").unwrap(), "1");
    }

    #[test]
    fn signing_algorithms_as_string_or_array() {
        let AuthorizationSignedResponseAlg(single) = metadata().get().unwrap().unwrap();
        assert_eq!(single, vec!["ES256"]);

        let IdTokenSignedResponseAlg(many) = metadata().get().unwrap().unwrap();
        assert_eq!(many, vec!["EdDSA", "ES256"]);
    }

    #[test]
    fn authorization_encrypted_response_alg() {
        let AuthorizationEncryptedResponseAlg(s) = metadata().get().unwrap().unwrap();
        assert_eq!(s, "ECDH-ES");
        let AuthorizationEncryptedResponseEnc(s) = metadata().get().unwrap().unwrap();
        assert_eq!(s, "A256GCM");
    }

    #[test]
    fn subject_syntax_types() {
        let SubjectSyntaxTypesSupported(types) = metadata().get().unwrap().unwrap();
        assert_eq!(types.len(), 2);
    }
}
