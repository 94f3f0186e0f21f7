use super::{credential_format::*, object::TypedParameter};

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A DescriptorMapId is a unique identifier for a DescriptorMap.
pub type DescriptorMapId = String;

/// Presentation Submissions express how the inputs presented as proofs to a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) are
/// provided in accordance with the requirements specified in a
/// [PresentationDefinition](super::presentation_definition::PresentationDefinition).
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationSubmission {
    id: String,
    definition_id: DescriptorMapId,
    descriptor_map: Vec<DescriptorMap>,
}

impl TypedParameter for PresentationSubmission {
    const KEY: &'static str = "presentation_submission";
}

impl TryFrom<Json> for PresentationSubmission {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        serde_json::from_value(value).map_err(Into::into)
    }
}

impl TryFrom<PresentationSubmission> for Json {
    type Error = Error;

    fn try_from(value: PresentationSubmission) -> Result<Self, Self::Error> {
        serde_json::to_value(value).context("failed to serialize presentation submission")
    }
}

impl PresentationSubmission {
    /// The `definition_id` MUST be the id of the presentation definition the
    /// submission answers. The `descriptor_map` lists the satisfied descriptors
    /// in definition order.
    pub fn new(
        id: String,
        definition_id: DescriptorMapId,
        descriptor_map: Vec<DescriptorMap>,
    ) -> Self {
        Self {
            id,
            definition_id,
            descriptor_map,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn definition_id(&self) -> &String {
        &self.definition_id
    }

    pub fn descriptor_map(&self) -> &Vec<DescriptorMap> {
        &self.descriptor_map
    }
}

/// Descriptor Maps are objects used to describe the information a
/// [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder)
/// provides to a [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescriptorMap {
    id: DescriptorMapId,
    format: ClaimFormatDesignation,
    path: String,
}

impl DescriptorMap {
    /// Create a new descriptor map.
    ///
    /// `id` is the id of the satisfied input descriptor, `path` the normalized JSONPath
    /// (e.g. `$['credentialSubject']['given_name']`) of the claim that satisfied it.
    pub fn new(
        id: impl Into<DescriptorMapId>,
        format: ClaimFormatDesignation,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            format,
            path: path.into(),
        }
    }

    pub fn id(&self) -> &DescriptorMapId {
        &self.id
    }

    pub fn format(&self) -> &ClaimFormatDesignation {
        &self.format
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape() {
        let submission = PresentationSubmission::new(
            "a30e3b91-fb77-4d22-95fa-871689c322e2".into(),
            "pd".into(),
            vec![DescriptorMap::new("d1", ClaimFormatDesignation::JwtVp, "$")],
        );

        assert_eq!(
            serde_json::to_value(&submission).unwrap(),
            json!({
                "id": "a30e3b91-fb77-4d22-95fa-871689c322e2",
                "definition_id": "pd",
                "descriptor_map": [{"id": "d1", "format": "jwt_vp", "path": "$"}]
            })
        );
    }

    #[test]
    fn submission_ids_are_opaque_strings() {
        let submission: PresentationSubmission = serde_json::from_value(json!({
            "id": "psId",
            "definition_id": "pd",
            "descriptor_map": [{"id": "d1", "format": "jwt_vc_json", "path": "$"}]
        }))
        .unwrap();

        assert_eq!(submission.id(), "psId");
        assert_eq!(
            submission.descriptor_map()[0].format(),
            &ClaimFormatDesignation::JwtVcJson
        );
    }
}
