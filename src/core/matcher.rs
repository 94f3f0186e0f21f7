//! Evaluation of a [PresentationDefinition] against a holder's claims.
//!
//! Matching is pure. Descriptors, fields and paths are evaluated in
//! declaration order, and JSON objects keep their key order, so the same
//! inputs always produce the same [PresentationSubmission].

use jsonschema::JSONSchema;
use serde_json::Value as Json;
use serde_json_path::JsonPath;
use uuid::Uuid;

use super::{
    credential_format::ClaimFormatDesignation,
    input_descriptor::{ConstraintsField, InputDescriptor},
    presentation_definition::PresentationDefinition,
    presentation_submission::{DescriptorMap, PresentationSubmission},
};

/// Path recorded for a descriptor whose constraints have no fields.
const ROOT_PATH: &str = "$";

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("no input descriptor is satisfied by the claims")]
    NoDescriptorsSatisfied,
    #[error("input descriptor '{descriptor}' has an invalid path '{path}': {reason}")]
    InvalidPath {
        descriptor: String,
        path: String,
        reason: String,
    },
    #[error("input descriptor '{descriptor}' has a filter that is not a valid JSON schema: {reason}")]
    InvalidFilter { descriptor: String, reason: String },
}

/// Matches presentation definitions against claim payloads.
#[derive(Debug, Clone)]
pub struct PresentationMatcher {
    default_format: ClaimFormatDesignation,
}

impl Default for PresentationMatcher {
    fn default() -> Self {
        Self {
            default_format: ClaimFormatDesignation::JwtVp,
        }
    }
}

impl PresentationMatcher {
    /// Format tag used when neither the descriptor nor the definition declares one.
    pub fn with_default_format(default_format: ClaimFormatDesignation) -> Self {
        Self { default_format }
    }

    pub fn match_claims(
        &self,
        definition: &PresentationDefinition,
        claims: &Json,
    ) -> Result<PresentationSubmission, MatchError> {
        let compiled = definition
            .input_descriptors()
            .iter()
            .map(CompiledDescriptor::compile)
            .collect::<Result<Vec<_>, _>>()?;

        let descriptor_map: Vec<DescriptorMap> = compiled
            .iter()
            .filter_map(|descriptor| {
                let path = descriptor.evaluate(claims)?;
                let format = self.format_for(definition, descriptor.descriptor);
                Some(DescriptorMap::new(descriptor.descriptor.id(), format, path))
            })
            .collect();

        if descriptor_map.is_empty() && !definition.input_descriptors().is_empty() {
            return Err(MatchError::NoDescriptorsSatisfied);
        }

        Ok(PresentationSubmission::new(
            submission_id(definition, &descriptor_map).to_string(),
            definition.id().clone(),
            descriptor_map,
        ))
    }

    fn format_for(
        &self,
        definition: &PresentationDefinition,
        descriptor: &InputDescriptor,
    ) -> ClaimFormatDesignation {
        ClaimFormatDesignation::declared_in(descriptor.format())
            .next()
            .or_else(|| {
                definition
                    .format()
                    .and_then(|format| ClaimFormatDesignation::declared_in(format).next())
            })
            .unwrap_or_else(|| self.default_format.clone())
    }
}

struct CompiledDescriptor<'a> {
    descriptor: &'a InputDescriptor,
    fields: Vec<CompiledField>,
}

struct CompiledField {
    paths: Vec<JsonPath>,
    filter: Option<JSONSchema>,
}

impl<'a> CompiledDescriptor<'a> {
    fn compile(descriptor: &'a InputDescriptor) -> Result<Self, MatchError> {
        let fields = descriptor
            .constraints()
            .fields()
            .iter()
            .map(|field| CompiledField::compile(descriptor.id(), field))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { descriptor, fields })
    }

    /// The normalized location of the first field's match, if every field matched.
    fn evaluate(&self, claims: &Json) -> Option<String> {
        let mut first = None;
        for field in &self.fields {
            let location = match field.evaluate(claims) {
                Some(location) => location,
                None => {
                    tracing::debug!(
                        "input descriptor '{}' is not satisfied",
                        self.descriptor.id()
                    );
                    return None;
                }
            };
            first.get_or_insert(location);
        }
        Some(first.unwrap_or_else(|| ROOT_PATH.to_owned()))
    }
}

impl CompiledField {
    fn compile(descriptor: &str, field: &ConstraintsField) -> Result<Self, MatchError> {
        let paths = field
            .path()
            .iter()
            .map(|path| {
                JsonPath::parse(path).map_err(|e| MatchError::InvalidPath {
                    descriptor: descriptor.to_owned(),
                    path: path.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let filter = field
            .filter()
            .map(|schema| {
                JSONSchema::compile(schema).map_err(|e| MatchError::InvalidFilter {
                    descriptor: descriptor.to_owned(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self { paths, filter })
    }

    /// The first path selecting anything decides; with a filter, its first
    /// node passing the filter is the match.
    fn evaluate(&self, claims: &Json) -> Option<String> {
        let nodes = self
            .paths
            .iter()
            .map(|path| path.query_located(claims))
            .find(|nodes| !nodes.is_empty())?;

        let matched = match &self.filter {
            None => nodes.iter().next(),
            Some(filter) => nodes.iter().find(|node| filter.is_valid(node.node())),
        };
        matched.map(|node| node.location().to_string())
    }
}

/// Name-based UUID over the definition id and the descriptor map, so equal
/// inputs get equal submission ids.
fn submission_id(definition: &PresentationDefinition, descriptor_map: &[DescriptorMap]) -> Uuid {
    let mut name = definition.id().clone();
    for entry in descriptor_map {
        name.push('\n');
        name.push_str(entry.id());
        name.push('\0');
        name.push_str(entry.format().as_ref());
        name.push('\0');
        name.push_str(entry.path());
    }
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}
