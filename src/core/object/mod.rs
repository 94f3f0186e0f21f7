use anyhow::{Context, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Parameters whose value is a JSON document even when they travel inside a
/// urlencoded query string.
const JSON_VALUED_PARAMETERS: &[&str] = &[
    "presentation_definition",
    "client_metadata",
    "presentation_submission",
];

/// An untyped (JSON) object from which [TypedParameters](TypedParameter) are parsed.
///
/// Represents request parameters, request object claims, client metadata and
/// response parameters alike. Keys keep their insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UntypedObject(pub(crate) Map<String, Json>);

/// A strongly typed parameter that can represent metadata entries or request parameters.
pub trait TypedParameter:
    TryFrom<Json, Error = anyhow::Error> + TryInto<Json> + Clone + std::fmt::Debug
{
    const KEY: &'static str;
}

impl UntypedObject {
    /// Parse urlencoded query parameters.
    ///
    /// Values of known JSON-valued parameters are decoded as JSON, every other
    /// value is kept as a string.
    pub fn from_query(query: &str) -> Result<Self> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(query).context("query is not valid urlencoded data")?;

        let mut map = Map::new();
        for (key, value) in pairs {
            let value = if JSON_VALUED_PARAMETERS.contains(&key.as_str()) {
                serde_json::from_str(&value)
                    .with_context(|| format!("'{key}' is not a valid JSON document"))?
            } else {
                Json::String(value)
            };
            map.insert(key, value);
        }
        Ok(Self(map))
    }

    /// Get a [TypedParameter] from the object or return its default value.
    pub fn get_or_default<T: TypedParameter + Default>(&self) -> Result<T> {
        Ok(self
            .0
            .get(T::KEY)
            .cloned()
            .map(TryInto::try_into)
            .transpose()?
            .unwrap_or_default())
    }

    /// Get a [TypedParameter] from the object.
    ///
    /// Returns `None` when the key is absent. The underlying value is cloned.
    pub fn get<T: TypedParameter>(&self) -> Option<Result<T>> {
        Some(self.0.get(T::KEY)?.clone().try_into().map_err(Into::into))
    }

    /// Whether the object has an entry for this [TypedParameter].
    pub fn contains<T: TypedParameter>(&self) -> bool {
        self.0.contains_key(T::KEY)
    }

    /// Insert a [TypedParameter], replacing any existing entry.
    pub fn insert<T: TypedParameter>(&mut self, t: T) -> Result<()> {
        let value = t
            .try_into()
            .map_err(|_| Error::msg(format!("'{}' could not be serialized", T::KEY)))?;
        self.0.insert(T::KEY.to_owned(), value);
        Ok(())
    }

    /// Insert a raw claim.
    pub fn insert_raw(&mut self, key: impl Into<String>, value: impl Into<Json>) {
        self.0.insert(key.into(), value.into());
    }

    /// Borrow a raw claim.
    pub fn get_raw(&self, key: &str) -> Option<&Json> {
        self.0.get(key)
    }

    /// Flatten into `application/x-www-form-urlencoded` pairs.
    ///
    /// Strings are emitted verbatim, every other value as its JSON serialization.
    pub fn flatten_for_form(&self) -> Result<Vec<(String, String)>> {
        self.0
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Json::String(s) => s.clone(),
                    other => serde_json::to_string(other)
                        .with_context(|| format!("'{key}' could not be serialized"))?,
                };
                Ok((key.clone(), value))
            })
            .collect()
    }

    pub fn into_inner(self) -> Map<String, Json> {
        self.0
    }
}

impl From<Map<String, Json>> for UntypedObject {
    fn from(value: Map<String, Json>) -> Self {
        Self(value)
    }
}

impl From<UntypedObject> for Json {
    fn from(value: UntypedObject) -> Self {
        value.0.into()
    }
}

impl TryFrom<Json> for UntypedObject {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        match value {
            Json::Object(map) => Ok(Self(map)),
            other => Err(Error::msg(format!("expected a JSON object, found {other}"))),
        }
    }
}

pub trait ParsingErrorContext {
    type T: TypedParameter;

    fn parsing_error(self) -> Result<Self::T>;
}

impl<T: TypedParameter> ParsingErrorContext for Option<Result<T>> {
    type T = T;

    fn parsing_error(self) -> Result<T> {
        self.context(format!("'{}' is missing", T::KEY))?
            .context(format!("'{}' could not be parsed", T::KEY))
    }
}

impl<T: TypedParameter> ParsingErrorContext for Result<T> {
    type T = T;

    fn parsing_error(self) -> Result<T> {
        self.context(format!("'{}' could not be parsed", T::KEY))
    }
}
