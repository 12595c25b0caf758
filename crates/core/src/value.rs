//! Values exchanged with concepts and the success/error outcome union.

pub use serde_json::Value;

/// A named argument or result map, e.g. `{ "user": "u1", "name": "Ada" }`.
pub type Fields = serde_json::Map<String, Value>;

/// The result of a concept action.
///
/// Every mutating action either succeeds with a map of result fields or
/// refuses with a human-readable message. Refusals are ordinary data: they
/// are recorded in the invocation log as `{ "error": message }` and handled
/// by synchronizations like any other result.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Fields),
    Error(String),
}

impl Outcome {
    /// A success carrying the given fields.
    pub fn success(fields: Fields) -> Self {
        Outcome::Success(fields)
    }

    /// A success with a single field.
    pub fn field(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = Fields::new();
        fields.insert(key.into(), value.into());
        Outcome::Success(fields)
    }

    /// A success with no result fields.
    pub fn empty() -> Self {
        Outcome::Success(Fields::new())
    }

    /// A domain refusal.
    pub fn error(message: impl Into<String>) -> Self {
        Outcome::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    /// The output map recorded for this outcome.
    pub fn into_fields(self) -> Fields {
        match self {
            Outcome::Success(fields) => fields,
            Outcome::Error(message) => {
                let mut fields = Fields::new();
                fields.insert("error".into(), Value::String(message));
                fields
            }
        }
    }

    /// Recover an outcome from a recorded output map.
    ///
    /// A map with a string `error` field is a refusal; anything else is a
    /// success.
    pub fn from_fields(fields: Fields) -> Self {
        match fields.get("error") {
            Some(Value::String(message)) => Outcome::Error(message.clone()),
            _ => Outcome::Success(fields),
        }
    }
}

/// Convert a JSON value into a field map. Non-objects yield an empty map.
pub fn to_fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Read a required string argument.
pub fn require_str<'a>(
    input: &'a Fields,
    operation: &str,
    key: &str,
) -> Result<&'a str, crate::ConceptError> {
    match input.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(crate::ConceptError::InvalidInput {
            operation: operation.to_string(),
            reason: format!("field '{key}' must be a string, got {other}"),
        }),
        None => Err(crate::ConceptError::InvalidInput {
            operation: operation.to_string(),
            reason: format!("missing field '{key}'"),
        }),
    }
}

/// Read an optional string argument. `null` counts as absent.
pub fn optional_str<'a>(
    input: &'a Fields,
    operation: &str,
    key: &str,
) -> Result<Option<&'a str>, crate::ConceptError> {
    match input.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(crate::ConceptError::InvalidInput {
            operation: operation.to_string(),
            reason: format!("field '{key}' must be a string, got {other}"),
        }),
    }
}
