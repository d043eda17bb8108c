//! Envelopes for values that cannot cross the channel verbatim.
//!
//! A primitive (string, number, boolean, null) travels as itself. Anything
//! else travels as an envelope: a JSON object whose `"$"` field names the
//! codec that produced it, plus whatever fields that codec needs.
//!
//! ```text
//! {"$": "Error", "message": "Craps", "name": "Error"}
//! {"$": "Function", "id": 3}
//! {"$": "Undefined"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{FunctionHandle, ProtocolError};

/// Name of the field that carries an envelope's kind.
pub const ENVELOPE_TAG: &str = "$";

/// Kind of the nullary envelope standing in for "no value" (unit).
///
/// JSON has no `undefined`, so unit needs an envelope of its own. The
/// encoder and decoder handle it directly; no codec may claim this name.
pub const UNDEFINED_KIND: &str = "Undefined";

// ---------------------------------------------------------------------------
// WrappedValue
// ---------------------------------------------------------------------------

/// A tagged structure standing in for a value that can't cross as-is.
///
/// `kind` is serialized as the `"$"` field and every other field is
/// flattened next to it, so `WrappedValue { kind: "Function", fields:
/// {"id": 3} }` becomes `{"$": "Function", "id": 3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrappedValue {
    /// Name of the codec that produced (and can reverse) this envelope.
    #[serde(rename = "$")]
    pub kind: String,

    /// Codec-specific payload.
    #[serde(flatten)]
    pub fields: Map<String, JsonValue>,
}

impl WrappedValue {
    /// Creates an envelope with no fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// The nullary `Undefined` envelope.
    pub fn undefined() -> Self {
        Self::new(UNDEFINED_KIND)
    }

    /// Adds a field, builder style.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns `true` for the unit envelope.
    pub fn is_undefined(&self) -> bool {
        self.kind == UNDEFINED_KIND
    }

    /// Recognizes an envelope inside an arbitrary JSON value.
    ///
    /// Anything that is an object with a string `"$"` field counts. Returns
    /// `None` for primitives, arrays and plain objects.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        let object = value.as_object()?;
        let kind = object.get(ENVELOPE_TAG)?.as_str()?.to_string();
        let fields = object
            .iter()
            .filter(|(key, _)| key.as_str() != ENVELOPE_TAG)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Some(Self { kind, fields })
    }

    /// Converts into the JSON object placed on the wire.
    pub fn into_json(self) -> JsonValue {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert(ENVELOPE_TAG.to_string(), JsonValue::String(self.kind));
        object.extend(self.fields);
        JsonValue::Object(object)
    }

    /// Reads an optional string field. `null` counts as absent.
    fn optional_str(&self, key: &str) -> Result<Option<String>, ProtocolError> {
        match self.fields.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(ProtocolError::InvalidEnvelope(format!(
                "{} envelope field `{key}` must be a string, got {other}",
                self.kind
            ))),
        }
    }

    fn expect_kind(&self, kind: &str) -> Result<(), ProtocolError> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(ProtocolError::InvalidEnvelope(format!(
                "expected a {kind} envelope, got {}",
                self.kind
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// WrappedError
// ---------------------------------------------------------------------------

/// The fields of an `Error` envelope.
///
/// `message` is mandatory; `name` and `stack` are carried when the
/// producing side had them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedError {
    pub message: String,
    pub name: Option<String>,
    pub stack: Option<String>,
}

impl WrappedError {
    /// Envelope kind for errors.
    pub const KIND: &'static str = "Error";

    /// Builds the envelope, omitting absent optional fields.
    pub fn into_wrapped(self) -> WrappedValue {
        let mut wrapped = WrappedValue::new(Self::KIND).with_field("message", self.message);
        if let Some(name) = self.name {
            wrapped = wrapped.with_field("name", name);
        }
        if let Some(stack) = self.stack {
            wrapped = wrapped.with_field("stack", stack);
        }
        wrapped
    }

    /// Validates and extracts the fields of an `Error` envelope.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidEnvelope`] if the kind is wrong, `message`
    /// is missing or not a string, or `name`/`stack` are present but not
    /// strings.
    pub fn from_wrapped(wrapped: &WrappedValue) -> Result<Self, ProtocolError> {
        wrapped.expect_kind(Self::KIND)?;
        let message = wrapped
            .fields
            .get("message")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| {
                ProtocolError::InvalidEnvelope("Error envelope needs a string `message`".into())
            })?
            .to_string();
        Ok(Self {
            message,
            name: wrapped.optional_str("name")?,
            stack: wrapped.optional_str("stack")?,
        })
    }
}

// ---------------------------------------------------------------------------
// WrappedFunction
// ---------------------------------------------------------------------------

/// The fields of a `Function` envelope: just the owner's handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrappedFunction {
    pub id: FunctionHandle,
}

impl WrappedFunction {
    /// Envelope kind for anonymous functions.
    pub const KIND: &'static str = "Function";

    pub fn into_wrapped(self) -> WrappedValue {
        WrappedValue::new(Self::KIND).with_field("id", self.id.0)
    }

    /// Validates and extracts the handle of a `Function` envelope.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidEnvelope`] unless `id` is a positive integer.
    pub fn from_wrapped(wrapped: &WrappedValue) -> Result<Self, ProtocolError> {
        wrapped.expect_kind(Self::KIND)?;
        match wrapped.fields.get("id").and_then(JsonValue::as_u64) {
            Some(id) if id > 0 => Ok(Self {
                id: FunctionHandle(id),
            }),
            _ => Err(ProtocolError::InvalidEnvelope(
                "Function envelope needs a positive integer `id`".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // =====================================================================
    // WrappedValue
    // =====================================================================

    #[test]
    fn test_wrapped_value_serializes_with_dollar_tag() {
        let wrapped = WrappedValue::new("Point").with_field("x", 1).with_field("y", 2);
        let json = serde_json::to_value(&wrapped).unwrap();
        assert_eq!(json, json!({"$": "Point", "x": 1, "y": 2}));
        assert_eq!(wrapped.into_json(), json);
    }

    #[test]
    fn test_wrapped_value_deserializes_with_serde() {
        let wrapped: WrappedValue =
            serde_json::from_value(json!({"$": "Function", "id": 9})).unwrap();
        assert_eq!(wrapped.kind, "Function");
        assert_eq!(wrapped.fields.get("id"), Some(&json!(9)));
    }

    #[test]
    fn test_from_json_recognizes_envelopes_only() {
        assert!(WrappedValue::from_json(&json!({"$": "Undefined"})).unwrap().is_undefined());
        assert!(WrappedValue::from_json(&json!({"kind": "Error"})).is_none());
        assert!(WrappedValue::from_json(&json!({"$": 3})).is_none());
        assert!(WrappedValue::from_json(&json!([1, 2])).is_none());
        assert!(WrappedValue::from_json(&json!("Error")).is_none());
    }

    // =====================================================================
    // WrappedError
    // =====================================================================

    #[test]
    fn test_wrapped_error_omits_absent_fields() {
        let wrapped = WrappedError {
            message: "Craps".into(),
            name: None,
            stack: None,
        }
        .into_wrapped();
        assert_eq!(wrapped.into_json(), json!({"$": "Error", "message": "Craps"}));
    }

    #[test]
    fn test_wrapped_error_round_trips_all_fields() {
        let error = WrappedError {
            message: "boom".into(),
            name: Some("TypeError".into()),
            stack: Some("at line 1".into()),
        };
        let back = WrappedError::from_wrapped(&error.clone().into_wrapped()).unwrap();
        assert_eq!(back, error);
    }

    #[test]
    fn test_wrapped_error_without_message_is_invalid() {
        let wrapped = WrappedValue::from_json(&json!({"$": "Error", "name": "x"})).unwrap();
        assert!(matches!(
            WrappedError::from_wrapped(&wrapped),
            Err(ProtocolError::InvalidEnvelope(_))
        ));
    }

    #[test]
    fn test_wrapped_error_with_non_string_name_is_invalid() {
        let wrapped =
            WrappedValue::from_json(&json!({"$": "Error", "message": "m", "name": 4})).unwrap();
        assert!(WrappedError::from_wrapped(&wrapped).is_err());
    }

    #[test]
    fn test_wrapped_error_null_optional_fields_are_absent() {
        let wrapped = WrappedValue::from_json(
            &json!({"$": "Error", "message": "m", "name": null, "stack": null}),
        )
        .unwrap();
        let error = WrappedError::from_wrapped(&wrapped).unwrap();
        assert_eq!(error.name, None);
        assert_eq!(error.stack, None);
    }

    // =====================================================================
    // WrappedFunction
    // =====================================================================

    #[test]
    fn test_wrapped_function_json_shape() {
        let wrapped = WrappedFunction {
            id: FunctionHandle(3),
        }
        .into_wrapped();
        assert_eq!(wrapped.into_json(), json!({"$": "Function", "id": 3}));
    }

    #[test]
    fn test_wrapped_function_rejects_zero_and_missing_id() {
        let zero = WrappedValue::from_json(&json!({"$": "Function", "id": 0})).unwrap();
        let missing = WrappedValue::from_json(&json!({"$": "Function"})).unwrap();
        assert!(WrappedFunction::from_wrapped(&zero).is_err());
        assert!(WrappedFunction::from_wrapped(&missing).is_err());
    }

    #[test]
    fn test_wrapped_function_rejects_wrong_kind() {
        let wrapped = WrappedValue::new("Error").with_field("id", 1);
        assert!(WrappedFunction::from_wrapped(&wrapped).is_err());
    }
}
