//! Turning [`Value`]s into wire JSON and back.
//!
//! Both walkers are stateless per call and borrow the peer's
//! [`CodecRegistry`]:
//!
//! ```text
//! Encoder:  primitive ──► itself
//!           Unit      ──► {"$": "Undefined"}
//!           other     ──► first codec that claims it ──► envelope
//!           Json      ──► itself (when no codec claims it)
//!
//! Decoder:  primitive ──► itself
//!           {"$": "Undefined"} ──► Unit
//!           {"$": kind, ...}   ──► codec named `kind`
//!           other array/object ──► Json
//! ```

use serde_json::Value as JsonValue;
use tandem_protocol::WrappedValue;

use crate::{CodecRegistry, DecodeContext, PeerError, Value};

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Encoder<'a> {
    codecs: &'a CodecRegistry,
}

impl<'a> Encoder<'a> {
    pub fn new(codecs: &'a CodecRegistry) -> Self {
        Self { codecs }
    }

    /// Encodes one value.
    ///
    /// # Errors
    /// [`PeerError::EncodeFailed`] for a value with no JSON form that no
    /// codec claims (typically a [`CustomValue`](crate::CustomValue) whose
    /// codec isn't registered), or whatever the claiming codec returns.
    pub fn encode(&self, value: &Value) -> Result<JsonValue, PeerError> {
        match value {
            Value::Unit => return Ok(WrappedValue::undefined().into_json()),
            Value::Null => return Ok(JsonValue::Null),
            Value::Bool(b) => return Ok(JsonValue::Bool(*b)),
            Value::Number(n) => return Ok(JsonValue::Number(n.clone())),
            Value::String(s) => return Ok(JsonValue::String(s.clone())),
            _ => {}
        }

        if let Some(codec) = self.codecs.find_encoder(value) {
            return Ok(codec.encode(value)?.into_json());
        }

        match value {
            Value::Json(json) => Ok(json.clone()),
            other => Err(PeerError::EncodeFailed(format!(
                "no codec claims a {} value",
                other.type_name()
            ))),
        }
    }

    /// Encodes a list of values, stopping at the first failure.
    pub fn encode_all(&self, values: &[Value]) -> Result<Vec<JsonValue>, PeerError> {
        values.iter().map(|value| self.encode(value)).collect()
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    codecs: &'a CodecRegistry,
    context: &'a DecodeContext,
}

impl<'a> Decoder<'a> {
    pub fn new(codecs: &'a CodecRegistry, context: &'a DecodeContext) -> Self {
        Self { codecs, context }
    }

    /// Decodes one wire value.
    ///
    /// # Errors
    /// [`PeerError::UnregisteredCodec`] for an envelope no local codec is
    /// named after, or whatever that codec returns.
    pub fn decode(&self, json: &JsonValue) -> Result<Value, PeerError> {
        let Some(wrapped) = WrappedValue::from_json(json) else {
            return Ok(Value::from_json(json.clone()));
        };
        if wrapped.is_undefined() {
            return Ok(Value::Unit);
        }
        let codec = self
            .codecs
            .get(&wrapped.kind)
            .ok_or_else(|| PeerError::UnregisteredCodec(wrapped.kind.clone()))?;
        codec.decode(wrapped, self.context)
    }

    /// Decodes a list of wire values, stopping at the first failure.
    pub fn decode_all(&self, values: &[JsonValue]) -> Result<Vec<Value>, PeerError> {
        values.iter().map(|value| self.decode(value)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Weak};

    use serde_json::json;
    use tandem_protocol::Target;

    use super::*;
    use crate::{CustomValue, Function, FunctionRegistry, Invocation, Invoker, RemoteError};

    struct NoPeer;

    impl Invoker for NoPeer {
        fn invoke_target(&self, _target: Target, _args: Vec<Value>) -> Invocation {
            Invocation::failed(PeerError::Disposed)
        }
    }

    fn registry() -> CodecRegistry {
        CodecRegistry::with_builtins(Arc::new(FunctionRegistry::new()))
    }

    fn context() -> DecodeContext {
        DecodeContext::new(Weak::<NoPeer>::new())
    }

    // =====================================================================
    // Primitives
    // =====================================================================

    #[test]
    fn test_primitives_pass_through_both_ways() {
        let codecs = registry();
        let context = context();
        let encoder = Encoder::new(&codecs);
        let decoder = Decoder::new(&codecs, &context);

        for json in [json!("text"), json!(3), json!(-2.5), json!(true), json!(null)] {
            let value = decoder.decode(&json).unwrap();
            assert_eq!(encoder.encode(&value).unwrap(), json);
        }
    }

    #[test]
    fn test_unit_uses_undefined_envelope() {
        let codecs = registry();
        let context = context();
        let encoded = Encoder::new(&codecs).encode(&Value::Unit).unwrap();
        assert_eq!(encoded, json!({"$": "Undefined"}));
        assert!(Decoder::new(&codecs, &context).decode(&encoded).unwrap().is_unit());
    }

    #[test]
    fn test_plain_structures_pass_through() {
        let codecs = registry();
        let context = context();
        let structure = json!({"entries": ["hello", "world"]});

        let encoded = Encoder::new(&codecs)
            .encode(&Value::Json(structure.clone()))
            .unwrap();
        assert_eq!(encoded, structure);

        let decoded = Decoder::new(&codecs, &context).decode(&structure).unwrap();
        assert_eq!(decoded.as_json(), Some(&structure));
    }

    // =====================================================================
    // Codec dispatch
    // =====================================================================

    #[test]
    fn test_error_round_trip_keeps_fields() {
        let codecs = registry();
        let context = context();
        let error = RemoteError::new("Craps").with_name("Error").with_stack("trace");

        let encoded = Encoder::new(&codecs).encode(&Value::Error(error.clone())).unwrap();
        let decoded = Decoder::new(&codecs, &context).decode(&encoded).unwrap();
        assert_eq!(decoded.as_error(), Some(&error));
    }

    #[test]
    fn test_function_encodes_to_handle() {
        let functions = Arc::new(FunctionRegistry::new());
        let codecs = CodecRegistry::with_builtins(functions.clone());
        let f = Function::from_fn(|_| Ok(Value::Unit));

        let encoded = Encoder::new(&codecs)
            .encode_all(&[Value::Function(f.clone()), Value::Function(f)])
            .unwrap();
        assert_eq!(
            encoded,
            vec![json!({"$": "Function", "id": 1}), json!({"$": "Function", "id": 2})]
        );
        assert_eq!(functions.len(), 2);
    }

    #[test]
    fn test_unknown_envelope_kind_is_unregistered_codec() {
        let codecs = registry();
        let context = context();
        let err = Decoder::new(&codecs, &context)
            .decode(&json!({"$": "Point", "x": 1}))
            .unwrap_err();
        assert!(matches!(err, PeerError::UnregisteredCodec(kind) if kind == "Point"));
    }

    #[test]
    fn test_malformed_builtin_envelope_is_protocol_error() {
        let codecs = registry();
        let context = context();
        let err = Decoder::new(&codecs, &context)
            .decode(&json!({"$": "Function", "id": "one"}))
            .unwrap_err();
        assert!(matches!(err, PeerError::Protocol(_)));
    }

    #[test]
    fn test_unclaimed_custom_value_fails_to_encode() {
        let codecs = registry();
        let err = Encoder::new(&codecs)
            .encode(&Value::Custom(CustomValue::new(42_u8)))
            .unwrap_err();
        assert!(matches!(err, PeerError::EncodeFailed(_)));
    }

    #[test]
    fn test_decode_all_stops_at_first_failure() {
        let codecs = registry();
        let context = context();
        let result = Decoder::new(&codecs, &context)
            .decode_all(&[json!(1), json!({"$": "Nope"}), json!(2)]);
        assert!(result.is_err());
    }
}
