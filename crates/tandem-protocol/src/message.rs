//! The positional message grammar.
//!
//! Every message is a JSON array. The sign of the first element tells the
//! two shapes apart:
//!
//! ```text
//! Invocation  [id >= 0, target, arg1, arg2, ...]
//! Response    [id <  0, error | null, result]
//! ```
//!
//! `id == 0` marks a fire-and-forget invocation: no response will ever be
//! sent for it. A response carries the negated id of the invocation it
//! answers. Arguments and results are already-encoded JSON values; turning
//! them into live values is the peer's job, not this crate's.

use serde_json::Value as JsonValue;

use crate::{FunctionHandle, ProtocolError, RequestId, Target, WrappedError, WrappedValue};

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// A request to run `target` with `args` on the receiving peer.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// `0` for fire-and-forget, otherwise the request id the response
    /// will echo (negated).
    pub id: u64,
    pub target: Target,
    /// Encoded arguments, in call order.
    pub args: Vec<JsonValue>,
}

impl Invocation {
    /// The request id, or `None` when the sender asked for no receipt.
    pub fn request_id(&self) -> Option<RequestId> {
        (self.id > 0).then_some(RequestId(self.id))
    }

    /// Returns `true` if the receiver must not respond.
    pub fn is_fire_and_forget(&self) -> bool {
        self.id == 0
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// The outcome of a receipted invocation.
///
/// Exactly one of `error` / `result` is meaningful: when `error` is set the
/// result slot holds the unit envelope.
///
/// `error` is the encoded rejection value. A well-behaved peer sends an
/// `Error` envelope, but any non-null value is a rejection; decoding it is
/// left to the receiver, like the result.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: RequestId,
    pub error: Option<JsonValue>,
    pub result: JsonValue,
}

impl Response {
    /// A successful response carrying an encoded result.
    pub fn success(id: RequestId, result: JsonValue) -> Self {
        Self {
            id,
            error: None,
            result,
        }
    }

    /// A failed response. The result slot is filled with the unit envelope.
    pub fn failure(id: RequestId, error: WrappedError) -> Self {
        Self {
            id,
            error: Some(error.into_wrapped().into_json()),
            result: WrappedValue::undefined().into_json(),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One message on the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Invocation(Invocation),
    Response(Response),
}

impl Message {
    /// Validates a raw message array against the grammar.
    ///
    /// A response without a result slot is accepted; its result is the
    /// unit envelope.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] when the array is empty, the id is
    /// not an integer, the target is neither a string nor a positive
    /// integer, or a response has trailing elements.
    pub fn parse(parts: Vec<JsonValue>) -> Result<Self, ProtocolError> {
        let mut parts = parts.into_iter();

        let id = match parts.next() {
            Some(JsonValue::Number(n)) => n.as_i64().ok_or_else(|| {
                ProtocolError::InvalidMessage(format!("id must be an integer, got {n}"))
            })?,
            Some(other) => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "id must be an integer, got {other}"
                )));
            }
            None => return Err(ProtocolError::InvalidMessage("empty message".into())),
        };

        if id >= 0 {
            let target = match parts.next() {
                Some(JsonValue::String(name)) => Target::Method(name),
                Some(JsonValue::Number(n)) => match n.as_u64() {
                    Some(handle) if handle > 0 => Target::Function(FunctionHandle(handle)),
                    _ => {
                        return Err(ProtocolError::InvalidMessage(format!(
                            "function handle must be a positive integer, got {n}"
                        )));
                    }
                },
                Some(other) => {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "target must be a method name or function handle, got {other}"
                    )));
                }
                None => {
                    return Err(ProtocolError::InvalidMessage(
                        "invocation is missing its target".into(),
                    ));
                }
            };
            return Ok(Message::Invocation(Invocation {
                id: id as u64,
                target,
                args: parts.collect(),
            }));
        }

        let error = match parts.next() {
            None | Some(JsonValue::Null) => None,
            Some(slot) => Some(slot),
        };
        let result = parts
            .next()
            .unwrap_or_else(|| WrappedValue::undefined().into_json());
        if parts.next().is_some() {
            return Err(ProtocolError::InvalidMessage(
                "response has more than three elements".into(),
            ));
        }

        Ok(Message::Response(Response {
            id: RequestId(id.unsigned_abs()),
            error,
            result,
        }))
    }

    /// Produces the positional array sent on the channel.
    pub fn into_wire(self) -> Vec<JsonValue> {
        match self {
            Message::Invocation(invocation) => {
                let mut wire = Vec::with_capacity(invocation.args.len() + 2);
                wire.push(JsonValue::from(invocation.id));
                wire.push(invocation.target.to_json());
                wire.extend(invocation.args);
                wire
            }
            Message::Response(response) => vec![
                JsonValue::from(response.id.response_wire_id()),
                response.error.unwrap_or(JsonValue::Null),
                response.result,
            ],
        }
    }

    /// The request a response-shaped array answers, judged by its first
    /// element alone.
    ///
    /// Lets a receiver settle the waiting caller even when the rest of the
    /// array fails [`parse`](Self::parse).
    pub fn response_id(parts: &[JsonValue]) -> Option<RequestId> {
        parts
            .first()
            .and_then(JsonValue::as_i64)
            .filter(|id| *id < 0)
            .map(|id| RequestId(id.unsigned_abs()))
    }
}

impl From<Invocation> for Message {
    fn from(invocation: Invocation) -> Self {
        Message::Invocation(invocation)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: JsonValue) -> Result<Message, ProtocolError> {
        let JsonValue::Array(parts) = value else {
            panic!("test input must be an array");
        };
        Message::parse(parts)
    }

    // =====================================================================
    // Invocations
    // =====================================================================

    #[test]
    fn test_parse_method_invocation() {
        let message = parse(json!([4, "add", 1, 2])).unwrap();
        let Message::Invocation(invocation) = message else {
            panic!("expected an invocation");
        };
        assert_eq!(invocation.request_id(), Some(RequestId(4)));
        assert_eq!(invocation.target, Target::from("add"));
        assert_eq!(invocation.args, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_parse_fire_and_forget_function_invocation() {
        let message = parse(json!([0, 7, "hi"])).unwrap();
        let Message::Invocation(invocation) = message else {
            panic!("expected an invocation");
        };
        assert!(invocation.is_fire_and_forget());
        assert_eq!(invocation.request_id(), None);
        assert_eq!(invocation.target, Target::Function(FunctionHandle(7)));
    }

    #[test]
    fn test_parse_invocation_without_args() {
        let message = parse(json!([1, "ping"])).unwrap();
        assert!(matches!(message, Message::Invocation(i) if i.args.is_empty()));
    }

    #[test]
    fn test_parse_rejects_bad_targets() {
        for bad in [json!([1]), json!([1, 0]), json!([1, -3]), json!([1, 1.5]), json!([1, null])] {
            assert!(
                matches!(parse(bad.clone()), Err(ProtocolError::InvalidMessage(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_bad_ids() {
        for bad in [json!([]), json!(["1", "ping"]), json!([1.5, "ping"]), json!([null])] {
            assert!(parse(bad.clone()).is_err(), "{bad} should be rejected");
        }
    }

    // =====================================================================
    // Responses
    // =====================================================================

    #[test]
    fn test_parse_success_response() {
        let message = parse(json!([-3, null, "pong"])).unwrap();
        assert_eq!(
            message,
            Message::Response(Response::success(RequestId(3), json!("pong")))
        );
    }

    #[test]
    fn test_parse_failure_response() {
        let message = parse(json!([-2, {"$": "Error", "message": "Craps"}, {"$": "Undefined"}]))
            .unwrap();
        let Message::Response(response) = message else {
            panic!("expected a response");
        };
        assert_eq!(response.id, RequestId(2));
        assert_eq!(
            response.error,
            Some(json!({"$": "Error", "message": "Craps"}))
        );
    }

    #[test]
    fn test_parse_keeps_non_error_rejection_value() {
        let message = parse(json!([-1, "oops", null])).unwrap();
        let Message::Response(response) = message else {
            panic!("expected a response");
        };
        assert_eq!(response.error, Some(json!("oops")));
    }

    #[test]
    fn test_parse_response_without_result_is_unit() {
        let message = parse(json!([-1, null])).unwrap();
        let Message::Response(response) = message else {
            panic!("expected a response");
        };
        assert_eq!(response.result, json!({"$": "Undefined"}));
    }

    #[test]
    fn test_parse_rejects_trailing_response_elements() {
        assert!(parse(json!([-1, null, 1, 2])).is_err());
    }

    #[test]
    fn test_response_id_survives_malformed_tail() {
        let parts = vec![json!(-5), json!(null), json!(1), json!(2)];
        assert!(Message::parse(parts.clone()).is_err());
        assert_eq!(Message::response_id(&parts), Some(RequestId(5)));
        assert_eq!(Message::response_id(&[json!(5), json!("ping")]), None);
        assert_eq!(Message::response_id(&[json!("x")]), None);
        assert_eq!(Message::response_id(&[]), None);
    }

    // =====================================================================
    // Wire form
    // =====================================================================

    #[test]
    fn test_into_wire_invocation() {
        let message = Message::from(Invocation {
            id: 0,
            target: Target::from("log"),
            args: vec![json!("hi")],
        });
        assert_eq!(message.into_wire(), vec![json!(0), json!("log"), json!("hi")]);
    }

    #[test]
    fn test_into_wire_failure_response_negates_id() {
        let message = Message::from(Response::failure(
            RequestId(9),
            WrappedError {
                message: "nope".into(),
                name: None,
                stack: None,
            },
        ));
        assert_eq!(
            message.into_wire(),
            vec![
                json!(-9),
                json!({"$": "Error", "message": "nope"}),
                json!({"$": "Undefined"})
            ]
        );
    }
}
