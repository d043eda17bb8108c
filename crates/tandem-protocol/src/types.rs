//! Identity types used on the wire.
//!
//! Both identifiers are plain positive integers once serialized. The
//! newtypes exist so a request id can never be passed where a function
//! handle is expected (and vice versa), even though both are `u64`
//! underneath.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// Identifier of an invocation for which the sender awaits a receipt.
///
/// Always positive. On the wire the invocation carries `id` and the
/// matching response carries `-id`; the value `0` is reserved for
/// fire-and-forget invocations and is never wrapped in a `RequestId`
/// (see [`Invocation::id`](crate::Invocation::id)).
///
/// `#[serde(transparent)]` makes `RequestId(7)` serialize as `7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    /// The negated wire form used by the response.
    pub fn response_wire_id(self) -> i64 {
        -(self.0 as i64)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// FunctionHandle
// ---------------------------------------------------------------------------

/// Handle of an anonymous function registered on the peer that owns it.
///
/// Handles start at 1 and are never reused for the lifetime of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionHandle(pub u64);

impl fmt::Display for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// What an invocation calls on the receiving peer.
///
/// Serialized untagged: a method is a JSON string, a function handle a
/// JSON integer. That's exactly the second slot of the Invocation array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    /// A named method on the receiver's exposed API.
    Method(String),
    /// An anonymous function the receiver registered when it encoded it.
    Function(FunctionHandle),
}

impl Target {
    /// Converts into the JSON value placed in the target slot.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Target::Method(name) => serde_json::Value::String(name.clone()),
            Target::Function(handle) => serde_json::Value::from(handle.0),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Method(name) => write!(f, "{name}"),
            Target::Function(handle) => write!(f, "{handle}"),
        }
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Method(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::Method(name)
    }
}

impl From<FunctionHandle> for Target {
    fn from(handle: FunctionHandle) -> Self {
        Target::Function(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&RequestId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_request_id_response_wire_id_is_negated() {
        assert_eq!(RequestId(3).response_wire_id(), -3);
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(RequestId(7).to_string(), "req-7");
        assert_eq!(FunctionHandle(2).to_string(), "fn-2");
    }

    #[test]
    fn test_target_method_serializes_as_string() {
        let json = serde_json::to_value(Target::from("ping")).unwrap();
        assert_eq!(json, serde_json::json!("ping"));
    }

    #[test]
    fn test_target_function_serializes_as_integer() {
        let target = Target::Function(FunctionHandle(5));
        assert_eq!(serde_json::to_value(&target).unwrap(), serde_json::json!(5));
        assert_eq!(target.to_json(), serde_json::json!(5));
    }
}
