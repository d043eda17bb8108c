//! Values that cross the channel.
//!
//! The remote side is dynamically typed, so everything an exposed function
//! receives or returns is a [`Value`]. Most variants map one-to-one onto
//! JSON; the rest ([`Function`], [`RemoteError`], [`CustomValue`]) need a
//! codec to travel.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{Number, Value as JsonValue};

use crate::RemoteError;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// An argument or return value.
///
/// | variant      | on the wire                        |
/// |--------------|------------------------------------|
/// | `Unit`       | `{"$": "Undefined"}`               |
/// | `Null`       | `null`                             |
/// | `Bool`       | `true` / `false`                   |
/// | `Number`     | a JSON number                      |
/// | `String`     | a JSON string                      |
/// | `Function`   | `{"$": "Function", "id": n}`       |
/// | `Error`      | `{"$": "Error", "message": ...}`   |
/// | `Custom`     | whatever its codec produces        |
/// | `Json`       | the array/object itself            |
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// No value at all. What a function that "returns nothing" returns.
    #[default]
    Unit,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Function(Function),
    Error(RemoteError),
    Custom(CustomValue),
    /// Plain structured data (arrays and objects without an envelope tag).
    Json(JsonValue),
}

impl Value {
    /// Lifts a plain JSON value, keeping primitives as their own variants.
    ///
    /// No envelope detection happens here: an object with a `"$"` field
    /// stays `Value::Json`. Use a [`Decoder`](crate::Decoder) for wire data.
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Number(n),
            JsonValue::String(s) => Value::String(s),
            other => Value::Json(other),
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&RemoteError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_custom(&self) -> Option<&CustomValue> {
        match self {
            Value::Custom(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Value::Json(j) => Some(j),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Error(_) => "error",
            Value::Custom(c) => c.type_name(),
            Value::Json(_) => "json",
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `Null`, the same
    /// thing `JSON.stringify` does.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<RemoteError> for Value {
    fn from(e: RemoteError) -> Self {
        Value::Error(e)
    }
}

impl From<CustomValue> for Value {
    fn from(c: CustomValue) -> Self {
        Value::Custom(c)
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Value::from_json(json)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Function
// ---------------------------------------------------------------------------

/// The future every [`Function`] call returns.
pub type FunctionFuture = BoxFuture<'static, Result<Value, RemoteError>>;

type Callable = dyn Fn(Vec<Value>) -> FunctionFuture + Send + Sync;

/// A cloneable, type-erased async function over [`Value`]s.
///
/// Local functions are built with [`Function::new`] (async body) or
/// [`Function::from_fn`] (sync body). Functions received from the remote
/// side are proxies: calling one sends an invocation back through the
/// peer that decoded it, and the returned future behaves like an
/// [`Invocation`](crate::Invocation) (await it right away to get the
/// result).
///
/// Cloning is cheap (an `Arc` bump). Two clones are the same function
/// as far as [`ptr_eq`](Function::ptr_eq) is concerned.
#[derive(Clone)]
pub struct Function {
    inner: Arc<Callable>,
}

impl Function {
    /// Wraps an async closure.
    ///
    /// ```rust
    /// use tandem_peer::{Function, Value};
    ///
    /// let add = Function::new(|args: Vec<Value>| async move {
    ///     let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
    ///     Ok(Value::from(sum))
    /// });
    /// # let _ = add;
    /// ```
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RemoteError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |args| -> FunctionFuture { Box::pin(f(args)) }),
        }
    }

    /// Wraps a synchronous closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, RemoteError> + Send + Sync + 'static,
    {
        Self::new(move |args| std::future::ready(f(args)))
    }

    /// Calls the function.
    pub fn call(&self, args: Vec<Value>) -> FunctionFuture {
        (self.inner)(args)
    }

    /// Returns `true` if both handles point at the same function.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({:p})", Arc::as_ptr(&self.inner))
    }
}

// ---------------------------------------------------------------------------
// CustomValue
// ---------------------------------------------------------------------------

/// A user-defined value that a custom [`Codec`](crate::Codec) knows how to
/// carry.
///
/// The value is type-erased; codecs recognize theirs with
/// [`is`](CustomValue::is) and read it back with
/// [`downcast_ref`](CustomValue::downcast_ref).
#[derive(Clone)]
pub struct CustomValue {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl CustomValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// The Rust type name of the wrapped value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomValue({})", self.type_name)
    }
}
