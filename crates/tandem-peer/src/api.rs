//! The API a peer exposes to the remote side.

use std::collections::HashMap;
use std::future::Future;

use crate::{Function, PeerError, RemoteError, Value};

/// Method name → [`Function`], checked when it is built.
///
/// ```rust
/// use tandem_peer::{LocalApi, Value};
///
/// let api = LocalApi::builder()
///     .method("ping", |_args| async { Ok(Value::from("pong")) })
///     .build()
///     .unwrap();
/// assert!(api.get("ping").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocalApi {
    methods: HashMap<String, Function>,
}

impl LocalApi {
    pub fn builder() -> LocalApiBuilder {
        LocalApiBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.methods.get(name)
    }

    /// Exposed method names, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Builder for [`LocalApi`].
#[derive(Debug, Default)]
#[must_use]
pub struct LocalApiBuilder {
    methods: Vec<(String, Function)>,
}

impl LocalApiBuilder {
    /// Exposes an async closure under `name`.
    pub fn method<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RemoteError>> + Send + 'static,
    {
        self.function(name, Function::new(f))
    }

    /// Exposes a synchronous closure under `name`.
    pub fn method_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, RemoteError> + Send + Sync + 'static,
    {
        self.function(name, Function::from_fn(f))
    }

    /// Exposes an existing [`Function`] under `name`.
    pub fn function(mut self, name: impl Into<String>, function: Function) -> Self {
        self.methods.push((name.into(), function));
        self
    }

    /// Validates the method names.
    ///
    /// # Errors
    /// [`PeerError::InvalidApi`] for an empty name or a name used twice.
    pub fn build(self) -> Result<LocalApi, PeerError> {
        let mut methods = HashMap::with_capacity(self.methods.len());
        for (name, function) in self.methods {
            if name.is_empty() {
                return Err(PeerError::InvalidApi("method names must not be empty".into()));
            }
            if methods.contains_key(&name) {
                return Err(PeerError::InvalidApi(format!(
                    "method `{name}` is exposed twice"
                )));
            }
            methods.insert(name, function);
        }
        Ok(LocalApi { methods })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_built_api_dispatches_by_name() {
        let api = LocalApi::builder()
            .method("left", |_| async { Ok(Value::from("left")) })
            .method_fn("right", |_| Ok(Value::from("right")))
            .build()
            .unwrap();

        assert_eq!(api.method_names(), vec!["left", "right"]);
        let right = api.get("right").unwrap().call(vec![]).await.unwrap();
        assert_eq!(right.as_str(), Some("right"));
        assert!(api.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_method_is_invalid() {
        let result = LocalApi::builder()
            .method_fn("ping", |_| Ok(Value::Unit))
            .method_fn("ping", |_| Ok(Value::Unit))
            .build();
        assert!(matches!(result, Err(PeerError::InvalidApi(msg)) if msg.contains("ping")));
    }

    #[test]
    fn test_empty_method_name_is_invalid() {
        let result = LocalApi::builder()
            .method_fn("", |_| Ok(Value::Unit))
            .build();
        assert!(matches!(result, Err(PeerError::InvalidApi(_))));
    }

    #[test]
    fn test_empty_api_is_valid() {
        let api = LocalApi::builder().build().unwrap();
        assert!(api.is_empty());
        assert_eq!(api.len(), 0);
    }
}
