//! Peer configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`Peer`](crate::Peer).
///
/// Every field has a default, so hosts can deserialize a partial table
/// from their own config file:
///
/// ```rust
/// use tandem_peer::PeerConfig;
///
/// let config: PeerConfig = serde_json::from_str(r#"{"name": "editor"}"#).unwrap();
/// assert_eq!(config.name, "editor");
/// assert!(!config.trace_messages);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Name used in every log line this peer emits.
    pub name: String,

    /// Log every message sent and received at `trace` level.
    pub trace_messages: bool,
}

impl PeerConfig {
    /// Default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            name: "peer".to_string(),
            trace_messages: false,
        }
    }
}
