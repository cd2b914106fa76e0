//! Owner context capability.
//!
//! The owner context is the session-level state that bindings keep fresh.
//! Hosts plug their own state type in by implementing [`AttributeContext`];
//! [`Assigns`] is a ready-made map-backed implementation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

/// Unique identifier for an owner (one live session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(Uuid);

impl OwnerId {
    /// Creates a new random owner ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capabilities the core needs from an owner's state.
///
/// `merge` must be a pure update: it consumes the current context and returns
/// the next one with `key` bound to `value`.
pub trait AttributeContext: Clone + Send + 'static {
    /// Returns the context with `key` bound to `value`.
    #[must_use]
    fn merge(self, key: &str, value: Value) -> Self;

    /// Whether the session is live. Read once when a binding is attached.
    fn is_connected(&self) -> bool;
}

/// Map-backed owner context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assigns {
    values: BTreeMap<String, Value>,
    #[serde(default)]
    connected: bool,
}

impl Assigns {
    /// An empty, non-interactive context (e.g. a prerender pass).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty, interactive context.
    #[must_use]
    pub fn connected() -> Self {
        Self {
            values: BTreeMap::new(),
            connected: true,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Binds `key` in place.
    pub fn assign(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl AttributeContext for Assigns {
    fn merge(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_binds_key_and_keeps_others() {
        let mut ctx = Assigns::new();
        ctx.assign("user", "ada");

        let ctx = ctx.merge("count", Value::Int(3));
        assert_eq!(ctx.get("user"), Some(&Value::from("ada")));
        assert_eq!(ctx.get("count"), Some(&Value::Int(3)));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn merge_overwrites_existing_key() {
        let ctx = Assigns::new()
            .merge("count", Value::Int(1))
            .merge("count", Value::Int(2));
        assert_eq!(ctx.get("count"), Some(&Value::Int(2)));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn connectivity_flag() {
        assert!(!Assigns::new().is_connected());
        assert!(Assigns::connected().is_connected());

        let mut ctx = Assigns::connected();
        ctx.set_connected(false);
        assert!(!ctx.is_connected());
    }

    #[test]
    fn assigns_deserialize_without_connected_flag() {
        let ctx: Assigns =
            serde_json::from_str(r#"{"values":{"count":{"type":"int","value":4}}}"#).unwrap();
        assert_eq!(ctx.get("count"), Some(&Value::Int(4)));
        assert!(!ctx.is_connected());
    }
}
