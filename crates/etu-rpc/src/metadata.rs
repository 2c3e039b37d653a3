//! Per-call metadata sent alongside a request.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Key under which the service credential travels.
pub const AUTHORIZATION: &str = "authorization";

/// Out-of-band key/value pairs for a single call.
///
/// Keys are lowercased on insert. A `Metadata` value is moved into the
/// request it accompanies, so it cannot be changed once attached. `Debug`
/// output shows keys only; values are credentials and stay out of logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata carrying only the service credential.
    #[must_use]
    pub fn authorization(token: impl Into<String>) -> Self {
        Self::new().with(AUTHORIZATION, token)
    }

    #[must_use]
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.0.insert(key.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_single_entry() {
        let metadata = Metadata::authorization("svc-secret");
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata.get(AUTHORIZATION), Some("svc-secret"));
    }

    #[test]
    fn test_keys_are_lowercased() {
        let metadata = Metadata::new().with("X-Request-Id", "abc");
        assert_eq!(metadata.get("x-request-id"), Some("abc"));
        assert_eq!(metadata.get("X-REQUEST-ID"), Some("abc"));
        assert_eq!(metadata.keys().collect::<Vec<_>>(), vec!["x-request-id"]);
    }

    #[test]
    fn test_debug_redacts_values() {
        let metadata = Metadata::authorization("svc-secret");
        let debug = format!("{metadata:?}");
        assert!(debug.contains("authorization"));
        assert!(!debug.contains("svc-secret"));
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let metadata = Metadata::authorization("k");
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"authorization":"k"}"#);
    }

    #[test]
    fn test_empty() {
        assert!(Metadata::new().is_empty());
        assert!(Metadata::new().get(AUTHORIZATION).is_none());
    }
}
