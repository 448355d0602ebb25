//! Cookie name/value map rendered into `Cookie` headers and persisted by the
//! cookie cache hooks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An ordered cookie map.
///
/// Keys are kept sorted so [`CookieMap::encode`] is deterministic, which keeps
/// replayed requests byte-identical across retries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieMap(BTreeMap<String, String>);

impl CookieMap {
    /// Creates an empty cookie map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `Cookie` header style string (`k=v; k2=v2`).
    ///
    /// Malformed pairs without an `=` are skipped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut map = Self::new();
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                map.set(name.trim(), value.trim());
            }
        }
        map
    }

    /// Returns the value for `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Sets a cookie, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Removes a cookie.
    pub fn del(&mut self, name: &str) {
        self.0.remove(name);
    }

    /// Returns `true` when `name` is present.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns `true` when the map holds no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of cookies in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(name, value)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merges another map into this one, overriding duplicate names.
    pub fn extend(&mut self, other: &Self) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }

    /// Renders the map into `Cookie` header form: `k=v; k2=v2`.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.0 {
            if !out.is_empty() {
                out.push_str("; ");
            }
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CookieMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.set(name, value);
        }
        map
    }
}
