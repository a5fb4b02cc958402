// ── Endpoint mappings ──
//
// A mapping binds each named slot of a view to the endpoint that feeds
// it. Mappings are produced fresh on every resolution and never mutated
// in place; reconciliation compares two of them by value.

use std::borrow::Borrow;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use tether_api::Endpoint;

// ── Key ─────────────────────────────────────────────────────────────

/// Name of one slot of the consuming view, e.g. `"transactions"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ── EndpointsMapping ────────────────────────────────────────────────

/// Insertion-ordered `Key -> Endpoint` mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointsMapping {
    entries: IndexMap<Key, Endpoint>,
}

/// Result of comparing a freshly resolved mapping with the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingDiff {
    /// Keys that are new, or whose endpoint changed by value.
    pub bind: Vec<(Key, Endpoint)>,
    /// Keys present before but absent now.
    pub unbind: Vec<Key>,
}

impl MappingDiff {
    pub fn is_empty(&self) -> bool {
        self.bind.is_empty() && self.unbind.is_empty()
    }
}

impl EndpointsMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<Key>, endpoint: impl Into<Endpoint>) -> Self {
        self.insert(key, endpoint);
        self
    }

    /// Insert or replace the endpoint for `key`. Returns the previous one.
    pub fn insert(&mut self, key: impl Into<Key>, endpoint: impl Into<Endpoint>) -> Option<Endpoint> {
        self.entries.insert(key.into(), endpoint.into())
    }

    pub fn get(&self, key: &str) -> Option<&Endpoint> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Endpoint)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set difference against the previous mapping.
    ///
    /// With no previous mapping every key is bound. Endpoints are compared
    /// by value, so two independently resolved mappings with equal
    /// contents produce an empty diff.
    pub fn diff(&self, previous: Option<&EndpointsMapping>) -> MappingDiff {
        let Some(previous) = previous else {
            return MappingDiff {
                bind: self
                    .entries
                    .iter()
                    .map(|(k, e)| (k.clone(), e.clone()))
                    .collect(),
                unbind: Vec::new(),
            };
        };

        let bind = self
            .entries
            .iter()
            .filter(|(key, endpoint)| previous.entries.get(*key) != Some(*endpoint))
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();

        let unbind = previous
            .entries
            .keys()
            .filter(|key| !self.entries.contains_key(*key))
            .cloned()
            .collect();

        MappingDiff { bind, unbind }
    }
}

impl<K: Into<Key>, E: Into<Endpoint>> FromIterator<(K, E)> for EndpointsMapping {
    fn from_iter<I: IntoIterator<Item = (K, E)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, e)| (k.into(), e.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EndpointsMapping {
    type Item = (&'a Key, &'a Endpoint);
    type IntoIter = indexmap::map::Iter<'a, Key, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ab() -> EndpointsMapping {
        EndpointsMapping::new().with("a", "e1").with("b", "e2")
    }

    #[test]
    fn first_resolution_binds_everything() {
        let diff = ab().diff(None);
        assert_eq!(
            diff.bind,
            vec![
                (Key::from("a"), Endpoint::from("e1")),
                (Key::from("b"), Endpoint::from("e2")),
            ]
        );
        assert!(diff.unbind.is_empty());
    }

    #[test]
    fn equal_mappings_have_empty_diff() {
        let previous = ab();
        let next = ab();
        assert!(next.diff(Some(&previous)).is_empty());
    }

    #[test]
    fn changed_endpoint_is_rebound() {
        let previous = ab();
        let next = EndpointsMapping::new().with("a", "e1").with("b", "e3");
        let diff = next.diff(Some(&previous));
        assert_eq!(diff.bind, vec![(Key::from("b"), Endpoint::from("e3"))]);
        assert!(diff.unbind.is_empty());
    }

    #[test]
    fn missing_key_is_unbound() {
        let previous = ab();
        let next = EndpointsMapping::new().with("a", "e1").with("c", "e4");
        let diff = next.diff(Some(&previous));
        assert_eq!(diff.bind, vec![(Key::from("c"), Endpoint::from("e4"))]);
        assert_eq!(diff.unbind, vec![Key::from("b")]);
    }

    #[test]
    fn endpoint_normalization_counts_as_equal() {
        let previous = EndpointsMapping::new().with("a", "/e1/");
        let next = EndpointsMapping::new().with("a", "e1");
        assert!(next.diff(Some(&previous)).is_empty());
    }

    #[test]
    fn serializes_as_plain_object() {
        let json = serde_json::to_value(ab()).unwrap();
        assert_eq!(json, serde_json::json!({ "a": "e1", "b": "e2" }));
    }
}
