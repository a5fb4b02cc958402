// ── Endpoint identifiers ──
//
// An endpoint names one remote resource, e.g. `"account/btc/transactions"`.
// It is both the HTTP path under `/api/` and the subject of push frames.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a subscribable, fetchable remote resource.
///
/// Compared by value. Surrounding slashes are trimmed on construction so
/// `"/a/b/"` and `"a/b"` name the same resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(path.as_ref().trim_matches('/').to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Endpoint {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Endpoint {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Endpoint> for String {
    fn from(e: Endpoint) -> Self {
        e.0
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
