//! DNS rewrite entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A DNS rewrite: queries for `domain` are answered with `answer`.
///
/// The appliance has no identifier for rewrites; the pair itself is the key,
/// and deleting an entry requires sending the full pair back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RewriteEntry {
    /// Domain (may contain a leading wildcard).
    #[serde(default)]
    pub domain: String,
    /// IP address or canonical name.
    #[serde(default)]
    pub answer: String,
}

impl RewriteEntry {
    /// Creates a new rewrite entry.
    pub fn new(domain: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            answer: answer.into(),
        }
    }

    /// Natural key of the entry.
    pub fn key(&self) -> (String, String) {
        (self.domain.clone(), self.answer.clone())
    }
}

impl fmt::Display for RewriteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.domain, self.answer)
    }
}
