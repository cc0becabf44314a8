//! Blocked services.

use serde::{Deserialize, Serialize};

/// Identifiers of globally blocked services (e.g. `youtube`, `tiktok`).
///
/// Order is meaningless; the list is replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Services(pub Vec<String>);

impl Services {
    /// Creates a service list.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }

    /// Identifiers as a slice.
    pub fn ids(&self) -> &[String] {
        &self.0
    }

    /// Sorted, de-duplicated copy.
    pub fn normalized(&self) -> Services {
        Services(crate::sorted_set(&self.0))
    }

    /// Compares as sets.
    pub fn same_as(&self, other: &Services) -> bool {
        self.normalized() == other.normalized()
    }
}
