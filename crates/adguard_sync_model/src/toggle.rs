//! Boolean protection features.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A protection feature that is switched on or off as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    /// Safe browsing (malware/phishing domains).
    SafeBrowsing,
    /// Parental control.
    Parental,
    /// Safe search enforcement.
    SafeSearch,
}

impl Toggle {
    /// All toggles in sync order.
    pub const ALL: [Toggle; 3] = [Toggle::SafeBrowsing, Toggle::Parental, Toggle::SafeSearch];

    /// Path segment of the feature's endpoints.
    pub fn path(&self) -> &'static str {
        match self {
            Toggle::SafeBrowsing => "safebrowsing",
            Toggle::Parental => "parental",
            Toggle::SafeSearch => "safesearch",
        }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Response of `GET <toggle>/status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleStatus {
    /// Whether the feature is on.
    pub enabled: bool,
}
