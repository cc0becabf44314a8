//! Instance status.

use serde::{Deserialize, Serialize};

/// Response of `GET status`.
///
/// Only used as a connectivity probe and to compare versions between the
/// origin and its replicas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    /// Addresses the DNS server listens on.
    #[serde(deserialize_with = "crate::null_as_default")]
    pub dns_addresses: Vec<String>,
    /// DNS listen port.
    pub dns_port: u16,
    /// Web interface port.
    pub http_port: u16,
    /// Whether protection is globally enabled.
    pub protection_enabled: bool,
    /// Whether the DNS server is running.
    pub running: bool,
    /// Appliance version string.
    pub version: String,
    /// UI language.
    pub language: String,
}
