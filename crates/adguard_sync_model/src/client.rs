//! Persistent client (device) settings.

use serde::{Deserialize, Serialize};

/// A configured client with its per-device settings.
///
/// Clients are identified by `name`. Updates always carry the complete
/// object; the appliance has no partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    /// Unique display name.
    pub name: String,
    /// IPs, CIDRs, MACs or client IDs identifying the device.
    #[serde(deserialize_with = "crate::null_as_default")]
    pub ids: Vec<String>,
    /// Client tags.
    #[serde(deserialize_with = "crate::null_as_default")]
    pub tags: Vec<String>,
    /// Per-client upstream servers.
    #[serde(deserialize_with = "crate::null_as_default")]
    pub upstreams: Vec<String>,
    /// Services blocked for this client.
    #[serde(deserialize_with = "crate::null_as_default")]
    pub blocked_services: Vec<String>,
    /// Use the global settings instead of the per-client flags.
    pub use_global_settings: bool,
    /// Use the global blocked services instead of `blocked_services`.
    pub use_global_blocked_services: bool,
    /// Filtering enabled for this client.
    pub filtering_enabled: bool,
    /// Parental control enabled for this client.
    pub parental_enabled: bool,
    /// Safe browsing enabled for this client.
    pub safebrowsing_enabled: bool,
    /// Safe search enabled for this client.
    pub safesearch_enabled: bool,
}

impl Client {
    /// Creates a client with the given name and identifiers.
    pub fn new<I, S>(name: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            ids: ids.into_iter().map(Into::into).collect(),
            use_global_settings: true,
            use_global_blocked_services: true,
            ..Self::default()
        }
    }

    /// Natural key of the client.
    pub fn key(&self) -> String {
        self.name.clone()
    }

    /// Copy with every list field sorted and de-duplicated.
    pub fn normalized(&self) -> Client {
        Client {
            ids: crate::sorted_set(&self.ids),
            tags: crate::sorted_set(&self.tags),
            upstreams: crate::sorted_set(&self.upstreams),
            blocked_services: crate::sorted_set(&self.blocked_services),
            ..self.clone()
        }
    }

    /// Field-by-field equality where list order does not matter.
    pub fn same_as(&self, other: &Client) -> bool {
        self.normalized() == other.normalized()
    }
}

/// Response of `GET clients`.
///
/// Runtime-discovered clients are ignored; only configured ones sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Clients {
    /// Configured clients.
    #[serde(deserialize_with = "crate::null_as_default")]
    pub clients: Vec<Client>,
}

/// Body of `POST clients/update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientUpdate {
    /// Current name of the client to replace.
    pub name: String,
    /// Full replacement object.
    pub data: Client,
}

impl ClientUpdate {
    /// Builds an update replacing the client with the same name.
    pub fn new(client: &Client) -> Self {
        Self {
            name: client.name.clone(),
            data: client.clone(),
        }
    }
}
