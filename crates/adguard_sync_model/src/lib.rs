//! # AdGuard Sync Model
//!
//! Types of the AdGuard Home control API as seen by AdGuard Sync.
//!
//! This crate provides:
//! - `Status` for the connectivity probe
//! - `RewriteEntry`, `Filter`, `Client` and their natural keys
//! - `FilteringStatus`, `FilteringConfig`, `UserRules`, `Services`
//! - `Toggle` for the boolean protection features
//!
//! Every type serializes to the JSON shape the appliance speaks. Equality
//! rules used by the reconciliation engine live next to the types so that
//! "what counts as the same item" is decided in one place.
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod filtering;
mod rewrite;
mod services;
mod status;
mod toggle;

pub use client::{Client, ClientUpdate, Clients};
pub use filtering::{
    Filter, FilterData, FilterList, FilterRef, FilterUpdate, FilteringConfig, FilteringStatus,
    NewFilter, RefreshFilter, UserRules,
};
pub use rewrite::RewriteEntry;
pub use services::Services;
pub use status::Status;
pub use toggle::{Toggle, ToggleStatus};

use serde::{Deserialize, Deserializer};

/// Deserializes JSON `null` as the type's default.
///
/// The appliance reports empty lists as `null` rather than `[]`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Sorts and de-duplicates a list so that order carries no meaning.
pub(crate) fn sorted_set(values: &[String]) -> Vec<String> {
    let mut values = values.to_vec();
    values.sort();
    values.dedup();
    values
}
