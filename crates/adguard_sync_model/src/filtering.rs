//! Filter lists, custom rules and the filtering configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two filter list partitions a filter belongs to.
///
/// A URL is only a valid key within its own partition: the same URL may be
/// subscribed once as a blocklist and once as an allowlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterList {
    /// Blocking filter lists.
    Blacklist,
    /// Allowlist ("whitelist") filter lists.
    Whitelist,
}

impl FilterList {
    /// Both partitions, blacklist first.
    pub const ALL: [FilterList; 2] = [FilterList::Blacklist, FilterList::Whitelist];

    /// Value of the `whitelist` flag the API expects.
    pub fn is_whitelist(&self) -> bool {
        matches!(self, FilterList::Whitelist)
    }

    /// Short name for logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterList::Blacklist => "blacklist",
            FilterList::Whitelist => "whitelist",
        }
    }
}

impl fmt::Display for FilterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter list subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    /// Server-assigned identifier. Differs between instances.
    pub id: i64,
    /// Whether the list is active.
    pub enabled: bool,
    /// Download URL; the natural key within a partition.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Number of rules in the last download.
    pub rules_count: u64,
    /// Time of the last download.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl Filter {
    /// Creates an enabled filter.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            url: url.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Natural key of the filter.
    pub fn key(&self) -> String {
        self.url.clone()
    }

    /// Whether two filters describe the same subscription.
    ///
    /// Instance-local bookkeeping (`id`, `rules_count`, `last_updated`) is
    /// ignored, so a name or enabled-flag change still counts as a difference.
    pub fn same_as(&self, other: &Filter) -> bool {
        self.url == other.url && self.name == other.name && self.enabled == other.enabled
    }
}

/// Response of `GET filtering/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilteringStatus {
    /// Whether filtering is enabled.
    pub enabled: bool,
    /// Update interval in hours.
    pub interval: u32,
    /// Blocking filter lists.
    #[serde(deserialize_with = "crate::null_as_default")]
    pub filters: Vec<Filter>,
    /// Allowlist filter lists.
    #[serde(deserialize_with = "crate::null_as_default")]
    pub whitelist_filters: Vec<Filter>,
    /// Custom filtering rules.
    #[serde(deserialize_with = "crate::null_as_default")]
    pub user_rules: UserRules,
}

impl FilteringStatus {
    /// Returns the filters of one partition.
    pub fn filters_for(&self, list: FilterList) -> &[Filter] {
        match list {
            FilterList::Blacklist => &self.filters,
            FilterList::Whitelist => &self.whitelist_filters,
        }
    }

    /// Returns the filtering enable flag and interval.
    pub fn config(&self) -> FilteringConfig {
        FilteringConfig {
            enabled: self.enabled,
            interval: self.interval,
        }
    }
}

/// Body of `POST filtering/config`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteringConfig {
    /// Whether filtering is enabled.
    pub enabled: bool,
    /// Update interval in hours.
    pub interval: u32,
}

/// Body of `POST filtering/add_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFilter {
    /// Display name.
    pub name: String,
    /// Download URL.
    pub url: String,
    /// Target partition.
    pub whitelist: bool,
}

impl NewFilter {
    /// Builds the body for adding `filter` to `list`.
    pub fn new(list: FilterList, filter: &Filter) -> Self {
        Self {
            name: filter.name.clone(),
            url: filter.url.clone(),
            whitelist: list.is_whitelist(),
        }
    }
}

/// Body of `POST filtering/remove_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRef {
    /// Download URL.
    pub url: String,
    /// Target partition.
    pub whitelist: bool,
}

impl FilterRef {
    /// Builds the body for removing `filter` from `list`.
    pub fn new(list: FilterList, filter: &Filter) -> Self {
        Self {
            url: filter.url.clone(),
            whitelist: list.is_whitelist(),
        }
    }
}

/// Body of `POST filtering/set_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterUpdate {
    /// URL of the subscription to change.
    pub url: String,
    /// Target partition.
    pub whitelist: bool,
    /// Desired state.
    pub data: FilterData,
}

/// New state of a filter in a [`FilterUpdate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterData {
    /// Display name.
    pub name: String,
    /// Download URL.
    pub url: String,
    /// Whether the list is active.
    pub enabled: bool,
}

impl FilterUpdate {
    /// Builds the body replacing the subscription at `filter.url` in `list`.
    pub fn new(list: FilterList, filter: &Filter) -> Self {
        Self {
            url: filter.url.clone(),
            whitelist: list.is_whitelist(),
            data: FilterData {
                name: filter.name.clone(),
                url: filter.url.clone(),
                enabled: filter.enabled,
            },
        }
    }
}

/// Body of `POST filtering/refresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshFilter {
    /// Partition to refresh.
    pub whitelist: bool,
}

/// Custom filtering rules, one rule per line.
///
/// The appliance only offers whole-list replacement, so rules are compared
/// and written as a single text blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRules(pub Vec<String>);

impl UserRules {
    /// Creates rules from individual lines.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(lines.into_iter().map(Into::into).collect())
    }

    /// Parses rules from newline-separated text.
    pub fn from_text(text: &str) -> Self {
        Self::new(text.lines())
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no lines.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Strips trailing whitespace from every line and drops trailing blank
    /// lines.
    pub fn normalized(&self) -> UserRules {
        let mut lines: Vec<String> = self
            .0
            .iter()
            .map(|line| line.trim_end().to_string())
            .collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        UserRules(lines)
    }

    /// Wire format of `filtering/set_rules`.
    pub fn to_text(&self) -> String {
        self.0.join("\n")
    }

    /// Compares two rule sets after normalization.
    pub fn same_as(&self, other: &UserRules) -> bool {
        self.normalized() == other.normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_equality_ignores_instance_bookkeeping() {
        let mut a = Filter::new("AdGuard", "https://x/list.txt");
        let mut b = a.clone();
        a.id = 1;
        a.rules_count = 100;
        b.id = 7;
        b.last_updated = Some("2024-01-01T00:00:00Z".into());
        assert!(a.same_as(&b));

        let renamed = Filter::new("Other", "https://x/list.txt");
        assert!(!a.same_as(&renamed));

        let disabled = a.clone().with_enabled(false);
        assert!(!a.same_as(&disabled));
    }

    #[test]
    fn decode_filtering_status_with_null_lists() {
        let json = r#"{
            "enabled": true,
            "interval": 24,
            "filters": [{"id": 1, "enabled": true, "url": "https://x", "name": "x", "rules_count": 10}],
            "whitelist_filters": null,
            "user_rules": null
        }"#;
        let status: FilteringStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.filters_for(FilterList::Blacklist).len(), 1);
        assert!(status.filters_for(FilterList::Whitelist).is_empty());
        assert!(status.user_rules.is_empty());
        assert_eq!(
            status.config(),
            FilteringConfig {
                enabled: true,
                interval: 24
            }
        );
    }

    #[test]
    fn request_bodies_carry_partition_flag() {
        let filter = Filter::new("x", "https://x").with_enabled(false);

        let body = serde_json::to_value(NewFilter::new(FilterList::Whitelist, &filter)).unwrap();
        assert_eq!(body["whitelist"], true);
        assert_eq!(body["name"], "x");

        let body = serde_json::to_value(FilterRef::new(FilterList::Blacklist, &filter)).unwrap();
        assert_eq!(body["whitelist"], false);
        assert_eq!(body["url"], "https://x");

        let body = serde_json::to_value(FilterUpdate::new(FilterList::Blacklist, &filter)).unwrap();
        assert_eq!(body["data"]["enabled"], false);
        assert_eq!(body["data"]["url"], "https://x");
    }

    #[test]
    fn user_rules_normalization() {
        let a = UserRules::new(["||ads.com^ ", "@@||ok.com^\r", "", ""]);
        let b = UserRules::from_text("||ads.com^\n@@||ok.com^");
        assert!(a.same_as(&b));
        assert_eq!(a.normalized().to_text(), "||ads.com^\n@@||ok.com^");

        assert!(UserRules::new([""]).same_as(&UserRules::default()));
        assert!(!UserRules::from_text("||ads.com^").same_as(&UserRules::default()));
    }

    #[test]
    fn user_rules_keep_inner_blank_lines() {
        let rules = UserRules::new(["a", "", "b"]);
        assert_eq!(rules.normalized().len(), 3);
    }
}
