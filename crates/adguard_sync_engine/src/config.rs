//! Configuration for the sync engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// A category of synchronized configuration.
///
/// The declaration order is the order in which domains are synchronized on
/// each replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    /// DNS rewrites.
    Rewrites,
    /// Filter list subscriptions (both partitions).
    Filters,
    /// Custom filtering rules.
    CustomRules,
    /// Globally blocked services.
    Services,
    /// Persistent clients.
    Clients,
    /// Safe browsing, parental control, safe search and filtering config.
    Toggles,
}

impl DomainKind {
    /// All domains in sync order.
    pub const ALL: [DomainKind; 6] = [
        DomainKind::Rewrites,
        DomainKind::Filters,
        DomainKind::CustomRules,
        DomainKind::Services,
        DomainKind::Clients,
        DomainKind::Toggles,
    ];

    /// Short name for logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainKind::Rewrites => "rewrites",
            DomainKind::Filters => "filters",
            DomainKind::CustomRules => "custom_rules",
            DomainKind::Services => "services",
            DomainKind::Clients => "clients",
            DomainKind::Toggles => "toggles",
        }
    }

    /// Whether this domain is read from `filtering/status`.
    pub(crate) fn reads_filtering(&self) -> bool {
        matches!(
            self,
            DomainKind::Filters | DomainKind::CustomRules | DomainKind::Toggles
        )
    }
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of enabled domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSet(BTreeSet<DomainKind>);

impl DomainSet {
    /// Every domain enabled.
    pub fn all() -> Self {
        Self(DomainKind::ALL.into_iter().collect())
    }

    /// No domain enabled.
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Enables a domain.
    pub fn with(mut self, kind: DomainKind) -> Self {
        self.0.insert(kind);
        self
    }

    /// Disables a domain.
    pub fn without(mut self, kind: DomainKind) -> Self {
        self.0.remove(&kind);
        self
    }

    /// Returns true if the domain is enabled.
    pub fn contains(&self, kind: DomainKind) -> bool {
        self.0.contains(&kind)
    }

    /// Returns true if no domain is enabled.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Enabled domains in sync order.
    pub fn iter(&self) -> impl Iterator<Item = DomainKind> + '_ {
        self.0.iter().copied()
    }
}

impl Default for DomainSet {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<DomainKind> for DomainSet {
    fn from_iter<I: IntoIterator<Item = DomainKind>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Configuration for a sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Domains to synchronize.
    pub domains: DomainSet,
    /// Maximum number of replicas synchronized at the same time.
    ///
    /// `None` means one worker per replica.
    pub concurrency_limit: Option<usize>,
    /// Deadline for the whole run. When it elapses no new operation is
    /// dispatched and the partial report is returned.
    pub deadline: Option<Duration>,
}

impl SyncConfig {
    /// Creates a configuration with every domain enabled and no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the enabled domains.
    pub fn with_domains(mut self, domains: DomainSet) -> Self {
        self.domains = domains;
        self
    }

    /// Sets the concurrency limit.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit);
        self
    }

    /// Sets the run deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Number of workers to run for `replicas` replicas. Never zero.
    pub fn effective_concurrency(&self, replicas: usize) -> usize {
        self.concurrency_limit
            .unwrap_or(replicas)
            .min(replicas)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_domains(DomainSet::none().with(DomainKind::Rewrites))
            .with_concurrency_limit(2)
            .with_deadline(Duration::from_secs(60));

        assert!(config.domains.contains(DomainKind::Rewrites));
        assert!(!config.domains.contains(DomainKind::Clients));
        assert_eq!(config.concurrency_limit, Some(2));
        assert_eq!(config.deadline, Some(Duration::from_secs(60)));
    }

    #[test]
    fn domain_set_iterates_in_sync_order() {
        let set: DomainSet = [DomainKind::Toggles, DomainKind::Rewrites, DomainKind::Clients]
            .into_iter()
            .collect();
        let order: Vec<_> = set.iter().collect();
        assert_eq!(
            order,
            [DomainKind::Rewrites, DomainKind::Clients, DomainKind::Toggles]
        );
        assert_eq!(DomainSet::default(), DomainSet::all());
        assert!(DomainSet::all().without(DomainKind::Filters).iter().all(|d| d != DomainKind::Filters));
    }

    #[test]
    fn effective_concurrency() {
        assert_eq!(SyncConfig::new().effective_concurrency(5), 5);
        assert_eq!(SyncConfig::new().with_concurrency_limit(2).effective_concurrency(5), 2);
        assert_eq!(SyncConfig::new().with_concurrency_limit(10).effective_concurrency(3), 3);
        assert_eq!(SyncConfig::new().with_concurrency_limit(0).effective_concurrency(3), 1);
        assert_eq!(SyncConfig::new().effective_concurrency(0), 1);
    }
}
