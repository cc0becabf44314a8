//! Origin state captured once per run.

use crate::config::{DomainKind, DomainSet};
use crate::error::{SyncError, SyncResult};
use crate::transport::InstanceClient;
use adguard_sync_model::{
    Client, FilteringConfig, FilteringStatus, RewriteEntry, Services, Status, Toggle,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Protection features and the filtering config of one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToggleState {
    /// On/off state of each protection feature.
    pub toggles: BTreeMap<Toggle, bool>,
    /// Filtering enable flag and update interval.
    pub filtering: FilteringConfig,
}

impl ToggleState {
    /// Returns the state of a toggle, `false` when unknown.
    pub fn get(&self, toggle: Toggle) -> bool {
        self.toggles.get(&toggle).copied().unwrap_or(false)
    }

    /// Reads the toggle state from an instance.
    pub(crate) async fn read(
        instance: &dyn InstanceClient,
        filtering: FilteringConfig,
    ) -> SyncResult<Self> {
        let mut toggles = BTreeMap::new();
        for toggle in Toggle::ALL {
            toggles.insert(toggle, instance.toggle_status(toggle).await?);
        }
        Ok(Self { toggles, filtering })
    }
}

/// A domain read: `None` when the domain is disabled, otherwise the read
/// result.
type Captured<T> = Option<SyncResult<T>>;

/// Immutable snapshot of the origin, shared by every replica worker.
///
/// A failed read is kept as the domain's error so that every replica skips
/// that domain with the same cause.
#[derive(Debug, Clone, Default)]
pub struct OriginSnapshot {
    name: String,
    status: Status,
    rewrites: Captured<Vec<RewriteEntry>>,
    filtering: Captured<FilteringStatus>,
    services: Captured<Services>,
    clients: Captured<Vec<Client>>,
    toggles: Captured<ToggleState>,
}

impl OriginSnapshot {
    /// Reads every enabled domain from the origin.
    ///
    /// `status` is the result of the connectivity probe that preceded the
    /// capture. `filtering/status` is read once and shared by the filter,
    /// custom rule and toggle domains.
    pub async fn capture(origin: &dyn InstanceClient, status: Status, domains: &DomainSet) -> Self {
        let mut snapshot = Self {
            name: origin.name().to_string(),
            status,
            ..Self::default()
        };

        if domains.contains(DomainKind::Rewrites) {
            snapshot.rewrites = Some(logged(DomainKind::Rewrites, origin.rewrites().await));
        }
        if domains.iter().any(|d| d.reads_filtering()) {
            snapshot.filtering = Some(logged(DomainKind::Filters, origin.filtering().await));
        }
        if domains.contains(DomainKind::Services) {
            snapshot.services = Some(logged(DomainKind::Services, origin.services().await));
        }
        if domains.contains(DomainKind::Clients) {
            snapshot.clients = Some(logged(DomainKind::Clients, origin.clients().await));
        }
        if domains.contains(DomainKind::Toggles) {
            let toggles = match &snapshot.filtering {
                Some(Ok(filtering)) => ToggleState::read(origin, filtering.config()).await,
                Some(Err(e)) => Err(e.clone()),
                None => Err(not_captured(DomainKind::Filters)),
            };
            snapshot.toggles = Some(logged(DomainKind::Toggles, toggles));
        }

        debug!(origin = %snapshot.name, version = %snapshot.status.version, "origin captured");
        snapshot
    }

    /// Name of the origin.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version reported by the origin.
    pub fn version(&self) -> &str {
        &self.status.version
    }

    /// DNS rewrites.
    pub fn rewrites(&self) -> SyncResult<&[RewriteEntry]> {
        get(&self.rewrites, DomainKind::Rewrites).map(Vec::as_slice)
    }

    /// Filter lists, custom rules and filtering config.
    pub fn filtering(&self) -> SyncResult<&FilteringStatus> {
        get(&self.filtering, DomainKind::Filters)
    }

    /// Blocked services.
    pub fn services(&self) -> SyncResult<&Services> {
        get(&self.services, DomainKind::Services)
    }

    /// Configured clients.
    pub fn clients(&self) -> SyncResult<&[Client]> {
        get(&self.clients, DomainKind::Clients).map(Vec::as_slice)
    }

    /// Protection features and filtering config.
    pub fn toggles(&self) -> SyncResult<&ToggleState> {
        get(&self.toggles, DomainKind::Toggles)
    }
}

fn get<T>(captured: &Captured<T>, domain: DomainKind) -> SyncResult<&T> {
    match captured {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(e.clone()),
        None => Err(not_captured(domain)),
    }
}

fn not_captured(domain: DomainKind) -> SyncError {
    SyncError::config(format!("{domain} were not captured from the origin"))
}

fn logged<T>(domain: DomainKind, result: SyncResult<T>) -> SyncResult<T> {
    if let Err(e) = &result {
        warn!(%domain, error = %e, "origin read failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockInstance, MockRead};
    use adguard_sync_model::{Filter, FilterList};

    fn origin() -> MockInstance {
        MockInstance::new("origin")
            .with_version("v0.107.43")
            .with_rewrites(vec![RewriteEntry::new("a.com", "1.1.1.1")])
            .with_filters(FilterList::Blacklist, vec![Filter::new("x", "https://x")])
            .with_toggle(Toggle::Parental, true)
    }

    #[tokio::test]
    async fn captures_enabled_domains_only() {
        let origin = origin();
        let domains = DomainSet::none().with(DomainKind::Rewrites);
        let status = origin.status().await.unwrap();
        let snapshot = OriginSnapshot::capture(&origin, status, &domains).await;

        assert_eq!(snapshot.version(), "v0.107.43");
        assert_eq!(snapshot.rewrites().unwrap().len(), 1);
        assert!(matches!(snapshot.filtering(), Err(SyncError::Config { .. })));
        assert!(snapshot.clients().is_err());
    }

    #[tokio::test]
    async fn toggles_include_filtering_config() {
        let origin = origin().with_filtering_config(FilteringConfig {
            enabled: true,
            interval: 24,
        });
        let status = origin.status().await.unwrap();
        let snapshot = OriginSnapshot::capture(&origin, status, &DomainSet::all()).await;

        let toggles = snapshot.toggles().unwrap();
        assert!(toggles.get(Toggle::Parental));
        assert!(!toggles.get(Toggle::SafeSearch));
        assert_eq!(toggles.filtering.interval, 24);
    }

    #[tokio::test]
    async fn failed_read_is_kept_per_domain() {
        let origin = origin();
        origin.fail_read(MockRead::Clients, SyncError::Timeout);
        let status = origin.status().await.unwrap();
        let snapshot = OriginSnapshot::capture(&origin, status, &DomainSet::all()).await;

        assert_eq!(snapshot.clients(), Err(SyncError::Timeout));
        assert!(snapshot.rewrites().is_ok());
    }
}
