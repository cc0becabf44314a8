//! Sequencing of domain synchronizers for one replica.

use crate::config::DomainSet;
use crate::domains::{synchronizers_for, DomainSynchronizer, SyncContext};
use crate::error::SyncError;
use crate::report::ReplicaOutcome;
use crate::snapshot::OriginSnapshot;
use crate::transport::InstanceClient;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Synchronizes one origin→replica pair.
///
/// The replica is probed first; an unreachable replica yields a single
/// replica-level error and no domain outcomes. Domains then run one after
/// another. A panicking synchronizer is recorded as a `Panicked` domain
/// error and the remaining domains still run.
pub struct Orchestrator {
    synchronizers: Vec<Box<dyn DomainSynchronizer>>,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Creates an orchestrator for the enabled domains.
    pub fn new(domains: &DomainSet, cancel: CancellationToken) -> Self {
        Self::with_synchronizers(synchronizers_for(domains), cancel)
    }

    /// Creates an orchestrator running the given synchronizers in order.
    pub fn with_synchronizers(
        synchronizers: Vec<Box<dyn DomainSynchronizer>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            synchronizers,
            cancel,
        }
    }

    /// Runs every synchronizer against the replica.
    pub async fn run(&self, origin: &OriginSnapshot, replica: &dyn InstanceClient) -> ReplicaOutcome {
        let name = replica.name().to_string();
        let mut outcome = ReplicaOutcome::new(name.as_str());

        if self.cancel.is_cancelled() {
            outcome.error = Some(SyncError::Cancelled);
            return outcome.finish();
        }

        let status = match replica.status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(replica = %name, error = %e, "replica unreachable");
                outcome.error = Some(e);
                return outcome.finish();
            }
        };
        if status.version != origin.version() {
            let message = format!(
                "version mismatch: origin {}, replica {}",
                origin.version(),
                status.version
            );
            warn!(replica = %name, "{}", message);
            outcome.warnings.push(message);
        }

        let ctx = SyncContext::new(name.as_str(), self.cancel.clone());
        for synchronizer in &self.synchronizers {
            if ctx.is_cancelled() {
                outcome
                    .domains
                    .push(synchronizer.outcome().fail(SyncError::Cancelled));
                continue;
            }
            let domain = AssertUnwindSafe(synchronizer.sync(origin, replica, &ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| synchronizer.outcome().fail(SyncError::from_panic(panic)));
            outcome.domains.push(domain);
        }

        let outcome = outcome.finish();
        info!(
            replica = %name,
            changes = outcome.domains.iter().map(|d| d.change_count()).sum::<usize>(),
            errors = outcome.domains.iter().filter(|d| !d.is_success()).count(),
            "replica synchronized"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainKind;
    use crate::transport::{MockInstance, MockRead};
    use adguard_sync_model::RewriteEntry;

    async fn snapshot(origin: &MockInstance, domains: &DomainSet) -> OriginSnapshot {
        let status = origin.status().await.unwrap();
        OriginSnapshot::capture(origin, status, domains).await
    }

    #[tokio::test]
    async fn unreachable_replica_short_circuits() {
        let origin = MockInstance::new("origin");
        let replica = MockInstance::new("replica");
        replica.set_reachable(false);

        let orchestrator = Orchestrator::new(&DomainSet::all(), CancellationToken::new());
        let outcome = orchestrator
            .run(&snapshot(&origin, &DomainSet::all()).await, &replica)
            .await;
        assert!(matches!(outcome.error, Some(SyncError::Connection { .. })));
        assert!(outcome.domains.is_empty());
    }

    #[tokio::test]
    async fn version_mismatch_is_a_warning() {
        let origin = MockInstance::new("origin").with_version("v0.107.43");
        let replica = MockInstance::new("replica").with_version("v0.107.40");

        let orchestrator = Orchestrator::new(&DomainSet::all(), CancellationToken::new());
        let outcome = orchestrator
            .run(&snapshot(&origin, &DomainSet::all()).await, &replica)
            .await;
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("v0.107.40"));
        assert!(outcome.is_success());
        assert_eq!(outcome.domains.len(), 7);
    }

    #[tokio::test]
    async fn panicking_domain_is_isolated() {
        let origin = MockInstance::new("origin")
            .with_rewrites(vec![RewriteEntry::new("a.com", "1.1.1.1")]);
        let replica = MockInstance::new("replica");
        replica.panic_on_read(MockRead::Rewrites);
        let domains = DomainSet::none()
            .with(DomainKind::Rewrites)
            .with(DomainKind::Clients);

        let orchestrator = Orchestrator::new(&domains, CancellationToken::new());
        let outcome = orchestrator.run(&snapshot(&origin, &domains).await, &replica).await;

        let rewrites = outcome.domain(DomainKind::Rewrites).unwrap();
        assert!(matches!(rewrites.error, Some(SyncError::Panicked { .. })));
        assert!(outcome.domain(DomainKind::Clients).unwrap().is_success());
    }

    #[tokio::test]
    async fn cancelled_before_probe() {
        let origin = MockInstance::new("origin");
        let replica = MockInstance::new("replica");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let orchestrator = Orchestrator::new(&DomainSet::all(), cancel);
        let outcome = orchestrator
            .run(&snapshot(&origin, &DomainSet::all()).await, &replica)
            .await;
        assert_eq!(outcome.error, Some(SyncError::Cancelled));
        assert!(replica.calls().is_empty());
    }
}
