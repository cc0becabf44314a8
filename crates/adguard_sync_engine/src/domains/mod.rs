//! Domain synchronizers.
//!
//! Each synchronizer converges one resource domain of a replica onto the
//! origin snapshot: read the replica, diff, then apply removals, additions
//! and updates one item at a time. Item failures are recorded and the
//! remaining items are still attempted.

mod clients;
mod custom_rules;
mod filters;
mod rewrites;
mod services;
mod toggles;

pub use clients::ClientsSync;
pub use custom_rules::CustomRulesSync;
pub use filters::FiltersSync;
pub use rewrites::RewritesSync;
pub use services::ServicesSync;
pub use toggles::TogglesSync;

use crate::config::{DomainKind, DomainSet};
use crate::diff::DiffResult;
use crate::error::SyncError;
use crate::report::DomainOutcome;
use crate::snapshot::OriginSnapshot;
use crate::transport::InstanceClient;
use adguard_sync_model::FilterList;
use async_trait::async_trait;
use std::fmt::Debug;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-replica context handed to every synchronizer.
#[derive(Debug, Clone)]
pub struct SyncContext {
    replica: String,
    cancel: CancellationToken,
}

impl SyncContext {
    /// Creates a context for one replica.
    pub fn new(replica: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            replica: replica.into(),
            cancel,
        }
    }

    /// Name of the replica being synchronized.
    pub fn replica(&self) -> &str {
        &self.replica
    }

    /// Returns true once the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Converges one resource domain of a replica.
#[async_trait]
pub trait DomainSynchronizer: Send + Sync {
    /// Domain handled by this synchronizer.
    fn kind(&self) -> DomainKind;

    /// Filter partition, for the filters domain.
    fn partition(&self) -> Option<FilterList> {
        None
    }

    /// An empty outcome labelled for this synchronizer.
    fn outcome(&self) -> DomainOutcome {
        match self.partition() {
            Some(list) => DomainOutcome::for_partition(self.kind(), list),
            None => DomainOutcome::new(self.kind()),
        }
    }

    /// Synchronizes the domain. Never fails as a whole: every problem ends
    /// up in the returned outcome.
    async fn sync(
        &self,
        origin: &OriginSnapshot,
        replica: &dyn InstanceClient,
        ctx: &SyncContext,
    ) -> DomainOutcome;
}

/// Synchronizers for the enabled domains, in sync order.
///
/// The filters domain yields two synchronizers, blacklist first.
pub fn synchronizers_for(domains: &DomainSet) -> Vec<Box<dyn DomainSynchronizer>> {
    let mut synchronizers: Vec<Box<dyn DomainSynchronizer>> = Vec::new();
    for kind in domains.iter() {
        match kind {
            DomainKind::Rewrites => synchronizers.push(Box::new(RewritesSync)),
            DomainKind::Filters => {
                for list in FilterList::ALL {
                    synchronizers.push(Box::new(FiltersSync::new(list)));
                }
            }
            DomainKind::CustomRules => synchronizers.push(Box::new(CustomRulesSync)),
            DomainKind::Services => synchronizers.push(Box::new(ServicesSync)),
            DomainKind::Clients => synchronizers.push(Box::new(ClientsSync)),
            DomainKind::Toggles => synchronizers.push(Box::new(TogglesSync)),
        }
    }
    synchronizers
}

/// Gate in front of every item call of one domain.
///
/// Once the run is cancelled, the calls not yet dispatched are counted as
/// skipped and the outcome carries a `Cancelled` domain error.
pub(crate) struct Dispatch<'a> {
    ctx: &'a SyncContext,
    remaining: usize,
}

impl<'a> Dispatch<'a> {
    pub(crate) fn new(ctx: &'a SyncContext, total: usize) -> Self {
        Self {
            ctx,
            remaining: total,
        }
    }

    /// Returns false if the next call must not be dispatched.
    pub(crate) fn proceed(&mut self, outcome: &mut DomainOutcome) -> bool {
        if self.ctx.is_cancelled() {
            if outcome.error.is_none() {
                outcome.skipped += self.remaining;
                warn!(
                    replica = %self.ctx.replica(),
                    domain = %outcome.label(),
                    skipped = self.remaining,
                    "cancelled"
                );
                outcome.error = Some(SyncError::Cancelled);
            }
            return false;
        }
        self.remaining = self.remaining.saturating_sub(1);
        true
    }

    /// Drops a planned call that will not be made.
    pub(crate) fn forgo(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

/// Copies the diff's counts and duplicate-key warnings into the outcome.
pub(crate) fn note_diff<K, T>(outcome: &mut DomainOutcome, diff: &DiffResult<K, T>, ctx: &SyncContext)
where
    K: Ord + Debug,
{
    outcome.unchanged = diff.unchanged;
    for key in &diff.origin_duplicates {
        outcome.warn(format!("duplicate key {key:?} in origin, last value used"));
    }
    for key in &diff.replica_duplicates {
        outcome.warn(format!("duplicate key {key:?} in replica, last value used"));
    }
    debug!(
        replica = %ctx.replica(),
        domain = %outcome.label(),
        additions = diff.additions.len(),
        updates = diff.updates.len(),
        removals = diff.removals.len(),
        unchanged = diff.unchanged,
        "diff computed"
    );
}
