use super::{note_diff, Dispatch, DomainSynchronizer, SyncContext};
use crate::config::DomainKind;
use crate::diff::diff;
use crate::report::{DomainOutcome, Operation};
use crate::snapshot::OriginSnapshot;
use crate::transport::InstanceClient;
use adguard_sync_model::RewriteEntry;
use async_trait::async_trait;

/// DNS rewrites, keyed by `(domain, answer)`.
///
/// A rewrite has no payload besides its key, so it is only ever added or
/// deleted.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewritesSync;

#[async_trait]
impl DomainSynchronizer for RewritesSync {
    fn kind(&self) -> DomainKind {
        DomainKind::Rewrites
    }

    async fn sync(
        &self,
        origin: &OriginSnapshot,
        replica: &dyn InstanceClient,
        ctx: &SyncContext,
    ) -> DomainOutcome {
        let mut outcome = self.outcome();
        let wanted = match origin.rewrites() {
            Ok(rewrites) => rewrites,
            Err(e) => return outcome.fail(e),
        };
        let current = match replica.rewrites().await {
            Ok(rewrites) => rewrites,
            Err(e) => return outcome.fail(e),
        };

        let diff = diff(wanted, &current, RewriteEntry::key, |a, b| a == b);
        note_diff(&mut outcome, &diff, ctx);

        let mut dispatch = Dispatch::new(ctx, diff.change_count());
        for entry in diff.removals.values() {
            if !dispatch.proceed(&mut outcome) {
                return outcome;
            }
            let result = replica.delete_rewrite(entry).await;
            outcome.record(Operation::Delete, entry, result);
        }
        for entry in diff.additions.values() {
            if !dispatch.proceed(&mut outcome) {
                return outcome;
            }
            let result = replica.add_rewrite(entry).await;
            outcome.record(Operation::Add, entry, result);
        }
        outcome
    }
}
