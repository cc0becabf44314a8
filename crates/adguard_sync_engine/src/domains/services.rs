use super::{note_diff, Dispatch, DomainSynchronizer, SyncContext};
use crate::config::DomainKind;
use crate::diff::diff;
use crate::report::{DomainOutcome, Operation};
use crate::snapshot::OriginSnapshot;
use crate::transport::InstanceClient;
use async_trait::async_trait;

/// Globally blocked services.
///
/// Diffed by identifier for the counts, written back as the full origin set
/// in a single call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServicesSync;

#[async_trait]
impl DomainSynchronizer for ServicesSync {
    fn kind(&self) -> DomainKind {
        DomainKind::Services
    }

    async fn sync(
        &self,
        origin: &OriginSnapshot,
        replica: &dyn InstanceClient,
        ctx: &SyncContext,
    ) -> DomainOutcome {
        let mut outcome = self.outcome();
        let wanted = match origin.services() {
            Ok(services) => services,
            Err(e) => return outcome.fail(e),
        };
        let current = match replica.services().await {
            Ok(services) => services,
            Err(e) => return outcome.fail(e),
        };

        let diff = diff(wanted.ids(), current.ids(), String::clone, |_, _| true);
        note_diff(&mut outcome, &diff, ctx);
        if diff.is_empty() {
            return outcome;
        }

        let mut dispatch = Dispatch::new(ctx, 1);
        if !dispatch.proceed(&mut outcome) {
            return outcome;
        }
        // One call carries every change; counts are per identifier.
        match replica.set_services(&wanted.normalized()).await {
            Ok(()) => {
                outcome.added = diff.additions.len();
                outcome.removed = diff.removals.len();
            }
            Err(e) => {
                outcome.record(Operation::Set, "services", Err(e));
            }
        }
        outcome
    }
}
