use super::{note_diff, Dispatch, DomainSynchronizer, SyncContext};
use crate::config::DomainKind;
use crate::diff::diff;
use crate::report::{DomainOutcome, Operation};
use crate::snapshot::OriginSnapshot;
use crate::transport::InstanceClient;
use adguard_sync_model::{Filter, FilterList};
use async_trait::async_trait;
use tracing::debug;

/// Filter list subscriptions of one partition, keyed by URL.
///
/// After any successful add or update the partition is refreshed once so
/// the replica downloads the new lists.
#[derive(Debug, Clone, Copy)]
pub struct FiltersSync {
    list: FilterList,
}

impl FiltersSync {
    /// Creates a synchronizer for one partition.
    pub fn new(list: FilterList) -> Self {
        Self { list }
    }
}

#[async_trait]
impl DomainSynchronizer for FiltersSync {
    fn kind(&self) -> DomainKind {
        DomainKind::Filters
    }

    fn partition(&self) -> Option<FilterList> {
        Some(self.list)
    }

    async fn sync(
        &self,
        origin: &OriginSnapshot,
        replica: &dyn InstanceClient,
        ctx: &SyncContext,
    ) -> DomainOutcome {
        let list = self.list;
        let mut outcome = self.outcome();
        let wanted = match origin.filtering() {
            Ok(filtering) => filtering.filters_for(list),
            Err(e) => return outcome.fail(e),
        };
        let current = match replica.filtering().await {
            Ok(filtering) => filtering,
            Err(e) => return outcome.fail(e),
        };

        let diff = diff(wanted, current.filters_for(list), Filter::key, Filter::same_as);
        note_diff(&mut outcome, &diff, ctx);

        // Disabled additions need a second call once added.
        let disabled = diff.additions.values().filter(|f| !f.enabled).count();
        let mut dispatch = Dispatch::new(ctx, diff.change_count() + disabled);
        let mut changed = false;
        for filter in diff.removals.values() {
            if !dispatch.proceed(&mut outcome) {
                return outcome;
            }
            let result = replica.delete_filter(list, filter).await;
            outcome.record(Operation::Delete, &filter.url, result);
        }
        for filter in diff.additions.values() {
            if !dispatch.proceed(&mut outcome) {
                break;
            }
            let result = replica.add_filter(list, filter).await;
            let added = outcome.record(Operation::Add, &filter.url, result);
            changed |= added;
            if filter.enabled {
                continue;
            }
            if !added {
                dispatch.forgo();
                continue;
            }
            // New subscriptions start enabled.
            if !dispatch.proceed(&mut outcome) {
                break;
            }
            if let Err(e) = replica.update_filter(list, filter).await {
                outcome.record(Operation::Update, &filter.url, Err(e));
            }
        }
        for filter in diff.updates.values() {
            if !dispatch.proceed(&mut outcome) {
                break;
            }
            let result = replica.update_filter(list, filter).await;
            changed |= outcome.record(Operation::Update, &filter.url, result);
        }

        if changed && !ctx.is_cancelled() {
            debug!(replica = %ctx.replica(), %list, "refreshing filters");
            let result = replica.refresh_filters(list).await;
            outcome.record(Operation::Refresh, "refresh", result);
        }
        outcome
    }
}
