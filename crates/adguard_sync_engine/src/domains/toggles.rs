use super::{Dispatch, DomainSynchronizer, SyncContext};
use crate::config::DomainKind;
use crate::report::{DomainOutcome, Operation};
use crate::snapshot::{OriginSnapshot, ToggleState};
use crate::transport::InstanceClient;
use adguard_sync_model::Toggle;
use async_trait::async_trait;

/// Safe browsing, parental control, safe search and the filtering config.
///
/// Each value is compared once; only differing values are written.
#[derive(Debug, Clone, Copy, Default)]
pub struct TogglesSync;

#[async_trait]
impl DomainSynchronizer for TogglesSync {
    fn kind(&self) -> DomainKind {
        DomainKind::Toggles
    }

    async fn sync(
        &self,
        origin: &OriginSnapshot,
        replica: &dyn InstanceClient,
        ctx: &SyncContext,
    ) -> DomainOutcome {
        let mut outcome = self.outcome();
        let wanted = match origin.toggles() {
            Ok(toggles) => toggles,
            Err(e) => return outcome.fail(e),
        };
        let current = match replica.filtering().await {
            Ok(filtering) => ToggleState::read(replica, filtering.config()).await,
            Err(e) => Err(e),
        };
        let current = match current {
            Ok(current) => current,
            Err(e) => return outcome.fail(e),
        };

        let changed: Vec<Toggle> = Toggle::ALL
            .into_iter()
            .filter(|t| wanted.get(*t) != current.get(*t))
            .collect();
        let filtering_changed = wanted.filtering != current.filtering;
        let total = changed.len() + usize::from(filtering_changed);
        outcome.unchanged = Toggle::ALL.len() + 1 - total;

        let mut dispatch = Dispatch::new(ctx, total);
        for toggle in changed {
            if !dispatch.proceed(&mut outcome) {
                return outcome;
            }
            let result = replica.set_toggle(toggle, wanted.get(toggle)).await;
            outcome.record(Operation::Set, toggle, result);
        }
        if filtering_changed && dispatch.proceed(&mut outcome) {
            let result = replica.set_filtering_config(wanted.filtering).await;
            outcome.record(Operation::Set, "filtering", result);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainSet;
    use crate::error::SyncError;
    use crate::transport::{MockCall, MockInstance};
    use adguard_sync_model::FilteringConfig;
    use tokio_util::sync::CancellationToken;

    async fn run(origin: &MockInstance, replica: &MockInstance) -> DomainOutcome {
        let status = origin.status().await.unwrap();
        let snapshot = OriginSnapshot::capture(origin, status, &DomainSet::all()).await;
        let ctx = SyncContext::new("replica", CancellationToken::new());
        TogglesSync.sync(&snapshot, replica, &ctx).await
    }

    #[tokio::test]
    async fn equal_values_issue_no_calls() {
        let origin = MockInstance::new("origin").with_toggle(Toggle::Parental, true);
        let replica = MockInstance::new("replica").with_toggle(Toggle::Parental, true);

        let outcome = run(&origin, &replica).await;
        assert_eq!(outcome.unchanged, 4);
        assert!(replica.calls().is_empty());
    }

    #[tokio::test]
    async fn one_call_per_differing_value() {
        let config = FilteringConfig {
            enabled: true,
            interval: 12,
        };
        let origin = MockInstance::new("origin")
            .with_toggle(Toggle::SafeBrowsing, true)
            .with_filtering_config(config);
        let replica = MockInstance::new("replica").with_toggle(Toggle::SafeSearch, true);

        let outcome = run(&origin, &replica).await;
        assert_eq!(outcome.updated, 3);
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(
            replica.calls(),
            vec![
                MockCall::SetToggle(Toggle::SafeBrowsing, true),
                MockCall::SetToggle(Toggle::SafeSearch, false),
                MockCall::SetFilteringConfig(config),
            ]
        );
    }

    #[tokio::test]
    async fn failure_is_keyed_by_toggle_name() {
        let origin = MockInstance::new("origin")
            .with_toggle(Toggle::Parental, true)
            .with_toggle(Toggle::SafeSearch, true);
        let replica = MockInstance::new("replica");
        replica.reject("parental", SyncError::Timeout);

        let outcome = run(&origin, &replica).await;
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].key, "parental");
        assert!(outcome.errors[0].retryable);
    }
}
