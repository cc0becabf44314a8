use super::{Dispatch, DomainSynchronizer, SyncContext};
use crate::config::DomainKind;
use crate::report::{DomainOutcome, Operation};
use crate::snapshot::OriginSnapshot;
use crate::transport::InstanceClient;
use async_trait::async_trait;
use tracing::debug;

/// Custom filtering rules, replaced as one normalized text blob.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomRulesSync;

#[async_trait]
impl DomainSynchronizer for CustomRulesSync {
    fn kind(&self) -> DomainKind {
        DomainKind::CustomRules
    }

    async fn sync(
        &self,
        origin: &OriginSnapshot,
        replica: &dyn InstanceClient,
        ctx: &SyncContext,
    ) -> DomainOutcome {
        let mut outcome = self.outcome();
        let wanted = match origin.filtering() {
            Ok(filtering) => &filtering.user_rules,
            Err(e) => return outcome.fail(e),
        };
        let current = match replica.filtering().await {
            Ok(filtering) => filtering.user_rules,
            Err(e) => return outcome.fail(e),
        };

        if wanted.same_as(&current) {
            outcome.unchanged = 1;
            return outcome;
        }

        debug!(
            replica = %ctx.replica(),
            origin_lines = wanted.len(),
            replica_lines = current.len(),
            "custom rules differ"
        );
        let mut dispatch = Dispatch::new(ctx, 1);
        if dispatch.proceed(&mut outcome) {
            let result = replica.set_custom_rules(&wanted.normalized()).await;
            outcome.record(Operation::Set, "custom_rules", result);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainSet;
    use crate::transport::MockInstance;
    use adguard_sync_model::UserRules;
    use tokio_util::sync::CancellationToken;

    async fn snapshot(origin: &MockInstance) -> OriginSnapshot {
        let status = origin.status().await.unwrap();
        OriginSnapshot::capture(origin, status, &DomainSet::all()).await
    }

    #[tokio::test]
    async fn whitespace_only_differences_are_ignored() {
        let origin = MockInstance::new("origin").with_user_rules(UserRules::from_text("||a.com^\n"));
        let replica = MockInstance::new("replica").with_user_rules(UserRules::from_text("||a.com^  \r\n\n"));
        let ctx = SyncContext::new("replica", CancellationToken::new());

        let outcome = CustomRulesSync.sync(&snapshot(&origin).await, &replica, &ctx).await;
        assert_eq!(outcome.unchanged, 1);
        assert!(replica.calls().is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_set_is_skipped() {
        let origin = MockInstance::new("origin").with_user_rules(UserRules::from_text("||a.com^"));
        let replica = MockInstance::new("replica");
        let token = CancellationToken::new();
        token.cancel();
        let ctx = SyncContext::new("replica", token);

        let outcome = CustomRulesSync.sync(&snapshot(&origin).await, &replica, &ctx).await;
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.error, Some(crate::error::SyncError::Cancelled));
        assert!(replica.calls().is_empty());
    }
}
