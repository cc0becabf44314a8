use super::{note_diff, Dispatch, DomainSynchronizer, SyncContext};
use crate::config::DomainKind;
use crate::diff::diff;
use crate::report::{DomainOutcome, Operation};
use crate::snapshot::OriginSnapshot;
use crate::transport::InstanceClient;
use adguard_sync_model::Client;
use async_trait::async_trait;

/// Persistent clients, keyed by name and replaced as whole objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientsSync;

#[async_trait]
impl DomainSynchronizer for ClientsSync {
    fn kind(&self) -> DomainKind {
        DomainKind::Clients
    }

    async fn sync(
        &self,
        origin: &OriginSnapshot,
        replica: &dyn InstanceClient,
        ctx: &SyncContext,
    ) -> DomainOutcome {
        let mut outcome = self.outcome();
        let wanted = match origin.clients() {
            Ok(clients) => clients,
            Err(e) => return outcome.fail(e),
        };
        let current = match replica.clients().await {
            Ok(clients) => clients,
            Err(e) => return outcome.fail(e),
        };

        let diff = diff(wanted, &current, Client::key, Client::same_as);
        note_diff(&mut outcome, &diff, ctx);

        let mut dispatch = Dispatch::new(ctx, diff.change_count());
        for client in diff.removals.values() {
            if !dispatch.proceed(&mut outcome) {
                return outcome;
            }
            let result = replica.delete_client(client).await;
            outcome.record(Operation::Delete, &client.name, result);
        }
        for client in diff.additions.values() {
            if !dispatch.proceed(&mut outcome) {
                return outcome;
            }
            let result = replica.add_client(client).await;
            outcome.record(Operation::Add, &client.name, result);
        }
        for client in diff.updates.values() {
            if !dispatch.proceed(&mut outcome) {
                return outcome;
            }
            let result = replica.update_client(client).await;
            outcome.record(Operation::Update, &client.name, result);
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
    use tokio_util::sync::CancellationToken;

    async fn run(origin: &MockInstance, replica: &MockInstance) -> DomainOutcome {
        let status = origin.status().await.unwrap();
        let snapshot = OriginSnapshot::capture(origin, status, &DomainSet::all()).await;
        let ctx = SyncContext::new("replica", CancellationToken::new());
        ClientsSync.sync(&snapshot, replica, &ctx).await
    }

    #[tokio::test]
    async fn update_sends_full_origin_object() {
        let mut wanted = Client::new("laptop", ["10.0.0.2"]);
        wanted.tags = vec!["device_laptop".into()];
        wanted.safesearch_enabled = true;
        let origin = MockInstance::new("origin").with_clients(vec![wanted.clone()]);
        let replica = MockInstance::new("replica").with_clients(vec![Client::new("laptop", ["10.0.0.2"])]);

        let outcome = run(&origin, &replica).await;
        assert_eq!(outcome.updated, 1);
        assert_eq!(replica.calls(), vec![MockCall::UpdateClient(wanted.clone())]);
        assert_eq!(replica.state().clients, vec![wanted]);
    }

    #[tokio::test]
    async fn list_order_is_not_a_difference() {
        let origin = MockInstance::new("origin").with_clients(vec![Client::new("tv", ["10.0.0.3", "aa:bb"])]);
        let replica = MockInstance::new("replica").with_clients(vec![Client::new("tv", ["aa:bb", "10.0.0.3"])]);

        let outcome = run(&origin, &replica).await;
        assert_eq!(outcome.unchanged, 1);
        assert!(replica.calls().is_empty());
    }

    #[tokio::test]
    async fn client_missing_on_origin_is_deleted() {
        let stale = Client::new("old-phone", ["10.0.0.9"]);
        let origin = MockInstance::new("origin");
        let replica = MockInstance::new("replica").with_clients(vec![stale.clone()]);

        let outcome = run(&origin, &replica).await;
        assert_eq!(outcome.removed, 1);
        assert!(outcome.is_success());
        assert_eq!(replica.calls(), vec![MockCall::DeleteClient(stale)]);
        assert!(replica.state().clients.is_empty());
    }

    #[tokio::test]
    async fn rejected_delete_is_recorded() {
        let origin = MockInstance::new("origin");
        let replica = MockInstance::new("replica")
            .with_clients(vec![Client::new("old-phone", ["10.0.0.9"])]);
        replica.reject("old-phone", SyncError::http(400, "client not found"));

        let outcome = run(&origin, &replica).await;
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].key, "old-phone");
        assert_eq!(outcome.errors[0].operation, Operation::Delete);
        assert!(!outcome.errors[0].retryable);
        assert_eq!(replica.state().clients.len(), 1);
    }

    #[tokio::test]
    async fn rejected_client_does_not_stop_siblings() {
        let origin = MockInstance::new("origin").with_clients(vec![
            Client::new("a", ["10.0.0.1"]),
            Client::new("b", ["10.0.0.2"]),
            Client::new("c", ["10.0.0.3"]),
        ]);
        let replica = MockInstance::new("replica");
        replica.reject("b", SyncError::http(400, "invalid id"));

        let outcome = run(&origin, &replica).await;
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].key, "b");
        assert_eq!(outcome.errors[0].operation, Operation::Add);
    }
}
