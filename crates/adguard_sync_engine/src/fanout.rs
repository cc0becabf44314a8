//! Concurrent synchronization of every replica.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::orchestrator::Orchestrator;
use crate::report::{ReplicaOutcome, SyncReport};
use crate::snapshot::OriginSnapshot;
use crate::transport::InstanceClient;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

/// Runs the orchestrator for every replica.
///
/// The origin is probed and captured once; the snapshot is shared by all
/// workers. One task is spawned per replica and a semaphore bounds how many
/// of them work at the same time. Every replica gets exactly one outcome,
/// in configured order, whatever happens to the others.
pub struct FanOut {
    config: SyncConfig,
    cancel: CancellationToken,
}

impl FanOut {
    /// Creates a controller with its own cancellation token.
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses a caller-supplied cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the token that cancels runs of this controller.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Synchronizes every replica onto the origin.
    ///
    /// Always returns a report. When the deadline elapses or the token is
    /// cancelled, no new call is dispatched and the partial report is
    /// returned.
    pub async fn run_all(
        &self,
        origin: Arc<dyn InstanceClient>,
        replicas: Vec<Arc<dyn InstanceClient>>,
    ) -> SyncReport {
        // A child token lets the deadline cancel this run only.
        let cancel = self.cancel.child_token();
        let deadline = self.config.deadline.map(|deadline| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!(?deadline, "deadline elapsed, cancelling run");
                cancel.cancel();
            })
        });

        let mut report = SyncReport::new(origin.name());
        info!(
            run_id = %report.run_id,
            origin = %report.origin,
            replicas = replicas.len(),
            "sync run started"
        );
        let outcomes = self.execute(&mut report, origin, replicas, &cancel).await;
        report.replicas = outcomes;
        report.cancelled = cancel.is_cancelled();
        if let Some(timer) = deadline {
            timer.abort();
        }

        let report = report.finish();
        let totals = report.totals();
        info!(
            run_id = %report.run_id,
            success = report.is_success(),
            failed_replicas = totals.failed_replicas,
            added = totals.added,
            updated = totals.updated,
            removed = totals.removed,
            errors = totals.errors,
            "sync run finished"
        );
        report
    }

    async fn execute(
        &self,
        report: &mut SyncReport,
        origin: Arc<dyn InstanceClient>,
        replicas: Vec<Arc<dyn InstanceClient>>,
        cancel: &CancellationToken,
    ) -> Vec<ReplicaOutcome> {
        if cancel.is_cancelled() {
            return cancelled(&replicas);
        }

        let status = match origin.status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(origin = %origin.name(), error = %e, "origin unreachable");
                report.origin_error = Some(e);
                return Vec::new();
            }
        };
        let snapshot = Arc::new(OriginSnapshot::capture(origin.as_ref(), status, &self.config.domains).await);

        let orchestrator = Arc::new(Orchestrator::new(&self.config.domains, cancel.clone()));
        let semaphore = Arc::new(Semaphore::new(self.config.effective_concurrency(replicas.len())));

        let workers: Vec<(String, JoinHandle<ReplicaOutcome>)> = replicas
            .into_iter()
            .map(|replica| {
                let name = replica.name().to_string();
                let span = info_span!("replica", replica = %name);
                let worker = worker(
                    replica,
                    Arc::clone(&snapshot),
                    Arc::clone(&orchestrator),
                    Arc::clone(&semaphore),
                    cancel.clone(),
                );
                (name, tokio::spawn(worker.instrument(span)))
            })
            .collect();

        let mut outcomes = Vec::with_capacity(workers.len());
        for (name, handle) in workers {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    let error = SyncError::from_panic(e.into_panic());
                    warn!(replica = %name, %error, "replica worker panicked");
                    ReplicaOutcome::failed(name, error).finish()
                }
                Err(_) => ReplicaOutcome::failed(name, SyncError::Cancelled).finish(),
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

async fn worker(
    replica: Arc<dyn InstanceClient>,
    snapshot: Arc<OriginSnapshot>,
    orchestrator: Arc<Orchestrator>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
) -> ReplicaOutcome {
    let permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        permit = semaphore.acquire_owned() => permit.ok(),
    };
    let Some(_permit) = permit else {
        return ReplicaOutcome::failed(replica.name(), SyncError::Cancelled).finish();
    };
    orchestrator.run(&snapshot, replica.as_ref()).await
}

fn cancelled(replicas: &[Arc<dyn InstanceClient>]) -> Vec<ReplicaOutcome> {
    replicas
        .iter()
        .map(|r| ReplicaOutcome::failed(r.name(), SyncError::Cancelled).finish())
        .collect()
}
