//! Outcomes of a sync run.
//!
//! The report is the only artifact the engine hands back to its caller. It
//! is built bottom-up: synchronizers fill a [`DomainOutcome`], the
//! orchestrator collects them into a [`ReplicaOutcome`], and the fan-out
//! controller assembles the [`SyncReport`] once every worker has finished.

use crate::config::DomainKind;
use crate::error::{SyncError, SyncResult};
use adguard_sync_model::FilterList;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::warn;
use uuid::Uuid;

/// Kind of mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Item created.
    Add,
    /// Item replaced.
    Update,
    /// Item removed.
    Delete,
    /// Whole value replaced (custom rules, services, toggles).
    Set,
    /// Filter lists re-downloaded.
    Refresh,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Add => "add",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Set => "set",
            Operation::Refresh => "refresh",
        };
        f.write_str(s)
    }
}

/// A failed mutating call. Sibling items were still attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    /// Domain of the item.
    pub domain: DomainKind,
    /// Attempted operation.
    pub operation: Operation,
    /// Natural key of the item.
    pub key: String,
    /// Transport or appliance error.
    pub cause: SyncError,
    /// Whether a later run may succeed unchanged.
    pub retryable: bool,
}

/// Result of synchronizing one domain (or one filter partition) on one
/// replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainOutcome {
    /// Domain.
    pub domain: DomainKind,
    /// Filter partition, for the filters domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<FilterList>,
    /// Items created.
    pub added: usize,
    /// Items replaced.
    pub updated: usize,
    /// Items removed.
    pub removed: usize,
    /// Items already in sync.
    pub unchanged: usize,
    /// Items not attempted because the run was cancelled.
    pub skipped: usize,
    /// Failed item operations, in the order they were attempted.
    pub errors: Vec<ItemError>,
    /// Domain-level failure; when set, the domain was not (fully) attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SyncError>,
    /// Non-fatal observations such as duplicate keys.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl DomainOutcome {
    /// Creates an empty outcome.
    pub fn new(domain: DomainKind) -> Self {
        Self {
            domain,
            partition: None,
            added: 0,
            updated: 0,
            removed: 0,
            unchanged: 0,
            skipped: 0,
            errors: Vec::new(),
            error: None,
            warnings: Vec::new(),
        }
    }

    /// Creates an empty outcome for one filter partition.
    pub fn for_partition(domain: DomainKind, partition: FilterList) -> Self {
        Self {
            partition: Some(partition),
            ..Self::new(domain)
        }
    }

    /// Marks the domain as failed as a whole.
    pub fn fail(mut self, error: SyncError) -> Self {
        warn!(domain = %self.label(), %error, "domain skipped");
        self.error = Some(error);
        self
    }

    /// Records the result of one mutating call.
    ///
    /// Returns true on success.
    pub fn record(&mut self, operation: Operation, key: impl fmt::Display, result: SyncResult<()>) -> bool {
        match result {
            Ok(()) => {
                match operation {
                    Operation::Add => self.added += 1,
                    Operation::Update | Operation::Set => self.updated += 1,
                    Operation::Delete => self.removed += 1,
                    Operation::Refresh => {}
                }
                true
            }
            Err(cause) => {
                let key = key.to_string();
                warn!(domain = %self.label(), %operation, %key, error = %cause, "operation failed");
                self.errors.push(ItemError {
                    domain: self.domain,
                    operation,
                    key,
                    retryable: cause.is_retryable(),
                    cause,
                });
                false
            }
        }
    }

    /// Adds a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(domain = %self.label(), "{}", message);
        self.warnings.push(message);
    }

    /// Domain name with partition, e.g. `filters(whitelist)`.
    pub fn label(&self) -> String {
        match self.partition {
            Some(partition) => format!("{}({})", self.domain, partition),
            None => self.domain.to_string(),
        }
    }

    /// Number of successful mutations.
    pub fn change_count(&self) -> usize {
        self.added + self.updated + self.removed
    }

    /// Returns true if nothing failed in this domain.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.errors.is_empty()
    }
}

/// Result of synchronizing one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaOutcome {
    /// Replica name.
    pub replica: String,
    /// Replica-level failure; when set, no domain was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SyncError>,
    /// Domain outcomes in execution order.
    pub domains: Vec<DomainOutcome>,
    /// Non-fatal observations such as a version mismatch.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// When the worker started.
    pub started_at: DateTime<Utc>,
    /// When the worker finished.
    pub finished_at: DateTime<Utc>,
}

impl ReplicaOutcome {
    /// Creates an outcome that is about to be filled.
    pub fn new(replica: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            replica: replica.into(),
            error: None,
            domains: Vec::new(),
            warnings: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    /// Creates a finished outcome with a replica-level error.
    pub fn failed(replica: impl Into<String>, error: SyncError) -> Self {
        let mut outcome = Self::new(replica);
        outcome.error = Some(error);
        outcome
    }

    /// Marks the outcome as finished.
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Returns the outcome of a domain, the first partition for filters.
    pub fn domain(&self, kind: DomainKind) -> Option<&DomainOutcome> {
        self.domains.iter().find(|d| d.domain == kind)
    }

    /// Returns the outcome of one filter partition.
    pub fn filters(&self, partition: FilterList) -> Option<&DomainOutcome> {
        self.domains
            .iter()
            .find(|d| d.domain == DomainKind::Filters && d.partition == Some(partition))
    }

    /// Returns true if nothing failed on this replica.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.domains.iter().all(DomainOutcome::is_success)
    }
}

/// Aggregated counts of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// Replicas in the report.
    pub replicas: usize,
    /// Replicas with any failure.
    pub failed_replicas: usize,
    /// Items created.
    pub added: usize,
    /// Items replaced.
    pub updated: usize,
    /// Items removed.
    pub removed: usize,
    /// Replica, domain and item errors.
    pub errors: usize,
}

/// Result of one sync run across all replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// Origin name.
    pub origin: String,
    /// Origin-level failure; when set, no replica was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_error: Option<SyncError>,
    /// Replica outcomes in configured order.
    pub replicas: Vec<ReplicaOutcome>,
    /// Whether the run was cancelled before it completed.
    pub cancelled: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    /// Creates a report for a run that starts now.
    pub fn new(origin: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            origin: origin.into(),
            origin_error: None,
            replicas: Vec::new(),
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    /// Marks the report as final.
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Returns the outcome of a replica by name.
    pub fn replica(&self, name: &str) -> Option<&ReplicaOutcome> {
        self.replicas.iter().find(|r| r.replica == name)
    }

    /// Returns true if no origin, replica, domain or item error occurred.
    pub fn is_success(&self) -> bool {
        self.origin_error.is_none() && self.replicas.iter().all(ReplicaOutcome::is_success)
    }

    /// Aggregates counts across replicas.
    pub fn totals(&self) -> Totals {
        let mut totals = Totals {
            replicas: self.replicas.len(),
            errors: usize::from(self.origin_error.is_some()),
            ..Totals::default()
        };
        for replica in &self.replicas {
            if !replica.is_success() {
                totals.failed_replicas += 1;
            }
            totals.errors += usize::from(replica.error.is_some());
            for domain in &replica.domains {
                totals.added += domain.added;
                totals.updated += domain.updated;
                totals.removed += domain.removed;
                totals.errors += domain.errors.len() + usize::from(domain.error.is_some());
            }
        }
        totals
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals = self.totals();
        write!(
            f,
            "run {} from {}: {} replica(s), {} failed, +{} ~{} -{}, {} error(s)",
            self.run_id,
            self.origin,
            totals.replicas,
            totals.failed_replicas,
            totals.added,
            totals.updated,
            totals.removed,
            totals.errors
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}
