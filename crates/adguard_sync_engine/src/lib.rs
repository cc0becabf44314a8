//! # AdGuard Sync Engine
//!
//! Reconciliation engine that converges AdGuard Home replicas onto an
//! origin instance.
//!
//! This crate provides:
//! - Instance client abstraction with HTTP and in-memory implementations
//! - Generic keyed differ
//! - Per-domain synchronizers (rewrites, filters, custom rules, services,
//!   clients, toggles)
//! - Per-replica orchestration with failure isolation
//! - Bounded concurrent fan-out across replicas with cancellation
//! - Serializable sync report
//!
//! ## Architecture
//!
//! A run follows a **snapshot-then-converge** model:
//! 1. Probe the origin and capture its state once
//! 2. For every replica (concurrently), probe it and run each domain
//! 3. Per domain: read the replica, diff, apply removals, additions, updates
//!
//! ## Key Invariants
//!
//! - The origin is authoritative and never written to
//! - Every replica gets exactly one outcome, in configured order
//! - Failures stay within their item, domain or replica
//! - Equal state issues no mutating call
//! - A report is always produced

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod diff;
mod domains;
mod error;
mod fanout;
mod http;
mod orchestrator;
mod report;
mod snapshot;
mod transport;

pub use config::{DomainKind, DomainSet, SyncConfig};
pub use diff::{diff, DiffResult};
pub use domains::{
    synchronizers_for, ClientsSync, CustomRulesSync, DomainSynchronizer, FiltersSync,
    RewritesSync, ServicesSync, SyncContext, TogglesSync,
};
pub use error::{SyncError, SyncResult};
pub use fanout::FanOut;
pub use http::{HttpInstanceClient, InstanceConfig, DEFAULT_API_PATH};
pub use orchestrator::Orchestrator;
pub use report::{DomainOutcome, ItemError, Operation, ReplicaOutcome, SyncReport, Totals};
pub use snapshot::{OriginSnapshot, ToggleState};
pub use transport::{InFlight, InstanceClient, MockCall, MockInstance, MockRead, MockState};
