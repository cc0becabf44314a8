//! Run command implementation.

use crate::config::Config;
use adguard_sync_engine::{DomainOutcome, FanOut, SyncReport, SyncResult};
use clap::ValueEnum;
use std::fmt;

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    Text,
    /// The full report as JSON.
    Json,
}

/// Runs one sync and prints the report.
///
/// Returns whether the run succeeded.
pub async fn run(config: &Config, format: OutputFormat) -> Result<bool, Box<dyn std::error::Error>> {
    let fanout = FanOut::new(config.sync_config());
    let report = sync_once(config, &fanout).await?;
    print_report(&report, format)?;
    Ok(report.is_success())
}

/// Builds the clients and runs the fan-out once.
pub async fn sync_once(config: &Config, fanout: &FanOut) -> SyncResult<SyncReport> {
    let (origin, replicas) = config.clients()?;
    Ok(fanout.run_all(origin, replicas).await)
}

/// Prints a report to stdout.
pub fn print_report(report: &SyncReport, format: OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => print!("{}", render_text(report)),
    }
    Ok(())
}

/// Renders the human-readable report.
pub fn render_text(report: &SyncReport) -> String {
    TextReport(report).to_string()
}

/// Human-readable form of a report.
struct TextReport<'a>(&'a SyncReport);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let status = match (report.is_success(), report.cancelled) {
            (true, _) => "ok",
            (false, true) => "cancelled",
            (false, false) => "failed",
        };
        writeln!(f, "AdGuard Sync Report")?;
        writeln!(f, "===================")?;
        writeln!(f, "Run:    {}", report.run_id)?;
        writeln!(f, "Origin: {}", report.origin)?;
        writeln!(f, "Status: {status}")?;
        if let Some(e) = &report.origin_error {
            writeln!(f, "Origin error: {e}")?;
        }

        for replica in &report.replicas {
            writeln!(f)?;
            let state = if replica.is_success() { "ok" } else { "failed" };
            writeln!(f, "Replica {}: {state}", replica.replica)?;
            if let Some(e) = &replica.error {
                writeln!(f, "  error: {e}")?;
            }
            for warning in &replica.warnings {
                writeln!(f, "  warning: {warning}")?;
            }
            for domain in &replica.domains {
                write_domain(f, domain)?;
            }
        }

        let totals = report.totals();
        writeln!(f)?;
        writeln!(
            f,
            "Totals: {} replica(s), {} failed, {} added, {} updated, {} removed, {} error(s)",
            totals.replicas,
            totals.failed_replicas,
            totals.added,
            totals.updated,
            totals.removed,
            totals.errors
        )
    }
}

fn write_domain(f: &mut fmt::Formatter<'_>, domain: &DomainOutcome) -> fmt::Result {
    write!(
        f,
        "  {:<20} +{} ~{} -{} ={}",
        domain.label(),
        domain.added,
        domain.updated,
        domain.removed,
        domain.unchanged
    )?;
    if domain.skipped > 0 {
        write!(f, " skipped {}", domain.skipped)?;
    }
    writeln!(f)?;
    if let Some(e) = &domain.error {
        writeln!(f, "    error: {e}")?;
    }
    for item in &domain.errors {
        let retry = if item.retryable { " (retryable)" } else { "" };
        writeln!(f, "    {} {}: {}{retry}", item.operation, item.key, item.cause)?;
    }
    for warning in &domain.warnings {
        writeln!(f, "    warning: {warning}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adguard_sync_engine::{DomainKind, Operation, ReplicaOutcome, SyncError};

    #[test]
    fn text_report_lists_failures() {
        let mut report = SyncReport::new("dns1.lan");
        let mut replica = ReplicaOutcome::new("dns2.lan");
        let mut rewrites = DomainOutcome::new(DomainKind::Rewrites);
        rewrites.record(Operation::Add, "a.lan -> 10.0.0.1", Ok(()));
        rewrites.record(
            Operation::Add,
            "b.lan -> 10.0.0.2",
            Err(SyncError::http(400, "invalid")),
        );
        replica.domains.push(rewrites);
        replica.warnings.push("version mismatch".into());
        report.replicas.push(replica);
        report
            .replicas
            .push(ReplicaOutcome::failed("dns3.lan", SyncError::Timeout));

        let text = render_text(&report);
        assert!(text.contains("Status: failed"));
        assert!(text.contains("Replica dns2.lan: failed"));
        assert!(text.contains("rewrites"));
        assert!(text.contains("+1 ~0 -0 =0"));
        assert!(text.contains("add b.lan -> 10.0.0.2: http status 400: invalid"));
        assert!(text.contains("warning: version mismatch"));
        assert!(text.contains("Replica dns3.lan: failed"));
        assert!(text.contains("error: operation timed out"));
        assert!(text.contains("2 replica(s), 2 failed"));
    }

    #[test]
    fn text_report_cancelled_run() {
        let mut report = SyncReport::new("dns1.lan");
        let mut replica = ReplicaOutcome::new("dns2.lan");
        let mut clients = DomainOutcome::new(DomainKind::Clients);
        clients.skipped = 3;
        clients.error = Some(SyncError::Cancelled);
        replica.domains.push(clients);
        report.replicas.push(replica);
        report.cancelled = true;

        let text = render_text(&report);
        assert!(text.contains("Status: cancelled"));
        assert!(text.contains("skipped 3"));
        assert!(text.ends_with("1 failed, 0 added, 0 updated, 0 removed, 1 error(s)\n"));
    }

    #[test]
    fn text_report_success() {
        let mut report = SyncReport::new("dns1.lan");
        report.replicas.push(ReplicaOutcome::new("dns2.lan"));
        let text = render_text(&report);
        assert!(text.contains("Status: ok"));
        assert!(text.contains("Replica dns2.lan: ok"));
    }
}
