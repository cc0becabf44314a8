//! Watch command implementation.

use super::run::{print_report, OutputFormat};
use crate::config::Config;
use adguard_sync_engine::FanOut;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs a sync every `interval` until Ctrl-C.
///
/// Ctrl-C cancels the run in flight; its partial report is still printed.
pub async fn run(
    config: &Config,
    interval: Duration,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = CancellationToken::new();
    cancel_on_interrupt(shutdown.clone(), tokio::signal::ctrl_c());

    let (origin, replicas) = config.clients()?;
    let fanout = FanOut::new(config.sync_config()).with_cancellation(shutdown.clone());
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_secs = interval.as_secs(), replicas = replicas.len(), "watching");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let report = fanout.run_all(origin.clone(), replicas.clone()).await;
        print_report(&report, format)?;
        if shutdown.is_cancelled() {
            break;
        }
    }
    Ok(())
}

/// Cancels `shutdown` once `signal` fires. A listener that cannot be
/// installed leaves the token alone.
fn cancel_on_interrupt<F>(shutdown: CancellationToken, signal: F) -> JoinHandle<()>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                info!("interrupt received, stopping");
                shutdown.cancel();
            }
            Err(e) => warn!(error = %e, "cannot listen for interrupts"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[tokio::test]
    async fn interrupt_cancels_shutdown() {
        let shutdown = CancellationToken::new();
        cancel_on_interrupt(shutdown.clone(), async { Ok(()) })
            .await
            .unwrap();
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn failed_listener_keeps_watching() {
        let shutdown = CancellationToken::new();
        cancel_on_interrupt(shutdown.clone(), async {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no signal handler"))
        })
        .await
        .unwrap();
        assert!(!shutdown.is_cancelled());
    }
}
