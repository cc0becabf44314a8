//! Check command implementation.

use crate::config::Config;
use adguard_sync_engine::InstanceClient;
use futures::future::join_all;
use std::sync::Arc;

/// Probes origin and replicas and prints their versions.
///
/// Returns whether every instance answered.
pub async fn run(config: &Config) -> Result<bool, Box<dyn std::error::Error>> {
    let (origin, replicas) = config.clients()?;
    let domains: Vec<_> = config
        .sync_config()
        .domains
        .iter()
        .map(|d| d.as_str())
        .collect();

    println!("Configuration OK");
    println!("  Replicas: {}", replicas.len());
    println!("  Domains:  {}", domains.join(", "));
    println!();

    let instances: Vec<(&str, Arc<dyn InstanceClient>)> = std::iter::once(("origin", origin))
        .chain(replicas.into_iter().map(|r| ("replica", r)))
        .collect();
    let probes = join_all(instances.iter().map(|(_, i)| i.status())).await;

    let mut all_up = true;
    for ((role, instance), probe) in instances.iter().zip(probes) {
        match probe {
            Ok(status) => println!("  {role:<8} {:<28} {}", instance.name(), status.version),
            Err(e) => {
                all_up = false;
                println!("  {role:<8} {:<28} unreachable: {e}", instance.name());
            }
        }
    }
    Ok(all_up)
}
