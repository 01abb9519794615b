// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, error, info};

use refsetd::cache::{BranchCache, Cache};
use refsetd::config::Config;
use refsetd::logging::setup_logging;
use refsetd::membership::MembershipSynchronizer;
use refsetd::store::{RefsetStore, SqliteRefsetStore};
use refsetd::terminology::{RestTerminology, Terminology};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    setup_logging(&config.log_level)?;

    info!("Starting refsetd v{}", env!("CARGO_PKG_VERSION"));

    // Initialize refset store
    let store: Arc<dyn RefsetStore> =
        Arc::new(SqliteRefsetStore::new(&config.store_db_path).await?);
    info!("Refset store initialized at {}", config.store_db_path.display());

    // Initialize terminology gateway and branch cache
    let terminology: Arc<dyn Terminology> = Arc::new(RestTerminology::new(
        &config.terminology_url,
        config.terminology_api_key.clone(),
    )?);
    info!("Terminology gateway pointed at {}", config.terminology_url);

    let cache: Arc<dyn Cache> = Arc::new(BranchCache::new());

    let synchronizer = Arc::new(MembershipSynchronizer::new(
        Arc::clone(&terminology),
        Arc::clone(&store),
        Arc::clone(&cache),
        config.sync_settings(),
    ));

    // Spawn the member count reconciliation task
    let reconcile_interval = Duration::from_secs(config.reconcile_interval_secs);
    let reconcile_store = Arc::clone(&store);
    let reconcile_task = tokio::spawn(async move {
        info!("Member count reconciliation task started");
        let mut ticker = tokio::time::interval(reconcile_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let refsets = match reconcile_store.list().await {
                Ok(refsets) => refsets,
                Err(e) => {
                    error!("Failed to list refsets for reconciliation: {}", e);
                    continue;
                }
            };
            for refset in refsets {
                match synchronizer.reconcile_member_count(&refset).await {
                    Ok(count) => {
                        debug!(refset_id = %refset.refset_id, count, "Member count reconciled");
                    }
                    Err(e) => {
                        error!(refset_id = %refset.refset_id, "Member count reconciliation failed: {}", e);
                    }
                }
            }
        }
    });

    info!("refsetd is running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    reconcile_task.abort();

    info!("refsetd stopped");
    Ok(())
}
