//! The scheduling loop.

use std::time::Duration;

use anyhow::Result;
use calbridge_core::config::BridgeConfig;
use calbridge_core::engine::SyncEngine;
use tracing::{error, info};

/// Pause before retrying after a failed pass, distinct from the regular
/// "no work to do" cadence.
const FAILURE_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// Run passes forever: one full pass, then sleep the configured
/// interval. Passes never overlap. Ctrl-C exits between sleeps.
pub async fn run(engine: SyncEngine, config: &BridgeConfig) -> Result<()> {
    let interval = Duration::from_secs(config.sync_interval_minutes * 60);
    info!(
        pairs = config.pairs.len(),
        interval_minutes = config.sync_interval_minutes,
        "calbridge started"
    );

    loop {
        let sleep = match engine.run_pass().await {
            Ok(summary) => {
                info!(
                    pairs_synced = summary.pairs_synced,
                    pairs_failed = summary.pairs_failed,
                    created = summary.counts.created,
                    updated = summary.counts.updated,
                    deleted = summary.counts.deleted,
                    skipped = summary.counts.skipped,
                    "pass complete"
                );
                interval
            }
            Err(e) => {
                error!(error = %e, "pass failed, backing off");
                FAILURE_BACKOFF
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(sleep) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                return Ok(());
            }
        }
    }
}
