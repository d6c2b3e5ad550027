use std::sync::Arc;
use std::time::Duration;

use fx_core::rebalancer::PoolRebalancer;
use fx_core::EngineConfig;
use fx_storage::{PgFxRateStore, PgLedger};

/// Drives the rebalancer on a fixed interval until `shutdown` resolves.
/// Cancellation is only observed at the tick boundary, as specified.
pub async fn run(
    fx_rates: Arc<PgFxRateStore>,
    ledger: Arc<PgLedger>,
    config: Arc<EngineConfig>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.rebalance_interval_seconds));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let rebalancer = PoolRebalancer::new(&*fx_rates, &*ledger, &config);
                if let Err(error) = rebalancer.run_cycle().await {
                    tracing::error!(%error, "rebalance cycle aborted");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("rebalancer task shutting down");
                    break;
                }
            }
        }
    }
}
