//! The pool rebalancer: a periodic control loop that moves liquidity between
//! pools whose utilization or net flow has drifted outside the configured
//! bands. `fx-core` only implements one cycle (`run_cycle`); `fx-server`
//! owns the `tokio::time::interval` loop and its cancellation.

use rust_decimal::Decimal;

use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::error::Result;
use crate::fx_rate::FxRateStore;
use crate::ledger::LiquidityLedger;
use crate::transaction::margin_free_convert;

/// One executed (or attempted-and-skipped) rebalance, returned by
/// `run_cycle` for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceOutcome {
    pub deficit_currency: String,
    pub donor_currency: String,
    pub transfer_amount: Money,
    pub executed: bool,
}

pub struct PoolRebalancer<'a, F, L> {
    fx_rates: &'a F,
    ledger: &'a L,
    config: &'a EngineConfig,
}

impl<'a, F, L> PoolRebalancer<'a, F, L>
where
    F: FxRateStore,
    L: LiquidityLedger,
{
    pub fn new(fx_rates: &'a F, ledger: &'a L, config: &'a EngineConfig) -> Self {
        Self { fx_rates, ledger, config }
    }

    /// Runs a single rebalance cycle: measures every pool, then for each
    /// deficit currency (in ascending currency-code order) picks the first
    /// donor candidate (also in ascending order) and executes at most one
    /// transfer. A single pool's failure is logged and does not stop the
    /// cycle.
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<Vec<RebalanceOutcome>> {
        tracing::info!("rebalance cycle started");

        let mut pools = self.ledger.all_pools().await?;
        pools.sort_by(|a, b| a.currency.cmp(&b.currency));

        let mut metrics = Vec::with_capacity(pools.len());
        for pool in &pools {
            match self.ledger.pool_metrics(&pool.currency, self.config.metrics_window_hours).await {
                Ok(m) => metrics.push((pool.currency.clone(), pool.balance, m)),
                Err(error) => {
                    tracing::warn!(currency = %pool.currency, %error, "failed to compute pool metrics, skipping");
                }
            }
        }

        let mut outcomes = Vec::new();

        for (currency, _balance, metric) in &metrics {
            let is_deficit = metric.utilization_rate > self.config.rebalance_high_utilization || metric.net_flow < Decimal::ZERO;
            if !is_deficit {
                continue;
            }

            let donor = metrics
                .iter()
                .find(|(other, _, other_metric)| other != currency && other_metric.utilization_rate < self.config.rebalance_low_utilization);

            let Some((donor_currency, donor_balance, _)) = donor else { continue };

            match self.attempt_rebalance(currency, metric.net_flow, donor_currency, *donor_balance).await {
                Ok(outcome) => {
                    if outcome.executed {
                        tracing::info!(
                            from = %outcome.donor_currency,
                            to = %outcome.deficit_currency,
                            amount = %outcome.transfer_amount,
                            "internal rebalance executed"
                        );
                    }
                    outcomes.push(outcome);
                }
                Err(error) => {
                    tracing::warn!(currency = %currency, %error, "rebalance attempt failed, skipping");
                }
            }
        }

        tracing::info!(rebalances = outcomes.len(), "rebalance cycle completed");
        Ok(outcomes)
    }

    async fn attempt_rebalance(
        &self,
        deficit_currency: &str,
        net_flow: Money,
        donor_currency: &str,
        donor_balance: Money,
    ) -> Result<RebalanceOutcome> {
        let target_required = net_flow.abs() * self.config.rebalance_buffer_multiplier;
        let source_required = margin_free_convert(self.fx_rates, deficit_currency, donor_currency, target_required).await?;
        let cap = donor_balance * Decimal::new(5, 1);
        let transfer_amount = source_required.min(cap);

        if transfer_amount <= Decimal::ZERO {
            return Ok(RebalanceOutcome {
                deficit_currency: deficit_currency.to_string(),
                donor_currency: donor_currency.to_string(),
                transfer_amount: Decimal::ZERO,
                executed: false,
            });
        }

        self.ledger.internal_rebalance(donor_currency, deficit_currency, transfer_amount).await?;

        Ok(RebalanceOutcome {
            deficit_currency: deficit_currency.to_string(),
            donor_currency: donor_currency.to_string(),
            transfer_amount,
            executed: true,
        })
    }
}
