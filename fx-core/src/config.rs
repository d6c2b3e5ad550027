//! Typed, read-only-after-init configuration for the engine.
//!
//! `fx-server` is the only place that parses this from CLI flags/env vars
//! (via `clap`'s `env` feature); everything below just consumes the struct.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Engine-wide configuration, read once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fraction of `base_target_amount` deducted as revenue on every quote.
    pub transaction_margin_rate: Decimal,
    /// Per-currency settlement delay, in seconds.
    pub settlement_times: BTreeMap<String, u64>,
    /// Seed balances applied at database init. The key set of this map *is*
    /// the supported-currency allowlist.
    pub initial_balances: BTreeMap<String, Decimal>,
    /// Utilization above which a pool is a rebalance deficit candidate.
    pub rebalance_high_utilization: Decimal,
    /// Utilization below which a pool is a rebalance donor candidate.
    pub rebalance_low_utilization: Decimal,
    /// Multiplier applied to `|net_flow|` to size a rebalance transfer.
    pub rebalance_buffer_multiplier: Decimal,
    /// Cadence of the rebalancer loop, in seconds.
    pub rebalance_interval_seconds: u64,
    /// History window used by `pool_metrics`, in hours.
    pub metrics_window_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let settlement_times = BTreeMap::from([
            ("USD".to_string(), 3),
            ("EUR".to_string(), 2),
            ("JPY".to_string(), 3),
            ("GBP".to_string(), 2),
            ("AUD".to_string(), 3),
        ]);
        let initial_balances = BTreeMap::from([
            ("USD".to_string(), Decimal::new(1_000_000, 0)),
            ("EUR".to_string(), Decimal::new(921_658, 0)),
            ("JPY".to_string(), Decimal::new(109_890_110, 0)),
            ("GBP".to_string(), Decimal::new(750_000, 0)),
            ("AUD".to_string(), Decimal::new(1_349_528, 0)),
        ]);
        Self {
            transaction_margin_rate: dec!(0.001),
            settlement_times,
            initial_balances,
            rebalance_high_utilization: dec!(0.7),
            rebalance_low_utilization: dec!(0.3),
            rebalance_buffer_multiplier: dec!(1.5),
            rebalance_interval_seconds: 60,
            metrics_window_hours: 1,
        }
    }
}

impl EngineConfig {
    /// The supported-currency allowlist: the key set of `initial_balances`.
    pub fn supported_currencies(&self) -> impl Iterator<Item = &str> {
        self.initial_balances.keys().map(String::as_str)
    }

    pub fn is_supported(&self, currency: &str) -> bool {
        self.initial_balances.contains_key(currency)
    }

    /// `SETTLEMENT_TIMES[source] + SETTLEMENT_TIMES[target]`, defaulting an
    /// unconfigured currency's delay to zero rather than failing -- currency
    /// support is already enforced earlier by `is_supported`.
    pub fn settlement_delay_seconds(&self, source: &str, target: &str) -> u64 {
        self.settlement_times.get(source).copied().unwrap_or(0)
            + self.settlement_times.get(target).copied().unwrap_or(0)
    }
}
