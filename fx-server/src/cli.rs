//! CLI/env configuration surface. Every flag mirrors an environment variable
//! of the same name via `clap`'s `env` feature; [`Cli::into_engine_config`]
//! folds the parsed flags onto [`EngineConfig::default`] so an unset option
//! keeps its documented default.

use std::collections::BTreeMap;

use clap::Parser;
use fx_core::EngineConfig;
use rust_decimal::Decimal;

#[derive(Debug, Parser)]
#[command(name = "fx-server", about = "Multi-currency FX transfer engine")]
pub struct Cli {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "HTTP_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub http_bind_addr: String,

    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub rust_log: String,

    #[arg(long, env = "TRANSACTION_MARGIN_RATE")]
    pub transaction_margin_rate: Option<Decimal>,

    #[arg(long, env = "REBALANCE_HIGH_UTILIZATION")]
    pub rebalance_high_utilization: Option<Decimal>,

    #[arg(long, env = "REBALANCE_LOW_UTILIZATION")]
    pub rebalance_low_utilization: Option<Decimal>,

    #[arg(long, env = "REBALANCE_BUFFER_MULTIPLIER")]
    pub rebalance_buffer_multiplier: Option<Decimal>,

    #[arg(long, env = "REBALANCE_INTERVAL_SECONDS")]
    pub rebalance_interval_seconds: Option<u64>,

    #[arg(long, env = "METRICS_WINDOW_HOURS")]
    pub metrics_window_hours: Option<i64>,

    /// Comma-separated `CCY=seconds` pairs, e.g. `USD=3,EUR=2`.
    #[arg(long, env = "SETTLEMENT_TIMES")]
    pub settlement_times: Option<String>,

    /// Comma-separated `CCY=balance` pairs, e.g. `USD=1000000,EUR=921658`.
    /// Also defines the supported-currency allowlist when set.
    #[arg(long, env = "INITIAL_BALANCES")]
    pub initial_balances: Option<String>,
}

impl Cli {
    pub fn into_engine_config(self) -> EngineConfig {
        let mut config = EngineConfig::default();

        if let Some(v) = self.transaction_margin_rate {
            config.transaction_margin_rate = v;
        }
        if let Some(v) = self.rebalance_high_utilization {
            config.rebalance_high_utilization = v;
        }
        if let Some(v) = self.rebalance_low_utilization {
            config.rebalance_low_utilization = v;
        }
        if let Some(v) = self.rebalance_buffer_multiplier {
            config.rebalance_buffer_multiplier = v;
        }
        if let Some(v) = self.rebalance_interval_seconds {
            config.rebalance_interval_seconds = v;
        }
        if let Some(v) = self.metrics_window_hours {
            config.metrics_window_hours = v;
        }
        if let Some(raw) = self.settlement_times.as_deref() {
            config.settlement_times = parse_u64_map(raw);
        }
        if let Some(raw) = self.initial_balances.as_deref() {
            config.initial_balances = parse_decimal_map(raw);
        }

        config
    }
}

fn parse_u64_map(raw: &str) -> BTreeMap<String, u64> {
    raw.split(',')
        .filter_map(|entry| entry.split_once('='))
        .filter_map(|(ccy, v)| v.trim().parse::<u64>().ok().map(|v| (ccy.trim().to_string(), v)))
        .collect()
}

fn parse_decimal_map(raw: &str) -> BTreeMap<String, Decimal> {
    raw.split(',')
        .filter_map(|entry| entry.split_once('='))
        .filter_map(|(ccy, v)| v.trim().parse::<Decimal>().ok().map(|v| (ccy.trim().to_string(), v)))
        .collect()
}
