//! The liquidity pool ledger: the authoritative balance store. Reservation
//! is a soft hold; settlement is the hard, two-sided commit. Implementors
//! own the locking discipline described in the trait docs below -- `fx-core`
//! only states the contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::decimal::Money;
use crate::error::Result;

/// One currency's pool: total funds owned, and funds currently held against
/// pending transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityPool {
    pub currency: String,
    pub balance: Money,
    pub reserved_balance: Money,
    pub updated_at: DateTime<Utc>,
}

impl LiquidityPool {
    /// `balance - reserved_balance`. Never observed negative outside the
    /// interior of a settlement transaction.
    pub fn available(&self) -> Money {
        self.balance - self.reserved_balance
    }
}

/// Flow metrics for one currency over a trailing window, as computed by
/// `pool_metrics`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolMetrics {
    pub outgoing_volume: Money,
    pub incoming_volume: Money,
    pub net_flow: Money,
    pub utilization_rate: Money,
}

impl PoolMetrics {
    pub fn compute(outgoing_volume: Money, incoming_volume: Money, balance: Money) -> Self {
        let net_flow = incoming_volume - outgoing_volume;
        let utilization_rate = if balance > Decimal::ZERO {
            outgoing_volume / balance
        } else {
            Decimal::ZERO
        };
        Self { outgoing_volume, incoming_volume, net_flow, utilization_rate }
    }
}

/// Storage seam for pool balances. Every method here is documented as
/// executing within one transaction; implementations are expected to uphold
/// that atomicity, including the deterministic ascending-currency-code lock
/// order for multi-pool operations.
#[async_trait]
pub trait LiquidityLedger: Send + Sync {
    /// `available(currency) >= amount`. Read-only; fails with `NotFound` if
    /// the pool does not exist.
    async fn check_liquidity(&self, currency: &str, amount: Money) -> Result<bool>;

    /// Locks the pool, verifies `available >= amount`, increments
    /// `reserved_balance`. Fails with `InsufficientLiquidity` otherwise.
    async fn reserve_funds(&self, currency: &str, amount: Money) -> Result<()>;

    /// Decrements `reserved_balance` by `amount` under lock. The
    /// post-condition `reserved_balance >= 0` is enforced by the
    /// implementation.
    async fn release_reservation(&self, currency: &str, amount: Money) -> Result<()>;

    /// Locks both pools in ascending-currency-code order and applies the
    /// "target pool pays out" settlement model: releases and debits the
    /// target pool's reservation and balance by `target_amount`, credits the
    /// source pool's balance by `source_amount`. Fails with
    /// `InvariantViolation` -- and persists nothing -- if a post-condition
    /// would be violated.
    async fn settle_transaction(
        &self,
        source_currency: &str,
        target_currency: &str,
        source_amount: Money,
        target_amount: Money,
    ) -> Result<()>;

    /// Locks both pools in order, moves `amount` of `from_currency` into
    /// `to_currency` at the latest (margin-free) FX rate. A logged no-op if
    /// `from_pool.balance < amount`; fails with `NotFound` if either pool or
    /// the FX rate is missing.
    async fn internal_rebalance(&self, from_currency: &str, to_currency: &str, amount: Money) -> Result<()>;

    /// Flow metrics for `currency` over the trailing `window_hours`.
    async fn pool_metrics(&self, currency: &str, window_hours: i64) -> Result<PoolMetrics>;

    /// All pools, in ascending currency-code order (the iteration order the
    /// rebalancer relies on for deterministic behavior).
    async fn all_pools(&self) -> Result<Vec<LiquidityPool>>;

    async fn get_pool(&self, currency: &str) -> Result<LiquidityPool>;
}
