use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fx_core::decimal::{round6, Money};
use fx_core::error::{Error, Result};
use fx_core::fx_rate::FxRateStore;
use fx_core::ledger::{LiquidityLedger, LiquidityPool, PoolMetrics};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction as SqlxTx};

#[derive(FromRow, Clone)]
struct PoolRow {
    currency: String,
    balance: Money,
    reserved_balance: Money,
    updated_at: DateTime<Utc>,
}

impl From<PoolRow> for LiquidityPool {
    fn from(row: PoolRow) -> Self {
        LiquidityPool {
            currency: row.currency,
            balance: row.balance,
            reserved_balance: row.reserved_balance,
            updated_at: row.updated_at,
        }
    }
}

/// Postgres-backed [`LiquidityLedger`]. Every mutating operation runs inside
/// an explicit `sqlx::Transaction`; multi-pool operations lock both pool
/// rows in ascending currency-code order before touching either balance.
pub struct PgLedger {
    pool: PgPool,
    fx_rates: Arc<dyn FxRateStore>,
}

impl PgLedger {
    pub fn new(pool: PgPool, fx_rates: Arc<dyn FxRateStore>) -> Self {
        Self { pool, fx_rates }
    }

    async fn lock_pool(tx: &mut SqlxTx<'_, Postgres>, currency: &str) -> Result<PoolRow> {
        sqlx::query_as::<_, PoolRow>(
            "SELECT currency, balance, reserved_balance, updated_at FROM liquidity_pools WHERE currency = $1 FOR UPDATE",
        )
        .bind(currency)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::internal)?
        .ok_or_else(|| Error::NotFound(format!("no liquidity pool for {currency}")))
    }

    /// Locks two distinct pools in ascending currency-code order,
    /// regardless of the order `a`/`b` are named in, and returns them back
    /// in the caller's original `(a, b)` order.
    async fn lock_two_pools(tx: &mut SqlxTx<'_, Postgres>, a: &str, b: &str) -> Result<(PoolRow, PoolRow)> {
        if a <= b {
            let first = Self::lock_pool(tx, a).await?;
            let second = Self::lock_pool(tx, b).await?;
            Ok((first, second))
        } else {
            let second = Self::lock_pool(tx, b).await?;
            let first = Self::lock_pool(tx, a).await?;
            Ok((first, second))
        }
    }

    async fn write_balance(tx: &mut SqlxTx<'_, Postgres>, currency: &str, balance: Money, reserved_balance: Money) -> Result<()> {
        sqlx::query(
            "UPDATE liquidity_pools SET balance = $2, reserved_balance = $3, updated_at = now() WHERE currency = $1",
        )
        .bind(currency)
        .bind(balance)
        .bind(reserved_balance)
        .execute(&mut **tx)
        .await
        .map_err(Error::internal)?;
        Ok(())
    }
}

#[async_trait]
impl LiquidityLedger for PgLedger {
    async fn check_liquidity(&self, currency: &str, amount: Money) -> Result<bool> {
        let pool = self.get_pool(currency).await?;
        Ok(pool.available() >= amount)
    }

    async fn reserve_funds(&self, currency: &str, amount: Money) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::internal)?;
        let row = Self::lock_pool(&mut tx, currency).await?;
        let available = row.balance - row.reserved_balance;

        if available < amount {
            return Err(Error::InsufficientLiquidity {
                currency: currency.to_string(),
                requested: amount,
                available,
            });
        }

        Self::write_balance(&mut tx, currency, row.balance, row.reserved_balance + amount).await?;
        tx.commit().await.map_err(Error::internal)?;
        Ok(())
    }

    async fn release_reservation(&self, currency: &str, amount: Money) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::internal)?;
        let row = Self::lock_pool(&mut tx, currency).await?;
        let new_reserved = row.reserved_balance - amount;

        if new_reserved < Decimal::ZERO {
            return Err(Error::InvariantViolation(format!(
                "release_reservation would drive reserved_balance negative for {currency}"
            )));
        }

        Self::write_balance(&mut tx, currency, row.balance, new_reserved).await?;
        tx.commit().await.map_err(Error::internal)?;
        Ok(())
    }

    async fn settle_transaction(
        &self,
        source_currency: &str,
        target_currency: &str,
        source_amount: Money,
        target_amount: Money,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::internal)?;
        let (source_row, target_row) = Self::lock_two_pools(&mut tx, source_currency, target_currency).await?;

        let new_target_reserved = target_row.reserved_balance - target_amount;
        let new_target_balance = target_row.balance - target_amount;
        let new_source_balance = source_row.balance + source_amount;

        if new_target_reserved < Decimal::ZERO || new_target_balance < Decimal::ZERO || new_source_balance < Decimal::ZERO {
            return Err(Error::InvariantViolation(format!(
                "settlement of {source_currency}->{target_currency} would violate a non-negative balance invariant"
            )));
        }

        Self::write_balance(&mut tx, target_currency, new_target_balance, new_target_reserved).await?;
        Self::write_balance(&mut tx, source_currency, new_source_balance, source_row.reserved_balance).await?;
        tx.commit().await.map_err(Error::internal)?;
        Ok(())
    }

    async fn internal_rebalance(&self, from_currency: &str, to_currency: &str, amount: Money) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::internal)?;
        let (from_row, to_row) = Self::lock_two_pools(&mut tx, from_currency, to_currency).await?;

        if from_row.balance < amount {
            tracing::warn!(from = from_currency, to = to_currency, %amount, "internal rebalance skipped: insufficient source balance");
            return Ok(());
        }

        let rate = self.fx_rates.latest_rate(from_currency, to_currency).await?;
        let converted = round6(amount * rate.rate);

        Self::write_balance(&mut tx, from_currency, from_row.balance - amount, from_row.reserved_balance).await?;
        Self::write_balance(&mut tx, to_currency, to_row.balance + converted, to_row.reserved_balance).await?;
        tx.commit().await.map_err(Error::internal)?;
        Ok(())
    }

    async fn pool_metrics(&self, currency: &str, window_hours: i64) -> Result<PoolMetrics> {
        let since = Utc::now() - chrono::Duration::hours(window_hours);

        let outgoing: Option<Money> = sqlx::query_scalar(
            "SELECT SUM(source_amount) FROM transactions WHERE source_currency = $1 AND created_at >= $2",
        )
        .bind(currency)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::internal)?;

        let incoming: Option<Money> = sqlx::query_scalar(
            "SELECT SUM(target_amount) FROM transactions WHERE target_currency = $1 AND created_at >= $2",
        )
        .bind(currency)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::internal)?;

        let pool = self.get_pool(currency).await?;

        Ok(PoolMetrics::compute(
            outgoing.unwrap_or(Decimal::ZERO),
            incoming.unwrap_or(Decimal::ZERO),
            pool.balance,
        ))
    }

    async fn all_pools(&self) -> Result<Vec<LiquidityPool>> {
        let rows = sqlx::query_as::<_, PoolRow>(
            "SELECT currency, balance, reserved_balance, updated_at FROM liquidity_pools ORDER BY currency ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::internal)?;

        Ok(rows.into_iter().map(LiquidityPool::from).collect())
    }

    async fn get_pool(&self, currency: &str) -> Result<LiquidityPool> {
        let row = sqlx::query_as::<_, PoolRow>(
            "SELECT currency, balance, reserved_balance, updated_at FROM liquidity_pools WHERE currency = $1",
        )
        .bind(currency)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::internal)?
        .ok_or_else(|| Error::NotFound(format!("no liquidity pool for {currency}")))?;

        Ok(row.into())
    }
}
