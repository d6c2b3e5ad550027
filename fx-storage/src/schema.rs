//! Schema bootstrap. Stands in for a full migration tool (out of scope):
//! idempotent `CREATE TABLE IF NOT EXISTS` / `CREATE INDEX IF NOT EXISTS`,
//! plus seeding `liquidity_pools` from configured initial balances.

use fx_core::EngineConfig;
use sqlx::PgPool;

/// Creates the three relations and their indexes if absent, then seeds
/// `liquidity_pools` for any configured currency that doesn't yet have a
/// row. Safe to call on every startup.
pub async fn init(pool: &PgPool, config: &EngineConfig) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS liquidity_pools (
            currency CHAR(3) PRIMARY KEY,
            balance NUMERIC(20, 6) NOT NULL,
            reserved_balance NUMERIC(20, 6) NOT NULL DEFAULT 0,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fx_rates (
            id BIGSERIAL PRIMARY KEY,
            currency_pair VARCHAR(7) NOT NULL,
            rate NUMERIC(20, 6) NOT NULL,
            timestamp TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_fx_rates_pair_timestamp ON fx_rates (currency_pair, timestamp DESC)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id BIGSERIAL PRIMARY KEY,
            source_currency CHAR(3) NOT NULL,
            target_currency CHAR(3) NOT NULL,
            source_amount NUMERIC(20, 6) NOT NULL,
            target_amount NUMERIC(20, 6) NOT NULL,
            fx_rate NUMERIC(20, 6) NOT NULL,
            margin NUMERIC(20, 6) NOT NULL,
            revenue NUMERIC(20, 6) NOT NULL,
            status VARCHAR(16) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            settled_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    for (currency, balance) in &config.initial_balances {
        sqlx::query(
            r#"
            INSERT INTO liquidity_pools (currency, balance, reserved_balance)
            VALUES ($1, $2, 0)
            ON CONFLICT (currency) DO NOTHING
            "#,
        )
        .bind(currency)
        .bind(balance)
        .execute(pool)
        .await?;
    }

    Ok(())
}
