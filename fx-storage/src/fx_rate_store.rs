use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fx_core::decimal::Money;
use fx_core::error::{Error, Result};
use fx_core::fx_rate::{CurrencyPair, FxRate, FxRateStore, STALE_AFTER_SECONDS};
use sqlx::{FromRow, PgPool, Row};

#[derive(FromRow)]
struct FxRateRow {
    id: i64,
    currency_pair: String,
    rate: Money,
    timestamp: DateTime<Utc>,
}

impl FxRateRow {
    fn into_domain(self) -> FxRate {
        let (base, quote) = self
            .currency_pair
            .split_once('/')
            .unwrap_or((self.currency_pair.as_str(), self.currency_pair.as_str()));
        FxRate {
            id: self.id,
            currency_pair: CurrencyPair::new_unchecked(base, quote),
            rate: self.rate,
            timestamp: self.timestamp,
        }
    }
}

/// Postgres-backed [`FxRateStore`]. Rate observations are insert-only; no
/// locking is required since rows are never updated.
pub struct PgFxRateStore {
    pool: PgPool,
}

impl PgFxRateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FxRateStore for PgFxRateStore {
    async fn record_rate(&self, pair: CurrencyPair, rate: Money, timestamp: DateTime<Utc>) -> Result<FxRate> {
        if rate <= Money::ZERO {
            return Err(Error::InvalidInput(format!("rate must be positive, got {rate}")));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO fx_rates (currency_pair, rate, timestamp)
            VALUES ($1, $2, $3)
            RETURNING id, currency_pair, rate, timestamp
            "#,
        )
        .bind(pair.to_string())
        .bind(rate)
        .bind(timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::internal)?;

        Ok(FxRateRow {
            id: row.try_get("id").map_err(Error::internal)?,
            currency_pair: row.try_get("currency_pair").map_err(Error::internal)?,
            rate: row.try_get("rate").map_err(Error::internal)?,
            timestamp: row.try_get("timestamp").map_err(Error::internal)?,
        }
        .into_domain())
    }

    async fn latest_rate(&self, base: &str, quote: &str) -> Result<FxRate> {
        let pair = format!("{base}/{quote}");

        let row = sqlx::query_as::<_, FxRateRow>(
            r#"
            SELECT id, currency_pair, rate, timestamp
            FROM fx_rates
            WHERE currency_pair = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(&pair)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::internal)?
        .ok_or_else(|| Error::NotFound(format!("no rate available for {pair}")))?;

        let observation = row.into_domain();
        if observation.is_stale(Utc::now()) {
            tracing::warn!(
                pair = %observation.currency_pair,
                age_seconds = (Utc::now() - observation.timestamp).num_seconds(),
                threshold_seconds = STALE_AFTER_SECONDS,
                "FX rate observation is stale"
            );
        }

        Ok(observation)
    }
}
