use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fx_core::decimal::Money;
use fx_core::error::{Error, Result};
use fx_core::transaction::{Transaction, TransactionStatus, TransactionStore};
use sqlx::{FromRow, PgPool};

#[derive(FromRow)]
struct TransactionRow {
    id: i64,
    source_currency: String,
    target_currency: String,
    source_amount: Money,
    target_amount: Money,
    fx_rate: Money,
    margin: Money,
    revenue: Money,
    status: String,
    created_at: DateTime<Utc>,
    settled_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = Error;

    fn try_from(row: TransactionRow) -> Result<Self> {
        Ok(Transaction {
            id: row.id,
            source_currency: row.source_currency,
            target_currency: row.target_currency,
            source_amount: row.source_amount,
            target_amount: row.target_amount,
            fx_rate: row.fx_rate,
            margin: row.margin,
            revenue: row.revenue,
            status: parse_status(&row.status)?,
            created_at: row.created_at,
            settled_at: row.settled_at,
        })
    }
}

fn parse_status(raw: &str) -> Result<TransactionStatus> {
    match raw {
        "PENDING" => Ok(TransactionStatus::Pending),
        "PROCESSING" => Ok(TransactionStatus::Processing),
        "COMPLETED" => Ok(TransactionStatus::Completed),
        "FAILED" => Ok(TransactionStatus::Failed),
        other => Err(Error::Internal(format!("unknown transaction status in storage: {other}").into())),
    }
}

fn status_label(status: TransactionStatus) -> &'static str {
    match status {
        TransactionStatus::Pending => "PENDING",
        TransactionStatus::Processing => "PROCESSING",
        TransactionStatus::Completed => "COMPLETED",
        TransactionStatus::Failed => "FAILED",
    }
}

/// Postgres-backed [`TransactionStore`].
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn insert_pending(
        &self,
        source_currency: &str,
        target_currency: &str,
        source_amount: Money,
        fx_rate: Money,
        margin: Money,
        revenue: Money,
        target_amount: Money,
    ) -> Result<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions
                (source_currency, target_currency, source_amount, target_amount, fx_rate, margin, revenue, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, source_currency, target_currency, source_amount, target_amount, fx_rate, margin, revenue, status, created_at, settled_at
            "#,
        )
        .bind(source_currency)
        .bind(target_currency)
        .bind(source_amount)
        .bind(target_amount)
        .bind(fx_rate)
        .bind(margin)
        .bind(revenue)
        .bind(status_label(TransactionStatus::Pending))
        .fetch_one(&self.pool)
        .await
        .map_err(Error::internal)?;

        row.try_into()
    }

    async fn get(&self, id: i64) -> Result<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, source_currency, target_currency, source_amount, target_amount, fx_rate, margin, revenue, status, created_at, settled_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::internal)?
        .ok_or_else(|| Error::NotFound(format!("no transaction with id {id}")))?;

        row.try_into()
    }

    async fn set_status(&self, id: i64, status: TransactionStatus, settled_at: Option<DateTime<Utc>>) -> Result<()> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(status) {
            return Err(Error::InvariantViolation(format!(
                "illegal transition for transaction {id}: {} -> {status}",
                current.status
            )));
        }

        sqlx::query("UPDATE transactions SET status = $2, settled_at = COALESCE($3, settled_at) WHERE id = $1")
            .bind(id)
            .bind(status_label(status))
            .bind(settled_at)
            .execute(&self.pool)
            .await
            .map_err(Error::internal)?;

        Ok(())
    }
}
