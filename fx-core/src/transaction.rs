//! The transaction lifecycle engine: quoting, reservation, and the
//! settlement state machine.
//!
//! ```text
//! PENDING --reserve ok-->  PROCESSING --settle ok-->  COMPLETED
//!     |                          |
//!     +--reserve fail-->         +--settle fail-->
//!           FAILED                      FAILED
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::decimal::{round6, Money};
use crate::error::{Error, Result};
use crate::fx_rate::FxRateStore;
use crate::ledger::LiquidityLedger;

/// A transaction's position in the settlement state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition per the state machine
    /// above. Used to guard against status regression.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Failed) | (Processing, Completed) | (Processing, Failed)
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// A quote/settlement record, as persisted by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub source_currency: String,
    pub target_currency: String,
    pub source_amount: Money,
    pub target_amount: Money,
    pub fx_rate: Money,
    pub margin: Money,
    pub revenue: Money,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Input to `create_transaction`.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_currency: String,
    pub target_currency: String,
    pub source_amount: Money,
}

/// A transaction and the quote components computed for it, prior to
/// persistence.
#[derive(Debug, Clone)]
pub struct Quote {
    pub target_amount: Money,
    pub margin_amount: Money,
    pub fx_rate: Money,
}

/// Computes the quote for a source/target pair given `source_amount` and the
/// latest `fx_rate`: `target_amount = round6(source_amount * rate * (1 -
/// margin_rate))`, `revenue = round6(source_amount * rate * margin_rate)`.
/// Every multiplication is rounded half-even to scale 6 individually, rather
/// than computed from a single combined expression.
pub fn quote(source_amount: Money, fx_rate: Money, margin_rate: Money) -> Quote {
    let base_target = round6(source_amount * fx_rate);
    let margin_amount = round6(base_target * margin_rate);
    let target_amount = base_target - margin_amount;
    Quote { target_amount, margin_amount, fx_rate }
}

/// Storage seam for transactions. `fx-storage` implements this against
/// Postgres.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert_pending(
        &self,
        source_currency: &str,
        target_currency: &str,
        source_amount: Money,
        fx_rate: Money,
        margin: Money,
        revenue: Money,
        target_amount: Money,
    ) -> Result<Transaction>;

    async fn get(&self, id: i64) -> Result<Transaction>;

    /// Moves `id` to `status`, validating the transition is legal. `FAILED`
    /// and `COMPLETED` additionally record `settled_at` when `settled_at` is
    /// `Some`.
    async fn set_status(&self, id: i64, status: TransactionStatus, settled_at: Option<DateTime<Utc>>) -> Result<()>;
}

/// Fire-and-forget hand-off to the async runtime's task spawner. `fx-core`
/// never spawns a task itself -- `fx-server` implements this trait over
/// `tokio::spawn` and owns the actual settlement worker loop.
pub trait SettlementScheduler: Send + Sync {
    /// Enqueues settlement work for `transaction_id`. The contract promised
    /// by every implementation: this call succeeds iff settlement for
    /// `transaction_id` will be attempted exactly once.
    fn schedule(&self, transaction_id: i64);
}

/// Composes the FX rate store and ledger to quote, persist, and schedule
/// settlement of transfer requests.
pub struct TransactionLifecycleEngine<'a, F, L, T, S> {
    fx_rates: &'a F,
    ledger: &'a L,
    transactions: &'a T,
    scheduler: &'a S,
    config: &'a EngineConfig,
}

impl<'a, F, L, T, S> TransactionLifecycleEngine<'a, F, L, T, S>
where
    F: FxRateStore,
    L: LiquidityLedger,
    T: TransactionStore,
    S: SettlementScheduler,
{
    pub fn new(fx_rates: &'a F, ledger: &'a L, transactions: &'a T, scheduler: &'a S, config: &'a EngineConfig) -> Self {
        Self { fx_rates, ledger, transactions, scheduler, config }
    }

    /// Validates the request, quotes it against the latest FX rate,
    /// persists it PENDING, and hands settlement off to the scheduler.
    #[tracing::instrument(skip(self), fields(source = %request.source_currency, target = %request.target_currency))]
    pub async fn create_transaction(&self, request: TransferRequest) -> Result<Transaction> {
        if !self.config.is_supported(&request.source_currency) {
            return Err(Error::InvalidInput(format!("unsupported currency: {}", request.source_currency)));
        }
        if !self.config.is_supported(&request.target_currency) {
            return Err(Error::InvalidInput(format!("unsupported currency: {}", request.target_currency)));
        }
        if request.source_currency == request.target_currency {
            return Err(Error::InvalidInput("source and target currency must differ".into()));
        }
        if request.source_amount <= Money::ZERO {
            return Err(Error::InvalidInput("source_amount must be positive".into()));
        }

        let rate = self
            .fx_rates
            .latest_rate(&request.source_currency, &request.target_currency)
            .await
            .map_err(|_| Error::NoRate(format!("{}/{}", request.source_currency, request.target_currency)))?;

        let q = quote(request.source_amount, rate.rate, self.config.transaction_margin_rate);

        let transaction = self
            .transactions
            .insert_pending(
                &request.source_currency,
                &request.target_currency,
                request.source_amount,
                q.fx_rate,
                self.config.transaction_margin_rate,
                q.margin_amount,
                q.target_amount,
            )
            .await?;

        self.scheduler.schedule(transaction.id);
        tracing::info!(transaction_id = transaction.id, "transaction created, settlement scheduled");

        Ok(transaction)
    }

    pub async fn get_transaction(&self, id: i64) -> Result<Transaction> {
        self.transactions.get(id).await
    }

    /// The settlement worker body, run by `fx-server` as an independent
    /// task per transaction. Loading and every status write happen through
    /// `self.transactions`/`self.ledger`; the delay happens with no
    /// connection held (the `sleep` argument is injected so `fx-core` stays
    /// free of a `tokio` dependency and the delay is trivially fast-forwarded
    /// in tests).
    #[tracing::instrument(skip(self, sleep), fields(transaction_id = transaction_id))]
    pub async fn run_settlement<Fut>(&self, transaction_id: i64, sleep: impl FnOnce(std::time::Duration) -> Fut)
    where
        Fut: std::future::Future<Output = ()>,
    {
        let transaction = match self.transactions.get(transaction_id).await {
            Ok(t) => t,
            Err(_) => return,
        };

        if let Err(error) = self.ledger.reserve_funds(&transaction.target_currency, transaction.target_amount).await {
            tracing::warn!(transaction_id, %error, "reservation failed, marking FAILED");
            let _ = self.transactions.set_status(transaction_id, TransactionStatus::Failed, None).await;
            return;
        }

        if self
            .transactions
            .set_status(transaction_id, TransactionStatus::Processing, None)
            .await
            .is_err()
        {
            return;
        }

        let delay = self
            .config
            .settlement_delay_seconds(&transaction.source_currency, &transaction.target_currency);
        sleep(std::time::Duration::from_secs(delay)).await;

        match self
            .ledger
            .settle_transaction(
                &transaction.source_currency,
                &transaction.target_currency,
                transaction.source_amount,
                transaction.target_amount,
            )
            .await
        {
            Ok(()) => {
                let _ = self
                    .transactions
                    .set_status(transaction_id, TransactionStatus::Completed, Some(Utc::now()))
                    .await;
                tracing::info!(transaction_id, "settlement completed");
            }
            Err(error) => {
                tracing::warn!(transaction_id, %error, "settlement failed, releasing reservation and marking FAILED");
                let _ = self.ledger.release_reservation(&transaction.target_currency, transaction.target_amount).await;
                let _ = self.transactions.set_status(transaction_id, TransactionStatus::Failed, None).await;
            }
        }
    }
}

/// Convenience wrapper used by the rebalancer and lifecycle engine alike to
/// look up a rate and convert an amount without a margin.
pub async fn margin_free_convert<F: FxRateStore>(fx_rates: &F, from: &str, to: &str, amount: Money) -> Result<Money> {
    let rate = fx_rates.latest_rate(from, to).await?;
    Ok(round6(amount * rate.rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quote_should_apply_margin_half_even_rounded() {
        let q = quote(dec!(1000), dec!(0.92), dec!(0.001));
        assert_eq!(q.target_amount, dec!(919.080000));
        assert_eq!(q.margin_amount, dec!(0.920000));
    }

    #[test]
    fn status_transitions_should_follow_the_state_machine() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Pending));
    }

    #[test]
    fn terminal_statuses_should_be_completed_and_failed() {
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Processing.is_terminal());
    }
}
