use std::sync::Arc;

use fx_core::transaction::{SettlementScheduler, TransactionLifecycleEngine};
use fx_core::EngineConfig;
use fx_storage::{PgFxRateStore, PgLedger, PgTransactionStore};

/// The `SettlementScheduler` wired over `tokio::spawn`. `schedule` hands the
/// transaction id to an independent task that reopens its own view of the
/// shared stores and runs the settlement worker body to completion.
#[derive(Clone)]
pub struct TokioScheduler {
    fx_rates: Arc<PgFxRateStore>,
    ledger: Arc<PgLedger>,
    transactions: Arc<PgTransactionStore>,
    config: Arc<EngineConfig>,
}

impl TokioScheduler {
    pub fn new(
        fx_rates: Arc<PgFxRateStore>,
        ledger: Arc<PgLedger>,
        transactions: Arc<PgTransactionStore>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self { fx_rates, ledger, transactions, config }
    }
}

impl SettlementScheduler for TokioScheduler {
    fn schedule(&self, transaction_id: i64) {
        let fx_rates = self.fx_rates.clone();
        let ledger = self.ledger.clone();
        let transactions = self.transactions.clone();
        let config = self.config.clone();
        let scheduler = self.clone();

        tokio::spawn(async move {
            let engine = TransactionLifecycleEngine::new(&*fx_rates, &*ledger, &*transactions, &scheduler, &config);
            engine.run_settlement(transaction_id, |delay| tokio::time::sleep(delay)).await;
        });
    }
}
