use std::sync::Arc;

use fx_core::EngineConfig;
use fx_storage::{PgFxRateStore, PgLedger, PgTransactionStore};

use crate::scheduler::TokioScheduler;

/// Shared handles wired once at startup and cloned into every `actix-web`
/// worker via `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub fx_rates: Arc<PgFxRateStore>,
    pub ledger: Arc<PgLedger>,
    pub transactions: Arc<PgTransactionStore>,
    pub scheduler: Arc<TokioScheduler>,
    pub config: Arc<EngineConfig>,
}
