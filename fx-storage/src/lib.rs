//! Postgres-backed implementations of the storage traits defined in `fx-core`.

pub mod fx_rate_store;
pub mod ledger_store;
pub mod schema;
pub mod transaction_store;

pub use fx_rate_store::PgFxRateStore;
pub use ledger_store::PgLedger;
pub use transaction_store::PgTransactionStore;
