//! Exercises the lifecycle engine and rebalancer end-to-end against
//! in-memory fakes of the three storage traits -- no database required.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fx_core::decimal::Money;
use fx_core::error::{Error, Result};
use fx_core::fx_rate::{CurrencyPair, FxRate, FxRateStore};
use fx_core::ledger::{LiquidityLedger, LiquidityPool, PoolMetrics};
use fx_core::rebalancer::PoolRebalancer;
use fx_core::transaction::{SettlementScheduler, Transaction, TransactionLifecycleEngine, TransactionStatus, TransactionStore, TransferRequest};
use fx_core::EngineConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Default)]
struct FakeFxRates {
    rates: Mutex<Vec<FxRate>>,
}

#[async_trait]
impl FxRateStore for FakeFxRates {
    async fn record_rate(&self, pair: CurrencyPair, rate: Money, timestamp: DateTime<Utc>) -> Result<FxRate> {
        let mut rates = self.rates.lock().unwrap();
        let observation = FxRate { id: rates.len() as i64 + 1, currency_pair: pair, rate, timestamp };
        rates.push(observation.clone());
        Ok(observation)
    }

    async fn latest_rate(&self, base: &str, quote: &str) -> Result<FxRate> {
        self.rates
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.currency_pair.base() == base && r.currency_pair.quote() == quote)
            .max_by_key(|r| (r.timestamp, r.id))
            .cloned()
            .ok_or_else(|| Error::NoRate(format!("{base}/{quote}")))
    }
}

#[derive(Default)]
struct FakeLedger {
    pools: Mutex<HashMap<String, LiquidityPool>>,
    volumes: Mutex<HashMap<String, (Money, Money)>>, // (outgoing, incoming)
}

impl FakeLedger {
    fn seed(&self, currency: &str, balance: Money) {
        self.pools.lock().unwrap().insert(
            currency.to_string(),
            LiquidityPool { currency: currency.to_string(), balance, reserved_balance: Decimal::ZERO, updated_at: Utc::now() },
        );
    }

    fn record_flow(&self, source: &str, target: &str, source_amount: Money, target_amount: Money) {
        let mut volumes = self.volumes.lock().unwrap();
        volumes.entry(source.to_string()).or_default().0 += source_amount;
        volumes.entry(target.to_string()).or_default().1 += target_amount;
    }
}

#[async_trait]
impl LiquidityLedger for FakeLedger {
    async fn check_liquidity(&self, currency: &str, amount: Money) -> Result<bool> {
        Ok(self.get_pool(currency).await?.available() >= amount)
    }

    async fn reserve_funds(&self, currency: &str, amount: Money) -> Result<()> {
        let mut pools = self.pools.lock().unwrap();
        let pool = pools.get_mut(currency).ok_or_else(|| Error::NotFound(currency.to_string()))?;
        let available = pool.balance - pool.reserved_balance;
        if available < amount {
            return Err(Error::InsufficientLiquidity { currency: currency.to_string(), requested: amount, available });
        }
        pool.reserved_balance += amount;
        Ok(())
    }

    async fn release_reservation(&self, currency: &str, amount: Money) -> Result<()> {
        let mut pools = self.pools.lock().unwrap();
        let pool = pools.get_mut(currency).ok_or_else(|| Error::NotFound(currency.to_string()))?;
        pool.reserved_balance -= amount;
        Ok(())
    }

    async fn settle_transaction(&self, source_currency: &str, target_currency: &str, source_amount: Money, target_amount: Money) -> Result<()> {
        {
            let mut pools = self.pools.lock().unwrap();
            let target = pools.get(target_currency).ok_or_else(|| Error::NotFound(target_currency.to_string()))?.clone();
            let source = pools.get(source_currency).ok_or_else(|| Error::NotFound(source_currency.to_string()))?.clone();

            if target.reserved_balance - target_amount < Decimal::ZERO || target.balance - target_amount < Decimal::ZERO {
                return Err(Error::InvariantViolation("settlement would violate a balance invariant".into()));
            }

            pools.get_mut(target_currency).unwrap().reserved_balance -= target_amount;
            pools.get_mut(target_currency).unwrap().balance -= target_amount;
            pools.get_mut(source_currency).unwrap().balance += source_amount;
        }
        self.record_flow(source_currency, target_currency, source_amount, target_amount);
        Ok(())
    }

    async fn internal_rebalance(&self, from_currency: &str, to_currency: &str, amount: Money) -> Result<()> {
        let mut pools = self.pools.lock().unwrap();
        let from_balance = pools.get(from_currency).ok_or_else(|| Error::NotFound(from_currency.to_string()))?.balance;
        if from_balance < amount {
            return Ok(());
        }
        pools.get_mut(from_currency).unwrap().balance -= amount;
        pools.get_mut(to_currency).unwrap().balance += amount;
        Ok(())
    }

    async fn pool_metrics(&self, currency: &str, _window_hours: i64) -> Result<PoolMetrics> {
        let (outgoing, incoming) = self.volumes.lock().unwrap().get(currency).copied().unwrap_or((Decimal::ZERO, Decimal::ZERO));
        let balance = self.get_pool(currency).await?.balance;
        Ok(PoolMetrics::compute(outgoing, incoming, balance))
    }

    async fn all_pools(&self) -> Result<Vec<LiquidityPool>> {
        let mut pools: Vec<_> = self.pools.lock().unwrap().values().cloned().collect();
        pools.sort_by(|a, b| a.currency.cmp(&b.currency));
        Ok(pools)
    }

    async fn get_pool(&self, currency: &str) -> Result<LiquidityPool> {
        self.pools.lock().unwrap().get(currency).cloned().ok_or_else(|| Error::NotFound(currency.to_string()))
    }
}

#[derive(Default)]
struct FakeTransactions {
    rows: Mutex<Vec<Transaction>>,
}

#[async_trait]
impl TransactionStore for FakeTransactions {
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
        let mut rows = self.rows.lock().unwrap();
        let transaction = Transaction {
            id: rows.len() as i64 + 1,
            source_currency: source_currency.to_string(),
            target_currency: target_currency.to_string(),
            source_amount,
            target_amount,
            fx_rate,
            margin,
            revenue,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
            settled_at: None,
        };
        rows.push(transaction.clone());
        Ok(transaction)
    }

    async fn get(&self, id: i64) -> Result<Transaction> {
        self.rows.lock().unwrap().iter().find(|t| t.id == id).cloned().ok_or_else(|| Error::NotFound(format!("transaction {id}")))
    }

    async fn set_status(&self, id: i64, status: TransactionStatus, settled_at: Option<DateTime<Utc>>) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.iter_mut().find(|t| t.id == id).ok_or_else(|| Error::NotFound(format!("transaction {id}")))?;
        if !row.status.can_transition_to(status) {
            return Err(Error::InvariantViolation(format!("illegal transition {} -> {status}", row.status)));
        }
        row.status = status;
        if let Some(settled_at) = settled_at {
            row.settled_at = Some(settled_at);
        }
        Ok(())
    }
}

struct ImmediateScheduler;

impl SettlementScheduler for ImmediateScheduler {
    fn schedule(&self, _transaction_id: i64) {}
}

async fn no_delay(_: std::time::Duration) {}

#[tokio::test]
async fn create_transaction_should_produce_a_pending_quote() {
    let fx_rates = FakeFxRates::default();
    let ledger = FakeLedger::default();
    ledger.seed("USD", dec!(1_000_000));
    ledger.seed("EUR", dec!(921_658));
    let transactions = FakeTransactions::default();
    let scheduler = ImmediateScheduler;
    let config = EngineConfig::default();

    let pair = CurrencyPair::parse("USD/EUR", |c| config.is_supported(c)).unwrap();
    fx_rates.record_rate(pair, dec!(0.92), Utc::now()).await.unwrap();

    let engine = TransactionLifecycleEngine::new(&fx_rates, &ledger, &transactions, &scheduler, &config);
    let transaction = engine
        .create_transaction(TransferRequest { source_currency: "USD".into(), target_currency: "EUR".into(), source_amount: dec!(1000) })
        .await
        .unwrap();

    assert_eq!(transaction.status, TransactionStatus::Pending);
    assert_eq!(transaction.target_amount, dec!(919.080000));
    assert_eq!(transaction.revenue, dec!(0.920000));
}

#[tokio::test]
async fn create_transaction_should_fail_if_currency_unsupported() {
    let fx_rates = FakeFxRates::default();
    let ledger = FakeLedger::default();
    let transactions = FakeTransactions::default();
    let scheduler = ImmediateScheduler;
    let config = EngineConfig::default();

    let engine = TransactionLifecycleEngine::new(&fx_rates, &ledger, &transactions, &scheduler, &config);
    let result = engine
        .create_transaction(TransferRequest { source_currency: "CAD".into(), target_currency: "USD".into(), source_amount: dec!(100) })
        .await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn settlement_should_complete_and_move_balances_when_liquidity_is_sufficient() {
    let fx_rates = FakeFxRates::default();
    let ledger = FakeLedger::default();
    ledger.seed("USD", dec!(1_000_000));
    ledger.seed("EUR", dec!(921_658));
    let transactions = FakeTransactions::default();
    let scheduler = ImmediateScheduler;
    let config = EngineConfig::default();

    let pair = CurrencyPair::parse("USD/EUR", |c| config.is_supported(c)).unwrap();
    fx_rates.record_rate(pair, dec!(0.92), Utc::now()).await.unwrap();

    let engine = TransactionLifecycleEngine::new(&fx_rates, &ledger, &transactions, &scheduler, &config);
    let transaction = engine
        .create_transaction(TransferRequest { source_currency: "USD".into(), target_currency: "EUR".into(), source_amount: dec!(1000) })
        .await
        .unwrap();

    engine.run_settlement(transaction.id, no_delay).await;

    let settled = engine.get_transaction(transaction.id).await.unwrap();
    assert_eq!(settled.status, TransactionStatus::Completed);
    assert!(settled.settled_at.is_some());

    let usd_pool = ledger.get_pool("USD").await.unwrap();
    let eur_pool = ledger.get_pool("EUR").await.unwrap();
    assert_eq!(usd_pool.balance, dec!(1_001_000));
    assert_eq!(eur_pool.balance, dec!(921_658) - dec!(919.080000));
    assert_eq!(eur_pool.reserved_balance, Decimal::ZERO);
}

#[tokio::test]
async fn settlement_should_fail_the_transaction_when_liquidity_is_insufficient() {
    let fx_rates = FakeFxRates::default();
    let ledger = FakeLedger::default();
    ledger.seed("USD", dec!(1_000_000));
    ledger.seed("EUR", dec!(500));
    let transactions = FakeTransactions::default();
    let scheduler = ImmediateScheduler;
    let config = EngineConfig::default();

    let pair = CurrencyPair::parse("USD/EUR", |c| config.is_supported(c)).unwrap();
    fx_rates.record_rate(pair, dec!(0.92), Utc::now()).await.unwrap();

    let engine = TransactionLifecycleEngine::new(&fx_rates, &ledger, &transactions, &scheduler, &config);
    let transaction = engine
        .create_transaction(TransferRequest { source_currency: "USD".into(), target_currency: "EUR".into(), source_amount: dec!(1000) })
        .await
        .unwrap();

    engine.run_settlement(transaction.id, no_delay).await;

    let settled = engine.get_transaction(transaction.id).await.unwrap();
    assert_eq!(settled.status, TransactionStatus::Failed);

    let eur_pool = ledger.get_pool("EUR").await.unwrap();
    assert_eq!(eur_pool.balance, dec!(500));
}

#[tokio::test]
async fn rebalance_cycle_should_move_liquidity_from_a_donor_into_a_deficit_pool() {
    let fx_rates = FakeFxRates::default();
    let ledger = FakeLedger::default();
    ledger.seed("USD", dec!(1000));
    ledger.seed("EUR", dec!(2000));
    let config = EngineConfig::default();

    let pair = CurrencyPair::parse("USD/EUR", |c| config.is_supported(c)).unwrap();
    fx_rates.record_rate(pair, dec!(0.9), Utc::now()).await.unwrap();

    ledger.record_flow("USD", "EUR", dec!(800), dec!(0));

    let rebalancer = PoolRebalancer::new(&fx_rates, &ledger, &config);
    let outcomes = rebalancer.run_cycle().await.unwrap();

    let usd_outcome = outcomes.iter().find(|o| o.deficit_currency == "USD").expect("USD should be a deficit candidate");
    assert!(usd_outcome.executed);
    assert_eq!(usd_outcome.donor_currency, "EUR");
}
