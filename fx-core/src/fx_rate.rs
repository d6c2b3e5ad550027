//! FX rate observations: an append-only log queried for the latest
//! observation of a currency pair.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::decimal::Money;
use crate::error::{Error, Result};

/// How stale an observation can be before `latest_rate` logs a warning.
pub const STALE_AFTER_SECONDS: i64 = 300;

/// A single FX rate observation: `rate` units of `quote` per 1 unit of
/// `base`.
#[derive(Debug, Clone, PartialEq)]
pub struct FxRate {
    pub id: i64,
    pub currency_pair: CurrencyPair,
    pub rate: Money,
    pub timestamp: DateTime<Utc>,
}

impl FxRate {
    /// True once this observation is older than [`STALE_AFTER_SECONDS`] as
    /// measured from `now`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        (now - self.timestamp).num_seconds() > STALE_AFTER_SECONDS
    }
}

/// A validated "BASE/QUOTE" currency pair, e.g. `USD/EUR`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

impl CurrencyPair {
    /// Parses `"BASE/QUOTE"`, checking both legs against `is_supported` and
    /// that base and quote are distinct.
    pub fn parse(raw: &str, is_supported: impl Fn(&str) -> bool) -> Result<Self> {
        let (base, quote) = raw
            .split_once('/')
            .ok_or_else(|| Error::InvalidInput(format!("malformed currency pair: {raw}")))?;

        if !is_supported(base) || !is_supported(quote) {
            return Err(Error::InvalidInput(format!(
                "currency pair {raw} contains an unsupported currency"
            )));
        }
        if base == quote {
            return Err(Error::InvalidInput(format!(
                "currency pair {raw} must name two distinct currencies"
            )));
        }

        Ok(Self { base: base.to_string(), quote: quote.to_string() })
    }

    pub fn new_unchecked(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self { base: base.into(), quote: quote.into() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl std::fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Storage seam for FX rate observations. `fx-storage` implements this
/// against Postgres; `fx-core`'s own tests use an in-memory fake.
#[async_trait]
pub trait FxRateStore: Send + Sync {
    /// Validates and appends a new observation, returning the stored row.
    async fn record_rate(&self, pair: CurrencyPair, rate: Money, timestamp: DateTime<Utc>) -> Result<FxRate>;

    /// Returns the most recent observation for `base/quote` (highest
    /// timestamp, id tiebreak). Fails with `NotFound` if none exists.
    async fn latest_rate(&self, base: &str, quote: &str) -> Result<FxRate>;
}
