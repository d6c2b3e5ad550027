//! The error taxonomy threaded through every storage trait and core
//! operation. Each variant is documented with the HTTP status it maps to at
//! the `fx-server` boundary; nothing below this module knows about HTTP.

use thiserror::Error;

/// Errors produced by the FX core: quoting, the ledger, and the rebalancer.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed currency, unsupported currency, non-positive amount, or a
    /// malformed rate/currency pair. Maps to HTTP 400.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A transaction, FX rate, or pool that was looked up does not exist.
    /// Maps to HTTP 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// A reservation could not be satisfied because available balance was
    /// short. Maps to HTTP 400 when raised synchronously from `POST
    /// /transfer`; internally it drives a PENDING/PROCESSING -> FAILED
    /// transition during settlement.
    #[error("insufficient liquidity for {currency}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        currency: String,
        requested: crate::decimal::Money,
        available: crate::decimal::Money,
    },

    /// No FX rate observation exists for the requested pair. Maps to HTTP
    /// 404.
    #[error("no rate available for {0}")]
    NoRate(String),

    /// A ledger post-condition (non-negative balance, reserved <= balance)
    /// would have been violated; the enclosing transaction was rolled back.
    /// Maps to HTTP 500.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage or other unexpected runtime failure. Maps to HTTP 500.
    #[error("internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn internal(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Internal(Box::new(source))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
