use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use fx_core::transaction::{Transaction, TransactionLifecycleEngine, TransferRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::http_error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTransferRequest {
    pub source_currency: String,
    pub target_currency: String,
    pub source_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct TransactionBody {
    pub id: i64,
    pub source_currency: String,
    pub target_currency: String,
    pub source_amount: Decimal,
    pub target_amount: Decimal,
    pub fx_rate: Decimal,
    pub margin: Decimal,
    pub revenue: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl From<Transaction> for TransactionBody {
    fn from(t: Transaction) -> Self {
        TransactionBody {
            id: t.id,
            source_currency: t.source_currency,
            target_currency: t.target_currency,
            source_amount: t.source_amount,
            target_amount: t.target_amount,
            fx_rate: t.fx_rate,
            margin: t.margin,
            revenue: t.revenue,
            status: t.status.to_string(),
            created_at: t.created_at,
            settled_at: t.settled_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateTransferResponse {
    pub status: &'static str,
    pub data: TransactionBody,
}

pub async fn create_transfer(
    state: web::Data<AppState>,
    body: web::Json<CreateTransferRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let engine = TransactionLifecycleEngine::new(&*state.fx_rates, &*state.ledger, &*state.transactions, &*state.scheduler, &state.config);

    let transaction = engine
        .create_transaction(TransferRequest {
            source_currency: body.source_currency,
            target_currency: body.target_currency,
            source_amount: body.source_amount,
        })
        .await?;

    Ok(HttpResponse::Ok().json(CreateTransferResponse { status: "ok", data: transaction.into() }))
}

pub async fn get_transfer(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let engine = TransactionLifecycleEngine::new(&*state.fx_rates, &*state.ledger, &*state.transactions, &*state.scheduler, &state.config);
    let transaction = engine.get_transaction(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(TransactionBody::from(transaction)))
}
