use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use fx_core::fx_rate::{CurrencyPair, FxRateStore};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::http_error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecordRateRequest {
    pub pair: String,
    pub rate: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FxRateBody {
    pub pair: String,
    pub rate: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RecordRateResponse {
    pub status: &'static str,
    pub data: FxRateBody,
}

pub async fn record_rate(state: web::Data<AppState>, body: web::Json<RecordRateRequest>) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let pair = CurrencyPair::parse(&body.pair, |ccy| state.config.is_supported(ccy))?;
    let observation = state.fx_rates.record_rate(pair, body.rate, body.timestamp).await?;

    Ok(HttpResponse::Ok().json(RecordRateResponse {
        status: "ok",
        data: FxRateBody {
            pair: observation.currency_pair.to_string(),
            rate: observation.rate,
            timestamp: observation.timestamp,
        },
    }))
}

pub async fn latest_rate(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let raw = path.into_inner();
    let (base, quote) = raw
        .split_once('-')
        .ok_or_else(|| fx_core::Error::InvalidInput(format!("malformed pair path: {raw}")))?;

    if !state.config.is_supported(base) || !state.config.is_supported(quote) {
        return Err(fx_core::Error::InvalidInput(format!("unsupported currency in {raw}")).into());
    }

    let observation = state.fx_rates.latest_rate(base, quote).await?;

    Ok(HttpResponse::Ok().json(FxRateBody {
        pair: observation.currency_pair.to_string(),
        rate: observation.rate,
        timestamp: observation.timestamp,
    }))
}
