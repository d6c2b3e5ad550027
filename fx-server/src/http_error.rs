use actix_web::{http::StatusCode, HttpResponse, ResponseError};

/// Local wrapper around `fx_core::Error` so the boundary crate can implement
/// the foreign `ResponseError` trait (the orphan rule forbids implementing
/// it directly on `fx_core::Error`). Maps each variant to the HTTP status
/// documented on the error taxonomy.
#[derive(Debug)]
pub struct ApiError(pub fx_core::Error);

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<fx_core::Error> for ApiError {
    fn from(error: fx_core::Error) -> Self {
        ApiError(error)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        use fx_core::Error::*;
        match &self.0 {
            InvalidInput(_) | InsufficientLiquidity { .. } => StatusCode::BAD_REQUEST,
            NotFound(_) | NoRate(_) => StatusCode::NOT_FOUND,
            InvariantViolation(_) | Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "status": "error",
            "message": self.0.to_string(),
        }))
    }
}
