use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::core::errors::TopupError;
use crate::core::models::DisbursementStatus;

/// Form fields posted by the USSD gateway.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UssdRequest {
    pub session_id: Option<String>,
    pub phone_number: Option<String>,
    pub service_code: Option<String>,
    #[serde(default)]
    pub text: String,
}

#[derive(Deserialize, IntoParams)]
pub struct ListTransactionsQuery {
    /// Only return transactions in this disbursement state, e.g. `failed` for refund follow-up.
    #[param(value_type = Option<String>)]
    pub disbursement_status: Option<DisbursementStatus>,
}

#[derive(Deserialize, IntoParams)]
pub struct LogsQuery {
    /// Only return entries for this transaction.
    pub correlation_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
    pub uptime_seconds: f64,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

// Newtype wrapper for TopupError to implement IntoResponse
pub struct ApiError(pub TopupError);

impl From<TopupError> for ApiError {
    fn from(err: TopupError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            TopupError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            TopupError::DuplicateCorrelationId(_) | TopupError::InvalidTransition(_) => StatusCode::CONFLICT,
            TopupError::InvalidPhoneNumber(_) | TopupError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            TopupError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            TopupError::PaymentInitiationError(_)
            | TopupError::DisbursementError(_)
            | TopupError::NotificationError(_)
            | TopupError::HttpError(_) => StatusCode::BAD_GATEWAY,
            TopupError::StorageError(_) | TopupError::LoggingError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
