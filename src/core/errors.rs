use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize)]
pub enum TopupError {
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Transaction with correlation id {0} already exists")]
    DuplicateCorrelationId(String),
    #[error("Transaction {0} not found")]
    TransactionNotFound(String),
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
    #[error("Payment initiation failed: {0}")]
    PaymentInitiationError(String),
    #[error("Airtime disbursement failed: {0}")]
    DisbursementError(String),
    #[error("Notification failed: {0}")]
    NotificationError(String),
    #[error("HTTP error: {0}")]
    HttpError(String),
    #[error("Operation timed out: {0}")]
    Timeout(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Logging error: {0}")]
    LoggingError(String),
}

impl From<reqwest::Error> for TopupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TopupError::Timeout(err.to_string())
        } else {
            TopupError::HttpError(err.to_string())
        }
    }
}
