use crate::core::errors::TopupError;
use crate::core::models::PhoneNumber;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod africastalking;
pub mod daraja;

pub const AIRTIME_SENT_STATUS: &str = "Sent";

/// Per-recipient result reported by the airtime provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipientStatus {
    pub phone_number: String,
    #[serde(default)]
    pub amount: Option<String>,
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DisbursementResponse {
    #[serde(default)]
    pub responses: Vec<RecipientStatus>,
}

impl DisbursementResponse {
    /// A top-up goes to exactly one recipient; only that recipient's `Sent` counts.
    pub fn is_sent(&self) -> bool {
        self.responses
            .first()
            .is_some_and(|r| r.status == AIRTIME_SENT_STATUS)
    }

    pub fn failure_summary(&self) -> String {
        match self.responses.first() {
            Some(r) => match r.error_message.as_deref() {
                Some(msg) if !msg.is_empty() && msg != "None" => format!("{} ({})", r.status, msg),
                _ => r.status.clone(),
            },
            None => "no recipient status returned".to_string(),
        }
    }
}

#[async_trait]
pub trait PaymentInitiator: Send + Sync {
    /// Prompts the payer for `amount` and returns the gateway correlation id.
    async fn initiate_payment(&self, phone: &PhoneNumber, amount: Decimal) -> Result<String, TopupError>;
}

#[async_trait]
pub trait AirtimeDisburser: Send + Sync {
    async fn disburse(&self, phone: &PhoneNumber, amount: Decimal) -> Result<DisbursementResponse, TopupError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, phone: &PhoneNumber, message: &str) -> Result<(), TopupError>;
}
