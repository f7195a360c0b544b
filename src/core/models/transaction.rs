use super::phone::PhoneNumber;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Airtime disbursement state. `Processing` is the claim taken before the provider is called;
/// anything other than `None` means an attempt has already been made.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisbursementStatus {
    None,
    Processing,
    Sent,
    Failed,
}

impl std::fmt::Display for DisbursementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DisbursementStatus::None => "none",
            DisbursementStatus::Processing => "processing",
            DisbursementStatus::Sent => "sent",
            DisbursementStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub correlation_id: String,
    pub session_id: Option<String>,
    #[schema(value_type = String, example = "+254712345678")]
    pub payer_phone: PhoneNumber,
    #[schema(value_type = String, example = "50")]
    pub requested_amount: Decimal,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    #[schema(value_type = Option<String>)]
    pub paid_amount: Option<Decimal>,
    pub provider_receipt_id: Option<String>,
    pub disbursement_status: DisbursementStatus,
    pub disbursement_error: Option<String>,
    /// When the in-flight claim was taken; used to spot claims abandoned mid-send.
    #[schema(value_type = Option<String>)]
    pub disbursement_claimed_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>)]
    pub disbursed_at: Option<DateTime<Utc>>,
    #[schema(value_type = Object)]
    pub raw_callback: Option<serde_json::Value>,
    pub callback_count: u32,
    #[schema(value_type = String, example = "2024-06-01T12:34:56Z")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Option<String>)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Time since the disbursement claim was taken, if one was.
    pub fn claim_age(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        let claimed_at = self.disbursement_claimed_at?;
        (now - claimed_at).to_std().ok()
    }

    pub fn pending(
        correlation_id: String,
        session_id: Option<String>,
        payer_phone: PhoneNumber,
        requested_amount: Decimal,
    ) -> Self {
        Transaction {
            correlation_id,
            session_id,
            payer_phone,
            requested_amount,
            status: PaymentStatus::Pending,
            failure_reason: None,
            paid_amount: None,
            provider_receipt_id: None,
            disbursement_status: DisbursementStatus::None,
            disbursement_error: None,
            disbursement_claimed_at: None,
            disbursed_at: None,
            raw_callback: None,
            callback_count: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn apply_status(&mut self, update: StatusUpdate, now: DateTime<Utc>) {
        match update {
            StatusUpdate::Failed { reason } => {
                self.status = PaymentStatus::Failed;
                self.failure_reason = Some(reason);
            }
            StatusUpdate::Succeeded {
                paid_amount,
                provider_receipt_id,
            } => {
                self.status = PaymentStatus::Success;
                self.paid_amount = Some(paid_amount);
                self.provider_receipt_id = Some(provider_receipt_id);
            }
        }
        self.completed_at = Some(now);
    }

    pub fn apply_disbursement(&mut self, update: DisbursementUpdate, now: DateTime<Utc>) {
        match update {
            DisbursementUpdate::Claim => {
                self.disbursement_status = DisbursementStatus::Processing;
                self.disbursement_claimed_at = Some(now);
            }
            DisbursementUpdate::Sent => {
                self.disbursement_status = DisbursementStatus::Sent;
                self.disbursement_error = None;
                self.disbursed_at = Some(now);
            }
            DisbursementUpdate::Failed { reason } => {
                self.disbursement_status = DisbursementStatus::Failed;
                self.disbursement_error = Some(reason);
            }
        }
    }
}

/// Terminal outcome written by a `pending -> success | failed` transition.
#[derive(Clone, Debug, PartialEq)]
pub enum StatusUpdate {
    Failed {
        reason: String,
    },
    Succeeded {
        paid_amount: Decimal,
        provider_receipt_id: String,
    },
}

impl StatusUpdate {
    pub fn target(&self) -> PaymentStatus {
        match self {
            StatusUpdate::Failed { .. } => PaymentStatus::Failed,
            StatusUpdate::Succeeded { .. } => PaymentStatus::Success,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DisbursementUpdate {
    Claim,
    Sent,
    Failed { reason: String },
}

impl DisbursementUpdate {
    pub fn target(&self) -> DisbursementStatus {
        match self {
            DisbursementUpdate::Claim => DisbursementStatus::Processing,
            DisbursementUpdate::Sent => DisbursementStatus::Sent,
            DisbursementUpdate::Failed { .. } => DisbursementStatus::Failed,
        }
    }
}
