use crate::core::constants::{
    AIRTIME_FAILED, AIRTIME_SENT, CALLBACK_RECEIVED, NOTIFICATION_FAILED, PAYMENT_CONFIRMED, PAYMENT_FAILED,
    UNKNOWN_FAILURE_REASON, VERIFICATION_MISMATCH, VERIFICATION_MISMATCH_REASON,
};
use crate::core::errors::TopupError;
use crate::core::models::{
    DisbursementStatus, DisbursementUpdate, PaymentStatus, StatusUpdate, StkCallback, Transaction,
};
use crate::core::verification::{VerificationMismatch, verify_payment};
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::providers::{AirtimeDisburser, Notifier};
use crate::infrastructure::storage::{TransactionStore, Transition};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Clone, Copy, Debug)]
pub struct Timeouts {
    pub store: Duration,
    pub provider: Duration,
    /// Age after which a `processing` claim is treated as abandoned. Must exceed `provider`.
    pub claim_ttl: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            store: Duration::from_secs(2),
            provider: Duration::from_secs(10),
            claim_ttl: Duration::from_secs(60),
        }
    }
}

/// Runs a store call under a deadline.
pub(crate) async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T, TopupError>
where
    F: Future<Output = Result<T, TopupError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TopupError::Timeout(format!(
            "{} exceeded {}ms",
            what,
            limit.as_millis()
        ))),
    }
}

/// What a single callback did to the store. The HTTP layer acknowledges every variant alike.
#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileOutcome {
    /// Body was not JSON or lacked `Body.stkCallback`.
    Malformed,
    UnknownCorrelation {
        correlation_id: String,
    },
    /// Success result code without amount, receipt or phone. The transaction stays pending.
    MissingMetadata {
        correlation_id: String,
    },
    PaymentFailed {
        correlation_id: String,
        reason: String,
    },
    VerificationFailed {
        correlation_id: String,
        mismatch: VerificationMismatch,
    },
    AlreadyProcessed {
        correlation_id: String,
        status: PaymentStatus,
        disbursement: DisbursementStatus,
    },
    Completed {
        correlation_id: String,
        disbursement: DisbursementStatus,
    },
}

pub fn confirmation_message(currency: &str, amount: Decimal, receipt_id: &str) -> String {
    format!(
        "Your {} {} airtime top-up is complete. M-Pesa receipt: {}. Thank you for using Quick Airtime!",
        currency,
        amount.normalize(),
        receipt_id
    )
}

pub struct ReconciliationEngine<S: TransactionStore, L: LoggingService> {
    storage: S,
    logging: L,
    disburser: Arc<dyn AirtimeDisburser>,
    notifier: Arc<dyn Notifier>,
    currency: String,
    timeouts: Timeouts,
}

impl<S: TransactionStore, L: LoggingService> ReconciliationEngine<S, L> {
    pub fn new(
        storage: S,
        logging: L,
        disburser: Arc<dyn AirtimeDisburser>,
        notifier: Arc<dyn Notifier>,
        currency: String,
        timeouts: Timeouts,
    ) -> Self {
        ReconciliationEngine {
            storage,
            logging,
            disburser,
            notifier,
            currency,
            timeouts,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn logging(&self) -> &L {
        &self.logging
    }

    /// Applies one payment-gateway callback.
    ///
    /// Status moves `pending -> success | failed` exactly once through a compare-and-set on the
    /// store, so replays and concurrent duplicates observe the terminal record instead of
    /// re-verifying. Airtime is only sent after the success is durable, and only by the caller
    /// that wins the `none -> processing` disbursement claim.
    pub async fn reconcile(&self, body: &[u8]) -> Result<ReconcileOutcome, TopupError> {
        let payload: serde_json::Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "callback body is not valid JSON");
                return Ok(ReconcileOutcome::Malformed);
            }
        };
        let Some(callback) = StkCallback::from_payload(&payload) else {
            warn!(payload = %payload, "invalid callback structure");
            return Ok(ReconcileOutcome::Malformed);
        };

        let correlation_id = callback.checkout_request_id.clone();
        info!(
            correlation_id = %correlation_id,
            merchant_request_id = callback.merchant_request_id.as_deref().unwrap_or(""),
            result_code = callback.result_code,
            result_desc = callback.result_desc.as_deref().unwrap_or(""),
            "payment callback received"
        );

        // Raw payload is kept on the record before any decision is made.
        let recorded = bounded(
            self.timeouts.store,
            "record callback",
            self.storage.record_callback(&correlation_id, payload),
        )
        .await?;
        let Some(transaction) = recorded else {
            warn!(correlation_id = %correlation_id, "no transaction found for callback");
            return Ok(ReconcileOutcome::UnknownCorrelation { correlation_id });
        };

        self.audit(
            CALLBACK_RECEIVED,
            json!({
                "result_code": callback.result_code,
                "result_desc": callback.result_desc,
                "callback_count": transaction.callback_count,
            }),
            &correlation_id,
        )
        .await;

        if transaction.status.is_terminal() {
            info!(
                correlation_id = %correlation_id,
                status = %transaction.status,
                "callback for already processed transaction"
            );
            return self.resume(transaction).await;
        }

        if !callback.is_success() {
            let reason = callback
                .result_desc
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_FAILURE_REASON.to_string());
            return self.fail_payment(transaction, reason, None).await;
        }

        let Some(receipt) = callback.receipt() else {
            error!(
                correlation_id = %correlation_id,
                metadata = ?callback.callback_metadata,
                "success callback is missing amount, receipt or phone metadata"
            );
            return Ok(ReconcileOutcome::MissingMetadata { correlation_id });
        };

        if let Err(mismatch) = verify_payment(&transaction, &receipt) {
            error!(
                correlation_id = %correlation_id,
                expected_amount = %mismatch.expected_amount,
                received_amount = %mismatch.received_amount,
                expected_phone = %mismatch.expected_phone,
                received_phone = %mismatch.received_phone,
                receipt_id = %receipt.receipt_id,
                "payment verification mismatch"
            );
            self.audit(
                VERIFICATION_MISMATCH,
                json!({
                    "expected_amount": mismatch.expected_amount.to_string(),
                    "received_amount": mismatch.received_amount.to_string(),
                    "expected_phone": mismatch.expected_phone,
                    "received_phone": mismatch.received_phone,
                    "receipt_id": receipt.receipt_id,
                }),
                &correlation_id,
            )
            .await;
            return self
                .fail_payment(transaction, VERIFICATION_MISMATCH_REASON.to_string(), Some(mismatch))
                .await;
        }

        let update = StatusUpdate::Succeeded {
            paid_amount: receipt.amount,
            provider_receipt_id: receipt.receipt_id.clone(),
        };
        let committed = match bounded(
            self.timeouts.store,
            "commit payment",
            self.storage
                .transition_status(&correlation_id, PaymentStatus::Pending, update),
        )
        .await?
        {
            Transition::Applied(t) => t,
            Transition::Stale(current) => return self.resume(current).await,
        };

        info!(
            correlation_id = %correlation_id,
            amount = %receipt.amount,
            receipt_id = %receipt.receipt_id,
            "payment confirmed"
        );
        self.audit(
            PAYMENT_CONFIRMED,
            json!({ "amount": receipt.amount.to_string(), "receipt_id": receipt.receipt_id }),
            &correlation_id,
        )
        .await;

        let disbursement = self.disburse_once(committed).await?;
        Ok(ReconcileOutcome::Completed {
            correlation_id,
            disbursement,
        })
    }

    async fn fail_payment(
        &self,
        transaction: Transaction,
        reason: String,
        mismatch: Option<VerificationMismatch>,
    ) -> Result<ReconcileOutcome, TopupError> {
        let correlation_id = transaction.correlation_id.clone();
        let update = StatusUpdate::Failed {
            reason: reason.clone(),
        };
        match bounded(
            self.timeouts.store,
            "record payment failure",
            self.storage
                .transition_status(&correlation_id, PaymentStatus::Pending, update),
        )
        .await?
        {
            Transition::Applied(_) => {}
            Transition::Stale(current) => return self.resume(current).await,
        }

        info!(
            correlation_id = %correlation_id,
            phone = %transaction.payer_phone,
            reason = %reason,
            "payment failed"
        );
        self.audit(PAYMENT_FAILED, json!({ "reason": reason }), &correlation_id)
            .await;

        Ok(match mismatch {
            Some(mismatch) => ReconcileOutcome::VerificationFailed {
                correlation_id,
                mismatch,
            },
            None => ReconcileOutcome::PaymentFailed {
                correlation_id,
                reason,
            },
        })
    }

    /// Terminal transactions only pass through the disbursement gate.
    async fn resume(&self, transaction: Transaction) -> Result<ReconcileOutcome, TopupError> {
        let correlation_id = transaction.correlation_id.clone();
        let status = transaction.status;
        let disbursement = if status == PaymentStatus::Success {
            self.disburse_once(transaction).await?
        } else {
            transaction.disbursement_status
        };
        Ok(ReconcileOutcome::AlreadyProcessed {
            correlation_id,
            status,
            disbursement,
        })
    }

    async fn disburse_once(&self, transaction: Transaction) -> Result<DisbursementStatus, TopupError> {
        let correlation_id = transaction.correlation_id.clone();
        match transaction.disbursement_status {
            DisbursementStatus::None => {}
            DisbursementStatus::Processing
                if transaction
                    .claim_age(Utc::now())
                    .is_some_and(|age| age >= self.timeouts.claim_ttl) =>
            {
                return self.abandon_claim(transaction).await;
            }
            status => {
                info!(
                    correlation_id = %correlation_id,
                    disbursement_status = %status,
                    "airtime already attempted, skipping"
                );
                return Ok(status);
            }
        }

        let claimed = match bounded(
            self.timeouts.store,
            "claim disbursement",
            self.storage.transition_disbursement(
                &correlation_id,
                DisbursementStatus::None,
                DisbursementUpdate::Claim,
            ),
        )
        .await?
        {
            Transition::Applied(t) => t,
            Transition::Stale(current) => {
                info!(
                    correlation_id = %correlation_id,
                    disbursement_status = %current.disbursement_status,
                    "disbursement claimed by another callback, skipping"
                );
                return Ok(current.disbursement_status);
            }
        };

        let amount = claimed.paid_amount.unwrap_or(claimed.requested_amount);
        debug!(correlation_id = %correlation_id, phone = %claimed.payer_phone, %amount, "sending airtime");
        let update = match tokio::time::timeout(
            self.timeouts.provider,
            self.disburser.disburse(&claimed.payer_phone, amount),
        )
        .await
        {
            Ok(Ok(response)) if response.is_sent() => DisbursementUpdate::Sent,
            Ok(Ok(response)) => DisbursementUpdate::Failed {
                reason: format!("Airtime send failed: {}", response.failure_summary()),
            },
            Ok(Err(e)) => DisbursementUpdate::Failed {
                reason: format!("Airtime disbursement failed: {}", e),
            },
            Err(_) => DisbursementUpdate::Failed {
                reason: format!(
                    "Airtime disbursement timed out after {}ms",
                    self.timeouts.provider.as_millis()
                ),
            },
        };

        let recorded = match bounded(
            self.timeouts.store,
            "record disbursement",
            self.storage.transition_disbursement(
                &correlation_id,
                DisbursementStatus::Processing,
                update.clone(),
            ),
        )
        .await
        {
            Ok(Transition::Applied(t) | Transition::Stale(t)) => t,
            Err(e) => {
                // The claim stays `processing` until a later callback finds it past its TTL.
                error!(
                    correlation_id = %correlation_id,
                    outcome = %update.target(),
                    claim_age_ms = claimed
                        .claim_age(Utc::now())
                        .map(|age| age.as_millis() as u64)
                        .unwrap_or_default(),
                    error = %e,
                    "airtime outcome not recorded"
                );
                return Err(e);
            }
        };

        match recorded.disbursement_status {
            DisbursementStatus::Sent => {
                info!(
                    correlation_id = %correlation_id,
                    phone = %recorded.payer_phone,
                    receipt_id = recorded.provider_receipt_id.as_deref().unwrap_or(""),
                    "airtime sent"
                );
                self.audit(AIRTIME_SENT, json!({ "amount": amount.to_string() }), &correlation_id)
                    .await;
                self.notify(&recorded, amount).await;
            }
            status => {
                // Payment was received but airtime was not delivered: needs operator follow-up.
                error!(
                    correlation_id = %correlation_id,
                    phone = %recorded.payer_phone,
                    disbursement_status = %status,
                    reason = recorded.disbursement_error.as_deref().unwrap_or(""),
                    "airtime disbursement did not complete"
                );
                self.audit(
                    AIRTIME_FAILED,
                    json!({ "reason": recorded.disbursement_error }),
                    &correlation_id,
                )
                .await;
            }
        }

        Ok(recorded.disbursement_status)
    }

    /// Resolves a claim whose holder never recorded an outcome. Airtime is not re-sent: the
    /// provider may already have delivered it, so the record goes to `failed` for follow-up.
    async fn abandon_claim(&self, transaction: Transaction) -> Result<DisbursementStatus, TopupError> {
        let correlation_id = transaction.correlation_id.clone();
        let age = transaction.claim_age(Utc::now()).unwrap_or_default();
        let reason = format!(
            "Airtime disbursement outcome unknown: claim abandoned after {}s",
            age.as_secs()
        );
        let update = DisbursementUpdate::Failed {
            reason: reason.clone(),
        };
        match bounded(
            self.timeouts.store,
            "abandon disbursement claim",
            self.storage.transition_disbursement(
                &correlation_id,
                DisbursementStatus::Processing,
                update,
            ),
        )
        .await?
        {
            Transition::Applied(t) => {
                error!(
                    correlation_id = %correlation_id,
                    phone = %t.payer_phone,
                    claim_age_ms = age.as_millis() as u64,
                    "abandoned airtime claim marked failed"
                );
                self.audit(AIRTIME_FAILED, json!({ "reason": reason }), &correlation_id)
                    .await;
                Ok(t.disbursement_status)
            }
            Transition::Stale(current) => Ok(current.disbursement_status),
        }
    }

    async fn notify(&self, transaction: &Transaction, amount: Decimal) {
        let message = confirmation_message(
            &self.currency,
            amount,
            transaction.provider_receipt_id.as_deref().unwrap_or(""),
        );
        let failure = match tokio::time::timeout(
            self.timeouts.provider,
            self.notifier.notify(&transaction.payer_phone, &message),
        )
        .await
        {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "notification timed out after {}ms",
                self.timeouts.provider.as_millis()
            )),
        };

        if let Some(reason) = failure {
            warn!(
                correlation_id = %transaction.correlation_id,
                reason = %reason,
                "confirmation SMS not delivered"
            );
            self.audit(
                NOTIFICATION_FAILED,
                json!({ "reason": reason }),
                &transaction.correlation_id,
            )
            .await;
        }
    }

    async fn audit(&self, action: &str, details: serde_json::Value, correlation_id: &str) {
        if let Err(e) = self
            .logging
            .log_action(action, details, Some(correlation_id))
            .await
        {
            warn!(error = %e, action, "failed to write audit log");
        }
    }
}
