use crate::core::errors::TopupError;
use crate::core::models::{DisbursementStatus, DisbursementUpdate, PaymentStatus, StatusUpdate, Transaction};
use async_trait::async_trait;

/// Result of a compare-and-set transition.
#[derive(Clone, Debug)]
pub enum Transition {
    /// The prior state matched and the update was written; carries the updated record.
    Applied(Transaction),
    /// The prior state did not match; nothing was written. Carries the current record.
    Stale(Transaction),
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Fails with `DuplicateCorrelationId` if a record already exists for the id.
    async fn create_transaction(&self, transaction: Transaction) -> Result<Transaction, TopupError>;
    async fn get_transaction(&self, correlation_id: &str) -> Result<Option<Transaction>, TopupError>;
    async fn list_transactions(
        &self,
        disbursement_status: Option<DisbursementStatus>,
    ) -> Result<Vec<Transaction>, TopupError>;
    /// Stores the raw callback on the matching record and bumps its callback count.
    /// Returns `None` when no record exists for the id.
    async fn record_callback(
        &self,
        correlation_id: &str,
        raw_callback: serde_json::Value,
    ) -> Result<Option<Transaction>, TopupError>;
    async fn transition_status(
        &self,
        correlation_id: &str,
        expected: PaymentStatus,
        update: StatusUpdate,
    ) -> Result<Transition, TopupError>;
    /// Only permitted once the payment status is `success`.
    async fn transition_disbursement(
        &self,
        correlation_id: &str,
        expected: DisbursementStatus,
        update: DisbursementUpdate,
    ) -> Result<Transition, TopupError>;
}

pub mod in_memory;
