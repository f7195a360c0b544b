use crate::core::errors::TopupError;
use crate::core::models::{DisbursementStatus, DisbursementUpdate, PaymentStatus, StatusUpdate, Transaction};
use crate::infrastructure::storage::{TransactionStore, Transition};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Transactions keyed by correlation id. Every mutation runs under the write lock, so each
/// compare-and-set is atomic with respect to concurrent callbacks.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    transactions: Arc<RwLock<HashMap<String, Transaction>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage {
            transactions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl TransactionStore for InMemoryStorage {
    async fn create_transaction(&self, transaction: Transaction) -> Result<Transaction, TopupError> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&transaction.correlation_id) {
            return Err(TopupError::DuplicateCorrelationId(transaction.correlation_id));
        }
        transactions.insert(transaction.correlation_id.clone(), transaction.clone());
        Ok(transaction)
    }

    async fn get_transaction(&self, correlation_id: &str) -> Result<Option<Transaction>, TopupError> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(correlation_id).cloned())
    }

    async fn list_transactions(
        &self,
        disbursement_status: Option<DisbursementStatus>,
    ) -> Result<Vec<Transaction>, TopupError> {
        let transactions = self.transactions.read().await;
        let mut matching: Vec<Transaction> = transactions
            .values()
            .filter(|t| disbursement_status.is_none_or(|s| t.disbursement_status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }

    async fn record_callback(
        &self,
        correlation_id: &str,
        raw_callback: serde_json::Value,
    ) -> Result<Option<Transaction>, TopupError> {
        let mut transactions = self.transactions.write().await;
        Ok(transactions.get_mut(correlation_id).map(|t| {
            t.raw_callback = Some(raw_callback);
            t.callback_count += 1;
            t.clone()
        }))
    }

    async fn transition_status(
        &self,
        correlation_id: &str,
        expected: PaymentStatus,
        update: StatusUpdate,
    ) -> Result<Transition, TopupError> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .get_mut(correlation_id)
            .ok_or_else(|| TopupError::TransactionNotFound(correlation_id.to_string()))?;

        if transaction.status != expected {
            return Ok(Transition::Stale(transaction.clone()));
        }
        if expected.is_terminal() {
            return Err(TopupError::InvalidTransition(format!(
                "{} cannot move from terminal status {} to {}",
                correlation_id,
                expected,
                update.target()
            )));
        }

        transaction.apply_status(update, Utc::now());
        Ok(Transition::Applied(transaction.clone()))
    }

    async fn transition_disbursement(
        &self,
        correlation_id: &str,
        expected: DisbursementStatus,
        update: DisbursementUpdate,
    ) -> Result<Transition, TopupError> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .get_mut(correlation_id)
            .ok_or_else(|| TopupError::TransactionNotFound(correlation_id.to_string()))?;

        if transaction.status != PaymentStatus::Success {
            return Err(TopupError::InvalidTransition(format!(
                "{} cannot record disbursement {} while payment is {}",
                correlation_id,
                update.target(),
                transaction.status
            )));
        }
        if transaction.disbursement_status != expected {
            return Ok(Transition::Stale(transaction.clone()));
        }

        transaction.apply_disbursement(update, Utc::now());
        Ok(Transition::Applied(transaction.clone()))
    }
}
