pub mod in_memory;

use crate::core::errors::TopupError;
use crate::core::models::audit::AppLog;
use async_trait::async_trait;

/// Append-only audit trail of reconciliation milestones.
#[async_trait]
pub trait LoggingService: Send + Sync {
    async fn log_action(
        &self,
        action: &str,
        details: serde_json::Value,
        correlation_id: Option<&str>,
    ) -> Result<(), TopupError>;
    /// Every entry, oldest first.
    async fn get_logs(&self) -> Result<Vec<AppLog>, TopupError>;
    /// Entries for one transaction, oldest first.
    async fn logs_for(&self, correlation_id: &str) -> Result<Vec<AppLog>, TopupError>;
}
