use crate::core::errors::TopupError;
use crate::core::models::audit::AppLog;
use crate::infrastructure::logging::LoggingService;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryLogging {
    entries: Arc<RwLock<Vec<AppLog>>>,
}

impl InMemoryLogging {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoggingService for InMemoryLogging {
    async fn log_action(
        &self,
        action: &str,
        details: serde_json::Value,
        correlation_id: Option<&str>,
    ) -> Result<(), TopupError> {
        let entry = AppLog::new(action, correlation_id, details);
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn get_logs(&self) -> Result<Vec<AppLog>, TopupError> {
        Ok(self.entries.read().await.clone())
    }

    async fn logs_for(&self, correlation_id: &str) -> Result<Vec<AppLog>, TopupError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|entry| entry.concerns(correlation_id))
            .cloned()
            .collect())
    }
}
