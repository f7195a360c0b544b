use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One business-level audit entry. `details` is whatever structured context the action carries.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AppLog {
    pub id: String,
    pub action: String,
    pub correlation_id: Option<String>,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    #[serde(with = "chrono::serde::ts_seconds")]
    #[schema(value_type = i64, example = 1717245296)]
    pub timestamp: DateTime<Utc>,
}

impl AppLog {
    pub fn new(action: &str, correlation_id: Option<&str>, details: serde_json::Value) -> Self {
        AppLog {
            id: Uuid::new_v4().to_string(),
            action: action.to_string(),
            correlation_id: correlation_id.map(String::from),
            details,
            timestamp: Utc::now(),
        }
    }

    pub fn concerns(&self, correlation_id: &str) -> bool {
        self.correlation_id.as_deref() == Some(correlation_id)
    }
}
