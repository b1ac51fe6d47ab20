//! Append-only audit log row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of a state-changing or admin operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub ip: Option<String>,
    pub ua: Option<String>,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(action: &str, resource_type: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: None,
            ip: None,
            ua: None,
            metadata: serde_json::json!({}),
            timestamp: Utc::now(),
        }
    }

    pub fn for_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn on_resource(mut self, resource_id: &str) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
