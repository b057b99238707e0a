use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message envelope shared by inbound business events and outbound notifications
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageEnvelope {
    pub id: Uuid,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub actor: Option<String>,
    pub data: serde_json::Map<String, serde_json::Value>,
    /// Id of the entity the event is about
    pub guid: Uuid,
    pub event_name: String,
}

impl MessageEnvelope {
    pub fn new(
        event_name: impl Into<String>,
        guid: Uuid,
        actor: Option<String>,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            actor,
            data,
            guid,
            event_name: event_name.into(),
        }
    }
}
