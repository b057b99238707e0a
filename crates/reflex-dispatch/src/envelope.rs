//! Inbound envelope validation and outbound notification construction.

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use reflex_core::models::MessageEnvelope;

use crate::error::EnvelopeError;

/// Dotted lower-case names such as `order.workflow.accept`
fn event_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9_]+(\.[a-z0-9_]+)+$")
            .unwrap_or_else(|e| panic!("event name pattern: {e}"))
    })
}

pub fn is_valid_event_name(name: &str) -> bool {
    event_name_pattern().is_match(name)
}

/// Parse a queue message body into an envelope
///
/// `id` and `guid` must be UUIDs and `data` an object; `created_at` defaults to
/// now and `actor` to none.
pub fn decode_envelope(body: &str) -> Result<MessageEnvelope, EnvelopeError> {
    let envelope: MessageEnvelope = serde_json::from_str(body)?;
    if !is_valid_event_name(&envelope.event_name) {
        return Err(EnvelopeError::InvalidEventName(envelope.event_name));
    }
    Ok(envelope)
}

/// Notification about `guid`, carrying `data` as payload
pub fn notification(
    event_name: &str,
    guid: Uuid,
    actor: Option<String>,
    data: serde_json::Value,
) -> MessageEnvelope {
    let data = match data {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("result".to_string(), other);
            map
        }
    };
    MessageEnvelope::new(event_name, guid, actor, data)
}
