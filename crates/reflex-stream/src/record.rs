use serde::{Deserialize, Serialize};

use reflex_core::models::{Order, OrderContents};
use reflex_core::ModelError;

use crate::error::{StreamError, StreamResult};

/// Source folder snapshot of one order, as appended to the change-stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentsRecord {
    pub order: Order,
    pub contents: OrderContents,
}

impl ContentsRecord {
    pub fn new(order: Order, contents: OrderContents) -> Self {
        Self { order, contents }
    }

    /// Records of one order land on the same shard
    pub fn partition_key(&self) -> &str {
        &self.order.id
    }

    pub fn encode(&self) -> StreamResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(StreamError::Encode)
    }

    pub fn decode(data: &[u8]) -> Result<Self, ModelError> {
        serde_json::from_slice(data).map_err(|e| ModelError::invalid_payload("contents record", e))
    }
}
