use std::sync::Arc;

use tracing::info;

use reflex_core::models::{Order, OrderContents};

use crate::error::StreamResult;
use crate::record::ContentsRecord;
use crate::source::ChangeStream;

/// Appends source folder snapshots for the inventory audit
pub struct ContentsProducer {
    stream: Arc<dyn ChangeStream>,
}

impl ContentsProducer {
    pub fn new(stream: Arc<dyn ChangeStream>) -> Self {
        Self { stream }
    }

    /// Append `{order, contents}` keyed by the order id; returns the sequence number
    pub async fn put_contents_record(
        &self,
        order: &Order,
        contents: &OrderContents,
    ) -> StreamResult<String> {
        let record = ContentsRecord::new(order.clone(), contents.clone());
        let sequence_number = self
            .stream
            .put_record(record.encode()?, record.partition_key())
            .await?;
        info!(
            order_id = %order.id,
            delivery_images = contents.delivery.images.len(),
            archive_images = contents.archive.images.len(),
            submissions = contents.submissions.len(),
            sequence_number = %sequence_number,
            "Contents record appended"
        );
        Ok(sequence_number)
    }
}
