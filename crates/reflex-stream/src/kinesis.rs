//! AWS Kinesis implementation of [`ChangeStream`].

use async_trait::async_trait;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_kinesis::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_kinesis::operation::get_records::GetRecordsError;
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::ShardIteratorType;
use aws_sdk_kinesis::Client;
use tracing::debug;

use reflex_core::Config;

use crate::error::{StreamError, StreamResult};
use crate::source::{ChangeStream, IteratorPosition, RecordBatch, ShardInfo, StreamRecord};

/// Service error codes worth another attempt
const RETRYABLE_CODES: [&str; 4] = [
    "ProvisionedThroughputExceededException",
    "LimitExceededException",
    "KMSThrottlingException",
    "InternalFailure",
];

pub struct KinesisStream {
    client: Client,
    stream_name: String,
}

impl KinesisStream {
    pub async fn new(region: &str, stream_name: impl Into<String>) -> Self {
        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .retry_config(retry_config)
            .load()
            .await;

        Self {
            client: Client::new(&config),
            stream_name: stream_name.into(),
        }
    }

    pub async fn from_config(config: &Config) -> Self {
        Self::new(config.aws_region(), config.delivery_stream()).await
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }
}

fn service_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> StreamError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let retryable = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(ctx) => ctx
            .err()
            .code()
            .is_some_and(|code| RETRYABLE_CODES.contains(&code)),
        _ => false,
    };
    StreamError::Service {
        operation,
        message: aws_sdk_kinesis::error::DisplayErrorContext(&err).to_string(),
        retryable,
    }
}

#[async_trait]
impl ChangeStream for KinesisStream {
    async fn list_shards(&self) -> StreamResult<Vec<ShardInfo>> {
        let mut shards = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            // The stream name and a pagination token are mutually exclusive
            let request = match &next_token {
                Some(token) => self.client.list_shards().next_token(token),
                None => self.client.list_shards().stream_name(&self.stream_name),
            };
            let output = request
                .send()
                .await
                .map_err(|e| service_error("list_shards", e))?;
            shards.extend(output.shards().iter().map(|shard| ShardInfo {
                shard_id: shard.shard_id().to_string(),
            }));
            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        debug!(stream = %self.stream_name, shards = shards.len(), "Listed shards");
        Ok(shards)
    }

    async fn shard_iterator(
        &self,
        shard_id: &str,
        position: &IteratorPosition,
    ) -> StreamResult<String> {
        let request = self
            .client
            .get_shard_iterator()
            .stream_name(&self.stream_name)
            .shard_id(shard_id);
        let request = match position {
            IteratorPosition::TrimHorizon => {
                request.shard_iterator_type(ShardIteratorType::TrimHorizon)
            }
            IteratorPosition::AtSequence(sequence) => request
                .shard_iterator_type(ShardIteratorType::AtSequenceNumber)
                .starting_sequence_number(sequence),
            IteratorPosition::AfterSequence(sequence) => request
                .shard_iterator_type(ShardIteratorType::AfterSequenceNumber)
                .starting_sequence_number(sequence),
        };
        let output = request
            .send()
            .await
            .map_err(|e| service_error("get_shard_iterator", e))?;
        output
            .shard_iterator()
            .map(str::to_string)
            .ok_or_else(|| StreamError::MissingIterator(shard_id.to_string()))
    }

    async fn get_records(&self, iterator: &str) -> StreamResult<RecordBatch> {
        let output = self
            .client
            .get_records()
            .shard_iterator(iterator)
            .send()
            .await
            .map_err(|e| {
                let expired = matches!(
                    &e,
                    SdkError::ServiceError(ctx)
                        if matches!(ctx.err(), GetRecordsError::ExpiredIteratorException(_))
                );
                if expired {
                    StreamError::ExpiredIterator(iterator.to_string())
                } else {
                    service_error("get_records", e)
                }
            })?;

        let records = output
            .records()
            .iter()
            .map(|record| StreamRecord {
                sequence_number: record.sequence_number().to_string(),
                partition_key: record.partition_key().unwrap_or_default().to_string(),
                data: record.data().as_ref().to_vec(),
            })
            .collect();
        Ok(RecordBatch {
            records,
            next_iterator: output.next_shard_iterator().map(str::to_string),
        })
    }

    async fn put_record(&self, data: Vec<u8>, partition_key: &str) -> StreamResult<String> {
        let output = self
            .client
            .put_record()
            .stream_name(&self.stream_name)
            .partition_key(partition_key)
            .data(Blob::new(data))
            .send()
            .await
            .map_err(|e| service_error("put_record", e))?;
        Ok(output.sequence_number().to_string())
    }
}
