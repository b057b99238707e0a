//! Configuration module
//!
//! All settings are read once at process start from the environment (and an
//! optional `.env` file). Components receive the pieces they need at construction
//! time; nothing reads the environment afterwards.

use std::env;
use std::path::PathBuf;

use crate::constants::{DEFAULT_CATALOG_ROOT_ID, DEFAULT_DELIVERY_FOLDER_NAMES};
use crate::models::{FolderAllowList, Lane};
use crate::storage_types::StorageBackend;

const DEFAULT_AWS_REGION: &str = "eu-central-1";
const DEFAULT_STAGING_PATH: &str = "/tmp/assets";
const DEFAULT_ASSETS_PREFIX: &str = "source/assets";
const DEFAULT_BUCKET_BASE: &str = "images";
const DEFAULT_DELIVERY_STREAM: &str = "gdrive_delivery_contents";
const HTTP_TIMEOUT_SECS: u64 = 60;
const TASK_MAX_RETRIES: u32 = 10;
const TASK_BACKOFF_BASE_MS: u64 = 1000;
const TASK_BACKOFF_MAX_SECS: u64 = 300;
const TASK_TIMEOUT_SECS: u64 = 3600;
const LANE_DEFAULT_CONCURRENCY: usize = 20;
const LANE_SOURCE_CONCURRENCY: usize = 4;
const LANE_DESTINATION_CONCURRENCY: usize = 8;
const SOURCE_RATE_LIMIT: f64 = 10.0;
// Kinesis iterators expire after five minutes.
const STREAM_ITERATOR_TTL_SECS: u64 = 280;
const WORKER_WAIT_TIME_SECS: i32 = 20;
const WORKER_MAX_MESSAGES: i32 = 1;

/// Concurrency ceiling and queue label of one execution lane
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaneSettings {
    pub concurrency: usize,
    pub queue: String,
}

#[derive(Clone, Debug)]
pub struct ReflexConfig {
    pub environment: String,
    pub log_format: String,
    pub aws_region: String,
    // Inbound business events and outbound notifications
    pub queue_url: Option<String>,
    pub events_queue_url: Option<String>,
    // External services
    pub catalog_base_url: String,
    pub catalog_root_id: String,
    pub catalog_actor_id: String,
    pub orders_base_url: String,
    pub drive_api_base: String,
    pub drive_access_token: Option<String>,
    pub http_timeout_secs: u64,
    // Transfer
    pub staging_path: PathBuf,
    pub assets_prefix: String,
    pub storage_backend: StorageBackend,
    pub s3_bucket: String,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
    pub delivery_folder_names: Vec<String>,
    // Job runner
    pub task_max_retries: u32,
    pub task_backoff_base_ms: u64,
    pub task_backoff_max_secs: u64,
    pub task_timeout_secs: u64,
    pub lane_default: LaneSettings,
    pub lane_source: LaneSettings,
    pub lane_destination: LaneSettings,
    pub source_rate_limit: f64,
    // Change stream
    pub delivery_stream: String,
    pub stream_checkpoint_path: Option<PathBuf>,
    pub stream_iterator_ttl_secs: u64,
    // Queue worker
    pub worker_wait_time_secs: i32,
    pub worker_max_messages: i32,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config(pub Box<ReflexConfig>);

impl Config {
    fn inner(&self) -> &ReflexConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ReflexConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn is_production(&self) -> bool {
        is_production(&self.inner().environment)
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn log_json(&self) -> bool {
        self.inner().log_format.eq_ignore_ascii_case("json")
    }

    pub fn aws_region(&self) -> &str {
        &self.inner().aws_region
    }

    pub fn queue_url(&self) -> Option<&str> {
        self.inner().queue_url.as_deref()
    }

    pub fn events_queue_url(&self) -> Option<&str> {
        self.inner().events_queue_url.as_deref()
    }

    pub fn catalog_base_url(&self) -> &str {
        &self.inner().catalog_base_url
    }

    pub fn catalog_root_id(&self) -> &str {
        &self.inner().catalog_root_id
    }

    pub fn catalog_actor_id(&self) -> &str {
        &self.inner().catalog_actor_id
    }

    pub fn orders_base_url(&self) -> &str {
        &self.inner().orders_base_url
    }

    pub fn drive_api_base(&self) -> &str {
        &self.inner().drive_api_base
    }

    pub fn drive_access_token(&self) -> Option<&str> {
        self.inner().drive_access_token.as_deref()
    }

    pub fn http_timeout_secs(&self) -> u64 {
        self.inner().http_timeout_secs
    }

    pub fn staging_path(&self) -> &PathBuf {
        &self.inner().staging_path
    }

    pub fn assets_prefix(&self) -> &str {
        &self.inner().assets_prefix
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> &str {
        &self.inner().s3_bucket
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn folder_allow_list(&self) -> FolderAllowList {
        FolderAllowList::new(&self.inner().delivery_folder_names)
    }

    pub fn task_max_retries(&self) -> u32 {
        self.inner().task_max_retries
    }

    pub fn task_backoff_base_ms(&self) -> u64 {
        self.inner().task_backoff_base_ms
    }

    pub fn task_backoff_max_secs(&self) -> u64 {
        self.inner().task_backoff_max_secs
    }

    pub fn task_timeout_secs(&self) -> u64 {
        self.inner().task_timeout_secs
    }

    pub fn lane(&self, lane: Lane) -> &LaneSettings {
        match lane {
            Lane::Default => &self.inner().lane_default,
            Lane::Source => &self.inner().lane_source,
            Lane::Destination => &self.inner().lane_destination,
        }
    }

    pub fn source_rate_limit(&self) -> f64 {
        self.inner().source_rate_limit
    }

    pub fn delivery_stream(&self) -> &str {
        &self.inner().delivery_stream
    }

    pub fn stream_checkpoint_path(&self) -> Option<&PathBuf> {
        self.inner().stream_checkpoint_path.as_ref()
    }

    pub fn stream_iterator_ttl_secs(&self) -> u64 {
        self.inner().stream_iterator_ttl_secs
    }

    pub fn worker_wait_time_secs(&self) -> i32 {
        self.inner().worker_wait_time_secs
    }

    pub fn worker_max_messages(&self) -> i32 {
        self.inner().worker_max_messages
    }
}

impl ReflexConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .parse::<StorageBackend>()?;

        let bucket_base =
            env::var("S3_BUCKET_BASE").unwrap_or_else(|_| DEFAULT_BUCKET_BASE.to_string());
        let s3_bucket = env::var("S3_BUCKET")
            .unwrap_or_else(|_| destination_bucket(&bucket_base, is_production(&environment)));

        let delivery_folder_names = env::var("DELIVERY_FOLDER_NAMES")
            .map(|names| names.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| {
                DEFAULT_DELIVERY_FOLDER_NAMES
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        Ok(ReflexConfig {
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_AWS_REGION.to_string()),
            queue_url: optional_var("REFLEX_QUEUE_URL"),
            events_queue_url: optional_var("REFLEX_EVENTS_QUEUE_URL"),
            catalog_base_url: env::var("CATALOG_BASE_URL")
                .unwrap_or_else(|_| "http://catalog.local".to_string()),
            catalog_root_id: env::var("CATALOG_ROOT_ID")
                .unwrap_or_else(|_| DEFAULT_CATALOG_ROOT_ID.to_string()),
            catalog_actor_id: env::var("CATALOG_ACTOR_ID").unwrap_or_else(|_| "reflex".to_string()),
            orders_base_url: env::var("ORDERS_BASE_URL")
                .unwrap_or_else(|_| "http://orders.local".to_string()),
            drive_api_base: env::var("DRIVE_API_BASE")
                .unwrap_or_else(|_| "https://www.googleapis.com/drive/v3".to_string()),
            drive_access_token: optional_var("DRIVE_ACCESS_TOKEN"),
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS),
            staging_path: PathBuf::from(
                env::var("STAGING_PATH").unwrap_or_else(|_| DEFAULT_STAGING_PATH.to_string()),
            ),
            assets_prefix: env::var("ASSETS_PREFIX")
                .unwrap_or_else(|_| DEFAULT_ASSETS_PREFIX.to_string()),
            storage_backend,
            s3_bucket,
            s3_region: optional_var("S3_REGION"),
            s3_endpoint: optional_var("S3_ENDPOINT"),
            local_storage_path: optional_var("LOCAL_STORAGE_PATH"),
            delivery_folder_names,
            task_max_retries: parse_var("TASK_MAX_RETRIES", TASK_MAX_RETRIES),
            task_backoff_base_ms: parse_var("TASK_BACKOFF_BASE_MS", TASK_BACKOFF_BASE_MS),
            task_backoff_max_secs: parse_var("TASK_BACKOFF_MAX_SECS", TASK_BACKOFF_MAX_SECS),
            task_timeout_secs: parse_var("TASK_TIMEOUT_SECS", TASK_TIMEOUT_SECS),
            lane_default: lane_from_env("DEFAULT", LANE_DEFAULT_CONCURRENCY, "reflex"),
            lane_source: lane_from_env("SOURCE", LANE_SOURCE_CONCURRENCY, "reflex_drive"),
            lane_destination: lane_from_env(
                "DESTINATION",
                LANE_DESTINATION_CONCURRENCY,
                "reflex_s3",
            ),
            source_rate_limit: parse_var("SOURCE_RATE_LIMIT", SOURCE_RATE_LIMIT),
            delivery_stream: env::var("DELIVERY_STREAM")
                .unwrap_or_else(|_| DEFAULT_DELIVERY_STREAM.to_string()),
            stream_checkpoint_path: optional_var("STREAM_CHECKPOINT_PATH").map(PathBuf::from),
            stream_iterator_ttl_secs: parse_var(
                "STREAM_ITERATOR_TTL_SECS",
                STREAM_ITERATOR_TTL_SECS,
            ),
            worker_wait_time_secs: parse_var("WORKER_WAIT_TIME_SECS", WORKER_WAIT_TIME_SECS),
            worker_max_messages: parse_var("WORKER_MAX_MESSAGES", WORKER_MAX_MESSAGES),
            environment,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (name, lane) in [
            ("LANE_DEFAULT_CONCURRENCY", &self.lane_default),
            ("LANE_SOURCE_CONCURRENCY", &self.lane_source),
            ("LANE_DESTINATION_CONCURRENCY", &self.lane_destination),
        ] {
            if lane.concurrency == 0 {
                return Err(anyhow::anyhow!("{} must be greater than 0", name));
            }
        }

        if self.source_rate_limit <= 0.0 {
            return Err(anyhow::anyhow!("SOURCE_RATE_LIMIT must be greater than 0"));
        }

        if self.assets_prefix.starts_with('/') || self.assets_prefix.contains("..") {
            return Err(anyhow::anyhow!(
                "ASSETS_PREFIX must be a relative key prefix without '..'"
            ));
        }

        if self.storage_backend == StorageBackend::Local && self.local_storage_path.is_none() {
            return Err(anyhow::anyhow!(
                "STORAGE_BACKEND=local requires LOCAL_STORAGE_PATH to be set"
            ));
        }

        if self.stream_iterator_ttl_secs == 0 || self.stream_iterator_ttl_secs >= 300 {
            return Err(anyhow::anyhow!(
                "STREAM_ITERATOR_TTL_SECS must be between 1 and 299"
            ));
        }

        if !(1..=10).contains(&self.worker_max_messages) {
            return Err(anyhow::anyhow!("WORKER_MAX_MESSAGES must be between 1 and 10"));
        }

        for (name, url) in [
            ("CATALOG_BASE_URL", &self.catalog_base_url),
            ("ORDERS_BASE_URL", &self.orders_base_url),
            ("DRIVE_API_BASE", &self.drive_api_base),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow::anyhow!("{} must be an http(s) URL", name));
            }
        }

        Ok(())
    }
}

fn is_production(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

/// Bucket naming convention: `{base}-live` in production, `{base}-stg` elsewhere
pub fn destination_bucket(base: &str, production: bool) -> String {
    if production {
        format!("{}-live", base)
    } else {
        format!("{}-stg", base)
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr + ToString + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

fn lane_from_env(name: &str, concurrency: usize, queue: &str) -> LaneSettings {
    LaneSettings {
        concurrency: parse_var(&format!("LANE_{}_CONCURRENCY", name), concurrency),
        queue: env::var(format!("LANE_{}_QUEUE", name)).unwrap_or_else(|_| queue.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReflexConfig {
        ReflexConfig {
            environment: "development".into(),
            log_format: "text".into(),
            aws_region: DEFAULT_AWS_REGION.into(),
            queue_url: None,
            events_queue_url: None,
            catalog_base_url: "http://catalog.local".into(),
            catalog_root_id: DEFAULT_CATALOG_ROOT_ID.into(),
            catalog_actor_id: "reflex".into(),
            orders_base_url: "http://orders.local".into(),
            drive_api_base: "https://www.googleapis.com/drive/v3".into(),
            drive_access_token: None,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            staging_path: PathBuf::from(DEFAULT_STAGING_PATH),
            assets_prefix: DEFAULT_ASSETS_PREFIX.into(),
            storage_backend: StorageBackend::S3,
            s3_bucket: "images-stg".into(),
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
            delivery_folder_names: vec!["originals".into()],
            task_max_retries: TASK_MAX_RETRIES,
            task_backoff_base_ms: TASK_BACKOFF_BASE_MS,
            task_backoff_max_secs: TASK_BACKOFF_MAX_SECS,
            task_timeout_secs: TASK_TIMEOUT_SECS,
            lane_default: LaneSettings {
                concurrency: 20,
                queue: "reflex".into(),
            },
            lane_source: LaneSettings {
                concurrency: 4,
                queue: "reflex_drive".into(),
            },
            lane_destination: LaneSettings {
                concurrency: 8,
                queue: "reflex_s3".into(),
            },
            source_rate_limit: SOURCE_RATE_LIMIT,
            delivery_stream: DEFAULT_DELIVERY_STREAM.into(),
            stream_checkpoint_path: None,
            stream_iterator_ttl_secs: STREAM_ITERATOR_TTL_SECS,
            worker_wait_time_secs: WORKER_WAIT_TIME_SECS,
            worker_max_messages: WORKER_MAX_MESSAGES,
        }
    }

    #[test]
    fn test_bucket_naming() {
        assert_eq!(destination_bucket("images", true), "images-live");
        assert_eq!(destination_bucket("images", false), "images-stg");
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = sample();
        config.lane_source.concurrency = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("LANE_SOURCE_CONCURRENCY"));
    }

    #[test]
    fn test_local_backend_requires_path() {
        let mut config = sample();
        config.storage_backend = StorageBackend::Local;
        assert!(config.validate().is_err());
        config.local_storage_path = Some("/var/lib/reflex".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_iterator_ttl_must_stay_under_expiry() {
        let mut config = sample();
        config.stream_iterator_ttl_secs = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_allow_list_from_config() {
        let config = Config(Box::new(sample()));
        assert!(config.folder_allow_list().matches("Originals"));
        assert!(!config.folder_allow_list().matches("print"));
        assert_eq!(config.lane(Lane::Source).queue, "reflex_drive");
    }
}
