//! Google Drive API v3 client.
//!
//! Only what the pipeline needs: paginated listing of a folder's direct children
//! and streamed downloads of file content.

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use reflex_core::models::FileMeta;

use crate::client::{ApiClient, Auth};
use crate::error::{ApiError, ApiResult};

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;

/// Fields requested for every listed file
const FILE_FIELDS: &str =
    "id,name,mimeType,size,webViewLink,webContentLink,imageMediaMetadata";

/// Read access to the source file host
#[async_trait]
pub trait SourceDrive: Send + Sync {
    /// Direct children of a folder, sub-folders included. A missing folder is an error.
    async fn list_folder(&self, folder_id: &str) -> ApiResult<Vec<FileMeta>>;

    /// Stream a file's content to `destination`, returning the bytes written
    async fn download_to(&self, file_id: &str, destination: &Path) -> ApiResult<u64>;

    /// Folder or file id embedded in a sharing link
    fn resolve_id_from_share_url(&self, url: &str) -> ApiResult<String> {
        folder_id_from_url(url)
    }
}

fn share_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:/folders/|/file/d/|/d/|[?&]id=)([A-Za-z0-9_-]{10,})")
            .unwrap_or_else(|e| panic!("share url pattern: {e}"))
    })
}

/// Extract the id from a Google Drive sharing link
///
/// Accepts `.../drive/folders/{id}`, `.../file/d/{id}/view`, `open?id={id}` and a
/// bare id.
pub fn folder_id_from_url(url: &str) -> ApiResult<String> {
    let url = url.trim();
    if let Some(captures) = share_url_pattern().captures(url) {
        if let Some(id) = captures.get(1) {
            return Ok(id.as_str().to_string());
        }
    }
    if !url.is_empty()
        && url.len() >= 10
        && url
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Ok(url.to_string());
    }
    Err(ApiError::InvalidShareUrl(url.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilesListResponse {
    #[serde(default)]
    files: Vec<FileMeta>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Google Drive connector authenticated with an OAuth access token
#[derive(Clone, Debug)]
pub struct GoogleDriveClient {
    client: ApiClient,
}

impl GoogleDriveClient {
    /// # Arguments
    ///
    /// * `api_base` - e.g. `https://www.googleapis.com/drive/v3`
    /// * `access_token` - OAuth 2.0 token with `drive.readonly` scope
    pub fn new(api_base: &str, access_token: &str, timeout: Duration) -> ApiResult<Self> {
        if access_token.trim().is_empty() {
            return Err(ApiError::Config("DRIVE_ACCESS_TOKEN is empty".to_string()));
        }
        Ok(Self {
            client: ApiClient::new(api_base, Auth::Bearer(access_token.to_string()), timeout)?,
        })
    }

    fn partial_path(destination: &Path) -> PathBuf {
        let mut name = destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        destination.with_file_name(name)
    }
}

#[async_trait]
impl SourceDrive for GoogleDriveClient {
    #[instrument(skip(self))]
    async fn list_folder(&self, folder_id: &str) -> ApiResult<Vec<FileMeta>> {
        let query = format!("'{}' in parents and trashed=false", folder_id.replace('\'', "\\'"));
        let fields = format!("nextPageToken,files({})", FILE_FIELDS);
        let page_size = MAX_PAGE_SIZE.to_string();

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params: Vec<(&str, &str)> = vec![
                ("q", query.as_str()),
                ("fields", fields.as_str()),
                ("pageSize", page_size.as_str()),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ];
            if let Some(ref token) = page_token {
                params.push(("pageToken", token.as_str()));
            }

            let page: FilesListResponse = match self.client.get_optional("files", &params).await? {
                Some(page) => page,
                None => return Err(ApiError::NotFound(format!("folder {}", folder_id))),
            };
            files.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        info!(folder_id = %folder_id, count = files.len(), "Listed source folder");
        Ok(files)
    }

    #[instrument(skip(self), fields(destination = %destination.display()))]
    async fn download_to(&self, file_id: &str, destination: &Path) -> ApiResult<u64> {
        let path = format!("files/{}", urlencoding::encode(file_id));
        let request = self
            .client
            .request(Method::GET, &path)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]);
        let response = self.client.send(Method::GET, &path, request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(format!("file {}", file_id)));
        }
        let response = self.client.check_status(Method::GET, &path, response).await?;

        let partial = Self::partial_path(destination);
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(source) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(ApiError::Transport {
                        url: self.client.build_url(&path),
                        source,
                    });
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&partial, destination).await?;

        debug!(file_id = %file_id, bytes = written, "Downloaded source file");
        Ok(written)
    }
}
