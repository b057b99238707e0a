use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::UNKNOWN_EXTENSION;
use crate::models::catalog::Collection;
use crate::models::drive::FileMeta;

/// Work item handed from the catalog upsert to the transfer pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferJob {
    /// Catalog id of the asset the file belongs to
    pub asset_id: String,
    /// Local staging directory for the download
    pub directory: PathBuf,
    /// `{asset_id}.{ext}`; also the last segment of the destination key
    pub file_name: String,
    pub file: FileMeta,
}

impl TransferJob {
    pub fn new(asset_id: &str, directory: PathBuf, file: FileMeta) -> Self {
        let file_name = file_name_for(asset_id, &file);
        Self {
            asset_id: asset_id.to_string(),
            directory,
            file_name,
            file,
        }
    }

    pub fn staging_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Extension derived from the MIME type, falling back to the file name
///
/// `image/jpeg` always maps to `jpg`; otherwise the last three characters of the
/// name are used verbatim when the name is long enough.
pub fn derive_extension(mime_type: &str, name: &str) -> String {
    if mime_type == "image/jpeg" {
        return "jpg".to_string();
    }
    let count = name.chars().count();
    if count >= 3 {
        name.chars().skip(count - 3).collect()
    } else {
        UNKNOWN_EXTENSION.to_string()
    }
}

pub fn file_name_for(asset_id: &str, file: &FileMeta) -> String {
    format!("{}.{}", asset_id, derive_extension(&file.mime_type, &file.name))
}

/// Staging directory for a file imported into `collection`
///
/// Requirement collections get their own directory under the order:
/// `{root}/{order_id}/{collection_id}`; order collections use `{root}/{order_id}`.
pub fn staging_directory(root: &Path, collection: &Collection) -> PathBuf {
    match (collection.is_requirement(), collection.parent_id.as_deref()) {
        (true, Some(order_id)) => root.join(order_id).join(&collection.id),
        _ => root.join(&collection.id),
    }
}
