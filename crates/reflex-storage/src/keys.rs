//! Destination key generation shared by all backends.

use crate::traits::{StorageError, StorageResult};

/// Build the destination key `{prefix}/{file_name}`.
///
/// The file name must be a single path segment; the prefix may be empty.
pub fn destination_key(prefix: &str, file_name: &str) -> StorageResult<String> {
    if file_name.is_empty()
        || file_name.contains('/')
        || file_name.contains('\\')
        || file_name.contains("..")
    {
        return Err(StorageError::InvalidKey(format!(
            "File name is not a single path segment: {}",
            file_name
        )));
    }

    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        Ok(file_name.to_string())
    } else {
        Ok(format!("{}/{}", prefix, file_name))
    }
}

/// Reject keys that could escape the bucket or base directory.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            storage_key
        )));
    }
    Ok(())
}
