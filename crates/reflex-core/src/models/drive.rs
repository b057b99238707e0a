use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_DELIVERY_FOLDER_NAMES;
use crate::models::catalog::de_size;

/// One file listed in a source folder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default, deserialize_with = "de_size")]
    pub size: Option<u64>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub web_content_link: Option<String>,
    #[serde(default)]
    pub image_media_metadata: Option<serde_json::Value>,
}

impl FileMeta {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}

/// Sub-folder of a listed folder, with its own images when sub-folders were expanded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FolderEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<FileMeta>,
}

/// Classified listing of a source folder
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FolderContents {
    #[serde(default)]
    pub images: Vec<FileMeta>,
    #[serde(default)]
    pub videos: Vec<FileMeta>,
    #[serde(default)]
    pub other_files: Vec<FileMeta>,
    #[serde(default)]
    pub folders: Vec<FolderEntry>,
}

/// Every source folder of an order: delivery, archive and one per submission
///
/// A folder the order does not link to stays empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderContents {
    #[serde(default)]
    pub delivery: FolderContents,
    #[serde(default)]
    pub archive: FolderContents,
    #[serde(default)]
    pub submissions: Vec<FolderContents>,
}

impl FolderContents {
    /// Direct images plus the images of every allow-listed sub-folder
    pub fn deliverable_images(&self, allow_list: &FolderAllowList) -> Vec<FileMeta> {
        let mut images = self.images.clone();
        for folder in self.matching_folders(allow_list) {
            images.extend(folder.images.iter().cloned());
        }
        images
    }

    pub fn matching_folders<'a>(
        &'a self,
        allow_list: &'a FolderAllowList,
    ) -> impl Iterator<Item = &'a FolderEntry> + 'a {
        self.folders
            .iter()
            .filter(move |folder| allow_list.matches(&folder.name))
    }
}

/// Names of sub-folders whose contents count as deliverables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderAllowList {
    names: Vec<String>,
}

impl FolderAllowList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| normalize_folder_name(name.as_ref()))
            .filter(|name| !name.is_empty())
            .collect();
        Self { names }
    }

    pub fn matches(&self, folder_name: &str) -> bool {
        let normalized = normalize_folder_name(folder_name);
        self.names.iter().any(|name| *name == normalized)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for FolderAllowList {
    fn default() -> Self {
        Self::new(DEFAULT_DELIVERY_FOLDER_NAMES)
    }
}

fn normalize_folder_name(name: &str) -> String {
    name.trim().to_lowercase()
}
