use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::constants::{
    CONTENT_TYPE_CUSTOMER, CONTENT_TYPE_ORDER, CONTENT_TYPE_PROJECT, CONTENT_TYPE_REQUIREMENT,
};

/// Catalog resource families addressed by the REST client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogResource {
    Collections,
    Assets,
}

impl CatalogResource {
    pub fn path(&self) -> &'static str {
        match self {
            CatalogResource::Collections => "collections",
            CatalogResource::Assets => "assets",
        }
    }
}

impl Display for CatalogResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.path())
    }
}

/// Level of a collection in the catalog hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Customer,
    Project,
    Order,
    Requirement,
}

impl CollectionKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            CollectionKind::Customer => CONTENT_TYPE_CUSTOMER,
            CollectionKind::Project => CONTENT_TYPE_PROJECT,
            CollectionKind::Order => CONTENT_TYPE_ORDER,
            CollectionKind::Requirement => CONTENT_TYPE_REQUIREMENT,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            CONTENT_TYPE_CUSTOMER => Some(CollectionKind::Customer),
            CONTENT_TYPE_PROJECT => Some(CollectionKind::Project),
            CONTENT_TYPE_ORDER => Some(CollectionKind::Order),
            CONTENT_TYPE_REQUIREMENT => Some(CollectionKind::Requirement),
            _ => None,
        }
    }
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CollectionKind::Customer => write!(f, "customer"),
            CollectionKind::Project => write!(f, "project"),
            CollectionKind::Order => write!(f, "order"),
            CollectionKind::Requirement => write!(f, "requirement"),
        }
    }
}

/// Source folder linkage stored on requirement collections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriveLinkage {
    pub folder_id: String,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdrive: Option<DriveLinkage>,
}

/// Catalog collection record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content_type: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<CollectionProperties>,
    /// Assigned by the catalog; either bare ids or nested records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<serde_json::Value>,
}

impl Collection {
    pub fn kind(&self) -> Option<CollectionKind> {
        CollectionKind::from_content_type(&self.content_type)
    }

    pub fn is_requirement(&self) -> bool {
        self.kind() == Some(CollectionKind::Requirement)
    }

    pub fn child_ids(&self) -> Vec<String> {
        self.children
            .iter()
            .filter_map(|child| match child {
                serde_json::Value::String(id) => Some(id.clone()),
                serde_json::Value::Object(map) => {
                    map.get("id").and_then(|v| v.as_str()).map(String::from)
                }
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalLinks {
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub download: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AssetProperties {
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub external_links: ExternalLinks,
}

/// Catalog asset record
///
/// Fields the pipeline does not model are kept in `extra` so that a
/// membership update writes the record back unchanged apart from `collections`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub id: String,
    /// Source file id; the idempotency key
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content_type: String,
    pub source_path: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default, deserialize_with = "de_size", skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default)]
    pub properties: AssetProperties,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Asset {
    /// Append a collection to the membership set; returns false when already present
    pub fn add_collection(&mut self, collection_id: &str) -> bool {
        if self.collections.iter().any(|c| c == collection_id) {
            return false;
        }
        self.collections.push(collection_id.to_string());
        true
    }
}

/// Sizes arrive as decimal strings from the file host and as numbers from the catalog.
pub(crate) fn de_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
    }

    match Option::<Size>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Size::Number(n)) => Ok(Some(n)),
        Some(Size::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
