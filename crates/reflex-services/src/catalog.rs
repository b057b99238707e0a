//! Catalog upsert engine.
//!
//! Collections are keyed by the source entity id and assets by the source file id
//! (their slug). Every write is preceded by a read, so running the same order twice
//! creates nothing new. The read-then-write is not atomic: two workers racing on the
//! same unseen file can both create it. The next run finds the first record by slug
//! and links it, which is accepted over coordinating writers.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use reflex_api_client::CatalogApi;
use reflex_core::constants::PROVENANCE_TAGS;
use reflex_core::models::{
    file_name_for, staging_directory, Asset, AssetProperties, CatalogResource, Collection,
    CollectionKind, CollectionProperties, DriveLinkage, ExternalLinks, FileMeta, Order,
    TransferJob,
};
use reflex_core::slug::slugify;
use reflex_core::{Config, ModelError, TaskError};
use reflex_storage::destination_key;

/// Collections resolved for one order
#[derive(Debug, Clone)]
pub struct OrderCollections {
    /// The order collection as the catalog returns it, children included
    pub order: Collection,
    /// One entry per requirement item, in the order's item order
    pub requirements: Vec<Collection>,
}

pub struct CatalogUpsert {
    catalog: Arc<dyn CatalogApi>,
    root_id: String,
    actor_id: String,
    staging_root: PathBuf,
    assets_prefix: String,
}

impl CatalogUpsert {
    pub fn new(
        catalog: Arc<dyn CatalogApi>,
        root_id: impl Into<String>,
        actor_id: impl Into<String>,
        staging_root: impl Into<PathBuf>,
        assets_prefix: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            root_id: root_id.into(),
            actor_id: actor_id.into(),
            staging_root: staging_root.into(),
            assets_prefix: assets_prefix.into(),
        }
    }

    pub fn from_config(catalog: Arc<dyn CatalogApi>, config: &Config) -> Self {
        Self::new(
            catalog,
            config.catalog_root_id(),
            config.catalog_actor_id(),
            config.staging_path().clone(),
            config.assets_prefix(),
        )
    }

    /// Make sure customer, project, order and requirement collections exist
    ///
    /// The chain is walked from the root; each missing node is created under the id
    /// the previous node resolved to.
    #[instrument(skip_all, fields(order_id = %order.id))]
    pub async fn ensure_collections(&self, order: &Order) -> Result<OrderCollections, TaskError> {
        let levels = [
            (
                CollectionKind::Customer,
                &order.customer.id,
                &order.customer.slug,
                &order.customer.title,
                &order.customer.description,
            ),
            (
                CollectionKind::Project,
                &order.project.id,
                &order.project.slug,
                &order.project.title,
                &order.project.description,
            ),
            (
                CollectionKind::Order,
                &order.id,
                &order.slug,
                &order.title,
                &order.description,
            ),
        ];

        let mut parent_id = self.root_id.clone();
        for (kind, id, slug, title, description) in levels {
            let resolved = match self.get_collection(id).await? {
                Some(existing) => {
                    debug!(kind = %kind, collection_id = %existing.id, "Collection already present");
                    existing
                }
                None => {
                    let record = Collection {
                        id: id.clone(),
                        slug: slug.clone(),
                        title: title.clone(),
                        description: description.clone(),
                        content_type: kind.content_type().to_string(),
                        parent_id: Some(parent_id.clone()),
                        tags: vec![kind.to_string()],
                        properties: None,
                        children: Vec::new(),
                    };
                    self.create_collection(&record).await?
                }
            };
            parent_id = resolved.id;
        }
        let order_collection_id = parent_id;

        let mut requirements = Vec::with_capacity(order.requirement_items.len());
        for (index, item) in order.requirement_items.iter().enumerate() {
            let resolved = match self.get_collection(&item.id).await? {
                Some(existing) => existing,
                None => {
                    let name = item
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("ItemName-{}", index));
                    let record = Collection {
                        id: item.id.clone(),
                        slug: slugify(&name),
                        title: item.category.clone(),
                        description: item.description.clone().unwrap_or_default(),
                        content_type: CollectionKind::Requirement.content_type().to_string(),
                        parent_id: Some(order_collection_id.clone()),
                        tags: item.tags.clone(),
                        properties: Some(CollectionProperties {
                            gdrive: Some(DriveLinkage {
                                folder_id: item.folder_id.clone(),
                                parent_folder_id: item.parent_folder_id.clone(),
                                created_by: self.actor_id.clone(),
                            }),
                        }),
                        children: Vec::new(),
                    };
                    self.create_collection(&record).await?
                }
            };
            requirements.push(resolved);
        }

        // Re-read so the order collection carries the children the catalog assigned.
        let order_collection = self
            .get_collection(&order_collection_id)
            .await?
            .ok_or_else(|| {
                TaskError::recoverable(anyhow::anyhow!(
                    "Order collection {} not readable after upsert",
                    order_collection_id
                ))
            })?;

        info!(
            collection_id = %order_collection.id,
            requirements = requirements.len(),
            "Order collections ensured"
        );
        Ok(OrderCollections {
            order: order_collection,
            requirements,
        })
    }

    /// Create or link the asset record for `file` and describe its transfer
    ///
    /// A new record gets a fresh id, the provenance tags followed by the collection's
    /// tags, and `collection` as its only member. An existing record gains
    /// `collection` in its membership when it is not already there.
    #[instrument(skip_all, fields(file_id = %file.id, collection_id = %collection.id))]
    pub async fn ensure_asset(
        &self,
        file: &FileMeta,
        collection: &Collection,
    ) -> Result<TransferJob, TaskError> {
        let matches = self
            .catalog
            .query(CatalogResource::Assets, &[("slug", file.id.as_str())])
            .await
            .map_err(TaskError::classify)?;

        let asset_id = match matches.first() {
            None => self.create_asset(file, collection).await?,
            Some(found) => {
                let asset_id = record_id(found, "asset")?;
                self.link_asset(&asset_id, collection).await?;
                asset_id
            }
        };

        let job = TransferJob::new(
            &asset_id,
            staging_directory(&self.staging_root, collection),
            file.clone(),
        );
        info!(
            asset_id = %asset_id,
            staging_path = %job.staging_path().display(),
            "Asset registered in catalog"
        );
        Ok(job)
    }

    async fn create_asset(&self, file: &FileMeta, collection: &Collection) -> Result<String, TaskError> {
        let mut asset = Asset {
            id: Uuid::new_v4().to_string(),
            slug: file.id.clone(),
            title: file.name.clone(),
            description: String::new(),
            content_type: file.mime_type.clone(),
            source_path: String::new(),
            tags: merge_tags(&collection.tags),
            collections: vec![collection.id.clone()],
            size: file.size,
            properties: AssetProperties {
                metadata: file.image_media_metadata.clone(),
                external_links: ExternalLinks {
                    view: file.web_view_link.clone(),
                    download: file.web_content_link.clone(),
                },
            },
            extra: serde_json::Map::new(),
        };
        asset.source_path = self.source_path(&asset.id, file)?;
        let payload = serde_json::to_value(&asset).map_err(TaskError::unrecoverable)?;

        let created = self
            .catalog
            .post(CatalogResource::Assets, &payload)
            .await
            .map_err(TaskError::classify)?;

        let assigned = match created.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() && id != asset.id => id.to_string(),
            _ => return Ok(asset.id),
        };

        // The upload key follows the catalog's id, so the stored path must too.
        asset.id = assigned;
        asset.source_path = self.source_path(&asset.id, file)?;
        let payload = serde_json::to_value(&asset).map_err(TaskError::unrecoverable)?;
        self.catalog
            .put(CatalogResource::Assets, &asset.id, &payload)
            .await
            .map_err(TaskError::classify)?;
        debug!(
            asset_id = %asset.id,
            source_path = %asset.source_path,
            "Source path realigned to catalog id"
        );
        Ok(asset.id)
    }

    fn source_path(&self, asset_id: &str, file: &FileMeta) -> Result<String, TaskError> {
        destination_key(&self.assets_prefix, &file_name_for(asset_id, file))
            .map_err(TaskError::classify)
    }

    async fn link_asset(&self, asset_id: &str, collection: &Collection) -> Result<(), TaskError> {
        let record = self
            .catalog
            .get(CatalogResource::Assets, asset_id)
            .await
            .map_err(TaskError::classify)?
            .ok_or_else(|| {
                TaskError::recoverable(anyhow::anyhow!(
                    "Asset {} listed by slug but not readable",
                    asset_id
                ))
            })?;
        let mut asset: Asset = serde_json::from_value(record)
            .map_err(|e| TaskError::classify(ModelError::invalid_payload("asset", e)))?;

        if !asset.add_collection(&collection.id) {
            debug!(asset_id = %asset_id, "Asset already member of collection");
            return Ok(());
        }

        let payload = serde_json::to_value(&asset).map_err(TaskError::unrecoverable)?;
        self.catalog
            .put(CatalogResource::Assets, asset_id, &payload)
            .await
            .map_err(TaskError::classify)?;
        info!(asset_id = %asset_id, members = asset.collections.len(), "Asset linked to collection");
        Ok(())
    }

    async fn get_collection(&self, id: &str) -> Result<Option<Collection>, TaskError> {
        let found = self
            .catalog
            .get(CatalogResource::Collections, id)
            .await
            .map_err(TaskError::classify)?;
        found.map(parse_collection).transpose()
    }

    async fn create_collection(&self, record: &Collection) -> Result<Collection, TaskError> {
        let payload = serde_json::to_value(record).map_err(TaskError::unrecoverable)?;
        let created = self
            .catalog
            .post(CatalogResource::Collections, &payload)
            .await
            .map_err(TaskError::classify)?;
        info!(
            collection_id = %record.id,
            content_type = %record.content_type,
            parent_id = record.parent_id.as_deref().unwrap_or_default(),
            "Collection created"
        );
        parse_collection(created)
    }
}

fn parse_collection(value: Value) -> Result<Collection, TaskError> {
    serde_json::from_value(value)
        .map_err(|e| TaskError::classify(ModelError::invalid_payload("collection", e)))
}

fn record_id(value: &Value, entity: &'static str) -> Result<String, TaskError> {
    value
        .get("id")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| TaskError::classify(ModelError::MissingField { entity, field: "id" }))
}

/// Provenance tags followed by the collection's, without repeats
fn merge_tags(collection_tags: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = PROVENANCE_TAGS.iter().map(|t| t.to_string()).collect();
    for tag in collection_tags {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
    tags
}
