//! Delivery inventory reconciliation.
//!
//! Counts deliverable images per order from replayed contents records and
//! flags orders whose delivery folder yields nothing.

use std::collections::BTreeMap;

use serde::Serialize;

use reflex_core::models::{FolderAllowList, FolderContents};

use crate::consumer::ContentsHandler;
use crate::record::ContentsRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderInventory {
    pub order_id: String,
    pub delivery_link: Option<String>,
    pub requirement_items: usize,
    pub total_images: usize,
    /// Direct and sub-folder images of the archive folder
    pub archive_images: usize,
    pub submission_images: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub orders: usize,
    pub total_images: usize,
    pub zero_image_orders: usize,
    /// Zero images and no counted sub-folder either: likely a broken delivery link
    pub broken_link_orders: usize,
}

/// Per-order image totals; the latest record for an order wins
pub struct InventoryAudit {
    allow_list: FolderAllowList,
    filter_folders: bool,
    orders: BTreeMap<String, OrderInventory>,
    broken_links: BTreeMap<String, bool>,
}

impl InventoryAudit {
    /// With `filter_folders` only allow-listed sub-folders count
    pub fn new(allow_list: FolderAllowList, filter_folders: bool) -> Self {
        Self {
            allow_list,
            filter_folders,
            orders: BTreeMap::new(),
            broken_links: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, record: &ContentsRecord) {
        let contents = &record.contents.delivery;
        let counted: Vec<_> = contents
            .folders
            .iter()
            .filter(|folder| !self.filter_folders || self.allow_list.matches(&folder.name))
            .collect();
        let total_images =
            contents.images.len() + counted.iter().map(|f| f.images.len()).sum::<usize>();

        let inventory = OrderInventory {
            order_id: record.order.id.clone(),
            delivery_link: record.order.delivery.gdrive.clone(),
            requirement_items: record.order.requirement_items.len(),
            total_images,
            archive_images: all_images(&record.contents.archive),
            submission_images: record.contents.submissions.iter().map(all_images).sum(),
        };
        if total_images == 0 {
            tracing::debug!(order_id = %inventory.order_id, "Order delivery has no images");
        }
        self.broken_links
            .insert(inventory.order_id.clone(), total_images == 0 && counted.is_empty());
        self.orders.insert(inventory.order_id.clone(), inventory);
    }

    pub fn orders(&self) -> impl Iterator<Item = &OrderInventory> {
        self.orders.values()
    }

    pub fn zero_image_orders(&self) -> impl Iterator<Item = &OrderInventory> {
        self.orders.values().filter(|o| o.total_images == 0)
    }

    pub fn broken_link_orders(&self) -> impl Iterator<Item = &OrderInventory> {
        self.orders
            .values()
            .filter(|o| self.broken_links.get(&o.order_id).copied().unwrap_or(false))
    }

    pub fn summary(&self) -> AuditSummary {
        AuditSummary {
            orders: self.orders.len(),
            total_images: self.orders.values().map(|o| o.total_images).sum(),
            zero_image_orders: self.zero_image_orders().count(),
            broken_link_orders: self.broken_link_orders().count(),
        }
    }
}

fn all_images(contents: &FolderContents) -> usize {
    contents.images.len() + contents.folders.iter().map(|f| f.images.len()).sum::<usize>()
}

impl ContentsHandler for InventoryAudit {
    fn handle(&mut self, record: &ContentsRecord) {
        self.record(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_core::models::{Delivery, FileMeta, FolderEntry, Order, OrderContents, Party};

    fn image(id: &str) -> FileMeta {
        FileMeta {
            id: id.into(),
            name: format!("{}.jpg", id),
            mime_type: "image/jpeg".into(),
            size: None,
            web_view_link: None,
            web_content_link: None,
            image_media_metadata: None,
        }
    }

    fn folder(name: &str, images: usize) -> FolderEntry {
        FolderEntry {
            id: name.to_lowercase(),
            name: name.into(),
            images: (0..images).map(|i| image(&format!("{}-{}", name, i))).collect(),
        }
    }

    fn record(order_id: &str, images: usize, folders: Vec<FolderEntry>) -> ContentsRecord {
        let party = Party {
            id: "p".into(),
            slug: "p".into(),
            title: "p".into(),
            description: String::new(),
        };
        ContentsRecord::new(
            Order {
                id: order_id.into(),
                slug: order_id.into(),
                title: order_id.into(),
                description: String::new(),
                customer: party.clone(),
                project: party,
                requirement_items: Vec::new(),
                delivery: Delivery {
                    gdrive: Some(format!("https://drive.google.com/drive/folders/{}", order_id)),
                    archive: None,
                },
                assignments: Vec::new(),
            },
            OrderContents {
                delivery: FolderContents {
                    images: (0..images).map(|i| image(&format!("{}-{}", order_id, i))).collect(),
                    folders,
                    ..FolderContents::default()
                },
                ..OrderContents::default()
            },
        )
    }

    #[test]
    fn test_counts_allow_listed_folders() {
        let mut audit = InventoryAudit::new(FolderAllowList::default(), true);
        audit.record(&record("o-1", 2, vec![folder("Originals", 3), folder("Rejects", 5)]));
        audit.record(&record("o-2", 0, vec![folder("Rejects", 1)]));
        audit.record(&record("o-3", 0, vec![folder("PRINT", 0)]));

        let totals: Vec<_> = audit.orders().map(|o| (o.order_id.as_str(), o.total_images)).collect();
        assert_eq!(totals, vec![("o-1", 5), ("o-2", 0), ("o-3", 0)]);

        let summary = audit.summary();
        assert_eq!(summary.total_images, 5);
        assert_eq!(summary.zero_image_orders, 2);
        assert_eq!(summary.broken_link_orders, 1);
        let broken: Vec<_> = audit.broken_link_orders().map(|o| o.order_id.as_str()).collect();
        assert_eq!(broken, vec!["o-2"]);
    }

    #[test]
    fn test_archive_and_submissions_counted_apart() {
        let mut audit = InventoryAudit::new(FolderAllowList::default(), true);
        let mut rec = record("o-1", 1, Vec::new());
        rec.contents.archive = FolderContents {
            images: vec![image("raw-1")],
            folders: vec![folder("Rejects", 2)],
            ..FolderContents::default()
        };
        rec.contents.submissions = vec![
            FolderContents {
                images: vec![image("s-1"), image("s-2")],
                ..FolderContents::default()
            },
            FolderContents::default(),
        ];
        audit.record(&rec);

        let inventory = audit.orders().next().unwrap();
        assert_eq!(inventory.total_images, 1);
        assert_eq!(inventory.archive_images, 3);
        assert_eq!(inventory.submission_images, 2);
    }

    #[test]
    fn test_unfiltered_counts_every_folder() {
        let mut audit = InventoryAudit::new(FolderAllowList::default(), false);
        audit.record(&record("o-1", 1, vec![folder("Rejects", 4)]));
        assert_eq!(audit.summary().total_images, 5);
    }
}
