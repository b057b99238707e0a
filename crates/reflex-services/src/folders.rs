//! Source folder enumeration.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument};

use reflex_api_client::{ApiResult, SourceDrive};
use reflex_core::constants::FOLDER_MIME_TYPE;
use reflex_core::models::{
    FileMeta, FolderAllowList, FolderContents, FolderEntry, Order, OrderContents,
};

/// Lists a folder's direct files and, optionally, the images of each sub-folder.
///
/// Read-only. A missing or unparsable folder reference is reported by the drive
/// client as a non-recoverable error; throttling and outages stay recoverable.
pub struct FolderEnumerator {
    drive: Arc<dyn SourceDrive>,
    allow_list: FolderAllowList,
}

impl FolderEnumerator {
    pub fn new(drive: Arc<dyn SourceDrive>, allow_list: FolderAllowList) -> Self {
        Self { drive, allow_list }
    }

    pub fn allow_list(&self) -> &FolderAllowList {
        &self.allow_list
    }

    /// Classify the children of `folder_ref`
    ///
    /// With `extract_id` the reference is a sharing link. With `include_subfolders`
    /// every sub-folder is listed one level deep and its images attached to its entry.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        folder_ref: &str,
        extract_id: bool,
        include_subfolders: bool,
    ) -> ApiResult<FolderContents> {
        let folder_id = if extract_id {
            self.drive.resolve_id_from_share_url(folder_ref)?
        } else {
            folder_ref.to_string()
        };

        let mut contents = FolderContents::default();
        let mut sub_folders = Vec::new();
        for file in self.drive.list_folder(&folder_id).await? {
            if file.mime_type == FOLDER_MIME_TYPE {
                sub_folders.push(file);
            } else if file.is_image() {
                contents.images.push(file);
            } else if file.is_video() {
                contents.videos.push(file);
            } else {
                contents.other_files.push(file);
            }
        }

        if include_subfolders {
            let listings = join_all(
                sub_folders
                    .iter()
                    .map(|folder| self.drive.list_folder(&folder.id)),
            )
            .await;
            for (folder, listing) in sub_folders.into_iter().zip(listings) {
                let images: Vec<FileMeta> =
                    listing?.into_iter().filter(FileMeta::is_image).collect();
                debug!(folder = %folder.name, images = images.len(), "Listed sub-folder");
                contents.folders.push(FolderEntry {
                    id: folder.id,
                    name: folder.name,
                    images,
                });
            }
        } else {
            contents.folders = sub_folders
                .into_iter()
                .map(|folder| FolderEntry {
                    id: folder.id,
                    name: folder.name,
                    images: Vec::new(),
                })
                .collect();
        }

        info!(
            folder_id = %folder_id,
            images = contents.images.len(),
            videos = contents.videos.len(),
            folders = contents.folders.len(),
            "Folder enumerated"
        );
        Ok(contents)
    }

    /// Delivery, archive and submission folders of `order`, sub-folders expanded
    #[instrument(skip_all, fields(order_id = %order.id))]
    pub async fn order_contents(&self, order: &Order) -> ApiResult<OrderContents> {
        let mut contents = OrderContents::default();
        if let Ok(link) = order.delivery_link() {
            contents.delivery = self.list(link, true, true).await?;
        }
        if let Some(link) = order.archive_link() {
            contents.archive = self.list(link, true, true).await?;
        }
        for link in order.submission_links() {
            contents.submissions.push(self.list(link, true, true).await?);
        }
        Ok(contents)
    }

    /// Direct images plus the images of allow-listed sub-folders
    pub async fn deliverable_images(
        &self,
        folder_ref: &str,
        extract_id: bool,
    ) -> ApiResult<Vec<FileMeta>> {
        let contents = self.list(folder_ref, extract_id, true).await?;
        Ok(contents.deliverable_images(&self.allow_list))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{file_meta, folder_meta, order_fixture, MockDrive};
    use reflex_core::models::Assignment;
    use reflex_api_client::ApiError;

    fn enumerator(drive: &Arc<MockDrive>) -> FolderEnumerator {
        FolderEnumerator::new(drive.clone(), FolderAllowList::default())
    }

    #[tokio::test]
    async fn test_classifies_children() {
        let drive = Arc::new(MockDrive::new());
        drive.add_folder(
            "root-folder",
            vec![
                file_meta("i1", "a.jpg", "image/jpeg"),
                file_meta("v1", "clip.mov", "video/quicktime"),
                file_meta("p1", "brief.pdf", "application/pdf"),
                folder_meta("d1", "Originals"),
            ],
        );
        drive.add_folder("d1", vec![file_meta("i2", "b.png", "image/png")]);

        let contents = enumerator(&drive)
            .list("root-folder", false, false)
            .await
            .unwrap();

        assert_eq!(contents.images.len(), 1);
        assert_eq!(contents.videos.len(), 1);
        assert_eq!(contents.other_files.len(), 1);
        assert_eq!(contents.folders.len(), 1);
        assert!(contents.folders[0].images.is_empty());
        assert_eq!(drive.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_only_allow_listed_subfolders_are_flattened() {
        let drive = Arc::new(MockDrive::new());
        drive.add_folder(
            "delivery-folder",
            vec![
                file_meta("i1", "a.jpg", "image/jpeg"),
                folder_meta("d1", "  Originals "),
                folder_meta("d2", "Rejected"),
            ],
        );
        drive.add_folder(
            "d1",
            vec![
                file_meta("i2", "b.jpg", "image/jpeg"),
                file_meta("x1", "notes.txt", "text/plain"),
            ],
        );
        drive.add_folder("d2", vec![file_meta("i3", "c.jpg", "image/jpeg")]);

        let images = enumerator(&drive)
            .deliverable_images("https://drive.google.com/drive/folders/delivery-folder", true)
            .await
            .unwrap();

        let ids: Vec<_> = images.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "i2"]);
    }

    #[tokio::test]
    async fn test_order_contents_covers_archive_and_submissions() {
        let drive = Arc::new(MockDrive::new());
        drive.add_folder(
            "delivery-folder",
            vec![file_meta("i1", "a.jpg", "image/jpeg"), folder_meta("d1", "Originals")],
        );
        drive.add_folder("d1", vec![file_meta("i2", "b.jpg", "image/jpeg")]);
        drive.add_folder("archive-folder", vec![file_meta("r1", "raw.CR2", "image/x-canon-cr2")]);
        drive.add_folder("submission-1", vec![file_meta("s1", "s.jpg", "image/jpeg")]);

        let mut order = order_fixture();
        order.delivery.gdrive = Some("https://drive.google.com/drive/folders/delivery-folder".into());
        order.delivery.archive = Some("https://drive.google.com/drive/folders/archive-folder".into());
        order.assignments = vec![
            Assignment {
                id: "a-1".into(),
                submission_path: Some("https://drive.google.com/drive/folders/submission-1".into()),
            },
            Assignment {
                id: "a-2".into(),
                submission_path: None,
            },
        ];

        let contents = enumerator(&drive).order_contents(&order).await.unwrap();

        assert_eq!(contents.delivery.images.len(), 1);
        assert_eq!(contents.delivery.folders[0].images.len(), 1);
        assert_eq!(contents.archive.images[0].id, "r1");
        assert_eq!(contents.submissions.len(), 1);
        assert_eq!(contents.submissions[0].images[0].id, "s1");
    }

    #[tokio::test]
    async fn test_order_contents_without_links_is_empty() {
        let drive = Arc::new(MockDrive::new());
        let mut order = order_fixture();
        order.delivery.gdrive = None;

        let contents = enumerator(&drive).order_contents(&order).await.unwrap();

        assert_eq!(contents, OrderContents::default());
        assert_eq!(drive.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_folder_is_fatal() {
        let drive = Arc::new(MockDrive::new());
        let err = enumerator(&drive)
            .list("missing", false, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_share_link() {
        let drive = Arc::new(MockDrive::new());
        let err = enumerator(&drive)
            .list("not a link", true, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidShareUrl(_)));
        assert_eq!(drive.list_calls(), 0);
    }
}
