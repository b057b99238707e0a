//! Order and file listing fixtures

use reflex_core::constants::{CONTENT_TYPE_ORDER, FOLDER_MIME_TYPE};
use reflex_core::models::{Collection, Delivery, FileMeta, Order, Party, RequirementItem};

/// Folder id behind the delivery link of [`order_fixture`]
pub const DELIVERY_FOLDER_ID: &str = "delivery-folder-1";

pub fn file_meta(id: &str, name: &str, mime_type: &str) -> FileMeta {
    FileMeta {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        size: Some(1024),
        web_view_link: Some(format!("https://drive.google.com/file/d/{}/view", id)),
        web_content_link: Some(format!("https://drive.google.com/uc?id={}", id)),
        image_media_metadata: None,
    }
}

pub fn folder_meta(id: &str, name: &str) -> FileMeta {
    FileMeta {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: FOLDER_MIME_TYPE.to_string(),
        size: None,
        web_view_link: None,
        web_content_link: None,
        image_media_metadata: None,
    }
}

fn party(id: &str, slug: &str, title: &str) -> Party {
    Party {
        id: id.to_string(),
        slug: slug.to_string(),
        title: title.to_string(),
        description: String::new(),
    }
}

/// Order without requirement items delivered into [`DELIVERY_FOLDER_ID`]
pub fn order_fixture() -> Order {
    Order {
        id: "order-1".to_string(),
        slug: "1708-0001".to_string(),
        title: "Spring shoot".to_string(),
        description: String::new(),
        customer: party("customer-1", "acme", "ACME"),
        project: party("project-1", "spring-campaign", "Spring campaign"),
        requirement_items: Vec::new(),
        delivery: Delivery {
            gdrive: Some(format!(
                "https://drive.google.com/drive/folders/{}",
                DELIVERY_FOLDER_ID
            )),
            archive: None,
        },
        assignments: Vec::new(),
    }
}

pub fn requirement_item(id: &str, name: Option<&str>, folder_id: &str) -> RequirementItem {
    RequirementItem {
        id: id.to_string(),
        name: name.map(String::from),
        category: "Interior".to_string(),
        description: None,
        tags: vec!["interior".to_string()],
        folder_id: folder_id.to_string(),
        parent_folder_id: None,
    }
}

/// Order-level collection as the catalog would return it
pub fn order_collection(id: &str, tags: &[&str]) -> Collection {
    Collection {
        id: id.to_string(),
        slug: id.to_string(),
        title: id.to_string(),
        description: String::new(),
        content_type: CONTENT_TYPE_ORDER.to_string(),
        parent_id: Some("project-1".to_string()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        properties: None,
        children: Vec::new(),
    }
}
