use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Customer or project an order belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Party {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// One requirement of an order, delivered into its own source folder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequirementItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub folder_id: String,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
}

/// Photographer assignment; `submission_path` links the folder they uploaded to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub id: String,
    #[serde(default)]
    pub submission_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delivery {
    /// Sharing link of the delivery folder
    pub gdrive: Option<String>,
    #[serde(default)]
    pub archive: Option<String>,
}

/// Business order as published by the order service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub customer: Party,
    pub project: Party,
    #[serde(default)]
    pub requirement_items: Vec<RequirementItem>,
    pub delivery: Delivery,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl Order {
    /// Parse an order payload, failing on any missing required field
    pub fn from_value(value: serde_json::Value) -> Result<Self, ModelError> {
        serde_json::from_value(value).map_err(|e| ModelError::invalid_payload("order", e))
    }

    pub fn has_requirement_items(&self) -> bool {
        !self.requirement_items.is_empty()
    }

    /// Delivery folder link, required when the order has no requirement items
    pub fn delivery_link(&self) -> Result<&str, ModelError> {
        self.delivery
            .gdrive
            .as_deref()
            .filter(|link| !link.trim().is_empty())
            .ok_or(ModelError::MissingField {
                entity: "order",
                field: "delivery.gdrive",
            })
    }

    pub fn archive_link(&self) -> Option<&str> {
        non_blank(self.delivery.archive.as_deref())
    }

    /// Submission folder links of the assignments that have one
    pub fn submission_links(&self) -> Vec<&str> {
        self.assignments
            .iter()
            .filter_map(|a| non_blank(a.submission_path.as_deref()))
            .collect()
    }
}

fn non_blank(link: Option<&str>) -> Option<&str> {
    link.filter(|link| !link.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_json() -> serde_json::Value {
        json!({
            "id": "o-1",
            "slug": "order-1",
            "title": "Order 1",
            "customer": {"id": "c-1", "slug": "acme", "title": "Acme"},
            "project": {"id": "p-1", "slug": "spring", "title": "Spring", "description": "d"},
            "delivery": {"gdrive": "https://drive.google.com/drive/folders/abc"}
        })
    }

    #[test]
    fn test_parse_minimal_order() {
        let order = Order::from_value(order_json()).unwrap();
        assert_eq!(order.customer.description, "");
        assert!(!order.has_requirement_items());
        assert_eq!(
            order.delivery_link().unwrap(),
            "https://drive.google.com/drive/folders/abc"
        );
    }

    #[test]
    fn test_missing_customer_is_rejected() {
        let mut value = order_json();
        value.as_object_mut().unwrap().remove("customer");
        let err = Order::from_value(value).unwrap_err();
        assert!(matches!(err, ModelError::InvalidPayload { entity: "order", .. }));
    }

    #[test]
    fn test_archive_and_submission_links() {
        let mut value = order_json();
        value["delivery"]["archive"] = json!("https://drive.google.com/drive/folders/arc");
        value["assignments"] = json!([
            {"id": "a-1", "submission_path": "https://drive.google.com/drive/folders/s1"},
            {"id": "a-2", "submission_path": null},
            {"id": "a-3", "submission_path": ""}
        ]);
        let order = Order::from_value(value).unwrap();
        assert_eq!(order.archive_link(), Some("https://drive.google.com/drive/folders/arc"));
        assert_eq!(
            order.submission_links(),
            vec!["https://drive.google.com/drive/folders/s1"]
        );
        assert!(Order::from_value(order_json()).unwrap().submission_links().is_empty());
    }

    #[test]
    fn test_blank_delivery_link() {
        let mut value = order_json();
        value["delivery"] = json!({"gdrive": "  "});
        let order = Order::from_value(value).unwrap();
        assert!(order.delivery_link().is_err());
    }
}
