//! Fixed catalog and pipeline constants

/// Catalog collection every customer collection hangs from unless overridden.
pub const DEFAULT_CATALOG_ROOT_ID: &str = "48f47fdc-922b-4aae-8388-0fb23a123fcc";

/// Tags every imported asset carries, ahead of its collection's tags.
pub const PROVENANCE_TAGS: [&str; 2] = ["gdrive", "image"];

/// Sub-folder names (lower-cased, trimmed) whose images count as deliverables.
pub const DEFAULT_DELIVERY_FOLDER_NAMES: [&str; 7] = [
    "originals",
    "original",
    "jpeg",
    "original sizes",
    "original size",
    "original format",
    "print",
];

pub const CONTENT_TYPE_CUSTOMER: &str = "application/collection.leica-customer";
pub const CONTENT_TYPE_PROJECT: &str = "application/collection.leica-project";
pub const CONTENT_TYPE_ORDER: &str = "application/collection.leica-order";
pub const CONTENT_TYPE_REQUIREMENT: &str = "application/collection.leica-order.requirement";

/// MIME type of folders in the source file-hosting service.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Extension used when neither the MIME type nor the file name yields one.
pub const UNKNOWN_EXTENSION: &str = "none";

/// Inbound event that triggers an order import.
pub const EVENT_ORDER_ACCEPTED: &str = "order.workflow.accept";
pub const EVENT_IMPORT_SUCCESS: &str = "reflex.import.assets.success";
pub const EVENT_IMPORT_FAILURE: &str = "reflex.import.assets.failure";
