//! Document schemas for the provenance log

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

/// Collection name for completed conversions
pub const CONVERSIONS_COLLECTION: &str = "conversions";

/// One completed conversion, written once and never mutated.
///
/// Recovery lookups read these back filtered by license key and a recency
/// window.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ConversionRecord {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// License key the conversion was charged against
    pub license_key: String,

    /// Filename of the uploaded brushset, as received
    pub original_filename: String,

    /// Retrievable URL of the output pack
    pub download_url: String,

    /// Sink-relative path of the stored artifact
    pub storage_path: String,

    /// Insert timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl ConversionRecord {
    pub fn new(
        license_key: &str,
        original_filename: &str,
        download_url: &str,
        storage_path: &str,
    ) -> Self {
        Self {
            _id: None,
            license_key: license_key.to_string(),
            original_filename: original_filename.to_string(),
            download_url: download_url.to_string(),
            storage_path: storage_path.to_string(),
            created_at: None,
        }
    }

    /// Index definitions applied at collection setup
    pub fn indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "license_key": 1, "created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("license_recency".to_string())
                    .build(),
            ),
        )]
    }
}

/// Shape returned to clients by /api/recover-link.
#[derive(Serialize, Debug, Clone)]
pub struct RecoveredLink {
    #[serde(rename = "originalFilename")]
    pub original_filename: String,
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl From<ConversionRecord> for RecoveredLink {
    fn from(record: ConversionRecord) -> Self {
        Self {
            original_filename: record.original_filename,
            download_url: record.download_url,
            created_at: record
                .created_at
                .map(|dt| dt.try_to_rfc3339_string().unwrap_or_default())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_through_bson() {
        let record = ConversionRecord::new("KEY-1", "inks.brushset", "http://x/y.zip", "u/y.zip");
        let doc = bson::to_document(&record).unwrap();
        let back: ConversionRecord = bson::from_document(doc).unwrap();
        assert_eq!(back.license_key, "KEY-1");
        assert_eq!(back.original_filename, "inks.brushset");
    }

    #[test]
    fn recovered_link_serializes_camel_case() {
        let mut record = ConversionRecord::new("k", "a.brushset", "http://x", "p");
        record.created_at = Some(DateTime::now());
        let link = RecoveredLink::from(record);
        let json = serde_json::to_value(&link).unwrap();
        assert!(json.get("originalFilename").is_some());
        assert!(json.get("downloadUrl").is_some());
        assert!(json.get("createdAt").is_some());
    }
}
