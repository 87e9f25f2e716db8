use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payload::NormalizedRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScanSource {
    Live,
    Upload,
}

impl ScanSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanSource::Live => "Live",
            ScanSource::Upload => "Upload",
        }
    }
}

/// A completed scan as persisted and presented: where it came from, the raw
/// decoded text, and the normalized record built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: String,
    pub scanned_at: DateTime<Utc>,
    pub source: ScanSource,
    pub raw_payload: String,
    pub record: NormalizedRecord,
}

impl ScanRecord {
    pub fn new(source: ScanSource, raw_payload: String, record: NormalizedRecord) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scanned_at: Utc::now(),
            source,
            raw_payload,
            record,
        }
    }
}
