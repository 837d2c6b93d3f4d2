//! Gallery entry records as stored and returned by the backends.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;

use super::embeddings::{bytes_to_embedding, json_to_metadata};

/// Free-form key/value metadata attached to an entry
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One enrolled embedding. Entries are immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryEntry {
    pub id: i64,
    pub label: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

/// Undecoded row, shared by the SQLite and PostgreSQL backends
pub(crate) struct RawEntry {
    pub id: i64,
    pub label: String,
    pub embedding: Vec<u8>,
    pub metadata: String,
    pub created_at: String,
}

impl RawEntry {
    pub(crate) fn decode(self) -> Result<GalleryEntry, StoreError> {
        let embedding = bytes_to_embedding(self.id, &self.embedding)?;
        let metadata = json_to_metadata(self.id, &self.metadata)?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt {
                id: self.id,
                reason: format!("bad created_at {:?}: {}", self.created_at, e),
            })?;

        Ok(GalleryEntry {
            id: self.id,
            label: self.label,
            embedding,
            metadata,
            created_at,
        })
    }
}

/// Timestamp format written by both backends
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}
