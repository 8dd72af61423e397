use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{ResourceId, UserId};

/// An uploaded reference document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub id: ResourceId,
    pub user_id: UserId,
    pub filename: String,
    pub file_path: String,
    pub file_type: String,
    pub topic: Option<String>,
    #[serde(skip_serializing)]
    pub extracted_text: String,
    pub processed: bool,
    pub embeddings_generated: bool,
    pub uploaded_at: DateTime<Utc>,
}

impl Resource {
    #[must_use]
    pub fn text_len(&self) -> usize {
        self.extracted_text.chars().count()
    }
}

/// One embedded window of a resource's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceChunk {
    pub resource_id: ResourceId,
    pub ordinal: u32,
    pub text: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
}
