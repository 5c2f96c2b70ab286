//! Read-only access to a preprocessed data room.
//!
//! The index is produced offline: one entry per document with a summary and
//! per-page summaries, and a rendered PNG per page stored relative to the
//! data room's base directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::fs;

use crate::error::CapabilityError;

/// Aggregate counts written by the preprocessor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    #[serde(default)]
    pub total_documents: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    pub page_number: u32,
    pub summary_description: String,
    /// Rendered page image, relative to the data room base directory.
    pub image_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub document_id: String,
    pub title: String,
    pub document_type: String,
    pub summary_description: String,
    pub page_count: u32,
    #[serde(default)]
    pub pages: Vec<PageEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataRoomIndex {
    #[serde(default)]
    pub metadata: IndexMetadata,
    pub documents: Vec<DocumentEntry>,
}

/// A loaded data room index plus the directory its page images live in.
#[derive(Debug, Clone)]
pub struct DataRoom {
    base_dir: PathBuf,
    metadata: IndexMetadata,
    documents: Vec<DocumentEntry>,
    by_id: HashMap<String, usize>,
}

impl DataRoom {
    pub fn new(index: DataRoomIndex, base_dir: impl Into<PathBuf>) -> Self {
        let by_id = index
            .documents
            .iter()
            .enumerate()
            .map(|(i, d)| (d.document_id.clone(), i))
            .collect();
        Self {
            base_dir: base_dir.into(),
            metadata: index.metadata,
            documents: index.documents,
            by_id,
        }
    }

    /// Load an index file. Page images resolve against `base_dir`.
    pub async fn load(index_path: &Path, base_dir: impl Into<PathBuf>) -> Result<Self, CapabilityError> {
        let raw = fs::read_to_string(index_path).await.map_err(|e| {
            CapabilityError::NotFound(format!(
                "Data room index {}: {}",
                index_path.display(),
                e
            ))
        })?;
        let index: DataRoomIndex = serde_json::from_str(&raw).map_err(|e| {
            CapabilityError::InvalidParameters(format!("Malformed data room index: {}", e))
        })?;

        let room = Self::new(index, base_dir);
        tracing::info!(
            documents = room.documents.len(),
            pages = room.metadata.total_pages,
            "Loaded data room"
        );
        Ok(room)
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn documents(&self) -> &[DocumentEntry] {
        &self.documents
    }

    pub fn document(&self, id: &str) -> Option<&DocumentEntry> {
        self.by_id.get(id).map(|&i| &self.documents[i])
    }

    /// Document-level summaries. An empty id list lists every document;
    /// unknown ids are skipped.
    pub fn document_summaries(&self, document_ids: &[String]) -> serde_json::Value {
        let selected: Vec<&DocumentEntry> = if document_ids.is_empty() {
            self.documents.iter().collect()
        } else {
            document_ids.iter().filter_map(|id| self.document(id)).collect()
        };

        let documents: Vec<serde_json::Value> = selected
            .into_iter()
            .map(|doc| {
                json!({
                    "id": doc.document_id,
                    "title": doc.title,
                    "document_type": doc.document_type,
                    "summary_description": doc.summary_description,
                    "page_count": doc.page_count,
                })
            })
            .collect();

        json!({ "count": documents.len(), "documents": documents })
    }

    /// Page-by-page summaries. Unknown ids are skipped, but at least one
    /// requested document must exist.
    pub fn page_summaries(&self, document_ids: &[String]) -> Result<serde_json::Value, CapabilityError> {
        if document_ids.is_empty() {
            return Err(CapabilityError::InvalidParameters(
                "Please provide at least one document ID".to_string(),
            ));
        }

        let mut result = serde_json::Map::new();
        for id in document_ids {
            let Some(doc) = self.document(id) else {
                continue;
            };
            let pages: Vec<serde_json::Value> = doc
                .pages
                .iter()
                .map(|p| json!({ "page_number": p.page_number, "summary": p.summary_description }))
                .collect();
            result.insert(
                id.clone(),
                json!({
                    "title": doc.title,
                    "document_type": doc.document_type,
                    "summary": doc.summary_description,
                    "pages": pages,
                }),
            );
        }

        if result.is_empty() {
            return Err(CapabilityError::NotFound(format!(
                "None of the requested documents were found: {}",
                document_ids.join(", ")
            )));
        }
        Ok(serde_json::Value::Object(result))
    }

    /// Base64 PNG data URLs for pages of one document.
    ///
    /// A missing page or image file is reported per page; the call fails
    /// only when the document itself is unknown.
    pub async fn page_images(
        &self,
        document_id: &str,
        page_numbers: &[u32],
    ) -> Result<serde_json::Value, CapabilityError> {
        if page_numbers.is_empty() {
            return Err(CapabilityError::InvalidParameters(
                "Please specify at least one page number".to_string(),
            ));
        }
        let doc = self
            .document(document_id)
            .ok_or_else(|| CapabilityError::NotFound(format!("Document {} not found", document_id)))?;

        let mut pages = Vec::with_capacity(page_numbers.len());
        let mut retrieved = 0usize;
        for &number in page_numbers {
            let Some(page) = doc.pages.iter().find(|p| p.page_number == number) else {
                pages.push(json!({
                    "page_number": number,
                    "error": format!("Page {} not found in document", number),
                }));
                continue;
            };

            let image_path = self.base_dir.join(&page.image_path);
            match fs::read(&image_path).await {
                Ok(bytes) => {
                    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                    retrieved += 1;
                    pages.push(json!({
                        "page_number": number,
                        "summary": page.summary_description,
                        "image_data": format!("data:image/png;base64,{}", encoded),
                    }));
                }
                Err(e) => {
                    tracing::debug!(path = %image_path.display(), error = %e, "Page image unavailable");
                    pages.push(json!({
                        "page_number": number,
                        "error": format!("Image file not found: {}", image_path.display()),
                    }));
                }
            }
        }

        Ok(json!({
            "document_id": document_id,
            "title": doc.title,
            "retrieved": retrieved,
            "pages": pages,
        }))
    }
}
