//! Capabilities available to workers, as a closed set of actions.
//!
//! Every action a worker may request is a [`GatedAction`] variant. The
//! orchestrator checks quota and approval policy per [`ActionKind`] and then
//! dispatches through [`execute`] to a [`Capabilities`] implementation.

pub mod builtin;
pub mod toolbox;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;
use crate::quota::ResourceClass;

pub use toolbox::Toolbox;

fn default_max_results() -> u32 {
    5
}

/// An action a worker asks the orchestrator to perform on its behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "args", rename_all = "snake_case")]
pub enum GatedAction {
    /// Document-level summaries. An empty id list means every document.
    LookupDocumentSummary {
        #[serde(default)]
        document_ids: Vec<String>,
    },
    /// Page-by-page summaries of the given documents.
    LookupPageSummary { document_ids: Vec<String> },
    /// Page images of one document.
    LookupPageImage {
        document_id: String,
        page_numbers: Vec<u32>,
    },
    WebSearch {
        query: String,
        #[serde(default = "default_max_results")]
        max_results: u32,
    },
    WebFetch { url: String },
    WriteFile { path: String, content: String },
    EditFile {
        path: String,
        old_string: String,
        new_string: String,
        #[serde(default)]
        replace_all: bool,
    },
    ReadFile { path: String },
}

impl GatedAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::LookupDocumentSummary { .. } => ActionKind::LookupDocumentSummary,
            Self::LookupPageSummary { .. } => ActionKind::LookupPageSummary,
            Self::LookupPageImage { .. } => ActionKind::LookupPageImage,
            Self::WebSearch { .. } => ActionKind::WebSearch,
            Self::WebFetch { .. } => ActionKind::WebFetch,
            Self::WriteFile { .. } => ActionKind::WriteFile,
            Self::EditFile { .. } => ActionKind::EditFile,
            Self::ReadFile { .. } => ActionKind::ReadFile,
        }
    }

    /// Quota class this action consumes, if any.
    pub fn resource_class(&self) -> Option<ResourceClass> {
        match self {
            Self::LookupPageImage { .. } => Some(ResourceClass::PageRetrieval),
            Self::WebFetch { .. } => Some(ResourceClass::ExternalFetch),
            _ => None,
        }
    }

    /// Units of quota this action consumes. Every requested page counts.
    pub fn quota_amount(&self) -> u32 {
        match self {
            Self::LookupPageImage { page_numbers, .. } => {
                u32::try_from(page_numbers.len()).unwrap_or(u32::MAX).max(1)
            }
            Self::WebFetch { .. } => 1,
            _ => 0,
        }
    }

    /// The action's arguments as a JSON object.
    pub fn args(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("args").map(serde_json::Value::take))
            .unwrap_or(serde_json::Value::Null)
    }

    /// Replace the arguments, keeping the action kind.
    pub fn with_edited_args(&self, args: serde_json::Value) -> Result<Self, CapabilityError> {
        let tagged = serde_json::json!({
            "action": self.kind().name(),
            "args": args,
        });
        serde_json::from_value(tagged)
            .map_err(|e| CapabilityError::InvalidParameters(format!("{}: {}", self.kind(), e)))
    }
}

/// Action names, without arguments. Used for approval policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    LookupDocumentSummary,
    LookupPageSummary,
    LookupPageImage,
    WebSearch,
    WebFetch,
    WriteFile,
    EditFile,
    ReadFile,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LookupDocumentSummary => "lookup_document_summary",
            Self::LookupPageSummary => "lookup_page_summary",
            Self::LookupPageImage => "lookup_page_image",
            Self::WebSearch => "web_search",
            Self::WebFetch => "web_fetch",
            Self::WriteFile => "write_file",
            Self::EditFile => "edit_file",
            Self::ReadFile => "read_file",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Concrete capability backends.
///
/// Every method defaults to [`CapabilityError::Unavailable`], so an
/// implementation only provides what its session needs.
#[async_trait]
pub trait Capabilities: Send + Sync {
    async fn lookup_document_summary(
        &self,
        _document_ids: &[String],
    ) -> Result<serde_json::Value, CapabilityError> {
        Err(CapabilityError::Unavailable(ActionKind::LookupDocumentSummary.to_string()))
    }

    async fn lookup_page_summary(
        &self,
        _document_ids: &[String],
    ) -> Result<serde_json::Value, CapabilityError> {
        Err(CapabilityError::Unavailable(ActionKind::LookupPageSummary.to_string()))
    }

    async fn lookup_page_image(
        &self,
        _document_id: &str,
        _page_numbers: &[u32],
    ) -> Result<serde_json::Value, CapabilityError> {
        Err(CapabilityError::Unavailable(ActionKind::LookupPageImage.to_string()))
    }

    async fn web_search(
        &self,
        _query: &str,
        _max_results: u32,
    ) -> Result<serde_json::Value, CapabilityError> {
        Err(CapabilityError::Unavailable(ActionKind::WebSearch.to_string()))
    }

    async fn web_fetch(&self, _url: &str) -> Result<serde_json::Value, CapabilityError> {
        Err(CapabilityError::Unavailable(ActionKind::WebFetch.to_string()))
    }

    async fn write_file(
        &self,
        _path: &str,
        _content: &str,
    ) -> Result<serde_json::Value, CapabilityError> {
        Err(CapabilityError::Unavailable(ActionKind::WriteFile.to_string()))
    }

    async fn edit_file(
        &self,
        _path: &str,
        _old_string: &str,
        _new_string: &str,
        _replace_all: bool,
    ) -> Result<serde_json::Value, CapabilityError> {
        Err(CapabilityError::Unavailable(ActionKind::EditFile.to_string()))
    }

    async fn read_file(&self, _path: &str) -> Result<serde_json::Value, CapabilityError> {
        Err(CapabilityError::Unavailable(ActionKind::ReadFile.to_string()))
    }
}

/// Run an action against a capability backend.
pub async fn execute(
    capabilities: &dyn Capabilities,
    action: &GatedAction,
) -> Result<serde_json::Value, CapabilityError> {
    let start = std::time::Instant::now();
    let result = match action {
        GatedAction::LookupDocumentSummary { document_ids } => {
            capabilities.lookup_document_summary(document_ids).await
        }
        GatedAction::LookupPageSummary { document_ids } => {
            capabilities.lookup_page_summary(document_ids).await
        }
        GatedAction::LookupPageImage {
            document_id,
            page_numbers,
        } => capabilities.lookup_page_image(document_id, page_numbers).await,
        GatedAction::WebSearch { query, max_results } => {
            capabilities.web_search(query, *max_results).await
        }
        GatedAction::WebFetch { url } => capabilities.web_fetch(url).await,
        GatedAction::WriteFile { path, content } => capabilities.write_file(path, content).await,
        GatedAction::EditFile {
            path,
            old_string,
            new_string,
            replace_all,
        } => {
            capabilities
                .edit_file(path, old_string, new_string, *replace_all)
                .await
        }
        GatedAction::ReadFile { path } => capabilities.read_file(path).await,
    };

    match &result {
        Ok(_) => tracing::debug!(
            action = %action.kind(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Action executed"
        ),
        Err(e) => tracing::warn!(action = %action.kind(), error = %e, "Action failed"),
    }
    result
}
