//! Toolbox: the capability set a session runs with.

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::tools::builtin::{DataRoom, FindingsStore, WebResearch};
use crate::tools::{ActionKind, Capabilities};

/// Composes the built-in backends. Any backend may be absent, in which case
/// its actions report [`CapabilityError::Unavailable`].
#[derive(Default)]
pub struct Toolbox {
    dataroom: Option<DataRoom>,
    web: Option<WebResearch>,
    findings: Option<FindingsStore>,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataroom(mut self, dataroom: DataRoom) -> Self {
        self.dataroom = Some(dataroom);
        self
    }

    pub fn with_web(mut self, web: WebResearch) -> Self {
        self.web = Some(web);
        self
    }

    pub fn with_findings(mut self, findings: FindingsStore) -> Self {
        self.findings = Some(findings);
        self
    }

    fn dataroom(&self, kind: ActionKind) -> Result<&DataRoom, CapabilityError> {
        self.dataroom
            .as_ref()
            .ok_or_else(|| CapabilityError::Unavailable(kind.to_string()))
    }

    fn web(&self, kind: ActionKind) -> Result<&WebResearch, CapabilityError> {
        self.web
            .as_ref()
            .ok_or_else(|| CapabilityError::Unavailable(kind.to_string()))
    }

    fn findings(&self, kind: ActionKind) -> Result<&FindingsStore, CapabilityError> {
        self.findings
            .as_ref()
            .ok_or_else(|| CapabilityError::Unavailable(kind.to_string()))
    }
}

#[async_trait]
impl Capabilities for Toolbox {
    async fn lookup_document_summary(
        &self,
        document_ids: &[String],
    ) -> Result<serde_json::Value, CapabilityError> {
        Ok(self
            .dataroom(ActionKind::LookupDocumentSummary)?
            .document_summaries(document_ids))
    }

    async fn lookup_page_summary(
        &self,
        document_ids: &[String],
    ) -> Result<serde_json::Value, CapabilityError> {
        self.dataroom(ActionKind::LookupPageSummary)?
            .page_summaries(document_ids)
    }

    async fn lookup_page_image(
        &self,
        document_id: &str,
        page_numbers: &[u32],
    ) -> Result<serde_json::Value, CapabilityError> {
        self.dataroom(ActionKind::LookupPageImage)?
            .page_images(document_id, page_numbers)
            .await
    }

    async fn web_search(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<serde_json::Value, CapabilityError> {
        self.web(ActionKind::WebSearch)?
            .search(query, max_results)
            .await
    }

    async fn web_fetch(&self, url: &str) -> Result<serde_json::Value, CapabilityError> {
        self.web(ActionKind::WebFetch)?.fetch(url).await
    }

    async fn write_file(
        &self,
        path: &str,
        content: &str,
    ) -> Result<serde_json::Value, CapabilityError> {
        self.findings(ActionKind::WriteFile)?
            .write(path, content)
            .await
    }

    async fn edit_file(
        &self,
        path: &str,
        old_string: &str,
        new_string: &str,
        replace_all: bool,
    ) -> Result<serde_json::Value, CapabilityError> {
        self.findings(ActionKind::EditFile)?
            .edit(path, old_string, new_string, replace_all)
            .await
    }

    async fn read_file(&self, path: &str) -> Result<serde_json::Value, CapabilityError> {
        self.findings(ActionKind::ReadFile)?.read(path).await
    }
}
