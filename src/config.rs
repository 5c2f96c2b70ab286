//! Configuration types.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::task::TaskRole;
use crate::tools::ActionKind;

/// Default ceiling on page image retrievals per session.
pub const DEFAULT_PAGE_RETRIEVAL_LIMIT: u32 = 50;

/// Default ceiling on web page fetches per session.
pub const DEFAULT_WEB_FETCH_LIMIT: u32 = 20;

/// Default ceiling on orchestrator loop iterations per session.
pub const DEFAULT_ITERATION_LIMIT: u32 = 50;

/// Session configuration: quotas, loop ceiling, and per-role approval gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Maximum page image retrievals for the whole session.
    pub page_retrieval_limit: u32,
    /// Maximum web page fetches for the whole session.
    pub web_fetch_limit: u32,
    /// Maximum orchestrator loop iterations before the session aborts.
    pub iteration_limit: u32,
    /// Actions that need a reviewer's decision, per task role.
    pub gated_actions: BTreeMap<TaskRole, BTreeSet<ActionKind>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut gated_actions = BTreeMap::new();
        gated_actions.insert(TaskRole::Coordinator, BTreeSet::new());
        gated_actions.insert(
            TaskRole::AnalysisSpecialist,
            BTreeSet::from([
                ActionKind::LookupPageSummary,
                ActionKind::WebFetch,
                ActionKind::WriteFile,
                ActionKind::EditFile,
            ]),
        );
        gated_actions.insert(
            TaskRole::ReportFormatter,
            BTreeSet::from([ActionKind::WriteFile]),
        );

        Self {
            page_retrieval_limit: DEFAULT_PAGE_RETRIEVAL_LIMIT,
            web_fetch_limit: DEFAULT_WEB_FETCH_LIMIT,
            iteration_limit: DEFAULT_ITERATION_LIMIT,
            gated_actions,
        }
    }
}

impl SessionConfig {
    /// Load a configuration from a JSON file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DATAROOM_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str, current: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(current)
        };
        self.page_retrieval_limit = parse("DATAROOM_PAGE_LIMIT", self.page_retrieval_limit);
        self.web_fetch_limit = parse("DATAROOM_FETCH_LIMIT", self.web_fetch_limit);
        self.iteration_limit = parse("DATAROOM_ITERATION_LIMIT", self.iteration_limit);
        self
    }

    /// Reject configurations that could never make progress.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iteration_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "iterationLimit".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Whether `action` needs a reviewer's decision when requested by a task of `role`.
    pub fn requires_approval(&self, role: TaskRole, action: ActionKind) -> bool {
        self.gated_actions
            .get(&role)
            .is_some_and(|actions| actions.contains(&action))
    }

    /// Keys whose values differ from `other`, in their JSON spelling.
    pub fn differences(&self, other: &SessionConfig) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.page_retrieval_limit != other.page_retrieval_limit {
            keys.push("pageRetrievalLimit");
        }
        if self.web_fetch_limit != other.web_fetch_limit {
            keys.push("webFetchLimit");
        }
        if self.iteration_limit != other.iteration_limit {
            keys.push("iterationLimit");
        }
        if self.gated_actions != other.gated_actions {
            keys.push("gatedActions");
        }
        keys
    }

    /// Builder-style override of the gated set for one role.
    pub fn with_gated(mut self, role: TaskRole, actions: impl IntoIterator<Item = ActionKind>) -> Self {
        self.gated_actions.insert(role, actions.into_iter().collect());
        self
    }
}
