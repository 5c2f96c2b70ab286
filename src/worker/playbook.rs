//! Playbook worker: a scripted review that exercises the whole engine.
//!
//! The coordinator delegates one specialist per domain, then one report
//! formatter fed with the specialists' results, then completes. Specialists
//! replay their scripted actions one step at a time. The formatter writes
//! the report.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ConfigError, WorkerError};
use crate::task::{ActionOutcome, ChildResult, ChildSpec, ResumeToken, TaskRole, TaskStatus};
use crate::tools::GatedAction;
use crate::worker::{TaskContext, Worker, WorkerOutcome};

fn default_required() -> bool {
    true
}

fn default_report_path() -> String {
    "final_report.md".to_string()
}

/// One analysis domain and the actions its specialist performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainPlan {
    pub name: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub actions: Vec<GatedAction>,
    #[serde(default = "default_required")]
    pub required: bool,
}

/// A complete scripted review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub domains: Vec<DomainPlan>,
    #[serde(default = "default_report_path")]
    pub report_path: String,
}

impl Playbook {
    /// Load a playbook from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// The standard due-diligence review: survey the data room in four
    /// domains and write findings for each.
    pub fn standard_review() -> Self {
        let domain = |name: &str, file: &str, instructions: &str| DomainPlan {
            name: name.to_string(),
            instructions: instructions.to_string(),
            actions: vec![
                GatedAction::LookupDocumentSummary {
                    document_ids: Vec::new(),
                },
                GatedAction::WriteFile {
                    path: file.to_string(),
                    content: format!("# {}\n\n{}\n", name, instructions),
                },
            ],
            required: true,
        };

        Self {
            domains: vec![
                domain(
                    "Corporate governance",
                    "governance_risks.md",
                    "Analyze the corporate governance structure and compliance.",
                ),
                domain(
                    "Commercial contracts",
                    "contract_risks.md",
                    "Review commercial contracts for key terms and liabilities.",
                ),
                domain(
                    "Intellectual property",
                    "ip_risks.md",
                    "Assess intellectual property portfolio and protections.",
                ),
                domain(
                    "Regulatory compliance",
                    "regulatory_risks.md",
                    "Evaluate regulatory compliance status.",
                ),
            ],
            report_path: default_report_path(),
        }
    }
}

/// Worker that plays every role from a [`Playbook`].
pub struct PlaybookWorker {
    playbook: Playbook,
}

impl PlaybookWorker {
    pub fn new(playbook: Playbook) -> Self {
        Self { playbook }
    }

    fn coordinate(&self, ctx: &TaskContext) -> WorkerOutcome {
        let specialists: Vec<&ChildResult> = ctx
            .children
            .iter()
            .filter(|c| c.role == TaskRole::AnalysisSpecialist)
            .collect();
        let formatter = ctx
            .children
            .iter()
            .find(|c| c.role == TaskRole::ReportFormatter);

        if ctx.children.is_empty() && !self.playbook.domains.is_empty() {
            let specs = self
                .playbook
                .domains
                .iter()
                .map(|d| {
                    let input = json!({
                        "domain": d.name,
                        "instructions": d.instructions,
                        "actions": d.actions,
                    });
                    if d.required {
                        ChildSpec::required(TaskRole::AnalysisSpecialist, input)
                    } else {
                        ChildSpec::best_effort(TaskRole::AnalysisSpecialist, input)
                    }
                })
                .collect();
            return WorkerOutcome::SpawnChildren(specs);
        }

        let Some(formatter) = formatter else {
            let findings: Vec<serde_json::Value> = specialists
                .iter()
                .map(|c| {
                    json!({
                        "domain": c.input.get("domain").cloned().unwrap_or_default(),
                        "status": c.status,
                        "output": c.output,
                        "failure": c.failure.as_ref().map(|f| f.to_string()),
                    })
                })
                .collect();
            return WorkerOutcome::SpawnChildren(vec![ChildSpec::required(
                TaskRole::ReportFormatter,
                json!({
                    "report_path": self.playbook.report_path,
                    "findings": findings,
                }),
            )]);
        };

        let completed = specialists
            .iter()
            .filter(|c| c.status == TaskStatus::Completed)
            .count();
        WorkerOutcome::Completed(json!({
            "domains": specialists.len(),
            "domains_completed": completed,
            "findings": specialists.iter().map(|c| &c.output).collect::<Vec<_>>(),
            "report": formatter.output,
        }))
    }

    fn analyse(&self, ctx: &TaskContext) -> Result<WorkerOutcome, WorkerError> {
        let actions: Vec<GatedAction> = match ctx.input.get("actions") {
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| WorkerError::InvalidInput(format!("actions: {}", e)))?,
            None => Vec::new(),
        };

        if let Some(next) = actions.get(ctx.history.len()) {
            return Ok(WorkerOutcome::GatedAction(next.clone()));
        }

        Ok(WorkerOutcome::Completed(json!({
            "domain": ctx.input.get("domain").cloned().unwrap_or_default(),
            "results": ctx.history.iter().map(summarize).collect::<Vec<_>>(),
        })))
    }

    fn format_report(&self, ctx: &TaskContext) -> Result<WorkerOutcome, WorkerError> {
        let path = ctx
            .input
            .get("report_path")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.playbook.report_path)
            .to_string();

        match ctx.history.last() {
            None => {
                let findings = ctx
                    .input
                    .get("findings")
                    .and_then(|v| v.as_array())
                    .cloned()
                    .unwrap_or_default();
                Ok(WorkerOutcome::GatedAction(GatedAction::WriteFile {
                    path,
                    content: render_report(&findings),
                }))
            }
            Some(token) => {
                let written = matches!(token.outcome, ActionOutcome::Executed { .. });
                Ok(WorkerOutcome::Completed(json!({
                    "report_path": path,
                    "written": written,
                    "result": summarize(token),
                })))
            }
        }
    }
}

#[async_trait]
impl Worker for PlaybookWorker {
    fn name(&self) -> &str {
        "playbook"
    }

    async fn step(&self, ctx: TaskContext) -> Result<WorkerOutcome, WorkerError> {
        match ctx.role {
            TaskRole::Coordinator => Ok(self.coordinate(&ctx)),
            TaskRole::AnalysisSpecialist => self.analyse(&ctx),
            TaskRole::ReportFormatter => self.format_report(&ctx),
        }
    }
}

fn summarize(token: &ResumeToken) -> serde_json::Value {
    json!({
        "action": token.action.kind(),
        "outcome": token.outcome,
    })
}

/// Render findings as a markdown report.
fn render_report(findings: &[serde_json::Value]) -> String {
    let mut out = String::from("# Legal Risk Analysis Report\n\n## Executive Summary\n\n");
    out.push_str(&format!("{} domain(s) reviewed.\n\n", findings.len()));

    for finding in findings {
        let domain = finding
            .get("domain")
            .and_then(|v| v.as_str())
            .unwrap_or("Unnamed domain");
        let status = finding
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        out.push_str(&format!("## {}\n\nStatus: {}\n\n", domain, status));

        if let Some(failure) = finding.get("failure").and_then(|v| v.as_str()) {
            out.push_str(&format!("Not completed: {}\n\n", failure));
        }
        if let Some(results) = finding
            .get("output")
            .and_then(|o| o.get("results"))
            .and_then(|r| r.as_array())
        {
            for result in results {
                let action = result.get("action").and_then(|v| v.as_str()).unwrap_or("?");
                let status = result
                    .get("outcome")
                    .and_then(|o| o.get("status"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("?");
                out.push_str(&format!("- {}: {}\n", action, status));
            }
            out.push('\n');
        }
    }
    out
}
