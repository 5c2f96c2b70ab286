//! End-to-end session scenarios driven through the public API.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use dataroom_review::agent::{AbortReason, StepOutcome, checkpoint};
use dataroom_review::approval::{ApprovalDecision, ApprovalRequest};
use dataroom_review::channels::{AutoApprove, Reviewer};
use dataroom_review::config::SessionConfig;
use dataroom_review::error::{ApprovalError, CapabilityError, Error, WorkerError};
use dataroom_review::quota::ResourceClass;
use dataroom_review::task::{ActionOutcome, ChildSpec, TaskFailure, TaskRole, TaskStatus};
use dataroom_review::tools::builtin::{DataRoom, FindingsStore};
use dataroom_review::tools::{Capabilities, GatedAction, Toolbox};
use dataroom_review::worker::{
    DomainPlan, Playbook, PlaybookWorker, TaskContext, Worker, WorkerOutcome, WorkerRegistry,
};
use dataroom_review::{Orchestrator, SessionState, SessionStatus};

// ── Fakes ───────────────────────────────────────────────────────────────

/// Records every executed action and answers with a small canned result.
#[derive(Default)]
struct Recording {
    calls: Mutex<Vec<GatedAction>>,
}

#[async_trait]
impl Capabilities for Recording {
    async fn lookup_document_summary(
        &self,
        document_ids: &[String],
    ) -> Result<serde_json::Value, CapabilityError> {
        self.calls.lock().push(GatedAction::LookupDocumentSummary {
            document_ids: document_ids.to_vec(),
        });
        Ok(json!({ "documents": [] }))
    }

    async fn lookup_page_image(
        &self,
        document_id: &str,
        page_numbers: &[u32],
    ) -> Result<serde_json::Value, CapabilityError> {
        self.calls.lock().push(GatedAction::LookupPageImage {
            document_id: document_id.to_string(),
            page_numbers: page_numbers.to_vec(),
        });
        Ok(json!({ "retrieved": page_numbers.len() }))
    }

    async fn write_file(
        &self,
        path: &str,
        content: &str,
    ) -> Result<serde_json::Value, CapabilityError> {
        self.calls.lock().push(GatedAction::WriteFile {
            path: path.to_string(),
            content: content.to_string(),
        });
        Ok(json!({ "path": path, "bytes_written": content.len() }))
    }
}

/// Spawns one more coordinator on every invocation.
struct AlwaysSpawn {
    calls: AtomicU32,
}

#[async_trait]
impl Worker for AlwaysSpawn {
    fn name(&self) -> &str {
        "always-spawn"
    }

    async fn step(&self, _ctx: TaskContext) -> Result<WorkerOutcome, WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(WorkerOutcome::SpawnChildren(vec![ChildSpec::required(
            TaskRole::Coordinator,
            json!({}),
        )]))
    }
}

/// Coordinator spawns the named children once; children complete (or fail
/// when named "fail") and record the order they ran in.
struct Fanout {
    names: Vec<&'static str>,
    order: Mutex<Vec<String>>,
}

#[async_trait]
impl Worker for Fanout {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn step(&self, ctx: TaskContext) -> Result<WorkerOutcome, WorkerError> {
        if ctx.role == TaskRole::Coordinator {
            if ctx.children.is_empty() {
                let specs = self
                    .names
                    .iter()
                    .map(|n| ChildSpec::required(TaskRole::AnalysisSpecialist, json!({ "name": n })))
                    .collect();
                return Ok(WorkerOutcome::SpawnChildren(specs));
            }
            let seen: Vec<_> = ctx
                .children
                .iter()
                .map(|c| (c.input["name"].clone(), c.status))
                .collect();
            return Ok(WorkerOutcome::Completed(json!(seen)));
        }

        let name = ctx.input["name"].as_str().unwrap_or_default().to_string();
        self.order.lock().push(name.clone());
        if name == "fail" {
            return Err(WorkerError::Failed {
                reason: "cannot read exhibit".into(),
            });
        }
        Ok(WorkerOutcome::Completed(json!({ "name": name })))
    }
}

/// Behaves according to `input.script`:
/// - `spawn`: spawn `input.children` once, then complete
/// - `write`: request a write of `input.path`, then complete with the outcome
/// - `lookups`: look up `input.pages` page images one at a time, then complete
/// - `fail`: return a worker error
struct Scripted;

#[async_trait]
impl Worker for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn step(&self, ctx: TaskContext) -> Result<WorkerOutcome, WorkerError> {
        match ctx.input["script"].as_str().unwrap_or_default() {
            "spawn" if ctx.children.is_empty() => {
                let specs: Vec<ChildSpec> = serde_json::from_value(ctx.input["children"].clone())
                    .map_err(|e| WorkerError::InvalidInput(e.to_string()))?;
                Ok(WorkerOutcome::SpawnChildren(specs))
            }
            "write" => match ctx.history.last() {
                None => Ok(WorkerOutcome::GatedAction(GatedAction::WriteFile {
                    path: ctx.input["path"].as_str().unwrap_or("out.md").to_string(),
                    content: "findings".into(),
                })),
                Some(token) => Ok(WorkerOutcome::Completed(json!(token.outcome))),
            },
            "lookups" => {
                let pages = ctx.input["pages"].as_u64().unwrap_or(0) as usize;
                match page_lookups(pages).get(ctx.history.len()) {
                    Some(next) => Ok(WorkerOutcome::GatedAction(next.clone())),
                    None => Ok(WorkerOutcome::Completed(json!(pages))),
                }
            }
            "fail" => Err(WorkerError::Failed {
                reason: "exhibit unreadable".into(),
            }),
            _ => Ok(WorkerOutcome::Completed(json!("done"))),
        }
    }
}

fn scripted(role: TaskRole, required: bool, input: serde_json::Value) -> serde_json::Value {
    json!({ "role": role, "required": required, "input": input })
}

/// Answers from a fixed queue, then approves. Records refusals.
struct QueuedReviewer {
    answers: Mutex<VecDeque<ApprovalDecision>>,
    refused: Mutex<Vec<String>>,
}

impl QueuedReviewer {
    fn new(answers: impl IntoIterator<Item = ApprovalDecision>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            refused: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Reviewer for QueuedReviewer {
    async fn review(&self, _request: &ApprovalRequest) -> Option<ApprovalDecision> {
        Some(
            self.answers
                .lock()
                .pop_front()
                .unwrap_or(ApprovalDecision::Approve),
        )
    }

    async fn decision_refused(&self, _request: &ApprovalRequest, error: &ApprovalError) {
        self.refused.lock().push(error.to_string());
    }
}

/// Keeps sending the same unusable edit.
struct StubbornEditor;

#[async_trait]
impl Reviewer for StubbornEditor {
    async fn review(&self, _request: &ApprovalRequest) -> Option<ApprovalDecision> {
        Some(ApprovalDecision::Edit {
            edited_args: json!({ "pth": "typo.md" }),
        })
    }
}

fn orchestrator(worker: Arc<dyn Worker>, caps: Arc<dyn Capabilities>) -> Orchestrator {
    Orchestrator::new(WorkerRegistry::new().with_all(worker), caps)
}

fn page_lookups(n: usize) -> Vec<GatedAction> {
    (1..=n as u32)
        .map(|p| GatedAction::LookupPageImage {
            document_id: "doc_001".into(),
            page_numbers: vec![p],
        })
        .collect()
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[tokio::test]
async fn iteration_ceiling_aborts_after_exactly_that_many_steps() {
    let worker = Arc::new(AlwaysSpawn {
        calls: AtomicU32::new(0),
    });
    let orch = orchestrator(worker.clone(), Arc::new(Recording::default()));
    let config = SessionConfig {
        iteration_limit: 3,
        ..SessionConfig::default()
    };
    let mut session = orch
        .start_session(ChildSpec::required(TaskRole::Coordinator, json!({})), config)
        .unwrap();

    let outcome = orch.run_until_blocked(&mut session).await.unwrap();

    assert_eq!(outcome, StepOutcome::Finished(SessionStatus::Aborted));
    assert_eq!(worker.calls.load(Ordering::SeqCst), 3);
    assert_eq!(session.iteration, 3);
    assert_eq!(
        session.abort_reason,
        Some(AbortReason::IterationLimitExceeded { limit: 3 })
    );
    assert!(session.tree.nodes().all(|n| n.status.is_terminal()));
}

#[tokio::test]
async fn quota_exhaustion_aborts_required_task_and_session() {
    let caps = Arc::new(Recording::default());
    let orch = orchestrator(
        Arc::new(PlaybookWorker::new(Playbook::standard_review())),
        caps.clone(),
    );
    let config = SessionConfig {
        page_retrieval_limit: 1,
        ..SessionConfig::default()
    };
    let mut session = orch
        .start_session(
            ChildSpec::required(
                TaskRole::AnalysisSpecialist,
                json!({ "domain": "ip", "actions": page_lookups(2) }),
            ),
            config,
        )
        .unwrap();

    orch.run_until_blocked(&mut session).await.unwrap();

    assert_eq!(caps.calls.lock().len(), 1);
    let root = session.tree.root().unwrap();
    assert_eq!(root.status, TaskStatus::Aborted);
    assert_eq!(
        root.failure,
        Some(TaskFailure::QuotaExceeded {
            class: ResourceClass::PageRetrieval,
            requested: 1,
            remaining: 0,
        })
    );
    assert_eq!(session.status, SessionStatus::Aborted);
    assert!(matches!(
        session.abort_reason,
        Some(AbortReason::QuotaExhausted { remaining: 0, .. })
    ));
    assert_eq!(session.quotas.remaining(ResourceClass::PageRetrieval), Some(0));
}

#[tokio::test]
async fn best_effort_domain_aborts_alone_on_quota() {
    let caps = Arc::new(Recording::default());
    let playbook = Playbook {
        domains: vec![
            DomainPlan {
                name: "exhibits".into(),
                instructions: String::new(),
                actions: page_lookups(2),
                required: false,
            },
            DomainPlan {
                name: "governance".into(),
                instructions: String::new(),
                actions: vec![GatedAction::LookupDocumentSummary {
                    document_ids: Vec::new(),
                }],
                required: true,
            },
        ],
        report_path: "report.md".into(),
    };
    let orch = orchestrator(Arc::new(PlaybookWorker::new(playbook)), caps.clone());
    let config = SessionConfig {
        page_retrieval_limit: 1,
        ..SessionConfig::default()
    };
    let mut session = orch
        .start_session(ChildSpec::required(TaskRole::Coordinator, json!({})), config)
        .unwrap();

    let summary = orch.run(&mut session, &AutoApprove).await.unwrap();

    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(summary.root_status, Some(TaskStatus::Completed));
    assert_eq!(summary.failures.len(), 1);
    assert!(!summary.failures[0].required);
    assert!(matches!(
        summary.failures[0].reason,
        Some(TaskFailure::QuotaExceeded { .. })
    ));
    let output = session.root_output().unwrap();
    assert_eq!(output["domains"], 2);
    assert_eq!(output["domains_completed"], 1);
    assert_eq!(output["report"]["written"], true);
}

#[tokio::test]
async fn rejected_write_executes_nothing() {
    let caps = Arc::new(Recording::default());
    let orch = orchestrator(
        Arc::new(PlaybookWorker::new(Playbook::standard_review())),
        caps.clone(),
    );
    let mut session = orch
        .start_session(
            ChildSpec::required(
                TaskRole::ReportFormatter,
                json!({ "report_path": "final_report.md", "findings": [] }),
            ),
            SessionConfig::default(),
        )
        .unwrap();

    let request = match orch.run_until_blocked(&mut session).await.unwrap() {
        StepOutcome::AwaitingApproval(requests) => requests[0].clone(),
        other => panic!("expected approval, got {:?}", other),
    };
    assert!(matches!(request.action, GatedAction::WriteFile { .. }));

    orch.apply_decision(&mut session, request.id, ApprovalDecision::Reject)
        .await
        .unwrap();
    let outcome = orch.run_until_blocked(&mut session).await.unwrap();

    assert_eq!(outcome, StepOutcome::Finished(SessionStatus::Completed));
    assert!(caps.calls.lock().is_empty());
    let root = session.tree.root().unwrap();
    assert_eq!(root.history.len(), 1);
    assert_eq!(root.history[0].outcome, ActionOutcome::Rejected);
    assert_eq!(session.root_output().unwrap()["written"], false);
}

#[tokio::test]
async fn decision_cannot_be_applied_twice() {
    let orch = orchestrator(
        Arc::new(PlaybookWorker::new(Playbook::standard_review())),
        Arc::new(Recording::default()),
    );
    let mut session = orch
        .start_session(
            ChildSpec::required(TaskRole::ReportFormatter, json!({ "findings": [] })),
            SessionConfig::default(),
        )
        .unwrap();
    orch.run_until_blocked(&mut session).await.unwrap();
    let id = session.pending_approvals()[0].id;

    orch.apply_decision(&mut session, id, ApprovalDecision::Approve)
        .await
        .unwrap();
    let status_before = session.tree.root().unwrap().status;

    let err = orch
        .apply_decision(&mut session, id, ApprovalDecision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Approval(ApprovalError::UnknownRequest { id: e }) if e == id
    ));
    assert_eq!(session.tree.root().unwrap().status, status_before);
}

#[tokio::test]
async fn children_run_in_spawn_order_before_parent_completes() {
    let worker = Arc::new(Fanout {
        names: vec!["A", "B"],
        order: Mutex::new(Vec::new()),
    });
    let orch = orchestrator(worker.clone(), Arc::new(Recording::default()));
    let mut session = orch
        .start_session(
            ChildSpec::required(TaskRole::Coordinator, json!({})),
            SessionConfig::default(),
        )
        .unwrap();

    orch.run_until_blocked(&mut session).await.unwrap();

    assert_eq!(*worker.order.lock(), vec!["A".to_string(), "B".to_string()]);
    assert_eq!(session.status, SessionStatus::Completed);

    let root = session.tree.root().unwrap();
    assert_eq!(root.status, TaskStatus::Completed);
    assert_eq!(
        root.output,
        Some(json!([["A", "completed"], ["B", "completed"]]))
    );
    let root_finished = root.finished_at.unwrap();
    for child in &root.children {
        let child = session.tree.get(*child).unwrap();
        assert!(child.finished_at.unwrap() <= root_finished);
    }
}

#[tokio::test]
async fn required_child_failure_fails_parent_and_aborts_siblings() {
    let worker = Arc::new(Fanout {
        names: vec!["fail", "B"],
        order: Mutex::new(Vec::new()),
    });
    let orch = orchestrator(worker.clone(), Arc::new(Recording::default()));
    let mut session = orch
        .start_session(
            ChildSpec::required(TaskRole::Coordinator, json!({})),
            SessionConfig::default(),
        )
        .unwrap();

    orch.run_until_blocked(&mut session).await.unwrap();

    // B never ran.
    assert_eq!(*worker.order.lock(), vec!["fail".to_string()]);
    let summary = session.summary();
    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(summary.root_status, Some(TaskStatus::Failed));

    let root = session.tree.root().unwrap();
    assert!(matches!(root.failure, Some(TaskFailure::ChildFailed { .. })));
    let sibling = session.tree.get(root.children[1]).unwrap();
    assert_eq!(sibling.status, TaskStatus::Aborted);
    assert_eq!(
        sibling.failure,
        Some(TaskFailure::ParentFailed { parent: root.id })
    );
    assert_eq!(summary.failures.len(), 3);
}

fn two_writers() -> ChildSpec {
    ChildSpec::required(
        TaskRole::Coordinator,
        json!({
            "script": "spawn",
            "children": [
                scripted(TaskRole::AnalysisSpecialist, true, json!({ "script": "write", "path": "a.md" })),
                scripted(TaskRole::AnalysisSpecialist, true, json!({ "script": "write", "path": "b.md" })),
            ]
        }),
    )
}

#[tokio::test]
async fn refused_edit_is_asked_again_without_losing_earlier_decisions() {
    let caps = Arc::new(Recording::default());
    let orch = orchestrator(Arc::new(Scripted), caps.clone());
    let mut session = orch
        .start_session(two_writers(), SessionConfig::default())
        .unwrap();
    let reviewer = QueuedReviewer::new([
        ApprovalDecision::Approve,
        ApprovalDecision::Edit {
            edited_args: json!({ "pth": "typo.md" }),
        },
        ApprovalDecision::Edit {
            edited_args: json!({ "path": "b-final.md", "content": "reviewed" }),
        },
    ]);

    let summary = orch.run(&mut session, &reviewer).await.unwrap();

    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(summary.root_status, Some(TaskStatus::Completed));
    assert_eq!(reviewer.refused.lock().len(), 1);
    assert!(reviewer.refused.lock()[0].contains("path"));

    let written: Vec<String> = caps
        .calls
        .lock()
        .iter()
        .filter_map(|a| match a {
            GatedAction::WriteFile { path, .. } => Some(path.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(written, vec!["a.md".to_string(), "b-final.md".to_string()]);
}

#[tokio::test]
async fn repeated_refusals_suspend_with_request_pending() {
    let caps = Arc::new(Recording::default());
    let orch = orchestrator(Arc::new(Scripted), caps.clone());
    let mut session = orch
        .start_session(two_writers(), SessionConfig::default())
        .unwrap();

    let summary = orch.run(&mut session, &StubbornEditor).await.unwrap();

    assert_eq!(summary.status, SessionStatus::Running);
    assert_eq!(summary.pending_approvals, 2);
    assert!(caps.calls.lock().is_empty());

    // Still resumable with a usable decision.
    let summary = orch.run(&mut session, &AutoApprove).await.unwrap();
    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(caps.calls.lock().len(), 2);
}

#[tokio::test]
async fn failing_sibling_discards_pending_request() {
    let orch = orchestrator(Arc::new(Scripted), Arc::new(Recording::default()));
    let root = ChildSpec::required(
        TaskRole::Coordinator,
        json!({
            "script": "spawn",
            "children": [
                scripted(TaskRole::Coordinator, false, json!({
                    "script": "spawn",
                    "children": [
                        scripted(TaskRole::AnalysisSpecialist, true, json!({ "script": "write" })),
                        scripted(TaskRole::AnalysisSpecialist, true, json!({ "script": "fail" })),
                    ]
                })),
                scripted(TaskRole::AnalysisSpecialist, true, json!({ "script": "complete" })),
            ]
        }),
    );
    let mut session = orch.start_session(root, SessionConfig::default()).unwrap();

    // Root spawns, group spawns, the writer suspends.
    for _ in 0..3 {
        orch.step(&mut session).await.unwrap();
    }
    let pending = session.pending_approvals();
    assert_eq!(pending.len(), 1);
    let request = pending[0].clone();

    // The failing sibling takes its parent down with the suspended writer.
    orch.step(&mut session).await.unwrap();

    assert_eq!(session.status, SessionStatus::Running);
    assert!(session.pending_approvals().is_empty());
    let writer = session.tree.get(request.task_id).unwrap();
    assert_eq!(writer.status, TaskStatus::Aborted);
    let group = writer.parent.unwrap();
    assert_eq!(writer.failure, Some(TaskFailure::ParentFailed { parent: group }));
    assert_eq!(session.tree.get(group).unwrap().status, TaskStatus::Failed);

    let err = orch
        .apply_decision(&mut session, request.id, ApprovalDecision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Approval(ApprovalError::UnknownRequest { id }) if id == request.id
    ));

    // The best-effort group does not fail the root.
    orch.run_until_blocked(&mut session).await.unwrap();
    assert_eq!(session.summary().root_status, Some(TaskStatus::Completed));
}

#[tokio::test]
async fn session_abort_discards_pending_requests() {
    let caps = Arc::new(Recording::default());
    let orch = orchestrator(Arc::new(Scripted), caps.clone());
    let root = ChildSpec::required(
        TaskRole::Coordinator,
        json!({
            "script": "spawn",
            "children": [
                scripted(TaskRole::AnalysisSpecialist, true, json!({ "script": "write" })),
                scripted(TaskRole::AnalysisSpecialist, true, json!({ "script": "lookups", "pages": 2 })),
            ]
        }),
    );
    let config = SessionConfig {
        page_retrieval_limit: 1,
        ..SessionConfig::default()
    };
    let mut session = orch.start_session(root, config).unwrap();

    let outcome = orch.run_until_blocked(&mut session).await.unwrap();

    assert_eq!(outcome, StepOutcome::Finished(SessionStatus::Aborted));
    assert!(matches!(
        session.abort_reason,
        Some(AbortReason::QuotaExhausted { .. })
    ));
    assert!(session.pending_approvals().is_empty());
    assert_eq!(session.approvals.len(), 0);
    let writer = session
        .tree
        .nodes()
        .find(|n| n.input["script"] == "write")
        .unwrap();
    assert_eq!(writer.status, TaskStatus::Aborted);
    assert!(matches!(
        writer.failure,
        Some(TaskFailure::SessionAborted { .. })
    ));
    // Only the first lookup ran; the write was never executed.
    assert_eq!(caps.calls.lock().len(), 1);
}

// ── Full review against an on-disk data room ───────────────────────────

fn write_dataroom(dir: &std::path::Path) -> std::path::PathBuf {
    let index = json!({
        "metadata": { "total_documents": 1, "total_pages": 1, "total_tokens": 400 },
        "documents": [{
            "document_id": "doc_001",
            "title": "Shareholders Agreement",
            "document_type": "agreement",
            "summary_description": "Voting and transfer restrictions",
            "page_count": 1,
            "pages": [{
                "page_number": 1,
                "summary_description": "Drag-along clause",
                "image_path": "doc_001/page_1.png"
            }]
        }]
    });
    std::fs::create_dir_all(dir.join("doc_001")).unwrap();
    std::fs::write(dir.join("doc_001/page_1.png"), [0x89, b'P', b'N', b'G']).unwrap();
    let path = dir.join("data_room_index.json");
    std::fs::write(&path, index.to_string()).unwrap();
    path
}

async fn review_orchestrator(room: &std::path::Path, output: &std::path::Path) -> Orchestrator {
    let index = write_dataroom(room);
    let toolbox = Toolbox::new()
        .with_dataroom(DataRoom::load(&index, room).await.unwrap())
        .with_findings(FindingsStore::new(output));
    orchestrator(
        Arc::new(PlaybookWorker::new(Playbook::standard_review())),
        Arc::new(toolbox),
    )
}

fn review_root() -> ChildSpec {
    ChildSpec::required(TaskRole::Coordinator, json!({ "task": "review" }))
}

#[tokio::test]
async fn standard_review_writes_findings_and_report() {
    let room = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let orch = review_orchestrator(room.path(), output.path()).await;
    let mut session = orch
        .start_session(review_root(), SessionConfig::default())
        .unwrap();

    let summary = orch.run(&mut session, &AutoApprove).await.unwrap();

    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(summary.root_status, Some(TaskStatus::Completed));
    assert!(summary.failures.is_empty());
    assert_eq!(summary.tasks.total, 6);
    assert!(summary.iterations <= session.config.iteration_limit);

    for file in ["governance_risks.md", "contract_risks.md", "ip_risks.md", "regulatory_risks.md"] {
        assert!(output.path().join(file).exists(), "{file} missing");
    }
    let report = std::fs::read_to_string(output.path().join("final_report.md")).unwrap();
    assert!(report.contains("# Legal Risk Analysis Report"));
    assert!(report.contains("Corporate governance"));
    assert_eq!(session.root_output().unwrap()["domains_completed"], 4);
}

#[tokio::test]
async fn suspended_review_resumes_from_checkpoint() {
    let room = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let orch = review_orchestrator(room.path(), output.path()).await;
    let mut session = orch
        .start_session(review_root(), SessionConfig::default())
        .unwrap();

    let pending = match orch.run_until_blocked(&mut session).await.unwrap() {
        StepOutcome::AwaitingApproval(requests) => requests,
        other => panic!("expected approvals, got {:?}", other),
    };
    assert_eq!(pending.len(), 4);

    let path = output.path().join("checkpoint.json");
    checkpoint::save(&session, &path).await.unwrap();
    drop(session);

    let mut restored: SessionState = checkpoint::load(&path).await.unwrap();
    assert_eq!(restored.pending_approvals(), pending);

    let decisions = pending
        .iter()
        .map(|r| (r.id, ApprovalDecision::Approve))
        .collect();
    assert_eq!(orch.resume(&mut restored, decisions).await.unwrap(), 4);

    let summary = orch.run(&mut restored, &AutoApprove).await.unwrap();
    assert_eq!(summary.status, SessionStatus::Completed);
    assert!(output.path().join("final_report.md").exists());
}
