use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde_json::json;

use dataroom_review::agent::checkpoint;
use dataroom_review::channels::{AutoApprove, CliReviewer, Reviewer};
use dataroom_review::config::SessionConfig;
use dataroom_review::task::{ChildSpec, TaskRole};
use dataroom_review::tools::Toolbox;
use dataroom_review::tools::builtin::{DataRoom, FindingsStore, WebResearch};
use dataroom_review::worker::{Playbook, PlaybookWorker, WorkerRegistry};
use dataroom_review::Orchestrator;

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let index_path = env_path("DATAROOM_INDEX", "./data_room_index.json");
    let output_dir = env_path("DATAROOM_OUTPUT_DIR", "./output");
    let checkpoint_path = std::env::var("DATAROOM_CHECKPOINT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| output_dir.join("session.json"));
    let auto_approve = env_flag("DATAROOM_AUTO_APPROVE");

    let config = match std::env::var("DATAROOM_CONFIG") {
        Ok(path) => SessionConfig::from_file(Path::new(&path))
            .with_context(|| format!("loading session config from {}", path))?,
        Err(_) => SessionConfig::default(),
    }
    .with_env_overrides();

    let playbook = match std::env::var("DATAROOM_PLAYBOOK") {
        Ok(path) => Playbook::from_file(Path::new(&path))
            .with_context(|| format!("loading playbook from {}", path))?,
        Err(_) => Playbook::standard_review(),
    };

    eprintln!("📁 Dataroom Review v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Index: {}", index_path.display());
    eprintln!("   Output: {}", output_dir.display());
    eprintln!(
        "   Reviewer: {}",
        if auto_approve { "auto-approve" } else { "interactive (type 'help')" }
    );

    // ── Capabilities ─────────────────────────────────────────────────────
    let mut toolbox = Toolbox::new().with_findings(FindingsStore::new(&output_dir));

    let base_dir = index_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    match DataRoom::load(&index_path, base_dir).await {
        Ok(dataroom) => toolbox = toolbox.with_dataroom(dataroom),
        Err(e) => tracing::warn!("Data room unavailable: {}", e),
    }

    let api_key = std::env::var("SEARCH_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .map(secrecy::SecretString::from);
    let mut web = WebResearch::new(api_key);
    if let Ok(url) = std::env::var("SEARCH_API_URL") {
        web = web.with_search_url(url);
    }
    toolbox = toolbox.with_web(web);

    // ── Orchestrator ─────────────────────────────────────────────────────
    let workers = WorkerRegistry::new().with_all(Arc::new(PlaybookWorker::new(playbook)));
    let orchestrator = Orchestrator::new(workers, Arc::new(toolbox));

    let resumed = checkpoint::exists(&checkpoint_path).await;
    let mut session = if resumed {
        let session = checkpoint::load(&checkpoint_path).await?;
        eprintln!("   Resuming from {}", checkpoint_path.display());
        let ignored = session.config.differences(&config);
        if !ignored.is_empty() {
            // Quota already reserved was counted against the checkpointed limits.
            tracing::warn!(
                keys = ?ignored,
                "Resumed session keeps its checkpointed config; current settings ignored"
            );
        }
        session
    } else {
        orchestrator.start_session(
            ChildSpec::required(
                TaskRole::Coordinator,
                json!({ "task": "Perform a due-diligence review of the data room" }),
            ),
            config,
        )?
    };

    let reviewer: Box<dyn Reviewer> = if auto_approve {
        Box::new(AutoApprove)
    } else {
        Box::new(CliReviewer::new())
    };

    eprintln!(
        "   Limits: {} pages, {} fetches, {} iterations{}\n",
        session.config.page_retrieval_limit,
        session.config.web_fetch_limit,
        session.config.iteration_limit,
        if resumed { " (from checkpoint)" } else { "" }
    );

    // Persist before surfacing a run error.
    let result = orchestrator.run(&mut session, reviewer.as_ref()).await;

    if session.is_finished() {
        checkpoint::remove(&checkpoint_path).await?;
    } else {
        checkpoint::save(&session, &checkpoint_path).await?;
        eprintln!(
            "\n⏸  Session suspended with {} pending approval(s). Checkpoint: {}",
            session.approvals.len(),
            checkpoint_path.display()
        );
    }

    let summary = result?;
    println!("\n{}", summary);
    if let Some(output) = session.root_output() {
        println!("{}", serde_json::to_string_pretty(output)?);
    }

    Ok(())
}
