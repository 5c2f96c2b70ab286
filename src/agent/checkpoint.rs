//! Session checkpoints.
//!
//! A suspended session is written as one JSON document. Writes go to a
//! sibling temp file first and are renamed into place, so a crash never
//! leaves a half-written checkpoint behind.

use std::path::{Path, PathBuf};

use crate::agent::session::SessionState;
use crate::error::CheckpointError;

/// Serialize `session` to `path`.
pub async fn save(session: &SessionState, path: &Path) -> Result<(), CheckpointError> {
    let json = serde_json::to_vec_pretty(session)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| io_error(parent, source))?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|source| io_error(&tmp, source))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| io_error(path, source))?;

    tracing::info!(
        session_id = %session.id,
        path = %path.display(),
        pending = session.approvals.len(),
        "Checkpoint saved"
    );
    Ok(())
}

/// Load a session previously written by [`save`].
pub async fn load(path: &Path) -> Result<SessionState, CheckpointError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| io_error(path, source))?;
    let session: SessionState = serde_json::from_slice(&bytes)?;

    tracing::info!(
        session_id = %session.id,
        iteration = session.iteration,
        pending = session.approvals.len(),
        "Checkpoint loaded"
    );
    Ok(session)
}

/// Whether a checkpoint exists at `path`.
pub async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Remove a checkpoint once its session has finished. Missing files are fine.
pub async fn remove(path: &Path) -> Result<(), CheckpointError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(io_error(path, source)),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "checkpoint".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, source: std::io::Error) -> CheckpointError {
    CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}
