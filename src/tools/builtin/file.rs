//! Findings store: sandboxed file access under the session's output directory.
//!
//! - Paths are resolved against the output directory; traversal is rejected
//! - Writes are capped and create parent directories
//! - Edits are exact search/replace

use std::path::{Component, Path, PathBuf};

use serde_json::json;
use tokio::fs;

use crate::error::CapabilityError;

/// Maximum file size for reading (1MB).
const MAX_READ_SIZE: u64 = 1024 * 1024;

/// Maximum file size for writing (5MB).
const MAX_WRITE_SIZE: usize = 5 * 1024 * 1024;

/// Normalize a path by resolving `.` and `..` components lexically (no filesystem access).
///
/// `canonicalize` only works on paths that exist, so new files are
/// normalized without touching the filesystem.
fn normalize_lexical(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if components
                    .last()
                    .is_some_and(|c| matches!(c, Component::Normal(_)))
                {
                    components.pop();
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Canonicalize the nearest existing ancestor and re-append the rest.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut ancestor = path;
    let mut tail = Vec::new();
    loop {
        if ancestor.exists() {
            let mut result = ancestor
                .canonicalize()
                .unwrap_or_else(|_| ancestor.to_path_buf());
            for part in tail.into_iter().rev() {
                result = result.join(part);
            }
            return result;
        }
        if let Some(name) = ancestor.file_name() {
            tail.push(name);
        }
        match ancestor.parent() {
            Some(parent) if parent != ancestor => ancestor = parent,
            _ => return path.to_path_buf(),
        }
    }
}

/// Resolve `path_str` under `base`, rejecting anything that escapes it.
fn validate_path(path_str: &str, base: &Path) -> Result<PathBuf, CapabilityError> {
    if path_str.trim().is_empty() {
        return Err(CapabilityError::InvalidParameters(
            "Path must not be empty".to_string(),
        ));
    }

    let path = Path::new(path_str);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let resolved = normalize_lexical(&joined);

    let base_canonical = base
        .canonicalize()
        .unwrap_or_else(|_| normalize_lexical(base));
    let check_path = resolve_existing_prefix(&resolved);

    if !check_path.starts_with(&base_canonical) {
        return Err(CapabilityError::NotAuthorized(format!(
            "Path escapes output directory: {}",
            path_str
        )));
    }

    Ok(resolved)
}

/// Reads and writes analysis findings under one directory.
#[derive(Debug, Clone)]
pub struct FindingsStore {
    base_dir: PathBuf,
}

impl FindingsStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create or overwrite a file.
    pub async fn write(&self, path_str: &str, content: &str) -> Result<serde_json::Value, CapabilityError> {
        if content.len() > MAX_WRITE_SIZE {
            return Err(CapabilityError::InvalidParameters(format!(
                "Content too large ({} bytes). Maximum is {} bytes.",
                content.len(),
                MAX_WRITE_SIZE
            )));
        }

        fs::create_dir_all(&self.base_dir).await.map_err(|e| {
            CapabilityError::ExecutionFailed(format!("Failed to create output directory: {}", e))
        })?;
        let path = validate_path(path_str, &self.base_dir)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                CapabilityError::ExecutionFailed(format!("Failed to create directories: {}", e))
            })?;
        }

        fs::write(&path, content)
            .await
            .map_err(|e| CapabilityError::ExecutionFailed(format!("Failed to write file: {}", e)))?;

        tracing::info!(path = %path.display(), bytes = content.len(), "Findings written");
        Ok(json!({
            "path": path.display().to_string(),
            "bytes_written": content.len(),
        }))
    }

    /// Replace `old_string` with `new_string`, once or everywhere.
    pub async fn edit(
        &self,
        path_str: &str,
        old_string: &str,
        new_string: &str,
        replace_all: bool,
    ) -> Result<serde_json::Value, CapabilityError> {
        if old_string.is_empty() {
            return Err(CapabilityError::InvalidParameters(
                "old_string must not be empty".to_string(),
            ));
        }
        let path = validate_path(path_str, &self.base_dir)?;

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| CapabilityError::ExecutionFailed(format!("Failed to read file: {}", e)))?;

        let occurrences = content.matches(old_string).count();
        if occurrences == 0 {
            return Err(CapabilityError::ExecutionFailed(format!(
                "Could not find the specified text in {}. Make sure old_string matches exactly.",
                path.display()
            )));
        }

        let (updated, replacements) = if replace_all {
            (content.replace(old_string, new_string), occurrences)
        } else {
            (content.replacen(old_string, new_string, 1), 1)
        };

        fs::write(&path, &updated)
            .await
            .map_err(|e| CapabilityError::ExecutionFailed(format!("Failed to write file: {}", e)))?;

        Ok(json!({
            "path": path.display().to_string(),
            "replacements": replacements,
        }))
    }

    /// Read a file back.
    pub async fn read(&self, path_str: &str) -> Result<serde_json::Value, CapabilityError> {
        let path = validate_path(path_str, &self.base_dir)?;

        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| CapabilityError::NotFound(format!("Cannot access file: {}", e)))?;
        if metadata.len() > MAX_READ_SIZE {
            return Err(CapabilityError::ExecutionFailed(format!(
                "File too large ({} bytes). Maximum is {} bytes.",
                metadata.len(),
                MAX_READ_SIZE
            )));
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| CapabilityError::ExecutionFailed(format!("Failed to read file: {}", e)))?;

        Ok(json!({
            "path": path.display().to_string(),
            "content": content,
        }))
    }
}
