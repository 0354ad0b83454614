//! Finds mix projects inside a workspace.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::config::ScanConfig;

/// Errors that can occur while scanning a workspace.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Workspace directory not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to walk workspace: {0}")]
    Walk(#[from] ignore::Error),
}

/// Returns every directory under `workspace_dir` (itself included) holding
/// the manifest file next to a test directory, sorted.
///
/// Ignore files are not honoured; only `exclude_dirs` prunes the walk.
pub fn scan_projects(workspace_dir: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>, ScanError> {
    if !workspace_dir.is_dir() {
        return Err(ScanError::NotFound(workspace_dir.to_path_buf()));
    }

    let exclude_dirs = config.exclude_dirs.clone();
    let walker = WalkBuilder::new(workspace_dir)
        .standard_filters(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy();
            !(is_dir && entry.depth() > 0 && exclude_dirs.iter().any(|d| *d == name))
        })
        .build();

    let mut projects = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }

        let dir = entry.path();
        if dir.join(&config.manifest_file).is_file() && dir.join(&config.test_dir).is_dir() {
            debug!(project = %dir.display(), "found project");
            projects.push(dir.to_path_buf());
        }
    }

    projects.sort();
    Ok(projects)
}
