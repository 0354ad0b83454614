use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while invoking the test runner.
///
/// Carries plain strings so one failure can be handed to every caller of a
/// shared load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("Failed to start `{command}` in {}: {message}", .project_dir.display())]
    Spawn {
        command: String,
        project_dir: PathBuf,
        message: String,
    },

    #[error("Compilation failed in project {}:\n{output}", .project_dir.display())]
    CompilationFailed { project_dir: PathBuf, output: String },

    #[error("Paths given to the runner did not match any file in {}: {filter}", .project_dir.display())]
    PathNotMatched { project_dir: PathBuf, filter: String },

    #[error("Runner failed in project {} (exit code {exit_code:?}):\n{output}", .project_dir.display())]
    ProcessFailed {
        project_dir: PathBuf,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Runner invocation was cancelled")]
    Cancelled,
}
