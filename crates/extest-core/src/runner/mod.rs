//! The contract with the external test runner.
//!
//! A [`Runner`] executes one invocation in a project directory and hands
//! back raw output; it knows nothing about parsing. The functions
//! [`discovery_stdout`] and [`execution_stdout`] decide from that output
//! whether the invocation produced a usable report.

mod error;
mod mix;

pub use error::RunnerError;
pub use mix::MixRunner;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Banner of a completed run.
pub const COMPLETION_MARKER: &str = "Finished in";

/// Printed when a file fails to compile.
pub const COMPILATION_ERROR_MARKER: &str = "== Compilation error in file";

/// stderr of a discovery run where every case was excluded.
pub const NOTHING_EXECUTED_MARKER: &str =
    "The --only option was given to \"mix test\" but no test was executed";

/// Printed when the path filter matched nothing.
pub const PATH_NOT_MATCHED_MARKER: &str =
    "Paths given to \"mix test\" did not match any directory/file";

/// Purpose of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// Enumerate cases without executing them.
    Discover,
    /// Execute cases and report failures.
    Execute,
}

/// One request to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub project_dir: PathBuf,
    pub mode: InvocationMode,
    /// Project-relative path, directory or `file:line` to restrict the run.
    pub path_filter: Option<String>,
}

impl Invocation {
    pub fn discover(project_dir: impl Into<PathBuf>, path_filter: Option<String>) -> Self {
        Self {
            project_dir: project_dir.into(),
            mode: InvocationMode::Discover,
            path_filter,
        }
    }

    pub fn execute(project_dir: impl Into<PathBuf>, path_filter: Option<String>) -> Self {
        Self {
            project_dir: project_dir.into(),
            mode: InvocationMode::Execute,
            path_filter,
        }
    }
}

/// Raw result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Trait for test runner backends.
///
/// Implementations must pass a fixed seed so repeated discovery runs print
/// cases in the same order.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Runs one invocation to completion.
    async fn run(&self, invocation: &Invocation) -> Result<RunOutput, RunnerError>;

    /// Terminates in-flight invocations. Idempotent; a no-op when idle.
    fn cancel(&self);
}

/// Accepts a discovery run's output, or explains why it is unusable.
pub fn discovery_stdout(project_dir: &Path, output: RunOutput) -> Result<String, RunnerError> {
    if output.stderr.trim() == NOTHING_EXECUTED_MARKER {
        return Ok(output.stdout);
    }
    if output.stdout.contains(COMPILATION_ERROR_MARKER) {
        return Err(RunnerError::CompilationFailed {
            project_dir: project_dir.to_path_buf(),
            output: join_output(&output),
        });
    }
    if output.stdout.contains(COMPLETION_MARKER) {
        return Ok(output.stdout);
    }

    Err(RunnerError::ProcessFailed {
        project_dir: project_dir.to_path_buf(),
        exit_code: output.exit_code,
        output: join_output(&output),
    })
}

/// Accepts an execution run's output, or explains why it is unusable.
///
/// Failing tests are not an error here: their reports are in stdout.
pub fn execution_stdout(invocation: &Invocation, output: RunOutput) -> Result<String, RunnerError> {
    let project_dir = invocation.project_dir.clone();

    if output.stdout.contains(PATH_NOT_MATCHED_MARKER) {
        return Err(RunnerError::PathNotMatched {
            project_dir,
            filter: invocation.path_filter.clone().unwrap_or_default(),
        });
    }
    if output.stdout.contains(COMPILATION_ERROR_MARKER) {
        return Err(RunnerError::CompilationFailed {
            project_dir,
            output: join_output(&output),
        });
    }
    if output.stdout.contains(COMPLETION_MARKER) {
        return Ok(output.stdout);
    }
    if !output.stderr.trim().is_empty() {
        return Err(RunnerError::ProcessFailed {
            project_dir,
            exit_code: output.exit_code,
            output: output.stderr,
        });
    }

    Ok(output.stdout)
}

fn join_output(output: &RunOutput) -> String {
    match (output.stderr.trim().is_empty(), output.stdout.trim().is_empty()) {
        (true, _) => output.stdout.clone(),
        (false, true) => output.stderr.clone(),
        (false, false) => format!("{}\n{}", output.stderr, output.stdout),
    }
}
