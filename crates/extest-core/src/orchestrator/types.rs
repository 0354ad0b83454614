use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::runner::RunnerError;
use crate::tree::DisplayNode;

/// What the orchestrator is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorState {
    Idle,
    Loading,
    Evaluating,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::Loading => "loading",
            OrchestratorState::Evaluating => "evaluating",
        };
        f.write_str(name)
    }
}

/// A runner invocation that failed for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFailure {
    pub project_dir: PathBuf,
    pub error: RunnerError,
}

impl ProjectFailure {
    pub fn new(project_dir: impl Into<PathBuf>, error: RunnerError) -> Self {
        Self {
            project_dir: project_dir.into(),
            error,
        }
    }
}

impl fmt::Display for ProjectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.project_dir.display(), self.error)
    }
}

/// Result of a load or reload: the whole tree after the update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub suite: DisplayNode,
    /// Projects whose discovery failed. Their previous subtree is kept.
    pub failures: Vec<ProjectFailure>,
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of one test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestState {
    Passed,
    Failed,
}

/// Per-test result of an evaluate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub node_id: String,
    pub state: TestState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestResult {
    pub fn passed(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            state: TestState::Passed,
            message: None,
        }
    }

    pub fn failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            state: TestState::Failed,
            message: Some(message.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state == TestState::Failed
    }
}

/// Result of an evaluate call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluateOutcome {
    pub results: Vec<TestResult>,
    /// Invocation-level failures, kept apart from per-test results.
    pub failures: Vec<ProjectFailure>,
}

impl EvaluateOutcome {
    pub fn failed(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| r.is_failed())
    }

    /// No failing test and no failed invocation.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.failed().next().is_none()
    }
}
