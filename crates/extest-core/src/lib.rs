//! Core library for extest: discovers, runs and reconciles ExUnit suites.
//!
//! `mix test --trace` prints one line per case; [`parser`] turns that text
//! into records, [`tree`] accumulates them into a suite hierarchy and
//! [`orchestrator`] drives the [`runner`] to load and evaluate it.

pub mod config;
pub mod orchestrator;
pub mod parser;
pub mod runner;
pub mod scan;
pub mod tree;

pub use config::Config;
pub use orchestrator::{
    EvaluateOutcome, LoadOutcome, OrchestratorError, OrchestratorState, ProjectFailure,
    TestOrchestrator, TestResult, TestState,
};
pub use parser::{MixOutputParser, ReportParser};
pub use runner::{MixRunner, Runner, RunnerError};
pub use scan::{scan_projects, ScanError};
pub use tree::{DisplayNode, ExportScope, TestTree, TreeError, ROOT_SUITE_ID};
