//! Output parsing for `mix test` reports.
//!
//! The runner only speaks free-form text. This module turns that text into
//! structured records and keeps every format-specific marker in one place,
//! so another reporter (a JSON formatter, say) only needs a new
//! [`ReportParser`] implementation.
//!
//! ## Components
//!
//! - [`ReportParser`] - The parsing interface used by the orchestrator
//! - [`MixOutputParser`] - ExUnit `--trace` text implementation
//! - [`ParseRecord`] / [`DiscoveryMap`] - Discovery output
//! - [`ErrorMap`] - Failure text keyed by case id

mod discovery;
mod errors;
pub mod patterns;

pub use discovery::{parse_discovery, CaseKind, DiscoveryMap, ParseRecord};
pub use errors::{is_line_target, parse_targeted_errors, parse_whole_run_errors, ErrorMap};

use std::path::Path;

/// Converts raw runner output into discovery and error records.
pub trait ReportParser: Send + Sync {
    /// Parses a discovery run of the project rooted at `working_dir`.
    fn parse_discovery(&self, working_dir: &Path, raw_output: &str) -> DiscoveryMap;

    /// Parses an unfiltered (or suite-filtered) run into failures by case id.
    fn parse_whole_run_errors(&self, raw_output: &str) -> ErrorMap;

    /// Parses a run filtered down to `target_id`.
    fn parse_targeted_errors(&self, target_id: &str, raw_output: &str) -> ErrorMap;

    /// Whether `id` addresses a single line, selecting the error mode.
    fn is_line_target(&self, id: &str) -> bool;

    /// Human-readable name of the report format.
    fn format_name(&self) -> &'static str;
}

/// Parser for ExUnit's `--trace` text output.
#[derive(Debug, Clone, Copy, Default)]
pub struct MixOutputParser;

impl MixOutputParser {
    pub fn new() -> Self {
        Self
    }
}

impl ReportParser for MixOutputParser {
    fn parse_discovery(&self, working_dir: &Path, raw_output: &str) -> DiscoveryMap {
        parse_discovery(working_dir, raw_output)
    }

    fn parse_whole_run_errors(&self, raw_output: &str) -> ErrorMap {
        parse_whole_run_errors(raw_output)
    }

    fn parse_targeted_errors(&self, target_id: &str, raw_output: &str) -> ErrorMap {
        parse_targeted_errors(target_id, raw_output)
    }

    fn is_line_target(&self, id: &str) -> bool {
        is_line_target(id)
    }

    fn format_name(&self) -> &'static str {
        "ExUnit trace"
    }
}
