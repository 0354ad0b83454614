//! Error modes: extract failure reports from an executed run.

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use super::patterns::{
    BLOCK_SEPARATOR_PATTERN, FAILURE_ENUMERATION_PATTERN, FAILURE_LOCATION_PATTERN,
    LINE_TARGET_PATTERN,
};

/// Case or suite id → accumulated failure text, in first-seen order.
pub type ErrorMap = IndexMap<String, String>;

/// Collects every numbered failure report of a run, keyed by the
/// `<file>.<ext>:<line>` location it names.
///
/// Reports naming the same location are joined with a newline.
pub fn parse_whole_run_errors(raw_output: &str) -> ErrorMap {
    let mut errors = ErrorMap::new();

    let (separator, enumeration, location) = match (
        Regex::new(BLOCK_SEPARATOR_PATTERN),
        Regex::new(FAILURE_ENUMERATION_PATTERN),
        Regex::new(FAILURE_LOCATION_PATTERN),
    ) {
        (Ok(s), Ok(e), Ok(l)) => (s, e, l),
        _ => return errors,
    };

    for block in separator.split(raw_output) {
        if !enumeration.is_match(block.trim_start()) {
            continue;
        }

        // The numbered header names the test, which may itself look like a location.
        let Some(id) = block
            .trim_start()
            .lines()
            .skip(1)
            .find_map(|line| location.captures(line))
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
        else {
            debug!(block, "failure report without a location");
            continue;
        };

        let block = block.trim_matches(|c| c == '\n' || c == '\r');
        errors
            .entry(id)
            .and_modify(|existing| {
                existing.push('\n');
                existing.push_str(block);
            })
            .or_insert_with(|| block.to_string());
    }

    errors
}

/// Attributes the whole output to `target_id` when it mentions it.
///
/// Used for runs already filtered down to that single line.
pub fn parse_targeted_errors(target_id: &str, raw_output: &str) -> ErrorMap {
    let mut errors = ErrorMap::new();
    if raw_output.contains(target_id) {
        errors.insert(target_id.to_string(), raw_output.to_string());
    }
    errors
}

/// True for ids addressing a single line: `test/foo_test.exs:12`.
pub fn is_line_target(id: &str) -> bool {
    Regex::new(LINE_TARGET_PATTERN)
        .map(|re| re.is_match(id))
        .unwrap_or(false)
}
