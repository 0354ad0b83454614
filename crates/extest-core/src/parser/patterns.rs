//! Markers and regex patterns for ExUnit `mix test` output.
//!
//! Everything tied to the runner's text format lives here.

/// Banner printed once the run configuration is known. Output before it is
/// compilation noise.
pub const DISCOVERY_START_PATTERN: &str = r#"Including tags: \[.*?\]"#;

/// Line printed by elixir >= 1.14 when every case was filtered out.
pub const ALL_EXCLUDED_LINE: &str = "All tests have been excluded.";

/// Trailing line-number marker of a `--trace` case line: `[L#12]`.
pub const LINE_MARKER_PATTERN: &str = r"^\[L#(\d+)\]$";

/// Trailing outcome annotation stripped from case labels.
pub const ANNOTATION_PATTERN: &str = r"^\((excluded|skipped|invalid|\d+(?:\.\d+)?ms)\)$";

/// Annotation that marks a case as skipped.
pub const SKIPPED_ANNOTATION: &str = "(skipped)";

/// Bullet characters decorating case lines.
pub const CASE_BULLETS: &[char] = &['*', '-'];

/// Characters that never occur in a relative test file path token.
pub const INVALID_PATH_CHARS: &[char] = &['"', '\'', '[', ']', '(', ')', ':', ','];

/// Separates failure reports (and other paragraphs) in a run report.
pub const BLOCK_SEPARATOR_PATTERN: &str = r"\n\s*\n";

/// Failure-numbering convention: `1) test ...`.
pub const FAILURE_ENUMERATION_PATTERN: &str = r"^\d+\)";

/// Location of a failing case inside a failure block: `test/foo_test.exs:12`.
pub const FAILURE_LOCATION_PATTERN: &str = r"([^\s:]+\.[A-Za-z0-9]+:\d+)";

/// Id of a single-line target: ends in `:<line>`.
pub const LINE_TARGET_PATTERN: &str = r":\d+$";

/// Case type tags printed before the case label.
pub const TEST_TAG: &str = "test";
pub const DOCTEST_TAG: &str = "doctest";
pub const PROPERTY_TAG: &str = "property";
