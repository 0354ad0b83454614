//! Discovery mode: turns a `mix test --trace --only=""` report into the
//! list of cases per test file.

use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::patterns::{
    ALL_EXCLUDED_LINE, ANNOTATION_PATTERN, CASE_BULLETS, DISCOVERY_START_PATTERN, DOCTEST_TAG,
    INVALID_PATH_CHARS, LINE_MARKER_PATTERN, PROPERTY_TAG, SKIPPED_ANNOTATION, TEST_TAG,
};
use crate::tree::TestCase;

/// Cases discovered in one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRecord {
    /// Path relative to the project directory, `/`-separated.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    /// Cases in emission order, unique by id.
    pub tests: Vec<TestCase>,
}

impl ParseRecord {
    pub fn new(relative_path: impl Into<String>, absolute_path: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: relative_path.into(),
            absolute_path: absolute_path.into(),
            tests: Vec::new(),
        }
    }
}

/// Relative path → record, in first-seen order.
pub type DiscoveryMap = IndexMap<String, ParseRecord>;

/// Type tag at the start of a case line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseKind {
    Test,
    Doctest,
    Property,
    /// Tags from macros or newer ExUnit versions; treated like `test`.
    Other,
}

impl CaseKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            TEST_TAG => CaseKind::Test,
            DOCTEST_TAG => CaseKind::Doctest,
            PROPERTY_TAG => CaseKind::Property,
            _ => CaseKind::Other,
        }
    }
}

struct DiscoveryPatterns {
    start: Regex,
    line_marker: Regex,
    annotation: Regex,
}

impl DiscoveryPatterns {
    fn compile() -> Option<Self> {
        Some(Self {
            start: Regex::new(DISCOVERY_START_PATTERN).ok()?,
            line_marker: Regex::new(LINE_MARKER_PATTERN).ok()?,
            annotation: Regex::new(ANNOTATION_PATTERN).ok()?,
        })
    }
}

/// Chunk currently being read.
enum Chunk {
    None,
    /// Header was not a usable file path; its case lines are dropped.
    Skipping,
    File {
        relative_path: String,
        absolute_path: PathBuf,
        cases: Vec<TestCase>,
    },
}

/// Parses discovery output of one project.
///
/// Malformed headers and case lines are skipped, never raised: the output
/// of an external tool varies between versions and one odd line must not
/// hide every other test.
pub fn parse_discovery(working_dir: &Path, raw_output: &str) -> DiscoveryMap {
    let mut records = DiscoveryMap::new();
    let Some(patterns) = DiscoveryPatterns::compile() else {
        return records;
    };

    let output = meaningful_output(raw_output, &patterns.start);
    let mut seen = HashSet::new();
    let mut chunk = Chunk::None;

    for raw_line in output.lines() {
        let line = effective_line(raw_line);
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == ALL_EXCLUDED_LINE {
            continue;
        }

        if line.starts_with(char::is_whitespace) {
            match &mut chunk {
                Chunk::File {
                    relative_path,
                    absolute_path,
                    cases,
                } => match parse_case_line(trimmed, relative_path, absolute_path, &patterns) {
                    Some(case) => cases.push(case),
                    None => debug!(line = trimmed, file = %relative_path, "skipping malformed case line"),
                },
                Chunk::Skipping => debug!(line = trimmed, "skipping case line of unusable header"),
                Chunk::None => debug!(line = trimmed, "skipping case line outside of a file chunk"),
            }
            continue;
        }

        flush(std::mem::replace(&mut chunk, Chunk::None), &mut records, &mut seen);

        chunk = match header_path(trimmed) {
            Some(relative_path) => Chunk::File {
                absolute_path: working_dir.join(&relative_path),
                relative_path,
                cases: Vec::new(),
            },
            None => Chunk::Skipping,
        };
    }

    flush(chunk, &mut records, &mut seen);

    debug!(
        files = records.len(),
        dir = %working_dir.display(),
        "parsed discovery output"
    );

    records
}

/// Drops everything before the tag banner; keeps the whole text when the
/// banner is missing.
fn meaningful_output<'a>(raw_output: &'a str, start: &Regex) -> &'a str {
    match start.find(raw_output) {
        Some(m) => &raw_output[m.start()..],
        None => raw_output,
    }
}

/// `--trace` rewrites progress lines with `\r`; the last segment wins.
fn effective_line(raw_line: &str) -> &str {
    raw_line
        .split('\r')
        .filter(|segment| !segment.trim().is_empty())
        .last()
        .unwrap_or("")
}

/// Extracts the file path of a chunk header: `FooTest [test/foo_test.exs]`
/// or a bare `test/foo_test.exs`.
fn header_path(line: &str) -> Option<String> {
    let token = line.split_whitespace().last()?;
    let token = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(token);

    is_relative_file_path(token).then(|| token.to_string())
}

fn is_relative_file_path(token: &str) -> bool {
    !token.is_empty()
        && !token.contains(INVALID_PATH_CHARS)
        && !token.starts_with(&['/', '\\'][..])
        && Path::new(token).extension().is_some()
}

fn parse_case_line(
    line: &str,
    relative_path: &str,
    absolute_path: &Path,
    patterns: &DiscoveryPatterns,
) -> Option<TestCase> {
    let body = line.trim_start_matches(CASE_BULLETS).trim_start();
    let mut tokens: Vec<&str> = body.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }

    let marker = tokens.pop()?;
    let line_number: u32 = patterns
        .line_marker
        .captures(marker)?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    if line_number == 0 {
        return None;
    }

    let tag = tokens.remove(0);
    let kind = CaseKind::from_tag(tag);

    let mut skipped = false;
    if let Some(last) = tokens.last() {
        if patterns.annotation.is_match(last) {
            skipped = *last == SKIPPED_ANNOTATION;
            tokens.pop();
        }
    }

    let label = match kind {
        CaseKind::Doctest => DOCTEST_TAG.to_string(),
        _ if tokens.is_empty() => tag.to_string(),
        _ => tokens.join(" "),
    };

    let mut case = TestCase::new(
        format!("{}:{}", relative_path, line_number),
        label,
        absolute_path,
        line_number - 1,
    );
    case.skipped = skipped;
    Some(case)
}

/// Moves a finished chunk into the map, dropping duplicate ids and empty
/// chunks.
fn flush(chunk: Chunk, records: &mut DiscoveryMap, seen: &mut HashSet<String>) {
    let Chunk::File {
        relative_path,
        absolute_path,
        cases,
    } = chunk
    else {
        return;
    };

    if cases.is_empty() {
        return;
    }

    let record = records
        .entry(relative_path.clone())
        .or_insert_with(|| ParseRecord::new(relative_path, absolute_path));

    for case in cases {
        if seen.insert(case.id.clone()) {
            record.tests.push(case);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = "/work/app";

    fn parse(output: &str) -> DiscoveryMap {
        parse_discovery(Path::new(PROJECT), output)
    }

    fn ids(record: &ParseRecord) -> Vec<&str> {
        record.tests.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_minimal_report() {
        let output = "Including tags: [:\"\"]\n\ntest/foo_test.exs\n  * test works [L#3]\n\nFinished in 0.1 seconds";
        let map = parse(output);

        assert_eq!(map.len(), 1);
        let record = &map["test/foo_test.exs"];
        assert_eq!(record.relative_path, "test/foo_test.exs");
        assert_eq!(record.absolute_path, Path::new("/work/app/test/foo_test.exs"));
        assert_eq!(record.tests.len(), 1);

        let case = &record.tests[0];
        assert_eq!(case.id, "test/foo_test.exs:3");
        assert_eq!(case.label, "works");
        assert_eq!(case.source_line, 2);
        assert!(!case.skipped);
        assert!(!case.errored);
        assert!(case.message.is_none());
    }

    #[test]
    fn test_full_trace_report() {
        let output = "\
Compiling 2 files (.ex)
Generated app app
Including tags: [:\"\"]
Excluding tags: [:test]

AppTest [test/app_test.exs]
  * doctest App.hello/0 (1) (excluded) [L#3]
  * test greets the world (excluded) [L#5]

App.Nested.NestedTest [test/nested/nested_test.exs]
  * test describe block works (excluded) [L#7]

All tests have been excluded.

Finished in 0.03 seconds (0.00s async, 0.03s sync)
1 doctest, 2 tests, 0 failures, 3 excluded

Randomized with seed 0
";
        let map = parse(output);

        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["test/app_test.exs", "test/nested/nested_test.exs"]);

        let app = &map["test/app_test.exs"];
        assert_eq!(ids(app), vec!["test/app_test.exs:3", "test/app_test.exs:5"]);
        assert_eq!(app.tests[0].label, "doctest");
        assert_eq!(app.tests[1].label, "greets the world");

        let nested = &map["test/nested/nested_test.exs"];
        assert_eq!(nested.tests[0].label, "describe block works");
        assert_eq!(nested.tests[0].source_line, 6);
    }

    #[test]
    fn test_noise_before_banner_is_ignored() {
        let output = "\
Bogus [test/noise_test.exs]
  * test should not appear [L#1]
Including tags: [:\"\"]

RealTest [test/real_test.exs]
  * test appears [L#2]
";
        let map = parse(output);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("test/real_test.exs"));
    }

    #[test]
    fn test_missing_banner_parses_whole_output() {
        let output = "FooTest [test/foo_test.exs]\n  * test works (excluded) [L#4]\n";
        let map = parse(output);
        assert_eq!(ids(&map["test/foo_test.exs"]), vec!["test/foo_test.exs:4"]);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let output = "\
Including tags: [:\"\"]

FooTest [test/foo_test.exs]
  * doctest Foo.camelize/1 (1) (excluded) [L#5]
  * doctest Foo.camelize/1 (2) (excluded) [L#5]
  * test first label (excluded) [L#9]
  * test second label (excluded) [L#9]
";
        let record = &parse(output)["test/foo_test.exs"];
        assert_eq!(ids(record), vec!["test/foo_test.exs:5", "test/foo_test.exs:9"]);
        assert_eq!(record.tests[1].label, "first label");
    }

    #[test]
    fn test_repeated_header_accumulates() {
        let output = "\
Including tags: [:\"\"]

FooTest [test/foo_test.exs]
  * test one (excluded) [L#3]

BarTest [test/bar_test.exs]
  * test bar (excluded) [L#2]

FooTest [test/foo_test.exs]
  * test two (excluded) [L#8]
  * test one again (excluded) [L#3]
";
        let map = parse(output);
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["test/foo_test.exs", "test/bar_test.exs"]);
        assert_eq!(
            ids(&map["test/foo_test.exs"]),
            vec!["test/foo_test.exs:3", "test/foo_test.exs:8"]
        );
    }

    #[test]
    fn test_carriage_return_progress_line() {
        let output = "Including tags: [:\"\"]\n\nFooTest [test/foo_test.exs]\n  * doctest Foo.hello/0 (1) (excluded) [L#5]\r  * doctest Foo.hello/0 (1) (excluded) [L#5]\n";
        let record = &parse(output)["test/foo_test.exs"];
        assert_eq!(ids(record), vec!["test/foo_test.exs:5"]);
    }

    #[test]
    fn test_chunk_without_cases_is_dropped() {
        let output = "\
Including tags: [:\"\"]

EmptyTest [test/empty_test.exs]

FooTest [test/foo_test.exs]
  * test works (excluded) [L#3]
";
        let map = parse(output);
        assert!(!map.contains_key("test/empty_test.exs"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_malformed_line_number_is_skipped() {
        let output = "\
Including tags: [:\"\"]

FooTest [test/foo_test.exs]
  * test no marker (excluded)
  * test bad marker (excluded) [L#abc]
  * test zero line (excluded) [L#0]
  * test good (excluded) [L#12]
";
        let record = &parse(output)["test/foo_test.exs"];
        assert_eq!(ids(record), vec!["test/foo_test.exs:12"]);
    }

    #[test]
    fn test_malformed_header_drops_its_cases() {
        let output = "\
Including tags: [:\"\"]

FooTest [test/foo_test.exs]
  * test kept (excluded) [L#3]

BrokenTest [not a path]
  * test orphan (excluded) [L#4]

NoExtension [test/foo_test]
  * test orphan too (excluded) [L#5]
";
        let map = parse(output);
        assert_eq!(map.len(), 1);
        assert_eq!(ids(&map["test/foo_test.exs"]), vec!["test/foo_test.exs:3"]);
    }

    #[test]
    fn test_case_line_before_any_header_is_skipped() {
        let output = "Including tags: [:\"\"]\n  * test stray [L#1]\nFooTest [test/foo_test.exs]\n  * test works [L#2]\n";
        let map = parse(output);
        assert_eq!(map.len(), 1);
        assert_eq!(map["test/foo_test.exs"].tests.len(), 1);
    }

    #[test]
    fn test_annotations() {
        let output = "\
Including tags: [:\"\"]

FooTest [test/foo_test.exs]
  * test skipped one (skipped) [L#3]
  * test timed one (0.05ms) [L#4]
  * test keeps parens (1) [L#5]
  * property holds for all (excluded) [L#6]
  * test [L#7]
";
        let record = &parse(output)["test/foo_test.exs"];
        let labels: Vec<&str> = record.tests.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["skipped one", "timed one", "keeps parens (1)", "holds for all", "test"]
        );
        assert!(record.tests[0].skipped);
        assert!(!record.tests[1].skipped);
    }

    #[test]
    fn test_repeated_discovery_is_stable() {
        let output = "Including tags: [:\"\"]\n\nFooTest [test/foo_test.exs]\n  * test a (excluded) [L#3]\n  * test b (excluded) [L#7]\n";
        assert_eq!(parse(output), parse(output));
    }

    #[test]
    fn test_case_kind_from_tag() {
        assert_eq!(CaseKind::from_tag("test"), CaseKind::Test);
        assert_eq!(CaseKind::from_tag("doctest"), CaseKind::Doctest);
        assert_eq!(CaseKind::from_tag("property"), CaseKind::Property);
        assert_eq!(CaseKind::from_tag("feature"), CaseKind::Other);
    }
}
