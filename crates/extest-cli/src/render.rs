//! Plain-text rendering of exported trees and evaluate results.

use extest_core::{DisplayNode, EvaluateOutcome, TestState};

/// Renders a display tree with box-drawing connectors.
pub fn render_tree(root: &DisplayNode) -> String {
    let mut out = String::new();
    out.push_str(&node_line(root));
    out.push('\n');
    render_children(&root.children, "", &mut out);
    out
}

fn render_children(children: &[DisplayNode], prefix: &str, out: &mut String) {
    for (i, child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;
        let connector = if is_last { "└── " } else { "├── " };

        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(&node_line(child));
        out.push('\n');

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        render_children(&child.children, &child_prefix, out);
    }
}

fn node_line(node: &DisplayNode) -> String {
    let mut line = node.label.clone();
    if node.is_test() {
        line.push_str(&format!("  [{}]", node.id));
    }
    if node.skipped {
        line.push_str(" (skipped)");
    }
    if node.errored {
        line.push_str(" (errored)");
    }
    line
}

/// One line per result, failure messages indented below, then a summary.
pub fn render_outcome(outcome: &EvaluateOutcome) -> String {
    let mut out = String::new();

    for result in &outcome.results {
        let mark = match result.state {
            TestState::Passed => "✓",
            TestState::Failed => "✗",
        };
        out.push_str(&format!("{} {}\n", mark, result.node_id));
        if let Some(message) = &result.message {
            for line in message.lines() {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    for failure in &outcome.failures {
        out.push_str(&format!("! {}\n", failure));
    }

    let failed = outcome.failed().count();
    out.push_str(&format!(
        "\n{} tests, {} passed, {} failed",
        outcome.results.len(),
        outcome.results.len() - failed,
        failed
    ));
    if !outcome.failures.is_empty() {
        out.push_str(&format!(", {} invocation errors", outcome.failures.len()));
    }
    out.push('\n');
    out
}
