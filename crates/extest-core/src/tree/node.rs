//! Node types stored in the test tree and the display shape it exports.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of a tree node as seen by the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Suite,
    Test,
}

/// One executable test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// `relative/path.exs:<line>` as produced by the parser. The tree may
    /// prefix it with a project namespace on import.
    pub id: String,
    pub label: String,
    /// Absolute path of the file declaring the case.
    pub source_file: PathBuf,
    /// Zero-based line of the declaration.
    pub source_line: u32,
    pub skipped: bool,
    pub errored: bool,
    pub message: Option<String>,
}

impl TestCase {
    /// Creates a case with annotations unset.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        source_file: impl Into<PathBuf>,
        source_line: u32,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            source_file: source_file.into(),
            source_line,
            skipped: false,
            errored: false,
            message: None,
        }
    }
}

/// A grouping node: project, directory or file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    pub id: String,
    pub label: String,
    pub source_file: Option<PathBuf>,
    pub source_line: Option<u32>,
    pub errored: bool,
    pub message: Option<String>,
}

impl TestSuite {
    /// Creates a suite that does not map to a single file.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            source_file: None,
            source_line: None,
            errored: false,
            message: None,
        }
    }

    /// Creates a suite standing for one source file.
    pub fn for_file(
        id: impl Into<String>,
        label: impl Into<String>,
        source_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_file: Some(source_file.into()),
            source_line: Some(0),
            ..Self::new(id, label)
        }
    }
}

/// A node of the test tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestNode {
    Suite(TestSuite),
    Test(TestCase),
}

impl TestNode {
    pub fn id(&self) -> &str {
        match self {
            TestNode::Suite(suite) => &suite.id,
            TestNode::Test(test) => &test.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TestNode::Suite(suite) => &suite.label,
            TestNode::Test(test) => &test.label,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            TestNode::Suite(_) => NodeKind::Suite,
            TestNode::Test(_) => NodeKind::Test,
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, TestNode::Test(_))
    }

    pub fn errored(&self) -> bool {
        match self {
            TestNode::Suite(suite) => suite.errored,
            TestNode::Test(test) => test.errored,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            TestNode::Suite(suite) => suite.message.as_deref(),
            TestNode::Test(test) => test.message.as_deref(),
        }
    }

    pub(crate) fn set_annotation(&mut self, errored: bool, message: Option<String>) {
        match self {
            TestNode::Suite(suite) => {
                suite.errored = errored;
                suite.message = message;
            }
            TestNode::Test(test) => {
                test.errored = errored;
                test.message = message;
            }
        }
    }
}

/// Display-ready node produced by [`TestTree::export`](super::TestTree::export).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DisplayNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub errored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DisplayNode {
    pub(crate) fn from_node(node: &TestNode) -> Self {
        match node {
            TestNode::Suite(suite) => Self {
                id: suite.id.clone(),
                label: suite.label.clone(),
                kind: NodeKind::Suite,
                description: None,
                children: Vec::new(),
                source_file: suite.source_file.clone(),
                source_line: suite.source_line,
                skipped: false,
                errored: suite.errored,
                message: suite.message.clone(),
            },
            TestNode::Test(test) => Self {
                id: test.id.clone(),
                label: test.label.clone(),
                kind: NodeKind::Test,
                description: None,
                children: Vec::new(),
                source_file: Some(test.source_file.clone()),
                source_line: Some(test.source_line),
                skipped: test.skipped,
                errored: test.errored,
                message: test.message.clone(),
            },
        }
    }

    pub fn is_test(&self) -> bool {
        self.kind == NodeKind::Test
    }

    /// All test leaves below (and including) this node, depth-first in
    /// child order.
    pub fn test_leaves(&self) -> Vec<&DisplayNode> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];

        while let Some(node) = stack.pop() {
            if node.is_test() {
                leaves.push(node);
            } else {
                stack.extend(node.children.iter().rev());
            }
        }

        leaves
    }

    /// Finds a node by id in this subtree.
    pub fn find(&self, id: &str) -> Option<&DisplayNode> {
        let mut stack = vec![self];

        while let Some(node) = stack.pop() {
            if node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }

        None
    }
}
