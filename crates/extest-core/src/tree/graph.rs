//! The test tree: an id-keyed node store with single-parent edges.

use std::collections::HashMap;
use tracing::{debug, warn};

use super::error::TreeError;
use super::node::{DisplayNode, TestCase, TestNode, TestSuite};
use crate::config::TreeConfig;
use crate::parser::{DiscoveryMap, ParseRecord};

/// Reserved id of the single ancestor-less suite.
pub const ROOT_SUITE_ID: &str = "extest_suite_root";

/// What [`TestTree::export`] builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportScope {
    /// The whole tree from the root.
    All,
    /// Only the subtree rooted at this id.
    Node(String),
}

/// Summary of one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub suites_created: usize,
    pub tests_imported: usize,
    /// Relative paths of records that could not be imported.
    pub records_skipped: Vec<String>,
}

/// Hierarchy of projects, directories, files and test cases.
///
/// Nodes live in an id-keyed map; edges are kept as `child → parent` and
/// `parent → [children]` in insertion order. Every insert goes through
/// [`TestTree::link`], which moves an existing edge instead of adding a
/// second one, so a node never has two parents.
#[derive(Debug, Clone)]
pub struct TestTree {
    nodes: HashMap<String, TestNode>,
    parents: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
    workspace_name: String,
    config: TreeConfig,
}

impl TestTree {
    /// Creates a tree holding only the root suite.
    pub fn new(workspace_name: impl Into<String>) -> Self {
        Self::with_config(workspace_name, TreeConfig::default())
    }

    pub fn with_config(workspace_name: impl Into<String>, config: TreeConfig) -> Self {
        let workspace_name = workspace_name.into();
        let root = TestSuite::new(
            ROOT_SUITE_ID,
            format!("{} {}", config.root_label, workspace_name),
        );

        let mut nodes = HashMap::new();
        nodes.insert(ROOT_SUITE_ID.to_string(), TestNode::Suite(root));

        Self {
            nodes,
            parents: HashMap::new(),
            children: HashMap::new(),
            workspace_name,
            config,
        }
    }

    pub fn root_id(&self) -> &'static str {
        ROOT_SUITE_ID
    }

    pub fn workspace_name(&self) -> &str {
        &self.workspace_name
    }

    /// Id of the suite grouping a project's tests.
    pub fn project_suite_id(namespace: &str) -> String {
        format!("{}/", namespace)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root is present.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get_node(&self, id: &str) -> Result<&TestNode, TreeError> {
        self.nodes
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))
    }

    pub fn parent(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    /// Child ids in insertion order.
    pub fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Inserts or replaces `suite` and links it under `parent_id` (the root
    /// when `None`).
    ///
    /// A parent that does not exist yet is only warned about; the edge is
    /// kept and connects once the parent is inserted.
    pub fn add_suite(&mut self, suite: TestSuite, parent_id: Option<&str>) -> Result<(), TreeError> {
        self.insert(TestNode::Suite(suite), parent_id)
    }

    /// Inserts or replaces a test leaf. Same contract as [`Self::add_suite`].
    pub fn add_test(&mut self, test: TestCase, parent_id: Option<&str>) -> Result<(), TreeError> {
        self.insert(TestNode::Test(test), parent_id)
    }

    fn insert(&mut self, node: TestNode, parent_id: Option<&str>) -> Result<(), TreeError> {
        let id = node.id().to_string();
        let parent = parent_id.unwrap_or(ROOT_SUITE_ID).to_string();

        if id == ROOT_SUITE_ID {
            return Err(TreeError::ReservedId(id));
        }
        if parent == id || self.is_ancestor(&id, &parent) {
            return Err(TreeError::Cycle { parent, child: id });
        }

        match self.nodes.get(&parent) {
            Some(TestNode::Test(_)) => {
                return Err(TreeError::ParentIsTest { parent, child: id });
            }
            Some(TestNode::Suite(_)) => {}
            None => warn!(parent = %parent, child = %id, "parent node does not exist yet"),
        }

        if let Some(existing) = self.nodes.get(&id) {
            if existing.kind() != node.kind() {
                return Err(TreeError::KindConflict(id));
            }
        }

        self.nodes.insert(id.clone(), node);
        self.link(&parent, &id);
        Ok(())
    }

    fn link(&mut self, parent: &str, child: &str) {
        if let Some(previous) = self.parents.get(child) {
            if previous == parent {
                return;
            }
            if let Some(siblings) = self.children.get_mut(previous) {
                siblings.retain(|c| c != child);
            }
        }

        self.parents.insert(child.to_string(), parent.to_string());
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
    }

    /// Whether `ancestor` lies on the parent chain of `id`.
    fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        let mut current = self.parents.get(id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parents.get(parent);
        }
        false
    }

    /// Removes a node with its whole subtree. Returns the number of nodes
    /// removed.
    pub fn remove(&mut self, id: &str) -> Result<usize, TreeError> {
        if id == ROOT_SUITE_ID {
            return Err(TreeError::ReservedId(id.to_string()));
        }
        if !self.contains(id) {
            return Err(TreeError::NodeNotFound(id.to_string()));
        }

        if let Some(parent) = self.parents.remove(id) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|c| c != id);
            }
        }

        let mut removed = 0;
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if self.nodes.remove(&current).is_some() {
                removed += 1;
            }
            self.parents.remove(&current);
            if let Some(children) = self.children.remove(&current) {
                stack.extend(children);
            }
        }

        Ok(removed)
    }

    /// Removes every descendant of `id`, keeping the node itself and its
    /// position among its siblings.
    pub fn clear_children(&mut self, id: &str) -> Result<usize, TreeError> {
        if !self.contains(id) {
            return Err(TreeError::NodeNotFound(id.to_string()));
        }

        let mut removed = 0;
        for child in self.children(id).to_vec() {
            removed += self.remove(&child)?;
        }
        Ok(removed)
    }

    /// Sets the run annotations of a node.
    pub fn annotate(
        &mut self,
        id: &str,
        errored: bool,
        message: Option<String>,
    ) -> Result<(), TreeError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?;
        node.set_annotation(errored, message);
        Ok(())
    }

    /// The ancestor of `id` sitting directly under the root (`id` itself
    /// when it is a root child). `None` for the root and for orphans.
    pub fn project_of<'a>(&'a self, id: &'a str) -> Result<Option<&'a str>, TreeError> {
        if !self.contains(id) {
            return Err(TreeError::NodeNotFound(id.to_string()));
        }

        let mut current = id;
        while let Some(parent) = self.parents.get(current) {
            if parent == ROOT_SUITE_ID {
                return Ok(Some(current));
            }
            current = parent.as_str();
        }
        Ok(None)
    }

    /// Imports discovery records directly under the root.
    pub fn import(&mut self, records: &DiscoveryMap) -> ImportReport {
        let mut report = ImportReport::default();
        for record in records.values() {
            self.import_into(ROOT_SUITE_ID, "", record, &mut report);
        }
        report
    }

    /// Imports one project's records under its own project suite
    /// (`<namespace>/`). Every created id is prefixed with that suite id,
    /// so projects sharing file layouts never collide.
    pub fn import_project(&mut self, namespace: &str, records: &DiscoveryMap) -> ImportReport {
        let mut report = ImportReport::default();
        let project_id = Self::project_suite_id(namespace);

        if !self.contains(&project_id) {
            if let Err(e) = self.add_suite(TestSuite::new(&project_id, namespace), None) {
                warn!(project = namespace, error = %e, "cannot create project suite");
                report
                    .records_skipped
                    .extend(records.keys().cloned());
                return report;
            }
            report.suites_created += 1;
        }

        for record in records.values() {
            self.import_into(&project_id, &project_id, record, &mut report);
        }
        report
    }

    fn import_into(
        &mut self,
        parent: &str,
        prefix: &str,
        record: &ParseRecord,
        report: &mut ImportReport,
    ) {
        if let Err(e) = self.import_record(parent, prefix, record, report) {
            warn!(path = %record.relative_path, error = %e, "skipping record");
            report.records_skipped.push(record.relative_path.clone());
        }
    }

    /// Walks the record's path, creating or reusing one suite per directory
    /// and one per file, then adds its cases under the file suite.
    ///
    /// The test directory segment adds no suite but still extends the id
    /// prefix, so suite ids stay valid path filters for the runner.
    fn import_record(
        &mut self,
        parent: &str,
        prefix: &str,
        record: &ParseRecord,
        report: &mut ImportReport,
    ) -> Result<(), TreeError> {
        let segments: Vec<&str> = record
            .relative_path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let Some(last) = segments.len().checked_sub(1) else {
            report.records_skipped.push(record.relative_path.clone());
            return Ok(());
        };

        let mut parent = parent.to_string();
        let mut running = prefix.to_string();

        for (i, segment) in segments.iter().enumerate() {
            running.push_str(segment);
            running.push('/');

            let is_file = i == last;
            if !is_file && *segment == self.config.test_dir_name {
                continue;
            }

            match self.nodes.get(&running) {
                Some(TestNode::Suite(_)) => {}
                Some(TestNode::Test(_)) => return Err(TreeError::KindConflict(running)),
                None => {
                    let suite = if is_file {
                        TestSuite::for_file(&running, *segment, &record.absolute_path)
                    } else {
                        TestSuite::new(&running, *segment)
                    };
                    self.add_suite(suite, Some(parent.as_str()))?;
                    report.suites_created += 1;
                }
            }

            parent = running.clone();
        }

        for test in &record.tests {
            let mut test = test.clone();
            test.id = format!("{}{}", prefix, test.id);
            self.add_test(test, Some(parent.as_str()))?;
            report.tests_imported += 1;
        }

        debug!(path = %record.relative_path, tests = record.tests.len(), "imported record");
        Ok(())
    }

    /// Builds the display tree for `scope`, depth-first with children in
    /// insertion order. Never mutates the tree.
    pub fn export(&self, scope: &ExportScope) -> Result<DisplayNode, TreeError> {
        match scope {
            ExportScope::All => self.build(ROOT_SUITE_ID),
            ExportScope::Node(id) => self.build(id),
        }
    }

    fn build(&self, start: &str) -> Result<DisplayNode, TreeError> {
        let mut stack = vec![self.frame(start)?];

        while let Some(top) = stack.last_mut() {
            if let Some(child) = top.pending.next() {
                if self.contains(child) {
                    stack.push(self.frame(child)?);
                }
                continue;
            }

            let Some(finished) = stack.pop() else { break };
            match stack.last_mut() {
                Some(parent) => parent.node.children.push(finished.node),
                None => return Ok(finished.node),
            }
        }

        Err(TreeError::NodeNotFound(start.to_string()))
    }

    fn frame(&self, id: &str) -> Result<Frame<'_>, TreeError> {
        let mut node = DisplayNode::from_node(self.get_node(id)?);
        if id == ROOT_SUITE_ID {
            node.description = Some(format!("Test suite for {}", self.workspace_name));
        }
        Ok(Frame {
            node,
            pending: self.children(id).iter(),
        })
    }
}

/// A node being built by [`TestTree::build`] and the children still to visit.
struct Frame<'a> {
    node: DisplayNode,
    pending: std::slice::Iter<'a, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_case(id: &str) -> TestCase {
        TestCase::new(id, id, "/p/test/foo_test.exs", 0)
    }

    #[test]
    fn test_new_tree_has_root_only() {
        let tree = TestTree::new("demo");
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 1);

        let root = tree.export(&ExportScope::All).unwrap();
        assert_eq!(root.id, ROOT_SUITE_ID);
        assert_eq!(root.label, "ExUnit demo");
        assert_eq!(root.description.as_deref(), Some("Test suite for demo"));
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_add_defaults_to_root() {
        let mut tree = TestTree::new("demo");
        tree.add_suite(TestSuite::new("a/", "a"), None).unwrap();

        assert_eq!(tree.parent("a/"), Some(ROOT_SUITE_ID));
        assert_eq!(tree.children(ROOT_SUITE_ID), ["a/".to_string()]);
    }

    #[test]
    fn test_readding_same_edge_does_not_duplicate() {
        let mut tree = TestTree::new("demo");
        tree.add_suite(TestSuite::new("a/", "a"), None).unwrap();
        tree.add_suite(TestSuite::new("a/", "renamed"), None).unwrap();

        assert_eq!(tree.children(ROOT_SUITE_ID).len(), 1);
        assert_eq!(tree.get_node("a/").unwrap().label(), "renamed");
    }

    #[test]
    fn test_reparent_moves_edge() {
        let mut tree = TestTree::new("demo");
        tree.add_suite(TestSuite::new("a/", "a"), None).unwrap();
        tree.add_suite(TestSuite::new("b/", "b"), None).unwrap();
        tree.add_test(test_case("t:1"), Some("a/")).unwrap();
        tree.add_test(test_case("t:1"), Some("b/")).unwrap();

        assert!(tree.children("a/").is_empty());
        assert_eq!(tree.children("b/"), ["t:1".to_string()]);
        assert_eq!(tree.parent("t:1"), Some("b/"));
    }

    #[test]
    fn test_missing_parent_keeps_orphan_edge() {
        let mut tree = TestTree::new("demo");
        tree.add_test(test_case("t:1"), Some("late/")).unwrap();

        assert_eq!(tree.parent("t:1"), Some("late/"));
        let root = tree.export(&ExportScope::All).unwrap();
        assert!(root.children.is_empty());

        // Out-of-order insertion: the edge connects once the parent exists.
        tree.add_suite(TestSuite::new("late/", "late"), None).unwrap();
        let root = tree.export(&ExportScope::All).unwrap();
        assert_eq!(root.children[0].children[0].id, "t:1");
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut tree = TestTree::new("demo");
        tree.add_suite(TestSuite::new("a/", "a"), None).unwrap();
        tree.add_suite(TestSuite::new("a/b/", "b"), Some("a/")).unwrap();

        let err = tree.add_suite(TestSuite::new("a/", "a"), Some("a/b/")).unwrap_err();
        assert!(matches!(err, TreeError::Cycle { .. }));

        let err = tree.add_suite(TestSuite::new("a/", "a"), Some("a/")).unwrap_err();
        assert!(matches!(err, TreeError::Cycle { .. }));
    }

    #[test]
    fn test_invalid_inserts() {
        let mut tree = TestTree::new("demo");
        tree.add_test(test_case("t:1"), None).unwrap();

        assert!(matches!(
            tree.add_test(test_case("t:2"), Some("t:1")),
            Err(TreeError::ParentIsTest { .. })
        ));
        assert!(matches!(
            tree.add_suite(TestSuite::new("t:1", "t"), None),
            Err(TreeError::KindConflict(_))
        ));
        assert!(matches!(
            tree.add_suite(TestSuite::new(ROOT_SUITE_ID, "root"), None),
            Err(TreeError::ReservedId(_))
        ));
    }

    #[test]
    fn test_get_node_missing() {
        let tree = TestTree::new("demo");
        assert_eq!(
            tree.get_node("nope").unwrap_err(),
            TreeError::NodeNotFound("nope".to_string())
        );
    }

    #[test]
    fn test_remove_subtree() {
        let mut tree = TestTree::new("demo");
        tree.add_suite(TestSuite::new("a/", "a"), None).unwrap();
        tree.add_suite(TestSuite::new("a/b/", "b"), Some("a/")).unwrap();
        tree.add_test(test_case("t:1"), Some("a/b/")).unwrap();
        tree.add_suite(TestSuite::new("c/", "c"), None).unwrap();

        assert_eq!(tree.remove("a/").unwrap(), 3);
        assert!(!tree.contains("t:1"));
        assert_eq!(tree.children(ROOT_SUITE_ID), ["c/".to_string()]);
        assert!(tree.remove(ROOT_SUITE_ID).is_err());
        assert!(tree.remove("a/").is_err());
    }

    #[test]
    fn test_clear_children_keeps_position() {
        let mut tree = TestTree::new("demo");
        tree.add_suite(TestSuite::new("a/", "a"), None).unwrap();
        tree.add_suite(TestSuite::new("b/", "b"), None).unwrap();
        tree.add_test(test_case("t:1"), Some("a/")).unwrap();

        assert_eq!(tree.clear_children("a/").unwrap(), 1);
        assert_eq!(tree.children(ROOT_SUITE_ID), ["a/".to_string(), "b/".to_string()]);
        assert!(tree.children("a/").is_empty());
    }

    #[test]
    fn test_annotate() {
        let mut tree = TestTree::new("demo");
        tree.add_test(test_case("t:1"), None).unwrap();
        tree.annotate("t:1", true, Some("boom".to_string())).unwrap();

        let node = tree.get_node("t:1").unwrap();
        assert!(node.errored());
        assert_eq!(node.message(), Some("boom"));
        assert!(tree.annotate("missing", true, None).is_err());
    }

    #[test]
    fn test_project_of() {
        let mut tree = TestTree::new("demo");
        tree.add_suite(TestSuite::new("app/", "app"), None).unwrap();
        tree.add_suite(TestSuite::new("app/x/", "x"), Some("app/")).unwrap();
        tree.add_test(test_case("app/x:1"), Some("app/x/")).unwrap();

        assert_eq!(tree.project_of("app/x:1").unwrap(), Some("app/"));
        assert_eq!(tree.project_of("app/").unwrap(), Some("app/"));
        assert_eq!(tree.project_of(ROOT_SUITE_ID).unwrap(), None);
        assert!(tree.project_of("missing").is_err());
    }

    #[test]
    fn test_export_node_scope() {
        let mut tree = TestTree::new("demo");
        tree.add_suite(TestSuite::new("a/", "a"), None).unwrap();
        tree.add_test(test_case("t:1"), Some("a/")).unwrap();

        let sub = tree.export(&ExportScope::Node("a/".to_string())).unwrap();
        assert_eq!(sub.id, "a/");
        assert_eq!(sub.children.len(), 1);

        let leaf = tree.export(&ExportScope::Node("t:1".to_string())).unwrap();
        assert!(leaf.is_test());

        assert_eq!(
            tree.export(&ExportScope::Node("zzz".to_string())).unwrap_err(),
            TreeError::NodeNotFound("zzz".to_string())
        );
    }
}
