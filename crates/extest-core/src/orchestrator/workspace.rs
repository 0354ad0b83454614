//! The tree together with the projects loaded into it.

use indexmap::IndexMap;
use std::path::{Component, Path, PathBuf};
use tracing::info;

use crate::parser::{DiscoveryMap, ErrorMap};
use crate::runner::RunnerError;
use crate::tree::{ExportScope, ImportReport, TestSuite, TestTree, TreeError, ROOT_SUITE_ID};

use super::error::OrchestratorError;
use super::types::TestResult;

/// One runner invocation needed to evaluate a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EvalScope {
    pub namespace: String,
    pub project_dir: PathBuf,
    /// Tree node whose test leaves the invocation covers.
    pub node_id: String,
    pub filter: Option<String>,
}

pub(crate) struct Workspace {
    pub tree: TestTree,
    /// Namespace to project directory, in registration order.
    projects: IndexMap<String, PathBuf>,
}

impl Workspace {
    pub fn new(tree: TestTree) -> Self {
        Self {
            tree,
            projects: IndexMap::new(),
        }
    }

    pub fn projects(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.projects
            .iter()
            .map(|(namespace, dir)| (namespace.as_str(), dir.as_path()))
    }

    /// Namespace of `dir`, assigning one if it is new.
    ///
    /// The directory's basename is used; on a clash with another project,
    /// parent components are prepended until the name is unique.
    pub fn register(&mut self, dir: &Path) -> String {
        if let Some((namespace, _)) = self.projects.iter().find(|(_, d)| d.as_path() == dir) {
            return namespace.clone();
        }

        let components: Vec<String> = dir
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let mut namespace = None;
        for take in 1..=components.len() {
            let candidate = components[components.len() - take..].join("/");
            if !self.projects.contains_key(&candidate) {
                namespace = Some(candidate);
                break;
            }
        }

        let namespace = namespace.unwrap_or_else(|| {
            let base = components.last().cloned().unwrap_or_else(|| "project".to_string());
            std::iter::once(base.clone())
                .chain((2..).map(|n| format!("{}~{}", base, n)))
                .find(|candidate| !self.projects.contains_key(candidate))
                .unwrap_or(base)
        });

        self.projects.insert(namespace.clone(), dir.to_path_buf());
        namespace
    }

    /// Drops every project not in `dirs`, subtree included.
    pub fn retain_projects(&mut self, dirs: &[PathBuf]) -> Result<(), TreeError> {
        let stale: Vec<String> = self
            .projects
            .iter()
            .filter(|(_, dir)| !dirs.contains(dir))
            .map(|(namespace, _)| namespace.clone())
            .collect();

        for namespace in stale {
            info!(project = %namespace, "project no longer listed, removing");
            self.projects.shift_remove(&namespace);
            let project_id = TestTree::project_suite_id(&namespace);
            if self.tree.contains(&project_id) {
                self.tree.remove(&project_id)?;
            }
        }
        Ok(())
    }

    /// Replaces a project's subtree with freshly discovered records.
    pub fn replace_project(
        &mut self,
        namespace: &str,
        records: &DiscoveryMap,
    ) -> Result<ImportReport, TreeError> {
        let project_id = TestTree::project_suite_id(namespace);
        if self.tree.contains(&project_id) {
            self.tree.clear_children(&project_id)?;
            self.tree.annotate(&project_id, false, None)?;
        }

        let report = self.tree.import_project(namespace, records);
        info!(
            project = namespace,
            suites = report.suites_created,
            tests = report.tests_imported,
            skipped = report.records_skipped.len(),
            "imported project"
        );
        Ok(report)
    }

    /// Marks a project whose discovery failed, keeping any previous subtree.
    pub fn flag_project(&mut self, namespace: &str, error: &RunnerError) -> Result<(), TreeError> {
        let project_id = TestTree::project_suite_id(namespace);
        if !self.tree.contains(&project_id) {
            self.tree
                .add_suite(TestSuite::new(&project_id, namespace), None)?;
        }
        self.tree.annotate(&project_id, true, Some(error.to_string()))
    }

    /// Removes `id` and then every ancestor left empty, stopping at the
    /// project suite.
    pub fn remove_pruned(&mut self, id: &str) -> Result<(), TreeError> {
        let mut parent = self.tree.parent(id).map(str::to_string);
        self.tree.remove(id)?;

        while let Some(current) = parent {
            let is_project = self.tree.parent(&current) == Some(ROOT_SUITE_ID);
            if current == ROOT_SUITE_ID
                || is_project
                || !self.tree.contains(&current)
                || !self.tree.children(&current).is_empty()
            {
                break;
            }
            parent = self.tree.parent(&current).map(str::to_string);
            self.tree.remove(&current)?;
        }
        Ok(())
    }

    /// Runner invocations covering `target_id`.
    ///
    /// The root fans out to every loaded project; any other node maps to
    /// its project with the id, namespace removed, as the path filter.
    pub fn scopes_for(&self, target_id: &str) -> Result<Vec<EvalScope>, OrchestratorError> {
        let node = self.tree.get_node(target_id)?;

        if target_id == ROOT_SUITE_ID {
            return Ok(self
                .projects
                .iter()
                .map(|(namespace, dir)| EvalScope {
                    namespace: namespace.clone(),
                    project_dir: dir.clone(),
                    node_id: TestTree::project_suite_id(namespace),
                    filter: None,
                })
                .filter(|scope| self.tree.contains(&scope.node_id))
                .collect());
        }

        let outside = || OrchestratorError::OutsideProject {
            target: target_id.to_string(),
        };
        let project_id = self.tree.project_of(target_id)?.ok_or_else(outside)?;
        let namespace = project_id.strip_suffix('/').ok_or_else(outside)?;
        let project_dir = self.projects.get(namespace).ok_or_else(outside)?;

        let relative = target_id.strip_prefix(project_id).unwrap_or(target_id);
        let filter = if relative.is_empty() {
            None
        } else if node.is_test() {
            Some(relative.to_string())
        } else {
            Some(relative.trim_end_matches('/').to_string())
        };

        Ok(vec![EvalScope {
            namespace: namespace.to_string(),
            project_dir: project_dir.clone(),
            node_id: target_id.to_string(),
            filter,
        }])
    }

    /// Matches an error map against the scope's test leaves and records the
    /// outcome on the tree.
    pub fn reconcile(
        &mut self,
        scope: &EvalScope,
        errors: &ErrorMap,
    ) -> Result<Vec<TestResult>, TreeError> {
        let subtree = self.tree.export(&ExportScope::Node(scope.node_id.clone()))?;
        let prefix = TestTree::project_suite_id(&scope.namespace);

        let results: Vec<TestResult> = subtree
            .test_leaves()
            .into_iter()
            .map(|leaf| {
                let relative = leaf.id.strip_prefix(prefix.as_str()).unwrap_or(&leaf.id);
                match errors.get(relative) {
                    Some(message) => TestResult::failed(&leaf.id, message.clone()),
                    None => TestResult::passed(&leaf.id),
                }
            })
            .collect();

        self.tree.annotate(&scope.node_id, false, None)?;
        for result in &results {
            self.tree
                .annotate(&result.node_id, result.is_failed(), result.message.clone())?;
        }
        Ok(results)
    }
}

/// `path` relative to `project_dir`, `/`-separated. `None` when it lies
/// outside the project.
pub(crate) fn relative_path(project_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(project_dir).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(s) => segments.push(s.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseRecord;
    use crate::tree::TestCase;

    fn workspace() -> Workspace {
        Workspace::new(TestTree::new("ws"))
    }

    fn records(relative: &str, lines: &[u32]) -> DiscoveryMap {
        let mut record = ParseRecord::new(relative, format!("/p/{}", relative));
        for line in lines {
            record.tests.push(TestCase::new(
                format!("{}:{}", relative, line),
                format!("case {}", line),
                format!("/p/{}", relative),
                line - 1,
            ));
        }
        let mut map = DiscoveryMap::new();
        map.insert(relative.to_string(), record);
        map
    }

    #[test]
    fn test_register_uses_basename() {
        let mut ws = workspace();
        assert_eq!(ws.register(Path::new("/w/apps/alpha")), "alpha");
        assert_eq!(ws.register(Path::new("/w/apps/alpha")), "alpha");
        assert_eq!(ws.register(Path::new("/w/apps/beta")), "beta");
    }

    #[test]
    fn test_register_clash_prepends_parents() {
        let mut ws = workspace();
        assert_eq!(ws.register(Path::new("/w/one/app")), "app");
        assert_eq!(ws.register(Path::new("/w/two/app")), "two/app");
    }

    #[test]
    fn test_register_without_components_tries_fallback_first() {
        let mut ws = workspace();
        assert_eq!(ws.register(Path::new("/")), "project");
        assert_eq!(ws.register(Path::new(".")), "project~2");
    }

    #[test]
    fn test_retain_projects_removes_subtree() {
        let mut ws = workspace();
        let alpha = ws.register(Path::new("/w/alpha"));
        ws.replace_project(&alpha, &records("test/a_test.exs", &[1])).unwrap();

        ws.retain_projects(&[PathBuf::from("/w/beta")]).unwrap();
        assert!(!ws.tree.contains("alpha/"));
        assert_eq!(ws.projects().count(), 0);
    }

    #[test]
    fn test_scopes_for_targets() {
        let mut ws = workspace();
        let alpha = ws.register(Path::new("/w/alpha"));
        ws.replace_project(&alpha, &records("test/unit/a_test.exs", &[3]))
            .unwrap();

        let project = ws.scopes_for("alpha/").unwrap();
        assert_eq!(project[0].filter, None);

        let dir = ws.scopes_for("alpha/test/unit/").unwrap();
        assert_eq!(dir[0].filter.as_deref(), Some("test/unit"));

        let file = ws.scopes_for("alpha/test/unit/a_test.exs/").unwrap();
        assert_eq!(file[0].filter.as_deref(), Some("test/unit/a_test.exs"));

        let test = ws.scopes_for("alpha/test/unit/a_test.exs:3").unwrap();
        assert_eq!(test[0].filter.as_deref(), Some("test/unit/a_test.exs:3"));
        assert_eq!(test[0].project_dir, PathBuf::from("/w/alpha"));

        let root = ws.scopes_for(ROOT_SUITE_ID).unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].node_id, "alpha/");

        assert!(matches!(
            ws.scopes_for("missing"),
            Err(OrchestratorError::Tree(TreeError::NodeNotFound(_)))
        ));
    }

    #[test]
    fn test_remove_pruned_stops_at_project() {
        let mut ws = workspace();
        let alpha = ws.register(Path::new("/w/alpha"));
        ws.replace_project(&alpha, &records("test/deep/a_test.exs", &[1]))
            .unwrap();

        ws.remove_pruned("alpha/test/deep/a_test.exs/").unwrap();
        assert!(!ws.tree.contains("alpha/test/deep/"));
        assert!(ws.tree.contains("alpha/"));
    }

    #[test]
    fn test_relative_path() {
        let project = Path::new("/w/alpha");
        assert_eq!(
            relative_path(project, Path::new("/w/alpha/test/a_test.exs")).as_deref(),
            Some("test/a_test.exs")
        );
        assert_eq!(relative_path(project, Path::new("/w/alpha")).as_deref(), Some(""));
        assert_eq!(relative_path(project, Path::new("/w/beta/x.exs")), None);
    }
}
