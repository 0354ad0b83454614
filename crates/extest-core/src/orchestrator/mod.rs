//! Composes the runner, the report parser and the test tree.
//!
//! [`TestOrchestrator`] is what a host talks to: it loads projects into one
//! shared tree, re-discovers single files after edits, and evaluates any
//! node, reconciling the runner's failure report back onto the tree.
//!
//! One activity runs at a time. Concurrent `load` calls share the load
//! already in flight; any other overlapping call is rejected with
//! [`OrchestratorError::Busy`].

mod error;
mod types;
mod workspace;

pub use error::OrchestratorError;
pub use types::{
    EvaluateOutcome, LoadOutcome, OrchestratorState, ProjectFailure, TestResult, TestState,
};

use futures::future::{self, BoxFuture, FutureExt, Shared};
use indexmap::IndexSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::TreeConfig;
use crate::parser::{DiscoveryMap, ErrorMap, MixOutputParser, ReportParser};
use crate::runner::{discovery_stdout, execution_stdout, Invocation, Runner, RunnerError};
use crate::tree::{DisplayNode, ExportScope, TestTree};
use workspace::{relative_path, EvalScope, Workspace};

type SharedLoad = Shared<BoxFuture<'static, Result<LoadOutcome, OrchestratorError>>>;

enum Activity {
    Idle,
    Loading(SharedLoad),
    Reloading,
    Evaluating,
}

impl Activity {
    fn state(&self) -> OrchestratorState {
        match self {
            Activity::Idle => OrchestratorState::Idle,
            Activity::Loading(_) | Activity::Reloading => OrchestratorState::Loading,
            Activity::Evaluating => OrchestratorState::Evaluating,
        }
    }
}

/// Resets the activity to idle when dropped.
struct ActivityGuard<'a> {
    activity: &'a Mutex<Activity>,
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        *self.activity.lock().unwrap_or_else(PoisonError::into_inner) = Activity::Idle;
    }
}

struct Inner<R> {
    runner: R,
    parser: Arc<dyn ReportParser>,
    workspace: RwLock<Workspace>,
    activity: Mutex<Activity>,
    /// Bumped by `cancel`; invocations are not started once it moved.
    cancel_epoch: AtomicU64,
}

/// Loads, reloads and evaluates ExUnit projects against one test tree.
///
/// Cloning is cheap and every clone drives the same tree.
pub struct TestOrchestrator<R: Runner> {
    inner: Arc<Inner<R>>,
}

impl<R: Runner> Clone for TestOrchestrator<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Runner + 'static> TestOrchestrator<R> {
    /// Creates an orchestrator with an empty tree named after the workspace.
    pub fn new(runner: R, workspace_name: impl Into<String>) -> Self {
        Self::with_config(runner, workspace_name, TreeConfig::default())
    }

    pub fn with_config(runner: R, workspace_name: impl Into<String>, config: TreeConfig) -> Self {
        Self::with_parser(
            runner,
            Arc::new(MixOutputParser::new()),
            workspace_name,
            config,
        )
    }

    /// Creates an orchestrator reading runner output with `parser`.
    pub fn with_parser(
        runner: R,
        parser: Arc<dyn ReportParser>,
        workspace_name: impl Into<String>,
        config: TreeConfig,
    ) -> Self {
        let tree = TestTree::with_config(workspace_name, config);
        Self {
            inner: Arc::new(Inner {
                runner,
                parser,
                workspace: RwLock::new(Workspace::new(tree)),
                activity: Mutex::new(Activity::Idle),
                cancel_epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.inner.activity().state()
    }

    /// Terminates the runner invocation in flight, if any, and stops the
    /// current call from starting new ones.
    pub fn cancel(&self) {
        self.inner.cancel_epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.runner.cancel();
    }

    /// Exports the tree, or one subtree of it.
    pub async fn export(&self, scope: &ExportScope) -> Result<DisplayNode, OrchestratorError> {
        let workspace = self.inner.workspace.read().await;
        Ok(workspace.tree.export(scope)?)
    }

    /// Loaded projects as `(namespace, directory)`, in load order.
    pub async fn projects(&self) -> Vec<(String, PathBuf)> {
        let workspace = self.inner.workspace.read().await;
        workspace
            .projects()
            .map(|(namespace, dir)| (namespace.to_string(), dir.to_path_buf()))
            .collect()
    }

    /// Discovers every project in `project_dirs` and imports them into the
    /// tree, one subtree per project.
    ///
    /// Projects are discovered concurrently. A project whose discovery
    /// fails keeps its previous subtree and is reported in
    /// [`LoadOutcome::failures`]; projects no longer listed are removed.
    /// A call made while a load is running returns that load's outcome.
    pub async fn load(&self, project_dirs: &[PathBuf]) -> Result<LoadOutcome, OrchestratorError> {
        let load = {
            let mut activity = self.inner.activity();
            match &*activity {
                Activity::Loading(load) => {
                    debug!("joining load in progress");
                    load.clone()
                }
                Activity::Idle => {
                    let inner = Arc::clone(&self.inner);
                    let dirs = project_dirs.to_vec();
                    let load = async move {
                        let outcome = inner.load_projects(dirs).await;
                        *inner.activity() = Activity::Idle;
                        outcome
                    }
                    .boxed()
                    .shared();

                    *activity = Activity::Loading(load.clone());
                    // Polled to the end even if every caller goes away, so
                    // the activity always returns to idle.
                    tokio::spawn(load.clone());
                    load
                }
                other => {
                    return Err(OrchestratorError::Busy {
                        state: other.state(),
                    })
                }
            }
        };

        load.await
    }

    /// Re-discovers `changed_path` inside an already loaded project.
    ///
    /// A deleted file loses its suite. A file or directory already in the
    /// tree is re-discovered alone and its suite's children replaced (the
    /// suite goes away when nothing is left). Anything else reloads the
    /// whole project.
    pub async fn reload(
        &self,
        project_dir: &Path,
        changed_path: &Path,
    ) -> Result<LoadOutcome, OrchestratorError> {
        let _guard = self.inner.begin(Activity::Reloading)?;
        let relative =
            relative_path(project_dir, changed_path).ok_or_else(|| OrchestratorError::OutsideProject {
                target: changed_path.display().to_string(),
            })?;

        let (namespace, suite_id) = {
            let mut workspace = self.inner.workspace.write().await;
            let namespace = workspace.register(project_dir);
            let suite_id = format!("{}{}/", TestTree::project_suite_id(&namespace), relative);
            let known = !relative.is_empty() && workspace.tree.contains(&suite_id);
            (namespace, known.then_some(suite_id))
        };

        let mut failures = Vec::new();
        match suite_id {
            Some(suite_id) if !changed_path.exists() => {
                info!(path = %relative, "source removed");
                self.inner.workspace.write().await.remove_pruned(&suite_id)?;
            }
            Some(suite_id) => {
                info!(path = %relative, "reloading source");
                match self.inner.discover(project_dir, Some(relative)).await {
                    Ok(records) => {
                        let mut workspace = self.inner.workspace.write().await;
                        workspace.tree.clear_children(&suite_id)?;
                        workspace.tree.import_project(&namespace, &records);
                        if workspace.tree.children(&suite_id).is_empty() {
                            workspace.remove_pruned(&suite_id)?;
                        }
                    }
                    Err(error) => {
                        warn!(project = %namespace, error = %error, "reload failed, keeping previous tests");
                        if error != RunnerError::Cancelled {
                            self.inner.workspace.write().await.tree.annotate(
                                &suite_id,
                                true,
                                Some(error.to_string()),
                            )?;
                        }
                        failures.push(ProjectFailure::new(project_dir, error));
                    }
                }
            }
            None => {
                info!(project = %namespace, "reloading project");
                let result = self.inner.discover(project_dir, None).await;
                let mut workspace = self.inner.workspace.write().await;
                match result {
                    Ok(records) => {
                        workspace.replace_project(&namespace, &records)?;
                    }
                    Err(error) => {
                        warn!(project = %namespace, error = %error, "reload failed, keeping previous tests");
                        if error != RunnerError::Cancelled {
                            workspace.flag_project(&namespace, &error)?;
                        }
                        failures.push(ProjectFailure::new(project_dir, error));
                    }
                }
            }
        }

        let suite = self.export(&ExportScope::All).await?;
        Ok(LoadOutcome { suite, failures })
    }

    /// Runs the tests under `target_id` and reports one result per test.
    ///
    /// A line target (`file.exs:<line>`) is run alone and fails when the
    /// output mentions it; any other target is run as a path and matched
    /// against the numbered failure report. The root runs every project in
    /// turn. Invocation failures are returned in
    /// [`EvaluateOutcome::failures`] and recorded on the target node.
    pub async fn evaluate(&self, target_id: &str) -> Result<EvaluateOutcome, OrchestratorError> {
        let _guard = self.inner.begin(Activity::Evaluating)?;
        let epoch = self.inner.cancel_epoch.load(Ordering::SeqCst);

        let scopes = self.inner.workspace.read().await.scopes_for(target_id)?;
        info!(target = target_id, invocations = scopes.len(), "evaluating");

        let mut outcome = EvaluateOutcome::default();
        for scope in scopes {
            if self.inner.cancel_epoch.load(Ordering::SeqCst) != epoch {
                outcome
                    .failures
                    .push(ProjectFailure::new(&scope.project_dir, RunnerError::Cancelled));
                break;
            }

            let result = self.inner.execute(&scope).await;
            let mut workspace = self.inner.workspace.write().await;
            match result {
                Ok(errors) => {
                    let results = workspace.reconcile(&scope, &errors)?;
                    debug!(
                        node = %scope.node_id,
                        tests = results.len(),
                        failed = errors.len(),
                        "reconciled"
                    );
                    outcome.results.extend(results);
                }
                Err(RunnerError::Cancelled) => {
                    outcome
                        .failures
                        .push(ProjectFailure::new(&scope.project_dir, RunnerError::Cancelled));
                    break;
                }
                Err(error) => {
                    warn!(node = %scope.node_id, error = %error, "evaluation failed");
                    workspace
                        .tree
                        .annotate(&scope.node_id, true, Some(error.to_string()))?;
                    outcome
                        .failures
                        .push(ProjectFailure::new(&scope.project_dir, error));
                }
            }
        }

        Ok(outcome)
    }
}

impl<R: Runner> Inner<R> {
    fn activity(&self) -> MutexGuard<'_, Activity> {
        self.activity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves from idle to `next`, or reports what is running.
    fn begin(&self, next: Activity) -> Result<ActivityGuard<'_>, OrchestratorError> {
        let mut activity = self.activity();
        if !matches!(*activity, Activity::Idle) {
            return Err(OrchestratorError::Busy {
                state: activity.state(),
            });
        }
        *activity = next;
        Ok(ActivityGuard {
            activity: &self.activity,
        })
    }

    async fn load_projects(&self, dirs: Vec<PathBuf>) -> Result<LoadOutcome, OrchestratorError> {
        let dirs: Vec<PathBuf> = dirs.into_iter().collect::<IndexSet<_>>().into_iter().collect();

        let targets: Vec<(String, PathBuf)> = {
            let mut workspace = self.workspace.write().await;
            workspace.retain_projects(&dirs)?;
            dirs.iter()
                .map(|dir| (workspace.register(dir), dir.clone()))
                .collect()
        };
        info!(projects = targets.len(), "loading projects");

        let discovered =
            future::join_all(targets.iter().map(|(_, dir)| self.discover(dir, None))).await;

        let mut failures = Vec::new();
        let mut workspace = self.workspace.write().await;
        for ((namespace, dir), result) in targets.into_iter().zip(discovered) {
            match result {
                Ok(records) => {
                    workspace.replace_project(&namespace, &records)?;
                }
                Err(error) => {
                    warn!(project = %namespace, error = %error, "discovery failed, keeping previous tests");
                    if error != RunnerError::Cancelled {
                        workspace.flag_project(&namespace, &error)?;
                    }
                    failures.push(ProjectFailure::new(dir, error));
                }
            }
        }

        let suite = workspace.tree.export(&ExportScope::All)?;
        Ok(LoadOutcome { suite, failures })
    }

    async fn discover(
        &self,
        project_dir: &Path,
        path_filter: Option<String>,
    ) -> Result<DiscoveryMap, RunnerError> {
        let output = self
            .runner
            .run(&Invocation::discover(project_dir, path_filter))
            .await?;
        let stdout = discovery_stdout(project_dir, output)?;
        Ok(self.parser.parse_discovery(project_dir, &stdout))
    }

    async fn execute(&self, scope: &EvalScope) -> Result<ErrorMap, RunnerError> {
        let invocation = Invocation::execute(&scope.project_dir, scope.filter.clone());
        let output = self.runner.run(&invocation).await?;
        let stdout = execution_stdout(&invocation, output)?;

        Ok(match &scope.filter {
            Some(filter) if self.parser.is_line_target(filter) => {
                self.parser.parse_targeted_errors(filter, &stdout)
            }
            _ => self.parser.parse_whole_run_errors(&stdout),
        })
    }
}
