//! Runs `mix test` as a child process.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::{debug, info};

use super::{Invocation, InvocationMode, RunOutput, Runner, RunnerError};
use crate::config::RunnerConfig;

/// [`Runner`] backed by the `mix` executable.
#[derive(Debug, Default)]
pub struct MixRunner {
    config: RunnerConfig,
    cancel: Notify,
}

impl MixRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            config,
            cancel: Notify::new(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Command-line arguments for an invocation, program excluded.
    pub fn args(&self, invocation: &Invocation) -> Vec<String> {
        let mut args = vec!["test".to_string()];

        if invocation.mode == InvocationMode::Discover && self.config.trace {
            args.push("--trace".to_string());
        }
        args.push(format!("--seed={}", self.config.seed));
        if invocation.mode == InvocationMode::Discover {
            args.push(format!("--only={}", self.config.only_tag));
        }

        args.extend(self.config.extra_args.iter().cloned());
        if let Some(filter) = &invocation.path_filter {
            args.push(filter.clone());
        }
        args
    }
}

#[async_trait]
impl Runner for MixRunner {
    async fn run(&self, invocation: &Invocation) -> Result<RunOutput, RunnerError> {
        let args = self.args(invocation);
        info!(
            project = %invocation.project_dir.display(),
            mode = ?invocation.mode,
            filter = invocation.path_filter.as_deref().unwrap_or(""),
            "running {}",
            self.config.program
        );

        // Registered before spawning so a cancel racing the spawn is seen.
        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);
        cancelled.as_mut().enable();

        let child = Command::new(&self.config.program)
            .args(&args)
            .current_dir(&invocation.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunnerError::Spawn {
                command: format!("{} {}", self.config.program, args.join(" ")),
                project_dir: invocation.project_dir.clone(),
                message: e.to_string(),
            })?;

        tokio::select! {
            output = child.wait_with_output() => {
                let output = output.map_err(|e| RunnerError::ProcessFailed {
                    project_dir: invocation.project_dir.clone(),
                    exit_code: None,
                    output: e.to_string(),
                })?;
                debug!(status = ?output.status.code(), "runner exited");
                Ok(RunOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code(),
                })
            }
            _ = &mut cancelled => {
                info!(project = %invocation.project_dir.display(), "runner cancelled");
                Err(RunnerError::Cancelled)
            }
        }
    }

    fn cancel(&self) {
        self.cancel.notify_waiters();
    }
}
