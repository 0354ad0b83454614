use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use extest_core::{
    scan_projects, Config, ExportScope, LoadOutcome, MixRunner, TestOrchestrator,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser)]
#[command(name = "extest")]
#[command(about = "Discover and run ExUnit tests from the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List mix projects found in a workspace
    Scan {
        /// Workspace directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Discover every test in a workspace and print the tree
    Load {
        /// Workspace directory
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the tests under a node id
    Run {
        /// Node id as printed by `load` (the whole workspace when omitted)
        id: Option<String>,
        /// Workspace directory
        #[arg(long, default_value = ".")]
        workspace: PathBuf,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the default configuration
    Config,
}

type Orchestrator = TestOrchestrator<MixRunner>;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { dir } => {
            let config = Config::load()?;
            for project in scan_projects(&dir, &config.scan)? {
                println!("{}", project.display());
            }
        }
        Commands::Load { dir, json } => {
            let config = Config::load()?;
            let (_, outcome) = load_workspace(&dir, config).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.suite)?);
            } else {
                print!("{}", render::render_tree(&outcome.suite));
            }
            report_load_failures(&outcome);

            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Run {
            id,
            workspace,
            json,
        } => {
            let config = Config::load()?;
            let (orchestrator, loaded) = load_workspace(&workspace, config).await?;
            report_load_failures(&loaded);

            let target = match id {
                Some(id) => id,
                None => orchestrator.export(&ExportScope::All).await?.id,
            };

            let cancel = orchestrator.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupted, cancelling test run");
                    cancel.cancel();
                }
            });

            let outcome = orchestrator.evaluate(&target).await?;

            if json {
                let failures: Vec<String> = outcome.failures.iter().map(|f| f.to_string()).collect();
                let value = serde_json::json!({
                    "results": &outcome.results,
                    "failures": failures,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print!("{}", render::render_outcome(&outcome));
            }

            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Config => {
            print!("{}", Config::default_config_string());
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("EXTEST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn load_workspace(dir: &Path, config: Config) -> Result<(Orchestrator, LoadOutcome)> {
    let dir = std::fs::canonicalize(dir)?;
    let projects = scan_projects(&dir, &config.scan)?;
    if projects.is_empty() {
        return Err(eyre!(
            "no mix project with a `{}` directory found under {}",
            config.scan.test_dir,
            dir.display()
        ));
    }

    debug!(projects = ?projects, "scanned workspace");

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace".to_string());
    let runner = MixRunner::with_config(config.runner);
    let orchestrator = TestOrchestrator::with_config(runner, name, config.tree);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.cyan} {msg}")?,
    );
    spinner.set_message(format!("Discovering tests in {} projects...", projects.len()));
    spinner.enable_steady_tick(Duration::from_millis(80));

    let outcome = orchestrator.load(&projects).await;
    spinner.finish_and_clear();

    Ok((orchestrator, outcome?))
}

fn report_load_failures(outcome: &LoadOutcome) {
    for failure in &outcome.failures {
        eprintln!("discovery failed for {}", failure);
    }
}
