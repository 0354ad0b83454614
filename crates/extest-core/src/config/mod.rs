//! Configuration management for extest.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `extest.toml` file
//! 3. User config `~/.config/extest/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How the test runner is invoked.
    pub runner: RunnerConfig,

    /// Shape of the test tree.
    pub tree: TreeConfig,

    /// Workspace scanning.
    pub scan: ScanConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./extest.toml` (project local)
    /// 2. `~/.config/extest/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new(PROJECT_CONFIG_FILE).exists() {
            return Self::from_file(PROJECT_CONFIG_FILE);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(USER_CONFIG_DIR).join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(program) = std::env::var("EXTEST_MIX_PROGRAM") {
            self.runner.program = program;
        }
        if let Ok(seed) = std::env::var("EXTEST_SEED") {
            if let Ok(n) = seed.parse() {
                self.runner.seed = n;
            }
        }
        if let Ok(dir) = std::env::var("EXTEST_TEST_DIR") {
            self.tree.test_dir_name = dir.clone();
            self.scan.test_dir = dir;
        }
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Test runner invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Executable that runs the suite (`mix`).
    pub program: String,

    /// Seed fixing case order, so discovery output is stable.
    pub seed: u64,

    /// Pass `--trace` on discovery runs (one line per case).
    pub trace: bool,

    /// Tag given to `--only` on discovery runs.
    pub only_tag: String,

    /// Extra arguments appended after the built-in ones.
    pub extra_args: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_MIX_PROGRAM.to_string(),
            seed: DEFAULT_SEED,
            trace: true,
            only_tag: DEFAULT_ONLY_TAG.to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Test tree settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Label prefix for the root suite.
    pub root_label: String,

    /// Path segment folded into its parent instead of becoming a suite.
    pub test_dir_name: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            root_label: DEFAULT_ROOT_LABEL.to_string(),
            test_dir_name: DEFAULT_TEST_DIR_NAME.to_string(),
        }
    }
}

/// Workspace scanning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File that marks a project root.
    pub manifest_file: String,

    /// Directory that must exist next to the manifest.
    pub test_dir: String,

    /// Directory names never descended into.
    pub exclude_dirs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
            test_dir: DEFAULT_SCAN_TEST_DIR.to_string(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
