//! Default values for extest configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Runner Defaults
// ============================================================================

/// Program used to run the test suite.
pub const DEFAULT_MIX_PROGRAM: &str = "mix";

/// Seed passed to every invocation so case ordering is stable across runs.
pub const DEFAULT_SEED: u64 = 0;

/// Tag passed to `--only` on discovery runs.
///
/// The empty tag matches nothing, so every case is listed as excluded
/// and nothing is executed.
pub const DEFAULT_ONLY_TAG: &str = "";

// ============================================================================
// Tree Defaults
// ============================================================================

/// Label prefix of the exported root suite.
pub const DEFAULT_ROOT_LABEL: &str = "ExUnit";

/// Conventional top-level test directory, folded into its parent suite.
pub const DEFAULT_TEST_DIR_NAME: &str = "test";

// ============================================================================
// Scan Defaults
// ============================================================================

/// Manifest file marking a mix project.
pub const DEFAULT_MANIFEST_FILE: &str = "mix.exs";

/// Directory that must sit next to the manifest.
pub const DEFAULT_SCAN_TEST_DIR: &str = "test";

/// Directories never descended into while scanning.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    // Dependencies and build output
    "deps",
    "_build",
    "node_modules",
    // Version control
    ".git",
    // Editor tooling
    ".elixir_ls",
];

// ============================================================================
// Config Files
// ============================================================================

/// Project-local config file name.
pub const PROJECT_CONFIG_FILE: &str = "extest.toml";

/// Directory under the user config dir holding `config.toml`.
pub const USER_CONFIG_DIR: &str = "extest";
