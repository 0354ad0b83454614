use extest_core::config::{
    RunnerConfig, DEFAULT_EXCLUDE_DIRS, DEFAULT_MANIFEST_FILE, DEFAULT_MIX_PROGRAM,
    DEFAULT_ROOT_LABEL, DEFAULT_SEED,
};
use extest_core::Config;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.runner.program, DEFAULT_MIX_PROGRAM);
    assert_eq!(config.runner.seed, DEFAULT_SEED);
    assert_eq!(config.tree.root_label, DEFAULT_ROOT_LABEL);
    assert_eq!(config.scan.manifest_file, DEFAULT_MANIFEST_FILE);
    assert_eq!(config.scan.exclude_dirs.len(), DEFAULT_EXCLUDE_DIRS.len());
}

#[test]
fn test_config_from_toml() {
    let toml_str = r#"
[runner]
seed = 7
trace = false
extra_args = ["--warnings-as-errors"]

[tree]
root_label = "Tests"

[scan]
exclude_dirs = ["vendor"]
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.runner.seed, 7);
    assert!(!config.runner.trace);
    assert_eq!(config.runner.extra_args, vec!["--warnings-as-errors".to_string()]);
    assert_eq!(config.tree.root_label, "Tests");
    assert_eq!(config.scan.exclude_dirs, vec!["vendor".to_string()]);
}

#[test]
fn test_partial_config_uses_defaults() {
    let toml_str = r#"
[runner]
only_tag = "integration"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.runner.only_tag, "integration");
    assert_eq!(config.runner.program, DEFAULT_MIX_PROGRAM);
    assert!(config.runner.trace);
    assert_eq!(config.tree.test_dir_name, "test");
}

#[test]
fn test_config_round_trips_through_default_string() {
    let rendered = Config::default_config_string();
    let config: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(config.runner.program, RunnerConfig::default().program);
    assert_eq!(config.scan.test_dir, "test");
}

#[test]
fn test_config_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("extest.toml");
    fs::write(&path, "[tree]\nroot_label = \"Suite\"\n").unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.tree.root_label, "Suite");
}

#[test]
fn test_config_from_invalid_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("extest.toml");
    fs::write(&path, "[runner\nseed = ").unwrap();

    assert!(Config::from_file(&path).is_err());
    assert!(Config::from_file(temp.path().join("missing.toml")).is_err());
}
