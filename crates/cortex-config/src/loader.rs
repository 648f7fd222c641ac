// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later ones winning:
//! 1. TOML file (base values; missing keys take defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{CalibrationPolicy, ConfigError, ConfigResult, CortexConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "cortex_wiring.toml";

/// Find the configuration file
///
/// Search order:
/// 1. `CORTEX_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("CORTEX_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by CORTEX_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd;
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent.to_path_buf();
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet CORTEX_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file and apply overrides
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is searched for.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the file is missing, contains invalid TOML, or an
/// override value cannot be parsed
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<CortexConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: CortexConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

/// Apply environment variable overrides
///
/// Supported environment variables:
/// - `CORTEX_SEED` -> `network.seed`
/// - `CORTEX_NUM_CELLS` -> `network.num_cells`
/// - `CORTEX_EDGE_EFFECTS` -> `network.edge_effects`
/// - `CORTEX_OUTPUT_DIR` -> `output.output_dir`
/// - `CORTEX_LOG_LEVEL` -> `logging.log_level`
/// - `CORTEX_CALIBRATION_POLICY` -> `calibration.policy`
pub fn apply_environment_overrides(config: &mut CortexConfig) -> ConfigResult<()> {
    if let Ok(value) = env::var("CORTEX_SEED") {
        config.network.seed = parse("CORTEX_SEED", &value)?;
    }
    if let Ok(value) = env::var("CORTEX_NUM_CELLS") {
        config.network.num_cells = parse("CORTEX_NUM_CELLS", &value)?;
    }
    if let Ok(value) = env::var("CORTEX_EDGE_EFFECTS") {
        config.network.edge_effects = parse_bool(&value);
    }
    if let Ok(value) = env::var("CORTEX_OUTPUT_DIR") {
        config.output.output_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("CORTEX_LOG_LEVEL") {
        config.logging.log_level = value;
    }
    if let Ok(value) = env::var("CORTEX_CALIBRATION_POLICY") {
        config.calibration.policy = parse_policy("CORTEX_CALIBRATION_POLICY", &value)?;
    }
    Ok(())
}

/// Apply CLI argument overrides
///
/// Keys: `seed`, `num_cells`, `edge_effects`, `output_dir`, `log_level`,
/// `calibration_policy`, `nrr`
pub fn apply_cli_overrides(
    config: &mut CortexConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(value) = cli_args.get("seed") {
        config.network.seed = parse("seed", value)?;
    }
    if let Some(value) = cli_args.get("num_cells") {
        config.network.num_cells = parse("num_cells", value)?;
    }
    if let Some(value) = cli_args.get("edge_effects") {
        config.network.edge_effects = parse_bool(value);
    }
    if let Some(value) = cli_args.get("output_dir") {
        config.output.output_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.log_level = value.clone();
    }
    if let Some(value) = cli_args.get("calibration_policy") {
        config.calibration.policy = parse_policy("calibration_policy", value)?;
    }
    if let Some(value) = cli_args.get("nrr") {
        config.reciprocal.nrr = parse("nrr", value)?;
    }
    Ok(())
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}'", name, value)))
}

fn parse_bool(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value == "true" || value == "1" || value == "yes"
}

fn parse_policy(name: &str, value: &str) -> ConfigResult<CalibrationPolicy> {
    value
        .parse::<CalibrationPolicy>()
        .map_err(|reason| ConfigError::InvalidValue(format!("{}: {}", name, reason)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDE_VARS: [&str; 6] = [
        "CORTEX_SEED",
        "CORTEX_NUM_CELLS",
        "CORTEX_EDGE_EFFECTS",
        "CORTEX_OUTPUT_DIR",
        "CORTEX_LOG_LEVEL",
        "CORTEX_CALIBRATION_POLICY",
    ];

    fn clear_overrides() {
        for var in OVERRIDE_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom.toml");
        File::create(&config_path).unwrap();

        env::set_var("CORTEX_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("CORTEX_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("CORTEX_CONFIG_PATH", "/nonexistent/cortex_wiring.toml");
        let result = find_config_file();
        env::remove_var("CORTEX_CONFIG_PATH");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_overrides();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[network]").unwrap();
        writeln!(file, "seed = 42").unwrap();
        writeln!(file, "num_cells = 850").unwrap();
        writeln!(file, "[reciprocal]").unwrap();
        writeln!(file, "nrr = 2.5").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.network.seed, 42);
        assert_eq!(config.network.num_cells, 850);
        assert_eq!(config.reciprocal.nrr, 2.5);
        assert_eq!(config.reference.num_cells, 10000);
    }

    #[test]
    fn test_invalid_toml() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[network\nseed = ").unwrap();
        assert!(matches!(
            load_config(Some(&config_path), None),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = CortexConfig::default();

        env::set_var("CORTEX_SEED", "7");
        env::set_var("CORTEX_EDGE_EFFECTS", "yes");
        env::set_var("CORTEX_CALIBRATION_POLICY", "clamp");
        let result = apply_environment_overrides(&mut config);
        clear_overrides();

        result.unwrap();
        assert_eq!(config.network.seed, 7);
        assert!(config.network.edge_effects);
        assert_eq!(config.calibration.policy, CalibrationPolicy::Clamp);
    }

    #[test]
    fn test_bad_environment_value_is_error() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = CortexConfig::default();
        env::set_var("CORTEX_NUM_CELLS", "many");
        let result = apply_environment_overrides(&mut config);
        clear_overrides();
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = CortexConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("num_cells".to_string(), "1000".to_string());
        cli_args.insert("output_dir".to_string(), "/tmp/l5".to_string());
        cli_args.insert("nrr".to_string(), "1.0".to_string());

        apply_cli_overrides(&mut config, &cli_args).unwrap();

        assert_eq!(config.network.num_cells, 1000);
        assert_eq!(config.output.output_dir, PathBuf::from("/tmp/l5"));
        assert_eq!(config.reciprocal.nrr, 1.0);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_overrides();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[network]").unwrap();
        writeln!(file, "seed = 1").unwrap();
        writeln!(file, "num_cells = 100").unwrap();

        env::set_var("CORTEX_SEED", "2");
        env::set_var("CORTEX_NUM_CELLS", "200");

        let mut cli_args = HashMap::new();
        cli_args.insert("seed".to_string(), "3".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args));
        clear_overrides();
        let config = config.unwrap();

        // CLI wins for seed, env wins for num_cells (no CLI override)
        assert_eq!(config.network.seed, 3);
        assert_eq!(config.network.num_cells, 200);
    }
}
