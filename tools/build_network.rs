// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Build the layer-5 column and write it to disk.
//!
//! Configuration comes from `cortex_wiring.toml` (searched like every other
//! tool), then `CORTEX_*` environment variables, then the flags below.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use cortex_config::{
    apply_cli_overrides, apply_environment_overrides, load_config, validate_config, ConfigError,
    CortexConfig,
};
use cortex_observability::{debug_flags_help, init_logging, parse_debug_flags, ObservabilityConfig};
use tracing::{error, info};

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: build_network [--config <path>] [--seed <n>] [--num-cells <n>]\n\
         \x20                    [--edge-effects <bool>] [--policy <strict|clamp>] [--nrr <x>]\n\
         \x20                    [--output-dir <path>] [--log-level <level>] [--print-config]\n\n\
         Without --config, cortex_wiring.toml is searched in CORTEX_CONFIG_PATH,\n\
         the working directory and its parents; defaults apply when none is found.\n\n\
         {}",
        debug_flags_help()
    );
    process::exit(2);
}

struct Args {
    config: Option<PathBuf>,
    overrides: HashMap<String, String>,
    print_config: bool,
}

fn parse_args() -> Args {
    let mut args_out = Args {
        config: None,
        overrides: HashMap::new(),
        print_config: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let key = match arg.as_str() {
            "--config" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                args_out.config = Some(PathBuf::from(v));
                continue;
            }
            "--print-config" => {
                args_out.print_config = true;
                continue;
            }
            "-h" | "--help" => usage_and_exit(),
            "--seed" => "seed",
            "--num-cells" => "num_cells",
            "--edge-effects" => "edge_effects",
            "--policy" => "calibration_policy",
            "--nrr" => "nrr",
            "--output-dir" => "output_dir",
            "--log-level" => "log_level",
            // Consumed by the debug flag parser
            other if other.starts_with("--debug-") => continue,
            other => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
        };
        let v = args.next().unwrap_or_else(|| usage_and_exit());
        args_out.overrides.insert(key.to_string(), v);
    }

    args_out
}

/// File config if there is one, defaults otherwise; overrides apply either way
fn resolve_config(args: &Args) -> Result<CortexConfig, ConfigError> {
    match load_config(args.config.as_deref(), Some(&args.overrides)) {
        Err(ConfigError::FileNotFound(_)) if args.config.is_none() => {
            let mut config = CortexConfig::default();
            apply_environment_overrides(&mut config)?;
            apply_cli_overrides(&mut config, &args.overrides)?;
            Ok(config)
        }
        other => other,
    }
}

fn run(args: &Args, config: &CortexConfig) -> anyhow::Result<()> {
    let network = cortex_network::build_l5(config).context("network build failed")?;
    let files = cortex_network::save_network(&network, &config.output)
        .with_context(|| format!("failed to write {}", config.output.output_dir.display()))?;
    info!(
        target: "cortex-wiring",
        "Wrote {} edges across {} edge types to {}",
        network.summary.total_edges,
        network.summary.edge_types.len(),
        files.edges.display()
    );
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(config)?);
    }
    Ok(())
}

fn main() {
    let args = parse_args();

    let config = resolve_config(&args).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        process::exit(2);
    });
    if let Err(e) = validate_config(&config) {
        eprintln!("{e}");
        process::exit(2);
    }

    let debug_flags = parse_debug_flags();
    let observability = ObservabilityConfig::with_level(config.logging.log_level.clone())
        .with_log_dir(&config.logging.log_dir);
    let _guard = init_logging(&debug_flags, &observability).unwrap_or_else(|e| {
        eprintln!("Failed to initialise logging: {e:#}");
        process::exit(2);
    });

    info!(
        target: "cortex-wiring",
        "cortex-wiring {} (seed {}, {} cells)",
        cortex_wiring::VERSION,
        config.network.seed,
        config.network.num_cells
    );
    if let Err(e) = run(&args, &config) {
        error!(target: "cortex-wiring", "{e:#}");
        process::exit(1);
    }
}
