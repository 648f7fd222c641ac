// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # End-to-End Tests
//!
//! Config file on disk -> validated config -> built column -> files on disk.

use cortex_wiring::prelude::*;
use std::collections::HashMap;
use std::fs;

const SMALL_COLUMN: &str = r#"
[network]
seed = 42
num_cells = 250
use_poisson_disc = false

[calibration]
policy = "clamp"

[gap_junctions]
enabled = true
"#;

#[test]
fn test_config_file_to_network_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config_path = dir.path().join("cortex_wiring.toml");
    fs::write(&config_path, SMALL_COLUMN).expect("write config");

    let mut overrides = HashMap::new();
    overrides.insert(
        "output_dir".to_string(),
        dir.path().join("out").display().to_string(),
    );
    let config = load_config(Some(&config_path), Some(&overrides)).expect("load config");
    validate_config(&config).expect("valid config");
    assert_eq!(config.network.num_cells, 250);
    assert_eq!(config.calibration.policy, CalibrationPolicy::Clamp);

    let network = build_l5(&config).expect("build");
    let files = save_network(&network, &config.output).expect("save");

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&files.summary).expect("summary"))
            .expect("summary json");
    assert_eq!(summary["seed"], 42);
    assert_eq!(summary["nodes"]["cortex"], 250);
    assert_eq!(
        summary["total_edges"].as_u64(),
        Some(network.summary.total_edges as u64)
    );

    let edge_types: Vec<&str> = summary["edge_types"]
        .as_array()
        .expect("edge type list")
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(edge_types.first(), Some(&"CP2CP"));
    assert!(edge_types.contains(&"UNCOR_LTS2CS"));
    assert_eq!(edge_types.last(), Some(&"LTS_gap"));
}

#[test]
fn test_invalid_config_is_rejected_before_building() {
    let mut config = CortexConfig::default();
    config.network.num_cells = 0;
    assert!(validate_config(&config).is_err());
    assert!(build_l5(&config).is_err());
}

#[test]
fn test_custom_network_through_prelude() {
    let mut builder = NetworkBuilder::new(99);
    builder
        .add_population(
            Population::new("retina", "RGC", (0..20).collect()),
            ModelType::Virtual,
        )
        .expect("source population");
    builder
        .add_population(
            Population::new("cortex", "CP", (0..20).collect()),
            ModelType::Biophysical,
        )
        .expect("target population");
    builder
        .add_edge_type(
            EdgeTypeSpec::new(
                "RGC2CP",
                PopulationRef::new("retina", "RGC"),
                PopulationRef::new("cortex", "CP"),
                ConnectorSpec::OneToOne,
            )
            .with_properties(EdgePropertyRule {
                delay: cortex_wiring::connectivity::Delay::Fixed { delay: 2.0 },
                placement: cortex_wiring::connectivity::Placement::Fixed {
                    section_id: 0,
                    section_pos: 0.5,
                },
                weight: cortex_wiring::connectivity::WeightRule::Constant { syn_weight: 0.25 },
            }),
        )
        .expect("edge type");

    let network = builder.build().expect("build");
    let table = network.edge_table("RGC2CP").expect("table");
    assert_eq!(table.len(), 20);
    assert!(table
        .records
        .iter()
        .all(|r| r.source == r.target && r.delay == 2.0 && r.syn_weight == 0.25));
}
