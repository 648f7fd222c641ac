// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! JSON Lines export of a built network.
//!
//! One line per node and one line per edge, followed by a pretty-printed
//! build summary. Edge lines carry the edge type and both network names next
//! to the flattened record fields.

use crate::builder::{BuildSummary, BuiltNetwork, ModelType};
use crate::error::NetworkResult;
use cortex_config::OutputConfig;
use cortex_connectivity::{CellId, EdgeRecord, Position};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Serialize)]
struct NodeLine<'a> {
    network: &'a str,
    node_id: CellId,
    pop_name: &'a str,
    model_type: ModelType,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<Position>,
}

#[derive(Serialize)]
struct EdgeLine<'a> {
    edge_type: &'a str,
    source_network: &'a str,
    target_network: &'a str,
    #[serde(flatten)]
    record: &'a EdgeRecord,
}

/// Paths written by `save_network`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFiles {
    pub nodes: PathBuf,
    pub edges: PathBuf,
    pub summary: PathBuf,
}

/// Write one JSON object per node; returns the number of lines
pub fn write_nodes_jsonl(path: &Path, network: &BuiltNetwork) -> NetworkResult<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    let mut lines = 0;
    for group in &network.nodes {
        let population = &group.population;
        for (index, &node_id) in population.ids().iter().enumerate() {
            let line = NodeLine {
                network: &population.network,
                node_id,
                pop_name: &population.label,
                model_type: group.model_type,
                position: population.position(index),
            };
            serde_json::to_writer(&mut out, &line)?;
            out.write_all(b"\n")?;
            lines += 1;
        }
    }
    out.flush()?;
    Ok(lines)
}

/// Write one JSON object per edge; returns the number of lines
pub fn write_edges_jsonl(path: &Path, network: &BuiltNetwork) -> NetworkResult<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    let mut lines = 0;
    for table in &network.edges {
        for record in &table.records {
            let line = EdgeLine {
                edge_type: &table.name,
                source_network: &table.source.network,
                target_network: &table.target.network,
                record,
            };
            serde_json::to_writer(&mut out, &line)?;
            out.write_all(b"\n")?;
            lines += 1;
        }
    }
    out.flush()?;
    Ok(lines)
}

pub fn write_summary_json(path: &Path, summary: &BuildSummary) -> NetworkResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, summary)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Write nodes, edges and summary into `output.output_dir`.
///
/// With `output.clean`, regular files already in the directory are removed
/// first; subdirectories are left alone.
pub fn save_network(network: &BuiltNetwork, output: &OutputConfig) -> NetworkResult<SavedFiles> {
    let dir = &output.output_dir;
    if output.clean && dir.is_dir() {
        let mut removed = 0;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        debug!(target: "cortex-network", "Removed {} files from {}", removed, dir.display());
    }
    fs::create_dir_all(dir)?;

    let files = SavedFiles {
        nodes: dir.join(&output.nodes_file),
        edges: dir.join(&output.edges_file),
        summary: dir.join(&output.summary_file),
    };
    let nodes = write_nodes_jsonl(&files.nodes, network)?;
    let edges = write_edges_jsonl(&files.edges, network)?;
    write_summary_json(&files.summary, &network.summary)?;
    info!(
        target: "cortex-network",
        "Saved {} nodes and {} edges to {}",
        nodes,
        edges,
        dir.display()
    );
    Ok(files)
}
