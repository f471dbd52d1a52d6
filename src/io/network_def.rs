//! Hydrodynamic network definition, as JSON converted from the model's ini file.
//!
//! The converter writes every value as a string, and a section that occurs
//! once comes out as an object rather than a list.

use crate::error::{Result, ScenarioError};
use crate::geometry::Point;
use crate::network::{HydroNetwork, NetworkEdge, NetworkGraph, NetworkNode};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BranchRecord {
    id: String,
    from_node: String,
    to_node: String,
    grid_point_offsets: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: String,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NetworkData {
    #[serde(rename = "Branch", default)]
    branches: OneOrMany<BranchRecord>,
    #[serde(rename = "Node", default)]
    nodes: OneOrMany<NodeRecord>,
}

#[derive(Debug, Deserialize)]
struct NetworkDocument {
    data: NetworkData,
}

/// Branch length: the last grid point offset.
fn branch_length(branch: &BranchRecord) -> Result<f64> {
    let last = branch
        .grid_point_offsets
        .split_whitespace()
        .last()
        .ok_or_else(|| {
            ScenarioError::Format(format!("branch {} has no grid point offsets", branch.id))
        })?;
    last.parse::<f64>().map_err(|e| {
        ScenarioError::Format(format!(
            "branch {}: invalid offset '{}': {}",
            branch.id, last, e
        ))
    })
}

fn node_location(node: &NodeRecord) -> Option<Point> {
    let x = node.x.as_deref()?.trim().parse::<f64>().ok()?;
    let y = node.y.as_deref()?.trim().parse::<f64>().ok()?;
    Some(Point::new(x, y))
}

/// Builds the hydro network from the JSON text, leaving out `exclude` branches.
pub fn parse_network_definition(text: &str, exclude: &[String]) -> Result<HydroNetwork> {
    let document: NetworkDocument = serde_json::from_str(text)?;
    let exclude: HashSet<&str> = exclude.iter().map(String::as_str).collect();

    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for branch in document.data.branches.into_vec() {
        seen.insert(branch.id.clone());
        if exclude.contains(branch.id.as_str()) {
            continue;
        }
        edges.push(NetworkEdge {
            length: branch_length(&branch)?,
            id: branch.id,
            from: branch.from_node,
            to: branch.to_node,
            name: branch.name,
        });
    }
    for id in exclude.iter().filter(|id| !seen.contains(**id)) {
        warn!("Excluded branch {} is not in the network definition", id);
    }

    let nodes = document
        .data
        .nodes
        .into_vec()
        .into_iter()
        .map(|node| NetworkNode {
            location: node_location(&node),
            id: node.id,
        })
        .collect();

    Ok(NetworkGraph::build(edges, nodes))
}

pub fn read_network_definition(path: &Path, exclude: &[String]) -> Result<HydroNetwork> {
    let text = std::fs::read_to_string(path)?;
    let network = parse_network_definition(&text, exclude)?;
    info!(
        "Hydro network built with {} nodes and {} branches",
        network.node_count(),
        network.edge_count()
    );
    Ok(network)
}
