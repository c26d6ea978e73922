//! Link-graph precomputation.
//!
//! The site's interactive graph view is seeded with data computed here at
//! export time: one node per exported page, one edge per resolved link, and a
//! radius per node that grows with its link count.
//!
//! ## Sizing
//!
//! Linked nodes get `blend(min, max, min(count / (max_links * SATURATION), 1))`
//! where `blend` is an in-out quadratic ease, so the best-connected nodes
//! reach the maximum radius before the absolute maximum link count. Unlinked
//! nodes keep the minimum radius.
//!
//! ## Ordering
//!
//! Nodes are stably sorted by descending radius, and every edge endpoint is
//! remapped through that permutation. Nodes with equal radius keep their
//! enumeration order, so the output is deterministic for a given vault.

use crate::config::GraphConfig;
use crate::naming::{self, PathRules};
use crate::unit::SourceDocument;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Fraction of the maximum link count that already reaches the maximum radius.
pub const SATURATION: f64 = 0.8;

/// Force-layout parameters passed through to the graph view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphOptions {
    pub attraction_force: f64,
    pub link_length: f64,
    pub repulsion_force: f64,
    pub central_force: f64,
    /// 0-100, applied by the view as a display threshold.
    pub edge_pruning: f64,
    pub min_node_radius: f64,
    pub max_node_radius: f64,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            attraction_force: 1.0,
            link_length: 10.0,
            repulsion_force: 150.0,
            central_force: 3.0,
            edge_pruning: 100.0,
            min_node_radius: 3.0,
            max_node_radius: 7.0,
        }
    }
}

impl From<&GraphConfig> for GraphOptions {
    fn from(config: &GraphConfig) -> Self {
        Self {
            attraction_force: config.attraction_force,
            link_length: config.link_length,
            repulsion_force: config.repulsion_force,
            central_force: config.central_force,
            edge_pruning: config.edge_pruning,
            min_node_radius: config.min_node_size,
            max_node_radius: config.max_node_size,
        }
    }
}

/// Quadratic ease between `start` and `end` for `t` in `[0, 1]`.
pub fn in_out_quad_blend(start: f64, end: f64, t: f64) -> f64 {
    let t = t / 2.0;
    let mut t2 = 2.0 * t * (1.0 - t) + 0.5;
    t2 -= 0.5;
    t2 *= 2.0;
    start + (end - start) * t2
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub label: String,
    /// Vault-relative source path.
    pub source_path: String,
    /// Output path, following the page naming rules.
    pub path: String,
    pub radius: f64,
    pub link_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphEdge {
    pub source: usize,
    pub target: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub options: GraphOptions,
}

/// Build the graph over `documents` from resolved `(source, target)` links.
///
/// Only convertible documents become nodes. Links with an endpoint that is
/// not a node, self links, and repeated links are dropped.
pub fn build_graph(
    documents: &[SourceDocument],
    links: &[(String, String)],
    rules: &PathRules,
    options: GraphOptions,
) -> Graph {
    let mut nodes: Vec<GraphNode> = Vec::new();
    let mut index_of: BTreeMap<String, usize> = BTreeMap::new();
    for document in documents.iter().filter(|d| naming::is_convertible(&d.path)) {
        let key = document.key().to_string();
        if index_of.contains_key(&key) {
            continue;
        }
        index_of.insert(key.clone(), nodes.len());
        nodes.push(GraphNode {
            label: document.title().to_string(),
            source_path: key,
            path: rules.destination_for(&document.path).as_str().to_string(),
            radius: options.min_node_radius,
            link_count: 0,
        });
    }

    let mut seen = BTreeSet::new();
    let mut edges = Vec::new();
    for (source, target) in links {
        let (Some(&s), Some(&t)) = (index_of.get(source), index_of.get(target)) else {
            continue;
        };
        if s == t || !seen.insert((s, t)) {
            continue;
        }
        nodes[s].link_count += 1;
        nodes[t].link_count += 1;
        edges.push(GraphEdge {
            source: s,
            target: t,
        });
    }

    let max_links = nodes.iter().map(|n| n.link_count).max().unwrap_or(0);
    if max_links > 0 {
        for node in nodes.iter_mut().filter(|n| n.link_count > 0) {
            let t = (node.link_count as f64 / (max_links as f64 * SATURATION)).min(1.0);
            node.radius = in_out_quad_blend(options.min_node_radius, options.max_node_radius, t);
        }
    }

    let mut order: Vec<usize> = (0..nodes.len()).collect();
    order.sort_by(|&a, &b| nodes[b].radius.total_cmp(&nodes[a].radius));
    let mut position = vec![0; nodes.len()];
    for (new, &old) in order.iter().enumerate() {
        position[old] = new;
    }
    let nodes: Vec<GraphNode> = order.iter().map(|&old| nodes[old].clone()).collect();
    for edge in &mut edges {
        edge.source = position[edge.source];
        edge.target = position[edge.target];
    }

    tracing::debug!(nodes = nodes.len(), edges = edges.len(), max_links, "built link graph");
    Graph {
        nodes,
        edges,
        options,
    }
}

/// Serialized form consumed by the graph view script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphData {
    pub node_count: usize,
    pub link_count: usize,
    pub radii: Vec<f64>,
    pub labels: Vec<String>,
    pub paths: Vec<String>,
    pub link_sources: Vec<usize>,
    pub link_targets: Vec<usize>,
    pub link_counts: Vec<usize>,
    pub graph_options: GraphOptions,
}

impl Graph {
    pub fn to_data(&self) -> GraphData {
        GraphData {
            node_count: self.nodes.len(),
            link_count: self.edges.len(),
            radii: self.nodes.iter().map(|n| n.radius).collect(),
            labels: self.nodes.iter().map(|n| n.label.clone()).collect(),
            paths: self.nodes.iter().map(|n| n.path.clone()).collect(),
            link_sources: self.edges.iter().map(|e| e.source).collect(),
            link_targets: self.edges.iter().map(|e| e.target).collect(),
            link_counts: self.nodes.iter().map(|n| n.link_count).collect(),
            graph_options: self.options.clone(),
        }
    }
}

impl GraphData {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Script body assigning the data to a global `graphData`.
    pub fn to_script(&self) -> Result<String, serde_json::Error> {
        Ok(format!("let graphData=\n{};", serde_json::to_string(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn docs(paths: &[&str]) -> Vec<SourceDocument> {
        paths.iter().map(|p| SourceDocument::new(p, 1, 1)).collect()
    }

    fn links(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect()
    }

    fn build(paths: &[&str], pairs: &[(&str, &str)]) -> Graph {
        build_graph(
            &docs(paths),
            &links(pairs),
            &PathRules::default(),
            GraphOptions::default(),
        )
    }

    // =========================================================================
    // Blend
    // =========================================================================

    #[test]
    fn blend_endpoints() {
        assert_eq!(in_out_quad_blend(3.0, 7.0, 0.0), 3.0);
        assert_eq!(in_out_quad_blend(3.0, 7.0, 1.0), 7.0);
    }

    #[test]
    fn blend_is_monotonic() {
        let mut last = f64::MIN;
        for i in 0..=100 {
            let r = in_out_quad_blend(3.0, 7.0, i as f64 / 100.0);
            assert!(r >= last);
            last = r;
        }
    }

    // =========================================================================
    // Nodes and edges
    // =========================================================================

    #[test]
    fn only_convertible_documents_are_nodes() {
        let g = build(&["A.md", "img.png", "B.canvas"], &[]);
        let labels: Vec<&str> = g.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B"]);
    }

    #[test]
    fn node_paths_follow_page_rules() {
        let g = build_graph(
            &docs(&["Notes/My Page.md"]),
            &[],
            &PathRules::new("", false, true),
            GraphOptions::default(),
        );
        assert_eq!(g.nodes[0].path, "notes/my-page.html");
    }

    #[test]
    fn links_outside_the_node_set_are_pruned() {
        let g = build(
            &["A.md", "B.md"],
            &[("A.md", "B.md"), ("A.md", "Gone.md"), ("A.md", "A.md"), ("A.md", "B.md")],
        );
        assert_eq!(g.edges.len(), 1);
        let total: usize = g.nodes.iter().map(|n| n.link_count).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn edge_indices_are_valid_after_sort() {
        let g = build(
            &["A.md", "B.md", "C.md", "D.md"],
            &[("A.md", "D.md"), ("B.md", "D.md"), ("C.md", "D.md"), ("C.md", "B.md")],
        );
        for e in &g.edges {
            assert!(e.source < g.nodes.len());
            assert!(e.target < g.nodes.len());
        }
        assert_eq!(g.nodes[0].label, "D");
        let d = 0;
        let pointing_at_d = g.edges.iter().filter(|e| e.target == d).count();
        assert_eq!(pointing_at_d, 3);
    }

    #[test]
    fn edges_survive_remapping_by_name() {
        let g = build(&["A.md", "B.md", "C.md"], &[("A.md", "C.md"), ("B.md", "C.md")]);
        let named: Vec<(String, String)> = g
            .edges
            .iter()
            .map(|e| (g.nodes[e.source].label.clone(), g.nodes[e.target].label.clone()))
            .collect();
        assert_eq!(
            named,
            vec![("A".to_string(), "C".to_string()), ("B".to_string(), "C".to_string())]
        );
    }

    #[test]
    fn equal_radii_keep_enumeration_order() {
        let g = build(&["A.md", "B.md", "C.md", "D.md"], &[("A.md", "B.md")]);
        let labels: Vec<&str> = g.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn radius_grows_with_link_count() {
        let g = build(
            &["Hub.md", "Mid.md", "Leaf.md", "X.md", "Y.md", "Alone.md"],
            &[
                ("X.md", "Hub.md"),
                ("Y.md", "Hub.md"),
                ("Mid.md", "Hub.md"),
                ("Leaf.md", "Mid.md"),
            ],
        );
        let mut by_count: Vec<(usize, f64)> =
            g.nodes.iter().map(|n| (n.link_count, n.radius)).collect();
        by_count.sort_by(|a, b| a.0.cmp(&b.0));
        for pair in by_count.windows(2) {
            assert!(pair[1].1 >= pair[0].1, "{:?}", by_count);
        }
        let alone = g.nodes.iter().find(|n| n.label == "Alone").unwrap();
        assert_eq!(alone.radius, 3.0);
    }

    #[test]
    fn no_links_means_minimum_radius() {
        let g = build(&["A.md", "B.md"], &[]);
        assert!(g.nodes.iter().all(|n| n.radius == 3.0));
    }

    // =========================================================================
    // Export data
    // =========================================================================

    #[test]
    fn data_uses_camel_case_keys() {
        let g = build(&["A.md", "B.md"], &[("A.md", "B.md")]);
        let json = serde_json::to_value(g.to_data()).unwrap();
        assert_eq!(json["nodeCount"], 2);
        assert_eq!(json["linkCount"], 1);
        assert_eq!(json["graphOptions"]["repulsionForce"], 150.0);
        assert_eq!(json["graphOptions"]["edgePruning"], 100.0);
        assert!(json["linkSources"].is_array());
    }

    #[test]
    fn script_assigns_global() {
        let g = build(&["A.md"], &[]);
        let script = g.to_data().to_script().unwrap();
        assert!(script.starts_with("let graphData=\n{"));
        assert!(script.ends_with("};"));
    }
}
