//! Street-network statistics.
//!
//! [`basic_stats`] measures size, density, and street geometry.
//! [`extended_stats`] adds centrality and connectivity measures, the
//! costlier of which are only computed when switched on.

pub mod basic;
pub mod extended;
mod flow;

use std::collections::{BTreeMap, BTreeSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use urbankit_network_models::StatValue;

pub use basic::basic_stats;
pub use extended::extended_stats;

use crate::graph::StreetGraph;

/// Names of every basic statistic, in output order.
pub const BASIC_STATS: &[&str] = &[
    "n",
    "m",
    "k_avg",
    "edge_length_total",
    "edge_length_avg",
    "streets_per_node_avg",
    "streets_per_node_counts",
    "streets_per_node_proportions",
    "intersection_count",
    "street_length_total",
    "street_segment_count",
    "street_length_avg",
    "circuity_avg",
    "self_loop_proportion",
    "node_density_km",
    "intersection_density_km",
    "edge_density_km",
    "street_density_km",
];

/// Names of every extended statistic, in output order.
pub const EXTENDED_STATS: &[&str] = &[
    "avg_neighbor_degree",
    "avg_neighbor_degree_avg",
    "degree_centrality",
    "degree_centrality_avg",
    "clustering_coefficient",
    "clustering_coefficient_avg",
    "pagerank",
    "pagerank_max_node",
    "pagerank_max",
    "pagerank_min_node",
    "pagerank_min",
    "node_connectivity",
    "edge_connectivity",
    "node_connectivity_avg",
    "eccentricity",
    "diameter",
    "radius",
    "center",
    "periphery",
    "closeness_centrality",
    "closeness_centrality_avg",
    "betweenness_centrality",
    "betweenness_centrality_avg",
];

/// Statistics keyed by name.
pub type Stats = BTreeMap<String, StatValue>;

/// Directed graph with parallel edges collapsed to the shortest one.
///
/// Node weights are OSM ids and node indices match the source graph.
pub(crate) fn simple_digraph(street: &StreetGraph) -> DiGraph<i64, f64> {
    let source = street.graph();
    let mut shortest: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for edge in source.edge_references() {
        let key = (edge.source().index(), edge.target().index());
        let length = edge.weight().length;
        shortest
            .entry(key)
            .and_modify(|l| *l = l.min(length))
            .or_insert(length);
    }

    let mut graph = DiGraph::with_capacity(source.node_count(), shortest.len());
    for node in source.node_weights() {
        graph.add_node(node.osm_id);
    }
    for ((u, v), length) in shortest {
        graph.add_edge(NodeIndex::new(u), NodeIndex::new(v), length);
    }
    graph
}

/// Undirected neighbour sets with self-loops dropped.
pub(crate) fn undirected_neighbors(street: &StreetGraph) -> Vec<BTreeSet<usize>> {
    let source = street.graph();
    let mut neighbors = vec![BTreeSet::new(); source.node_count()];
    for edge in source.edge_references() {
        let (u, v) = (edge.source().index(), edge.target().index());
        if u != v {
            neighbors[u].insert(v);
            neighbors[v].insert(u);
        }
    }
    neighbors
}

/// Mean of a non-empty sequence.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
