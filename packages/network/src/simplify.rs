//! Topology simplification: removes interstitial nodes that only continue a
//! street, so every remaining node is an intersection, a dead end, or a
//! self-loop anchor.

use std::collections::HashSet;

use petgraph::Direction::{Incoming, Outgoing};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;

use crate::graph::{StreetEdge, StreetGraph, StreetNode};

type Working = StableDiGraph<StreetNode, StreetEdge>;

/// Merges every chain of interstitial nodes into a single edge whose length
/// is the sum of the chain's edge lengths.
///
/// Closed rings with no endpoint at all are left as they are.
#[must_use]
pub fn simplify(street: &StreetGraph) -> StreetGraph {
    let mut g: Working = StableDiGraph::from(street.graph().clone());

    let endpoints: HashSet<NodeIndex> = g.node_indices().filter(|&n| is_endpoint(&g, n)).collect();

    let mut paths = Vec::new();
    for start in g.node_indices().filter(|n| endpoints.contains(n)) {
        let mut seen = Vec::new();
        for next in g.neighbors_directed(start, Outgoing) {
            if endpoints.contains(&next) || seen.contains(&next) {
                continue;
            }
            seen.push(next);
            if let Some(path) = build_path(&g, start, next, &endpoints) {
                paths.push(path);
            }
        }
    }

    let mut interstitial = HashSet::new();
    let mut merged = Vec::with_capacity(paths.len());
    for path in &paths {
        let mut length = 0.0;
        let mut osm_way = None;
        for pair in path.windows(2) {
            if let Some(edge) = g
                .edges_directed(pair[0], Outgoing)
                .filter(|e| e.target() == pair[1])
                .min_by(|a, b| a.weight().length.total_cmp(&b.weight().length))
            {
                length += edge.weight().length;
                osm_way.get_or_insert(edge.weight().osm_way);
            }
        }
        interstitial.extend(path[1..path.len() - 1].iter().copied());
        if let (Some(&first), Some(&last), Some(osm_way)) = (path.first(), path.last(), osm_way) {
            merged.push((first, last, StreetEdge { osm_way, length }));
        }
    }

    let before = g.node_count();
    for node in interstitial {
        g.remove_node(node);
    }
    for (u, v, edge) in merged {
        g.add_edge(u, v, edge);
    }

    log::debug!(
        "Simplified graph from {before} to {} nodes ({} paths merged)",
        g.node_count(),
        paths.len()
    );

    StreetGraph::from_graph(DiGraph::from(g))
}

/// Whether `node` must survive simplification.
///
/// A node is an endpoint if it has a self-loop, is a source or sink, or does
/// not look like the middle of a street (exactly two distinct neighbours with
/// total degree 2 for one-way or 4 for two-way flow).
fn is_endpoint(g: &Working, node: NodeIndex) -> bool {
    let mut neighbors: HashSet<NodeIndex> = g.neighbors_directed(node, Incoming).collect();
    neighbors.extend(g.neighbors_directed(node, Outgoing));

    let in_degree = g.edges_directed(node, Incoming).count();
    let out_degree = g.edges_directed(node, Outgoing).count();
    let degree = in_degree + out_degree;

    neighbors.contains(&node)
        || in_degree == 0
        || out_degree == 0
        || !(neighbors.len() == 2 && (degree == 2 || degree == 4))
}

/// Follows successors from `start` through `first` until an endpoint is
/// reached.
///
/// Returns `None` if the walk stalls on a non-endpoint.
fn build_path(
    g: &Working,
    start: NodeIndex,
    first: NodeIndex,
    endpoints: &HashSet<NodeIndex>,
) -> Option<Vec<NodeIndex>> {
    let mut path = vec![start, first];
    loop {
        let current = *path.last()?;
        if endpoints.contains(&current) {
            return Some(path);
        }
        match g.neighbors_directed(current, Outgoing).find(|n| !path.contains(n)) {
            Some(next) => path.push(next),
            None if g.contains_edge(current, start) => {
                path.push(start);
                return Some(path);
            }
            None => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::StreetGraphBuilder;
    use geo::Point;

    #[allow(clippy::cast_precision_loss)]
    fn builder(ids: &[i64]) -> StreetGraphBuilder {
        let mut b = StreetGraphBuilder::new();
        for (i, &id) in ids.iter().enumerate() {
            b.node(id, Point::new(i as f64 * 0.001, 0.0));
        }
        b
    }

    fn two_way(b: &mut StreetGraphBuilder, u: i64, v: i64, length: f64) {
        b.edge_with_length(u, v, 1, length);
        b.edge_with_length(v, u, 1, length);
    }

    fn lengths(g: &StreetGraph) -> Vec<(i64, i64, f64)> {
        let graph = g.graph();
        let mut out: Vec<_> = graph
            .edge_references()
            .map(|e| (graph[e.source()].osm_id, graph[e.target()].osm_id, e.weight().length))
            .collect();
        out.sort_by_key(|&(u, v, _)| (u, v));
        out
    }

    #[test]
    fn two_way_chain_collapses_to_single_street() {
        let mut b = builder(&[1, 2, 3, 4]);
        two_way(&mut b, 1, 2, 10.0);
        two_way(&mut b, 2, 3, 20.0);
        two_way(&mut b, 3, 4, 30.0);

        let g = simplify(&b.build());
        assert_eq!(g.node_count(), 2);
        assert_eq!(lengths(&g), vec![(1, 4, 60.0), (4, 1, 60.0)]);
    }

    #[test]
    fn one_way_chain_collapses_in_direction_of_travel() {
        let mut b = builder(&[1, 2, 3]);
        b.edge_with_length(1, 2, 5, 1.5);
        b.edge_with_length(2, 3, 5, 2.5);

        let g = simplify(&b.build());
        assert_eq!(lengths(&g), vec![(1, 3, 4.0)]);
        assert_eq!(g.graph().edge_weights().next().unwrap().osm_way, 5);
    }

    #[test]
    fn intersections_survive() {
        // 1 - 2 - 3 with a spur 2 - 4; node 2 has three neighbours.
        let mut b = builder(&[1, 2, 3, 4]);
        two_way(&mut b, 1, 2, 1.0);
        two_way(&mut b, 2, 3, 1.0);
        two_way(&mut b, 2, 4, 1.0);

        let g = simplify(&b.build());
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 6);
    }

    #[test]
    fn endpointless_ring_is_unchanged() {
        let mut b = builder(&[1, 2, 3]);
        b.edge_with_length(1, 2, 1, 1.0);
        b.edge_with_length(2, 3, 1, 1.0);
        b.edge_with_length(3, 1, 1, 1.0);

        let g = simplify(&b.build());
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn loop_hanging_off_intersection_becomes_self_loop() {
        // Street 1 - 2, plus a one-way ring 2 -> 3 -> 4 -> 2.
        let mut b = builder(&[1, 2, 3, 4]);
        two_way(&mut b, 1, 2, 1.0);
        b.edge_with_length(2, 3, 1, 2.0);
        b.edge_with_length(3, 4, 1, 3.0);
        b.edge_with_length(4, 2, 1, 4.0);

        let g = simplify(&b.build());
        assert_eq!(g.node_count(), 2);
        assert_eq!(lengths(&g), vec![(1, 2, 1.0), (2, 1, 1.0), (2, 2, 9.0)]);
    }
}
