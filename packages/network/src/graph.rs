//! Directed street graph with OSM node ids and metre edge lengths.

use std::collections::{BTreeMap, HashMap};

use geo::{Distance, Haversine, Intersects, MultiPolygon, Point};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;

/// An intersection or street vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct StreetNode {
    /// OpenStreetMap node id.
    pub osm_id: i64,
    /// Location in (lon, lat).
    pub point: Point<f64>,
}

/// A directed street segment.
#[derive(Debug, Clone, PartialEq)]
pub struct StreetEdge {
    /// OpenStreetMap way the segment came from.
    pub osm_way: i64,
    /// Length along the street in metres.
    pub length: f64,
}

/// A street network.
///
/// Two-way streets are stored as a pair of opposite edges; one-way
/// streets as a single edge.
#[derive(Debug, Clone, Default)]
pub struct StreetGraph {
    graph: DiGraph<StreetNode, StreetEdge>,
}

impl StreetGraph {
    #[must_use]
    pub const fn from_graph(graph: DiGraph<StreetNode, StreetEdge>) -> Self {
        Self { graph }
    }

    #[must_use]
    pub const fn graph(&self) -> &DiGraph<StreetNode, StreetEdge> {
        &self.graph
    }

    #[must_use]
    pub fn into_graph(self) -> DiGraph<StreetNode, StreetEdge> {
        self.graph
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Great-circle distance in metres between an edge's endpoints.
    #[must_use]
    pub fn straight_length(&self, edge: EdgeIndex) -> f64 {
        self.graph.edge_endpoints(edge).map_or(0.0, |(u, v)| {
            Haversine.distance(self.graph[u].point, self.graph[v].point)
        })
    }

    /// Keeps only nodes that intersect `polygon`, along with the edges
    /// between them.
    #[must_use]
    pub fn truncate(&self, polygon: &MultiPolygon<f64>) -> Self {
        let graph = self.graph.filter_map(
            |_, node| node.point.intersects(polygon).then(|| node.clone()),
            |_, edge| Some(edge.clone()),
        );
        log::debug!(
            "Truncated graph from {} to {} nodes",
            self.graph.node_count(),
            graph.node_count()
        );
        Self { graph }
    }

    /// Keeps only the largest weakly connected component.
    ///
    /// Ties go to the component holding the lowest node index.
    #[must_use]
    pub fn largest_weak_component(&self) -> Self {
        let mut union_find = UnionFind::<usize>::new(self.graph.node_count());
        for edge in self.graph.edge_references() {
            union_find.union(edge.source().index(), edge.target().index());
        }
        let labels = union_find.into_labeling();

        // label -> (size, lowest node index)
        let mut components: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
        for (index, &label) in labels.iter().enumerate() {
            let entry = components.entry(label).or_insert((0, index));
            entry.0 += 1;
        }
        let Some(largest) = components
            .iter()
            .max_by_key(|&(_, &(size, lowest))| (size, std::cmp::Reverse(lowest)))
            .map(|(&label, _)| label)
        else {
            return self.clone();
        };

        let graph = self.graph.filter_map(
            |i, node| (labels[i.index()] == largest).then(|| node.clone()),
            |_, edge| Some(edge.clone()),
        );
        Self { graph }
    }
}

/// Incrementally builds a [`StreetGraph`] from OSM node ids.
#[derive(Debug, Default)]
pub struct StreetGraphBuilder {
    graph: DiGraph<StreetNode, StreetEdge>,
    nodes: HashMap<i64, NodeIndex>,
}

impl StreetGraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, or returns the existing one with the same OSM id.
    pub fn node(&mut self, osm_id: i64, point: Point<f64>) -> NodeIndex {
        *self
            .nodes
            .entry(osm_id)
            .or_insert_with(|| self.graph.add_node(StreetNode { osm_id, point }))
    }

    /// Adds a directed edge between two known nodes, measuring its length
    /// as the great-circle distance between them.
    ///
    /// Returns `None` if either node has not been added.
    pub fn edge(&mut self, from: i64, to: i64, osm_way: i64) -> Option<EdgeIndex> {
        let (u, v) = (*self.nodes.get(&from)?, *self.nodes.get(&to)?);
        let length = Haversine.distance(self.graph[u].point, self.graph[v].point);
        Some(self.graph.add_edge(u, v, StreetEdge { osm_way, length }))
    }

    /// Adds a directed edge with an explicit length in metres.
    pub fn edge_with_length(
        &mut self,
        from: i64,
        to: i64,
        osm_way: i64,
        length: f64,
    ) -> Option<EdgeIndex> {
        let (u, v) = (*self.nodes.get(&from)?, *self.nodes.get(&to)?);
        Some(self.graph.add_edge(u, v, StreetEdge { osm_way, length }))
    }

    #[must_use]
    pub fn build(self) -> StreetGraph {
        StreetGraph { graph: self.graph }
    }
}
