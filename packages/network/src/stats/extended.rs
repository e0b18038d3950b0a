use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use petgraph::Direction::Outgoing;
use petgraph::algo::{dijkstra, kosaraju_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{EdgeRef, Reversed};
use urbankit_network_models::{ExtendedStatsOptions, StatValue};

use super::{Stats, flow, mean, simple_digraph, undirected_neighbors};
use crate::graph::StreetGraph;

const PAGERANK_ALPHA: f64 = 0.85;
const PAGERANK_MAX_ITER: usize = 100;
const PAGERANK_TOLERANCE: f64 = 1e-6;

/// Computes centrality and connectivity statistics.
///
/// Neighbour degree, degree centrality, clustering, and `PageRank` are
/// always computed. Connectivity, average node connectivity,
/// eccentricity, closeness, and betweenness are gated by `options`.
/// Path-based measures weight edges by length.
#[must_use]
pub fn extended_stats(street: &StreetGraph, options: ExtendedStatsOptions) -> Stats {
    let osm_ids: Vec<i64> = street.graph().node_weights().map(|n| n.osm_id).collect();
    let simple = simple_digraph(street);
    let neighbors = undirected_neighbors(street);
    let mut stats = Stats::new();

    insert_per_node(&mut stats, "avg_neighbor_degree", &osm_ids, avg_neighbor_degree(&simple));
    insert_per_node(&mut stats, "degree_centrality", &osm_ids, degree_centrality(street));
    insert_per_node(&mut stats, "clustering_coefficient", &osm_ids, clustering(&neighbors));

    let ranks = pagerank(&simple);
    if let Some((max_node, max)) = extreme(&ranks, Ordering::Greater) {
        stats.insert("pagerank_max_node".into(), StatValue::Number(node_id(&osm_ids, max_node)));
        stats.insert("pagerank_max".into(), max.into());
    }
    if let Some((min_node, min)) = extreme(&ranks, Ordering::Less) {
        stats.insert("pagerank_min_node".into(), StatValue::Number(node_id(&osm_ids, min_node)));
        stats.insert("pagerank_min".into(), min.into());
    }
    if !ranks.is_empty() {
        stats.insert("pagerank".into(), node_values(&osm_ids, &ranks));
    }

    if options.connectivity {
        stats.insert(
            "node_connectivity".into(),
            f64::from(flow::node_connectivity(&neighbors)).into(),
        );
        stats.insert(
            "edge_connectivity".into(),
            f64::from(flow::edge_connectivity(&neighbors)).into(),
        );
    }
    if options.anc {
        stats.insert(
            "node_connectivity_avg".into(),
            flow::average_node_connectivity(&neighbors).into(),
        );
    }
    if options.ecc {
        insert_eccentricity(&mut stats, &simple);
    }
    if options.cc {
        insert_per_node(&mut stats, "closeness_centrality", &osm_ids, closeness(&simple));
    }
    if options.bc {
        insert_per_node(&mut stats, "betweenness_centrality", &osm_ids, betweenness(&simple));
    }

    stats
}

/// Writes `name` as per-node values and `name_avg` as their mean.
fn insert_per_node(stats: &mut Stats, name: &str, osm_ids: &[i64], values: Vec<f64>) {
    if let Some(avg) = mean(values.iter().copied()) {
        stats.insert(format!("{name}_avg"), avg.into());
    }
    if !values.is_empty() {
        stats.insert(name.to_string(), node_values(osm_ids, &values));
    }
}

fn node_values(osm_ids: &[i64], values: &[f64]) -> StatValue {
    StatValue::NodeValues(osm_ids.iter().copied().zip(values.iter().copied()).collect())
}

#[allow(clippy::cast_precision_loss)]
fn node_id(osm_ids: &[i64], index: usize) -> f64 {
    osm_ids[index] as f64
}

/// First index holding the greatest (`Greater`) or least (`Less`) value.
fn extreme(values: &[f64], want: Ordering) -> Option<(usize, f64)> {
    values.iter().copied().enumerate().fold(None, |best, (i, v)| match best {
        Some((_, b)) if v.total_cmp(&b) != want => best,
        _ => Some((i, v)),
    })
}

/// Mean out-degree of each node's successors, divided by its own
/// out-degree.
#[allow(clippy::cast_precision_loss)]
fn avg_neighbor_degree(g: &DiGraph<i64, f64>) -> Vec<f64> {
    let out_degree = |n: NodeIndex| g.neighbors_directed(n, Outgoing).count();
    g.node_indices()
        .map(|n| {
            let degree = out_degree(n);
            if degree == 0 {
                return 0.0;
            }
            let total: usize = g.neighbors_directed(n, Outgoing).map(out_degree).sum();
            total as f64 / degree as f64
        })
        .collect()
}

/// Total degree (in plus out, parallel edges included) over `n - 1`.
#[allow(clippy::cast_precision_loss)]
fn degree_centrality(street: &StreetGraph) -> Vec<f64> {
    let g = street.graph();
    let n = g.node_count();
    if n <= 1 {
        return vec![1.0; n];
    }
    let mut degree = vec![0_usize; n];
    for edge in g.edge_references() {
        degree[edge.source().index()] += 1;
        degree[edge.target().index()] += 1;
    }
    let scale = 1.0 / (n - 1) as f64;
    degree.into_iter().map(|d| d as f64 * scale).collect()
}

/// Local clustering coefficient on the undirected simple graph.
#[allow(clippy::cast_precision_loss)]
fn clustering(neighbors: &[BTreeSet<usize>]) -> Vec<f64> {
    neighbors
        .iter()
        .map(|adjacent| {
            let k = adjacent.len();
            if k < 2 {
                return 0.0;
            }
            let adjacent: Vec<usize> = adjacent.iter().copied().collect();
            let mut triangles = 0_usize;
            for (i, &a) in adjacent.iter().enumerate() {
                for &b in &adjacent[i + 1..] {
                    if neighbors[a].contains(&b) {
                        triangles += 1;
                    }
                }
            }
            2.0 * triangles as f64 / (k * (k - 1)) as f64
        })
        .collect()
}

/// Length-weighted `PageRank` by power iteration with uniform
/// teleportation and dangling-node redistribution.
#[allow(clippy::cast_precision_loss)]
fn pagerank(g: &DiGraph<i64, f64>) -> Vec<f64> {
    let n = g.node_count();
    if n == 0 {
        return Vec::new();
    }
    let uniform = 1.0 / n as f64;
    let out_weight: Vec<f64> = g
        .node_indices()
        .map(|v| g.edges(v).map(|e| *e.weight()).sum())
        .collect();
    let dangling: Vec<usize> = (0..n).filter(|&v| out_weight[v] <= 0.0).collect();

    let mut x = vec![uniform; n];
    for _ in 0..PAGERANK_MAX_ITER {
        let dangle_sum = PAGERANK_ALPHA * dangling.iter().map(|&v| x[v]).sum::<f64>();
        let base = (1.0 - PAGERANK_ALPHA).mul_add(uniform, dangle_sum * uniform);
        let mut next = vec![base; n];
        for edge in g.edge_references() {
            let u = edge.source().index();
            if out_weight[u] > 0.0 {
                next[edge.target().index()] +=
                    PAGERANK_ALPHA * x[u] * edge.weight() / out_weight[u];
            }
        }
        let err: f64 = next.iter().zip(&x).map(|(a, b)| (a - b).abs()).sum();
        x = next;
        if err < n as f64 * PAGERANK_TOLERANCE {
            return x;
        }
    }

    log::warn!("PageRank did not converge after {PAGERANK_MAX_ITER} iterations");
    x
}

/// Eccentricity, diameter, radius, center, and periphery of the largest
/// strongly connected component.
#[allow(clippy::float_cmp)]
fn insert_eccentricity(stats: &mut Stats, g: &DiGraph<i64, f64>) {
    let Some(component) = kosaraju_scc(g).into_iter().max_by_key(Vec::len) else {
        return;
    };
    let keep: BTreeSet<NodeIndex> = component.into_iter().collect();
    let sub = g.filter_map(
        |i, &id| keep.contains(&i).then_some(id),
        |_, &length| Some(length),
    );

    let eccentricity: BTreeMap<i64, f64> = sub
        .node_indices()
        .map(|v| {
            let far = dijkstra(&sub, v, None, |e| *e.weight())
                .into_values()
                .fold(0.0, f64::max);
            (sub[v], far)
        })
        .collect();

    let diameter = eccentricity.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let radius = eccentricity.values().copied().fold(f64::INFINITY, f64::min);
    let nodes_at = |target: f64| -> Vec<i64> {
        eccentricity
            .iter()
            .filter(|&(_, &e)| e == target)
            .map(|(&id, _)| id)
            .collect()
    };

    stats.insert("center".into(), StatValue::NodeList(nodes_at(radius)));
    stats.insert("periphery".into(), StatValue::NodeList(nodes_at(diameter)));
    stats.insert("diameter".into(), diameter.into());
    stats.insert("radius".into(), radius.into());
    stats.insert("eccentricity".into(), StatValue::NodeValues(eccentricity));
}

/// Closeness from incoming length-weighted distances, scaled by the share
/// of the graph that can reach each node.
#[allow(clippy::cast_precision_loss)]
fn closeness(g: &DiGraph<i64, f64>) -> Vec<f64> {
    let n = g.node_count();
    g.node_indices()
        .map(|v| {
            let distances = dijkstra(Reversed(g), v, None, |e| *e.weight());
            let reached = distances.len();
            let total: f64 = distances.values().sum();
            if total > 0.0 && n > 1 {
                let share = (reached - 1) as f64 / (n - 1) as f64;
                (reached - 1) as f64 / total * share
            } else {
                0.0
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    distance: f64,
    node: usize,
    via: usize,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Length-weighted betweenness (Brandes), normalised by
/// `1 / ((n - 1)(n - 2))`.
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
fn betweenness(g: &DiGraph<i64, f64>) -> Vec<f64> {
    let n = g.node_count();
    let mut centrality = vec![0.0; n];

    for s in 0..n {
        let mut order = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut settled: Vec<Option<f64>> = vec![None; n];
        let mut seen: Vec<Option<f64>> = vec![None; n];

        let mut queue = BinaryHeap::from([Frontier {
            distance: 0.0,
            node: s,
            via: s,
        }]);
        seen[s] = Some(0.0);

        while let Some(Frontier { distance, node: v, via }) = queue.pop() {
            if settled[v].is_some() {
                continue;
            }
            sigma[v] += if v == s { 1.0 } else { sigma[via] };
            settled[v] = Some(distance);
            order.push(v);

            for edge in g.edges(NodeIndex::new(v)) {
                let w = edge.target().index();
                let candidate = distance + edge.weight();
                if settled[w].is_some() {
                    continue;
                }
                match seen[w] {
                    Some(best) if candidate == best => {
                        sigma[w] += sigma[v];
                        preds[w].push(v);
                    }
                    Some(best) if candidate > best => {}
                    _ => {
                        seen[w] = Some(candidate);
                        sigma[w] = 0.0;
                        preds[w] = vec![v];
                        queue.push(Frontier {
                            distance: candidate,
                            node: w,
                            via: v,
                        });
                    }
                }
            }
        }

        let mut delta = vec![0.0; n];
        while let Some(w) = order.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for c in &mut centrality {
            *c *= scale;
        }
    }
    centrality
}
