//! Unit-capacity max-flow for node and edge connectivity of undirected
//! graphs given as neighbour sets.

use std::collections::{BTreeSet, VecDeque};

/// Residual network with integer capacities.
struct FlowNetwork {
    heads: Vec<Vec<usize>>,
    to: Vec<usize>,
    capacity: Vec<u32>,
    residual: Vec<u32>,
}

impl FlowNetwork {
    fn new(nodes: usize) -> Self {
        Self {
            heads: vec![Vec::new(); nodes],
            to: Vec::new(),
            capacity: Vec::new(),
            residual: Vec::new(),
        }
    }

    /// Adds an arc and its zero-capacity reverse. Arc `i` pairs with `i ^ 1`.
    fn add_arc(&mut self, from: usize, to: usize, capacity: u32) {
        for (u, v, c) in [(from, to, capacity), (to, from, 0)] {
            self.heads[u].push(self.to.len());
            self.to.push(v);
            self.capacity.push(c);
            self.residual.push(c);
        }
    }

    fn reset(&mut self) {
        self.residual.clone_from(&self.capacity);
    }

    /// Edmonds-Karp from `source` to `sink`, stopping once `cutoff` units
    /// have been pushed.
    fn max_flow(&mut self, source: usize, sink: usize, cutoff: u32) -> u32 {
        self.reset();
        let mut flow = 0;
        while flow < cutoff {
            let Some(path) = self.augmenting_path(source, sink) else {
                break;
            };
            let bottleneck = path.iter().map(|&a| self.residual[a]).min().unwrap_or(0);
            for arc in path {
                self.residual[arc] -= bottleneck;
                self.residual[arc ^ 1] += bottleneck;
            }
            flow += bottleneck;
        }
        flow.min(cutoff)
    }

    fn augmenting_path(&self, source: usize, sink: usize) -> Option<Vec<usize>> {
        let mut via: Vec<Option<usize>> = vec![None; self.heads.len()];
        let mut visited = vec![false; self.heads.len()];
        visited[source] = true;
        let mut queue = VecDeque::from([source]);

        while let Some(u) = queue.pop_front() {
            if u == sink {
                break;
            }
            for &arc in &self.heads[u] {
                let v = self.to[arc];
                if !visited[v] && self.residual[arc] > 0 {
                    visited[v] = true;
                    via[v] = Some(arc);
                    queue.push_back(v);
                }
            }
        }

        if !visited[sink] {
            return None;
        }
        let mut path = Vec::new();
        let mut node = sink;
        while let Some(arc) = via[node] {
            path.push(arc);
            node = self.to[arc ^ 1];
        }
        Some(path)
    }
}

fn is_connected(neighbors: &[BTreeSet<usize>]) -> bool {
    if neighbors.is_empty() {
        return false;
    }
    let mut visited = vec![false; neighbors.len()];
    visited[0] = true;
    let mut queue = VecDeque::from([0]);
    let mut seen = 1;
    while let Some(u) = queue.pop_front() {
        for &v in &neighbors[u] {
            if !visited[v] {
                visited[v] = true;
                seen += 1;
                queue.push_back(v);
            }
        }
    }
    seen == neighbors.len()
}

fn degree(neighbors: &[BTreeSet<usize>], node: usize) -> u32 {
    u32::try_from(neighbors[node].len()).unwrap_or(u32::MAX)
}

/// Node-split network: node `i` becomes `2i` (in) and `2i + 1` (out)
/// joined by a unit arc, and every edge `{u, v}` becomes `u_out -> v_in`
/// and `v_out -> u_in`.
fn split_network(neighbors: &[BTreeSet<usize>]) -> FlowNetwork {
    let mut net = FlowNetwork::new(neighbors.len() * 2);
    for (u, adjacent) in neighbors.iter().enumerate() {
        net.add_arc(2 * u, 2 * u + 1, 1);
        for &v in adjacent {
            net.add_arc(2 * u + 1, 2 * v, 1);
        }
    }
    net
}

fn edge_network(neighbors: &[BTreeSet<usize>]) -> FlowNetwork {
    let mut net = FlowNetwork::new(neighbors.len());
    for (u, adjacent) in neighbors.iter().enumerate() {
        for &v in adjacent {
            net.add_arc(u, v, 1);
        }
    }
    net
}

/// Number of internally node-disjoint paths between `s` and `t`, counting
/// a direct edge as one path.
fn local_node_connectivity(net: &mut FlowNetwork, s: usize, t: usize, cutoff: u32) -> u32 {
    net.max_flow(2 * s + 1, 2 * t, cutoff)
}

/// Minimum number of nodes whose removal disconnects the graph.
///
/// Zero for disconnected graphs; `n - 1` for complete ones.
pub fn node_connectivity(neighbors: &[BTreeSet<usize>]) -> u32 {
    if !is_connected(neighbors) {
        return 0;
    }
    let Some(v) = (0..neighbors.len()).min_by_key(|&i| neighbors[i].len()) else {
        return 0;
    };
    let mut k = degree(neighbors, v);
    let mut net = split_network(neighbors);

    for w in 0..neighbors.len() {
        if w != v && !neighbors[v].contains(&w) {
            k = k.min(local_node_connectivity(&mut net, v, w, k));
        }
    }

    let adjacent: Vec<usize> = neighbors[v].iter().copied().collect();
    for (i, &x) in adjacent.iter().enumerate() {
        for &y in &adjacent[i + 1..] {
            if !neighbors[x].contains(&y) {
                k = k.min(local_node_connectivity(&mut net, x, y, k));
            }
        }
    }

    k
}

/// Minimum number of edges whose removal disconnects the graph.
pub fn edge_connectivity(neighbors: &[BTreeSet<usize>]) -> u32 {
    if !is_connected(neighbors) || neighbors.len() < 2 {
        return 0;
    }
    let mut k = (0..neighbors.len())
        .map(|i| degree(neighbors, i))
        .min()
        .unwrap_or(0);
    let mut net = edge_network(neighbors);
    for t in 1..neighbors.len() {
        k = k.min(net.max_flow(0, t, k));
    }
    k
}

/// Mean local node connectivity over all unordered node pairs.
#[allow(clippy::cast_precision_loss)]
pub fn average_node_connectivity(neighbors: &[BTreeSet<usize>]) -> f64 {
    let n = neighbors.len();
    if n < 2 {
        return 0.0;
    }
    let mut net = split_network(neighbors);
    let mut total = 0_u64;
    let mut pairs = 0_u64;
    for s in 0..n {
        for t in s + 1..n {
            let cutoff = degree(neighbors, s).min(degree(neighbors, t));
            total += u64::from(local_node_connectivity(&mut net, s, t, cutoff));
            pairs += 1;
        }
    }
    total as f64 / pairs as f64
}
