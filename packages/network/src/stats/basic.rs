use std::collections::BTreeMap;

use petgraph::graph::EdgeIndex;
use petgraph::visit::EdgeRef;
use urbankit_network_models::StatValue;

use super::Stats;
use crate::graph::StreetGraph;

const SQ_M_PER_SQ_KM: f64 = 1_000_000.0;

/// Computes size, length, and density statistics.
///
/// Edges count each direction separately. Streets count each connected
/// node pair once regardless of direction or parallel ways. Densities are
/// only produced when `area_m2` is known and positive.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn basic_stats(street: &StreetGraph, area_m2: Option<f64>) -> Stats {
    let g = street.graph();
    let n = g.node_count();
    let m = g.edge_count();
    let mut stats = Stats::new();

    stats.insert("n".into(), StatValue::Number(n as f64));
    stats.insert("m".into(), StatValue::Number(m as f64));
    if n > 0 {
        stats.insert("k_avg".into(), StatValue::Number(2.0 * m as f64 / n as f64));
    }

    let edge_length_total: f64 = g.edge_weights().map(|e| e.length).sum();
    stats.insert("edge_length_total".into(), edge_length_total.into());
    if m > 0 {
        stats.insert("edge_length_avg".into(), (edge_length_total / m as f64).into());
    }

    // One representative edge per unordered node pair.
    let mut streets: BTreeMap<(usize, usize), EdgeIndex> = BTreeMap::new();
    for edge in g.edge_references() {
        let (u, v) = (edge.source().index(), edge.target().index());
        streets.entry((u.min(v), u.max(v))).or_insert(edge.id());
    }

    let mut streets_per_node = vec![0_u32; n];
    for &(u, v) in streets.keys() {
        streets_per_node[u] += 1;
        streets_per_node[v] += 1;
    }

    let intersection_count = streets_per_node.iter().filter(|&&s| s > 1).count();
    if n > 0 {
        let total: u32 = streets_per_node.iter().sum();
        stats.insert(
            "streets_per_node_avg".into(),
            (f64::from(total) / n as f64).into(),
        );

        let max = streets_per_node.iter().copied().max().unwrap_or(0);
        let mut counts: BTreeMap<u32, f64> = (0..=max).map(|k| (k, 0.0)).collect();
        for &s in &streets_per_node {
            *counts.entry(s).or_default() += 1.0;
        }
        let proportions = counts.iter().map(|(&k, &c)| (k, c / n as f64)).collect();
        stats.insert("streets_per_node_counts".into(), StatValue::Histogram(counts));
        stats.insert(
            "streets_per_node_proportions".into(),
            StatValue::Histogram(proportions),
        );
    }
    stats.insert(
        "intersection_count".into(),
        (intersection_count as f64).into(),
    );

    let street_length_total: f64 = streets.values().map(|&e| g[e].length).sum();
    let straight_total: f64 = streets.values().map(|&e| street.straight_length(e)).sum();
    let self_loops = streets.keys().filter(|(u, v)| u == v).count();
    let segments = streets.len();

    stats.insert("street_length_total".into(), street_length_total.into());
    stats.insert("street_segment_count".into(), (segments as f64).into());
    if segments > 0 {
        stats.insert(
            "street_length_avg".into(),
            (street_length_total / segments as f64).into(),
        );
        stats.insert(
            "self_loop_proportion".into(),
            (self_loops as f64 / segments as f64).into(),
        );
    }
    if straight_total > 0.0 {
        stats.insert(
            "circuity_avg".into(),
            (street_length_total / straight_total).into(),
        );
    }

    if let Some(area_km) = area_m2.filter(|a| *a > 0.0).map(|a| a / SQ_M_PER_SQ_KM) {
        stats.insert("node_density_km".into(), (n as f64 / area_km).into());
        stats.insert(
            "intersection_density_km".into(),
            (intersection_count as f64 / area_km).into(),
        );
        stats.insert("edge_density_km".into(), (edge_length_total / area_km).into());
        stats.insert(
            "street_density_km".into(),
            (street_length_total / area_km).into(),
        );
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::fixtures;

    fn number(stats: &Stats, name: &str) -> f64 {
        stats[name].as_number().unwrap()
    }

    #[test]
    fn square_counts() {
        let stats = basic_stats(&fixtures::square(), None);
        assert!((number(&stats, "n") - 4.0).abs() < 1e-9);
        assert!((number(&stats, "m") - 8.0).abs() < 1e-9);
        assert!((number(&stats, "k_avg") - 4.0).abs() < 1e-9);
        assert!((number(&stats, "edge_length_total") - 800.0).abs() < 1e-9);
        assert!((number(&stats, "edge_length_avg") - 100.0).abs() < 1e-9);
        assert!((number(&stats, "street_length_total") - 400.0).abs() < 1e-9);
        assert!((number(&stats, "street_segment_count") - 4.0).abs() < 1e-9);
        assert!((number(&stats, "streets_per_node_avg") - 2.0).abs() < 1e-9);
        assert!((number(&stats, "intersection_count") - 4.0).abs() < 1e-9);
        assert!(number(&stats, "self_loop_proportion").abs() < 1e-9);
        assert!(!stats.contains_key("node_density_km"));
    }

    #[test]
    fn streets_per_node_histogram_includes_empty_bins() {
        let stats = basic_stats(&fixtures::square(), None);
        let StatValue::Histogram(counts) = &stats["streets_per_node_counts"] else {
            panic!("expected histogram");
        };
        assert_eq!(counts, &BTreeMap::from([(0, 0.0), (1, 0.0), (2, 4.0)]));
        let StatValue::Histogram(props) = &stats["streets_per_node_proportions"] else {
            panic!("expected histogram");
        };
        assert!((props[&2] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn circuity_compares_against_straight_line() {
        // 0.001 degrees on the equator is about 111.2 m; a 150 m street
        // between the two nodes is 1.35 times the straight distance.
        let street = fixtures::graph(
            &[(1, 0.0, 0.0), (2, 0.001, 0.0)],
            &fixtures::two_way(&[(1, 2, 150.0)]),
        );
        let straight = street.straight_length(EdgeIndex::new(0));
        let stats = basic_stats(&street, None);
        assert!((number(&stats, "circuity_avg") - 150.0 / straight).abs() < 1e-9);
        assert!(number(&stats, "intersection_count").abs() < 1e-9);
    }

    #[test]
    fn densities_use_square_kilometres() {
        let stats = basic_stats(&fixtures::square(), Some(2_000_000.0));
        assert!((number(&stats, "node_density_km") - 2.0).abs() < 1e-9);
        assert!((number(&stats, "intersection_density_km") - 2.0).abs() < 1e-9);
        assert!((number(&stats, "edge_density_km") - 400.0).abs() < 1e-9);
        assert!((number(&stats, "street_density_km") - 200.0).abs() < 1e-9);
    }

    #[test]
    fn self_loops_count_twice_per_node() {
        let street = fixtures::graph(
            &[(1, 0.0, 0.0), (2, 0.001, 0.0)],
            &[(1, 2, 10.0), (2, 2, 30.0)],
        );
        let stats = basic_stats(&street, None);
        assert!((number(&stats, "self_loop_proportion") - 0.5).abs() < 1e-9);
        let StatValue::Histogram(counts) = &stats["streets_per_node_counts"] else {
            panic!("expected histogram");
        };
        assert_eq!(counts[&1], 1.0);
        assert_eq!(counts[&3], 1.0);
    }

    #[test]
    fn empty_graph_has_only_totals() {
        let stats = basic_stats(&StreetGraph::default(), Some(1.0));
        assert!(number(&stats, "n").abs() < 1e-9);
        assert!(!stats.contains_key("k_avg"));
        assert!(!stats.contains_key("circuity_avg"));
        assert!(number(&stats, "node_density_km").abs() < 1e-9);
    }
}
