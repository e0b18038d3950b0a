//! Street networks from the Overpass API.
//!
//! Highway filters follow the osmnx network types. Ways come back with
//! `out geom`, so node coordinates arrive inline and no second request is
//! needed for the nodes.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use geo::{MultiPolygon, Point};
use serde::Deserialize;
use urbankit_network_models::NetworkType;
use urbankit_utils::{LatLon, shell_from_geometry};

use crate::graph::{StreetGraph, StreetGraphBuilder};
use crate::{NetworkError, simplify};

/// Source of street networks clipped to a polygon.
pub trait NetworkProvider {
    /// Returns the cleaned street graph inside `polygon`.
    ///
    /// # Errors
    ///
    /// Returns an error if the network cannot be fetched or nothing is
    /// left after clipping.
    fn street_graph(
        &self,
        polygon: &MultiPolygon<f64>,
        network_type: NetworkType,
    ) -> Result<StreetGraph, NetworkError>;
}

/// Overpass connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OverpassConfig {
    /// Interpreter URL.
    pub endpoint: String,
    /// Server-side query timeout, also used for the HTTP request.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://overpass-api.de/api/interpreter".to_string(),
            timeout_secs: 180,
            user_agent: format!("urbankit/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// [`NetworkProvider`] backed by a blocking Overpass client.
pub struct OverpassProvider {
    client: reqwest::blocking::Client,
    config: OverpassConfig,
}

impl OverpassProvider {
    /// # Errors
    ///
    /// Returns [`NetworkError::Http`] if the HTTP client cannot be built.
    pub fn new(config: OverpassConfig) -> Result<Self, NetworkError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Sends one request; a failed download is left to the caller's
    /// per-row recovery.
    fn fetch_ways(&self, query: &str) -> Result<Vec<OverpassWay>, NetworkError> {
        log::debug!("Overpass query: {query}");
        let response = self
            .client
            .post(&self.config.endpoint)
            .form(&[("data", query)])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| String::from("(no body)"));
            return Err(NetworkError::Overpass {
                status: status.as_u16(),
                body: body_preview(&body),
            });
        }

        let response: OverpassResponse = serde_json::from_str(&response.text()?)?;
        if let Some(remark) = &response.remark {
            log::warn!("Overpass remark: {remark}");
        }
        Ok(response.ways())
    }
}

/// Maximum length of the response body kept in error messages.
const BODY_PREVIEW_LEN: usize = 500;

fn body_preview(body: &str) -> String {
    match body.char_indices().nth(BODY_PREVIEW_LEN) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

impl NetworkProvider for OverpassProvider {
    fn street_graph(
        &self,
        polygon: &MultiPolygon<f64>,
        network_type: NetworkType,
    ) -> Result<StreetGraph, NetworkError> {
        let query = build_query(polygon, network_type, self.config.timeout_secs)?;
        let ways = self.fetch_ways(&query)?;
        log::debug!("Overpass returned {} ways", ways.len());
        prepare(&graph_from_ways(&ways, network_type), polygon)
    }
}

/// Overpass QL tag filter for a network type.
#[must_use]
pub const fn osm_filter(network_type: NetworkType) -> &'static str {
    match network_type {
        NetworkType::Drive => concat!(
            r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
            r#"["highway"!~"abandoned|bridleway|bus_guideway|construction|corridor|cycleway|elevator|escalator|footway|path|pedestrian|planned|platform|proposed|raceway|service|steps|track"]"#,
            r#"["motor_vehicle"!~"no"]["motorcar"!~"no"]"#,
            r#"["service"!~"alley|driveway|emergency_access|parking|parking_aisle|private"]"#,
        ),
        NetworkType::DriveService => concat!(
            r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
            r#"["highway"!~"abandoned|bridleway|bus_guideway|construction|corridor|cycleway|elevator|escalator|footway|path|pedestrian|planned|platform|proposed|raceway|steps|track"]"#,
            r#"["motor_vehicle"!~"no"]["motorcar"!~"no"]"#,
            r#"["service"!~"emergency_access|parking|parking_aisle|private"]"#,
        ),
        NetworkType::Walk => concat!(
            r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
            r#"["highway"!~"abandoned|bus_guideway|construction|cycleway|motor|planned|platform|proposed|raceway"]"#,
            r#"["foot"!~"no"]["service"!~"private"]"#,
        ),
        NetworkType::Bike => concat!(
            r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
            r#"["highway"!~"abandoned|bus_guideway|construction|corridor|elevator|escalator|footway|motor|planned|platform|proposed|raceway|steps"]"#,
            r#"["bicycle"!~"no"]["service"!~"private"]"#,
        ),
        NetworkType::All => concat!(
            r#"["highway"]["area"!~"yes"]["access"!~"private"]"#,
            r#"["highway"!~"abandoned|construction|planned|platform|proposed|raceway"]"#,
            r#"["service"!~"private"]"#,
        ),
        NetworkType::AllPrivate => concat!(
            r#"["highway"]["area"!~"yes"]"#,
            r#"["highway"!~"abandoned|construction|planned|platform|proposed|raceway"]"#,
        ),
    }
}

/// Builds the Overpass QL query for every exterior ring of `polygon`.
///
/// # Errors
///
/// Returns [`NetworkError::InvalidPolygon`] if no ring has at least three
/// vertices.
pub fn build_query(
    polygon: &MultiPolygon<f64>,
    network_type: NetworkType,
    timeout_secs: u64,
) -> Result<String, NetworkError> {
    let filter = osm_filter(network_type);
    let mut clauses = String::new();

    for part in polygon {
        let ring = part.exterior();
        if ring.0.len() < 3 {
            continue;
        }
        // Overpass poly filters take "lat lon" pairs.
        let poly: Vec<String> = ring
            .coords()
            .map(|c| format!("{:.6} {:.6}", c.y, c.x))
            .collect();
        let _ = write!(clauses, "way{filter}(poly:\"{}\");", poly.join(" "));
    }

    if clauses.is_empty() {
        return Err(NetworkError::InvalidPolygon {
            message: "no exterior ring with at least three vertices".to_string(),
        });
    }

    Ok(format!("[out:json][timeout:{timeout_secs}];({clauses});out geom;"))
}

/// Top-level Overpass JSON response.
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
    /// Server-side warning such as a query timeout.
    pub remark: Option<String>,
}

impl OverpassResponse {
    #[must_use]
    pub fn ways(self) -> Vec<OverpassWay> {
        self.elements
            .into_iter()
            .filter_map(|e| match e {
                OverpassElement::Way(way) => Some(way),
                OverpassElement::Other => None,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OverpassElement {
    Way(OverpassWay),
    #[serde(other)]
    Other,
}

/// A way with inline node geometry.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassWay {
    pub id: i64,
    #[serde(default)]
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub geometry: Vec<LatLon>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Direction of travel along a way's node order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Both,
    Forward,
    Backward,
}

/// Reads a way's one-way tags.
///
/// Walking networks are always two-way.
#[must_use]
pub fn flow(tags: &BTreeMap<String, String>, network_type: NetworkType) -> Flow {
    if !network_type.respects_oneway() {
        return Flow::Both;
    }
    match tags.get("oneway").map(String::as_str) {
        Some("-1" | "reverse" | "T") => Flow::Backward,
        Some("yes" | "true" | "1" | "F") => Flow::Forward,
        _ if tags.get("junction").is_some_and(|j| j == "roundabout") => Flow::Forward,
        _ => Flow::Both,
    }
}

/// Builds a directed graph from ways, one edge per consecutive node pair
/// in each permitted direction.
///
/// Ways whose node list and geometry disagree are skipped.
#[must_use]
pub fn graph_from_ways(ways: &[OverpassWay], network_type: NetworkType) -> StreetGraph {
    let mut builder = StreetGraphBuilder::new();
    let mut skipped = 0_usize;

    for way in ways {
        if way.nodes.len() < 2 || way.nodes.len() != way.geometry.len() {
            skipped += 1;
            continue;
        }
        for (&id, [lon, lat]) in way.nodes.iter().zip(shell_from_geometry(&way.geometry)) {
            builder.node(id, Point::new(lon, lat));
        }
        let direction = flow(&way.tags, network_type);
        for pair in way.nodes.windows(2) {
            let (u, v) = (pair[0], pair[1]);
            if direction != Flow::Backward {
                builder.edge(u, v, way.id);
            }
            if direction != Flow::Forward {
                builder.edge(v, u, way.id);
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} ways without matching node geometry");
    }
    builder.build()
}

/// Clips to `polygon`, keeps the largest weakly connected component, and
/// simplifies the topology.
///
/// # Errors
///
/// Returns [`NetworkError::EmptyGraph`] if no node lies inside `polygon`.
pub fn prepare(raw: &StreetGraph, polygon: &MultiPolygon<f64>) -> Result<StreetGraph, NetworkError> {
    let clipped = raw.truncate(polygon);
    if clipped.is_empty() {
        return Err(NetworkError::EmptyGraph);
    }
    let connected = clipped.largest_weak_component();
    let simplified = simplify::simplify(&connected);
    log::debug!(
        "Prepared graph: {} raw nodes, {} after clipping, {} after simplification",
        raw.node_count(),
        clipped.node_count(),
        simplified.node_count()
    );
    Ok(simplified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use std::io::{ErrorKind, Read, Write};
    use std::net::TcpListener;

    #[test]
    fn error_body_is_truncated_on_a_char_boundary() {
        let long = "é".repeat(BODY_PREVIEW_LEN + 10);
        let cut = body_preview(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), BODY_PREVIEW_LEN + 3);
        assert_eq!(body_preview("short"), "short");
    }

    fn square() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: -77.05, y: -12.10),
            (x: -77.00, y: -12.10),
            (x: -77.00, y: -12.05),
            (x: -77.05, y: -12.05),
            (x: -77.05, y: -12.10),
        ]])
    }

    const RESPONSE: &str = r#"{
        "version": 0.6,
        "elements": [
            {"type": "way", "id": 100, "nodes": [1, 2, 3],
             "geometry": [{"lat": -12.07, "lon": -77.04}, {"lat": -12.07, "lon": -77.03}, {"lat": -12.07, "lon": -77.02}],
             "tags": {"highway": "residential"}},
            {"type": "way", "id": 200, "nodes": [2, 4],
             "geometry": [{"lat": -12.07, "lon": -77.03}, {"lat": -12.06, "lon": -77.03}],
             "tags": {"highway": "primary", "oneway": "yes"}},
            {"type": "way", "id": 300, "nodes": [3, 5],
             "geometry": [{"lat": -12.07, "lon": -77.02}, {"lat": -12.20, "lon": -77.02}],
             "tags": {"highway": "primary"}},
            {"type": "node", "id": 9, "lat": 0.0, "lon": 0.0}
        ]
    }"#;

    fn ways() -> Vec<OverpassWay> {
        serde_json::from_str::<OverpassResponse>(RESPONSE).unwrap().ways()
    }

    #[test]
    fn query_lists_lat_lon_pairs_per_ring() {
        let query = build_query(&square(), NetworkType::Drive, 60).unwrap();
        assert!(query.starts_with("[out:json][timeout:60];(way[\"highway\"]"));
        assert!(query.contains("(poly:\"-12.100000 -77.050000 -12.100000 -77.000000"));
        assert!(query.ends_with(");out geom;"));
        assert_eq!(query.matches("way[").count(), 1);
    }

    #[test]
    fn empty_polygon_is_rejected() {
        assert!(matches!(
            build_query(&MultiPolygon(vec![]), NetworkType::Walk, 60),
            Err(NetworkError::InvalidPolygon { .. })
        ));
    }

    #[test]
    fn only_private_network_admits_private_access() {
        assert!(osm_filter(NetworkType::All).contains(r#"["access"!~"private"]"#));
        assert!(!osm_filter(NetworkType::AllPrivate).contains("access"));
        assert!(osm_filter(NetworkType::Drive).contains("service|steps|track"));
        assert!(!osm_filter(NetworkType::DriveService).contains("|service|"));
    }

    #[test]
    fn oneway_tags() {
        let tags = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect()
        };
        assert_eq!(flow(&tags(&[("oneway", "yes")]), NetworkType::Drive), Flow::Forward);
        assert_eq!(flow(&tags(&[("oneway", "-1")]), NetworkType::Drive), Flow::Backward);
        assert_eq!(
            flow(&tags(&[("junction", "roundabout")]), NetworkType::Bike),
            Flow::Forward
        );
        assert_eq!(flow(&tags(&[("oneway", "no")]), NetworkType::Drive), Flow::Both);
        assert_eq!(flow(&tags(&[("oneway", "yes")]), NetworkType::Walk), Flow::Both);
    }

    #[test]
    fn parses_ways_and_ignores_other_elements() {
        let ways = ways();
        assert_eq!(ways.len(), 3);
        assert_eq!(ways[1].tags["oneway"], "yes");
    }

    #[test]
    fn builds_directed_edges_from_ways() {
        let drive = graph_from_ways(&ways(), NetworkType::Drive);
        assert_eq!(drive.node_count(), 5);
        // 2 two-way segments on way 100, one one-way on 200, one two-way on 300.
        assert_eq!(drive.edge_count(), 7);

        let walk = graph_from_ways(&ways(), NetworkType::Walk);
        assert_eq!(walk.edge_count(), 8);
    }

    #[test]
    fn prepare_clips_and_simplifies() {
        let raw = graph_from_ways(&ways(), NetworkType::Drive);
        let g = prepare(&raw, &square()).unwrap();
        // Node 5 is outside the polygon; node 3 becomes a dead end.
        let mut ids: Vec<i64> = g.graph().node_weights().map(|n| n.osm_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(g.edge_count(), 5);
    }

    #[test]
    fn prepare_outside_polygon_is_empty() {
        let raw = graph_from_ways(&ways(), NetworkType::Drive);
        let far = MultiPolygon(vec![polygon![
            (x: 10.0, y: 10.0),
            (x: 11.0, y: 10.0),
            (x: 11.0, y: 11.0),
            (x: 10.0, y: 10.0),
        ]]);
        assert!(matches!(prepare(&raw, &far), Err(NetworkError::EmptyGraph)));
    }

    /// Reads one HTTP request (headers plus `Content-Length` body).
    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0_u8; 4096];
        loop {
            let n = stream.read(&mut buf).unwrap();
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length || n == 0 {
                    return text;
                }
            } else if n == 0 {
                return text;
            }
        }
    }

    #[test]
    fn busy_server_fails_the_row_after_one_request() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/api/interpreter", listener.local_addr().unwrap());

        let client_thread = std::thread::spawn(move || {
            let provider = OverpassProvider {
                client: reqwest::blocking::Client::builder()
                    .no_proxy()
                    .timeout(std::time::Duration::from_secs(10))
                    .build()
                    .unwrap(),
                config: OverpassConfig {
                    endpoint,
                    ..OverpassConfig::default()
                },
            };
            provider.street_graph(&square(), NetworkType::Drive)
        });

        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request(&mut stream);
        assert!(request.starts_with("POST /api/interpreter"));
        stream
            .write_all(
                b"HTTP/1.1 429 Too Many Requests\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy",
            )
            .unwrap();
        drop(stream);

        let result = client_thread.join().unwrap();
        assert!(matches!(
            result,
            Err(NetworkError::Overpass { status: 429, ref body }) if body == "busy"
        ));

        listener.set_nonblocking(true).unwrap();
        let second = listener.accept().map(|_| ());
        assert_eq!(second.unwrap_err().kind(), ErrorKind::WouldBlock);
    }
}
