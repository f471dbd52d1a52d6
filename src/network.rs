use crate::config::ColumnConfig;
use crate::error::{Result, ScenarioError};
use crate::geometry::Point;
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rusqlite::Connection;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use tracing::{debug, info};

/// Identifier usable for nodes and edges of a [`NetworkGraph`].
pub trait NetworkId: Clone + Eq + Hash + Ord + Debug + Display {}

impl<T: Clone + Eq + Hash + Ord + Debug + Display> NetworkId for T {}

// Network node, located when the source provides coordinates
#[derive(Debug, Clone)]
pub struct NetworkNode<K> {
    pub id: K,
    pub location: Option<Point>,
}

#[derive(Debug, Clone)]
pub struct NetworkEdge<K> {
    pub id: K,
    pub from: K,
    pub to: K,
    pub length: f64,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ShortestPath<K> {
    pub nodes: Vec<K>,
    pub edges: Vec<K>,
    pub length: f64,
}

/// Undirected network with length-weighted edges.
#[derive(Debug, Clone)]
pub struct NetworkGraph<K> {
    graph: UnGraph<K, usize>,
    node_index: HashMap<K, NodeIndex>,
    locations: HashMap<K, Point>,
    edges: Vec<NetworkEdge<K>>,
    edge_index: HashMap<K, usize>,
}

/// Hydrodynamic model network: branches between named nodes.
pub type HydroNetwork = NetworkGraph<String>;

/// Transport network: arcs between numbered nodes.
pub type TransportNetwork = NetworkGraph<i64>;

impl<K: NetworkId> NetworkGraph<K> {
    pub fn build(edges: Vec<NetworkEdge<K>>, nodes: Vec<NetworkNode<K>>) -> Self {
        let mut graph = UnGraph::default();
        let mut node_index: HashMap<K, NodeIndex> = HashMap::new();
        let mut edge_index = HashMap::new();

        for (i, edge) in edges.iter().enumerate() {
            let a = index_of(&mut graph, &mut node_index, &edge.from);
            let b = index_of(&mut graph, &mut node_index, &edge.to);
            graph.add_edge(a, b, i);
            edge_index.insert(edge.id.clone(), i);
        }

        let mut locations = HashMap::new();
        for node in nodes {
            if !node_index.contains_key(&node.id) {
                debug!("Node {} is not connected to any edge", node.id);
                index_of(&mut graph, &mut node_index, &node.id);
            }
            if let Some(location) = node.location {
                locations.insert(node.id, location);
            }
        }

        NetworkGraph {
            graph,
            node_index,
            locations,
            edges,
            edge_index,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge(&self, id: &K) -> Option<&NetworkEdge<K>> {
        self.edge_index.get(id).map(|&i| &self.edges[i])
    }

    pub fn edges(&self) -> &[NetworkEdge<K>] {
        &self.edges
    }

    pub fn location(&self, id: &K) -> Option<Point> {
        self.locations.get(id).copied()
    }

    /// End points of an edge, when both nodes are located.
    pub fn edge_line(&self, id: &K) -> Option<(Point, Point)> {
        let edge = self.edge(id)?;
        Some((self.location(&edge.from)?, self.location(&edge.to)?))
    }

    /// Midpoint of the edge's end points.
    pub fn edge_centroid(&self, id: &K) -> Option<Point> {
        self.edge_line(id).map(|(a, b)| a.midpoint(&b))
    }

    /// Dijkstra shortest path weighted by edge length.
    pub fn shortest_path(&self, start: &K, end: &K) -> Result<ShortestPath<K>> {
        let lookup = |id: &K| {
            self.node_index
                .get(id)
                .copied()
                .ok_or_else(|| ScenarioError::Network(format!("unknown node {}", id)))
        };
        let (source, target) = (lookup(start)?, lookup(end)?);

        let (length, path) = astar(
            &self.graph,
            source,
            |n| n == target,
            |e| self.edges[*e.weight()].length,
            |_| 0.0,
        )
        .ok_or_else(|| ScenarioError::Network(format!("no path from {} to {}", start, end)))?;

        let mut edges = Vec::with_capacity(path.len().saturating_sub(1));
        for pair in path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let shortest = self
                .graph
                .edges(a)
                .filter(|e| {
                    (e.source() == a && e.target() == b) || (e.source() == b && e.target() == a)
                })
                .map(|e| *e.weight())
                .min_by(|&i, &j| self.edges[i].length.total_cmp(&self.edges[j].length))
                .ok_or_else(|| {
                    ScenarioError::Network(format!(
                        "no edge between {} and {}",
                        self.graph[a], self.graph[b]
                    ))
                })?;
            edges.push(self.edges[shortest].id.clone());
        }

        Ok(ShortestPath {
            nodes: path.into_iter().map(|n| self.graph[n].clone()).collect(),
            edges,
            length,
        })
    }

    /// Located node nearest to `point`.
    pub fn nearest_node(&self, point: &Point) -> Option<K> {
        nearest_feature(point, self.locations.iter())
    }
}

fn index_of<K: NetworkId>(
    graph: &mut UnGraph<K, usize>,
    node_index: &mut HashMap<K, NodeIndex>,
    id: &K,
) -> NodeIndex {
    *node_index
        .entry(id.clone())
        .or_insert_with(|| graph.add_node(id.clone()))
}

/// Id of the candidate nearest to `point`. Equal distances resolve to the
/// smallest id, so the answer does not depend on candidate order.
pub fn nearest_feature<'a, K: Ord + Clone + 'a>(
    point: &Point,
    candidates: impl IntoIterator<Item = (&'a K, &'a Point)>,
) -> Option<K> {
    candidates
        .into_iter()
        .map(|(id, p)| (point.distance(p), id))
        .min_by(|(da, ia), (db, ib)| da.total_cmp(db).then_with(|| ia.cmp(ib)))
        .map(|(_, id)| id.clone())
}

// Function to build the transport network from the shipping database
pub fn load_transport_network(
    conn: &Connection,
    config: &ColumnConfig,
    scenario_id: Option<i64>,
) -> Result<TransportNetwork> {
    let mut arc_query = format!(
        "SELECT arcs.{}, arcs.{}, arcs.{}, arcs.{}, arcs.{} FROM arcs",
        config.arc_id, config.arc_name, config.arc_length, config.from_node, config.to_node
    );
    if scenario_id.is_some() {
        arc_query.push_str(&format!(
            " JOIN \"branching$branch_sets\" AS BS ON arcs.{} = BS.ID WHERE BS.BranchID = ?1",
            config.branch_set
        ));
    }
    arc_query.push_str(&format!(" ORDER BY arcs.{}", config.arc_id));

    let mut stmt = conn.prepare(&arc_query)?;
    let map_arc = |row: &rusqlite::Row<'_>| -> rusqlite::Result<NetworkEdge<i64>> {
        Ok(NetworkEdge {
            id: row.get::<_, i64>(0)?,
            name: row.get::<_, Option<String>>(1)?,
            length: row.get::<_, f64>(2)?,
            from: row.get::<_, i64>(3)?,
            to: row.get::<_, i64>(4)?,
        })
    };
    let arcs = match scenario_id {
        Some(id) => stmt.query_map([id], map_arc)?.collect::<rusqlite::Result<Vec<_>>>()?,
        None => stmt.query_map([], map_arc)?.collect::<rusqlite::Result<Vec<_>>>()?,
    };

    let node_query = format!(
        "SELECT {}, {}, {} FROM nodes",
        config.node_id, config.node_x, config.node_y
    );
    let mut stmt = conn.prepare(&node_query)?;
    let nodes = stmt
        .query_map([], |row| {
            let x = row.get::<_, Option<f64>>(1)?;
            let y = row.get::<_, Option<f64>>(2)?;
            Ok(NetworkNode {
                id: row.get::<_, i64>(0)?,
                location: x.zip(y).map(|(x, y)| Point::new(x, y)),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let network = NetworkGraph::build(arcs, nodes);
    info!(
        "Transport network built with {} nodes and {} arcs",
        network.node_count(),
        network.edge_count()
    );
    Ok(network)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn edge(id: i64, from: i64, to: i64, length: f64) -> NetworkEdge<i64> {
        NetworkEdge {
            id,
            from,
            to,
            length,
            name: None,
        }
    }

    fn node(id: i64, x: f64, y: f64) -> NetworkNode<i64> {
        NetworkNode {
            id,
            location: Some(Point::new(x, y)),
        }
    }

    /// 1 - 2 - 3 - 4 along y = 0, plus a long detour 1 - 5 - 4.
    pub(crate) fn line_network() -> TransportNetwork {
        NetworkGraph::build(
            vec![
                edge(10, 1, 2, 100.0),
                edge(20, 2, 3, 100.0),
                edge(30, 4, 3, 100.0),
                edge(40, 1, 5, 200.0),
                edge(50, 5, 4, 200.0),
            ],
            vec![
                node(1, 0.0, 0.0),
                node(2, 100.0, 0.0),
                node(3, 200.0, 0.0),
                node(4, 300.0, 0.0),
                node(5, 150.0, 150.0),
            ],
        )
    }

    #[test]
    fn test_shortest_path_follows_length() {
        let network = line_network();
        let path = network.shortest_path(&1, &4).unwrap();
        assert_eq!(path.nodes, vec![1, 2, 3, 4]);
        assert_eq!(path.edges, vec![10, 20, 30]);
        assert_eq!(path.length, 300.0);

        let back = network.shortest_path(&4, &1).unwrap();
        assert_eq!(back.edges, vec![30, 20, 10]);
    }

    #[test]
    fn test_parallel_edges_take_shortest() {
        let network = NetworkGraph::build(
            vec![edge(1, 1, 2, 50.0), edge(2, 1, 2, 20.0)],
            Vec::new(),
        );
        assert_eq!(network.shortest_path(&1, &2).unwrap().edges, vec![2]);
    }

    #[test]
    fn test_shortest_path_errors() {
        let network = NetworkGraph::build(
            vec![edge(1, 1, 2, 1.0), edge(2, 3, 4, 1.0)],
            Vec::new(),
        );
        assert!(matches!(
            network.shortest_path(&1, &9),
            Err(ScenarioError::Network(_))
        ));
        assert!(matches!(
            network.shortest_path(&1, &4),
            Err(ScenarioError::Network(_))
        ));
    }

    #[test]
    fn test_nearest_feature_is_order_independent() {
        let a = ("a".to_string(), Point::new(1.0, 0.0));
        let b = ("b".to_string(), Point::new(-1.0, 0.0));
        let c = ("c".to_string(), Point::new(5.0, 5.0));
        let origin = Point::new(0.0, 0.0);

        let forward = [a.clone(), b.clone(), c.clone()];
        let backward = [c, b, a];
        let pick = |set: &[(String, Point)]| nearest_feature(&origin, set.iter().map(|(k, p)| (k, p)));
        assert_eq!(pick(&forward), Some("a".to_string()));
        assert_eq!(pick(&backward), Some("a".to_string()));
        assert_eq!(pick(&[]), None);
    }

    #[test]
    fn test_edge_centroid_and_nearest_node() {
        let network = line_network();
        assert_eq!(network.edge_centroid(&20), Some(Point::new(150.0, 0.0)));
        assert_eq!(network.nearest_node(&Point::new(140.0, 120.0)), Some(5));
    }

    #[test]
    fn test_load_transport_network_from_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE arcs (ID INTEGER, Name TEXT, Length__m REAL, FromNodeID INTEGER, ToNodeID INTEGER, BranchSetID INTEGER);
             CREATE TABLE nodes (ID INTEGER, XCoordinate REAL, YCoordinate REAL);
             CREATE TABLE \"branching$branch_sets\" (ID INTEGER, BranchID INTEGER);
             INSERT INTO arcs VALUES (1, 'Waal km 1', 1000.0, 100, 101, 1);
             INSERT INTO arcs VALUES (2, NULL, 1500.0, 101, 102, 1);
             INSERT INTO arcs VALUES (3, 'Other', 10.0, 100, 102, 2);
             INSERT INTO nodes VALUES (100, 0.0, 0.0);
             INSERT INTO nodes VALUES (101, 1000.0, 0.0);
             INSERT INTO nodes VALUES (102, 2500.0, 0.0);
             INSERT INTO \"branching$branch_sets\" VALUES (1, 7);
             INSERT INTO \"branching$branch_sets\" VALUES (2, 8);",
        )
        .unwrap();
        let columns = ColumnConfig::new();

        let all = load_transport_network(&conn, &columns, None).unwrap();
        assert_eq!(all.edge_count(), 3);
        assert_eq!(all.shortest_path(&100, &102).unwrap().edges, vec![3]);

        let scenario = load_transport_network(&conn, &columns, Some(7)).unwrap();
        assert_eq!(scenario.edge_count(), 2);
        assert_eq!(scenario.shortest_path(&100, &102).unwrap().edges, vec![1, 2]);
        assert_eq!(scenario.edge(&1).unwrap().name.as_deref(), Some("Waal km 1"));
        assert_eq!(scenario.edge_centroid(&2), Some(Point::new(1750.0, 0.0)));
    }
}
