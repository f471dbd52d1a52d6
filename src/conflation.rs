//! Conflation of the transport network with the hydrodynamic model: every
//! arc of a matched reach is linked to the nearest gridpoint and reach segment.

use crate::config::ReachConfig;
use crate::error::{Result, ScenarioError};
use crate::geometry::{self, Point};
use crate::hydro::Sample;
use crate::network::{HydroNetwork, TransportNetwork, nearest_feature};
use indicatif::ProgressBar;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Link between one transport arc and the nearest hydro samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflationRecord {
    pub reach: String,
    pub arc_id: i64,
    pub arc_name: Option<String>,
    pub arc_centroid: Point,
    /// Nearest level sample
    pub gridpoint: Option<String>,
    pub gridpoint_location: Option<Point>,
    /// Nearest flow sample
    pub reachsegment: Option<String>,
    pub reachsegment_location: Option<Point>,
}

impl ConflationRecord {
    pub fn gridpoint_link(&self) -> Option<String> {
        self.gridpoint_location
            .map(|p| geometry::linestring_wkt(&self.arc_centroid, &p))
    }

    pub fn reachsegment_link(&self) -> Option<String> {
        self.reachsegment_location
            .map(|p| geometry::linestring_wkt(&self.arc_centroid, &p))
    }
}

/// Samples of one kind, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    samples: HashMap<String, Sample>,
}

impl SampleSet {
    pub fn new(samples: impl IntoIterator<Item = Sample>) -> Self {
        SampleSet {
            samples: samples.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Sample> {
        self.samples.get(id)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Nearest sample on one of `branches`.
    pub fn nearest_on_branches(&self, point: &Point, branches: &HashSet<&str>) -> Option<&Sample> {
        let candidates = self
            .samples
            .values()
            .filter(|s| branches.contains(s.branch.as_str()))
            .map(|s| (&s.id, &s.location));
        let id = nearest_feature(point, candidates)?;
        self.samples.get(&id)
    }
}

/// Links the arcs on the transport path of `reach` to the samples on its
/// hydro path.
pub fn conflate_reach(
    reach: &ReachConfig,
    transport: &TransportNetwork,
    hydro: &HydroNetwork,
    gridpoints: &SampleSet,
    reachsegments: &SampleSet,
) -> Result<Vec<ConflationRecord>> {
    let arcs = transport.shortest_path(&reach.transport.0, &reach.transport.1)?;
    let branches = hydro.shortest_path(&reach.hydro.0, &reach.hydro.1)?;
    debug!(
        "Reach {}: {} arcs, {} branches",
        reach.name,
        arcs.edges.len(),
        branches.edges.len()
    );
    let branches: HashSet<&str> = branches.edges.iter().map(String::as_str).collect();

    let mut records = Vec::with_capacity(arcs.edges.len());
    for arc_id in arcs.edges {
        let centroid = transport.edge_centroid(&arc_id).ok_or_else(|| {
            ScenarioError::Precondition(format!(
                "reach {}: arc {} has an end node without coordinates",
                reach.name, arc_id
            ))
        })?;
        let gridpoint = gridpoints.nearest_on_branches(&centroid, &branches);
        let reachsegment = reachsegments.nearest_on_branches(&centroid, &branches);
        if gridpoint.is_none() || reachsegment.is_none() {
            warn!(
                "Reach {}: arc {} has no gridpoint or reach segment candidate",
                reach.name, arc_id
            );
        }

        records.push(ConflationRecord {
            reach: reach.name.clone(),
            arc_name: transport.edge(&arc_id).and_then(|e| e.name.clone()),
            arc_id,
            arc_centroid: centroid,
            gridpoint: gridpoint.map(|s| s.id.clone()),
            gridpoint_location: gridpoint.map(|s| s.location),
            reachsegment: reachsegment.map(|s| s.id.clone()),
            reachsegment_location: reachsegment.map(|s| s.location),
        });
    }
    Ok(records)
}

/// Conflates all reaches. An arc that lies on several reaches takes the link
/// of the last one, in the position where it was first mapped.
pub fn create_mapping(
    reaches: &[ReachConfig],
    transport: &TransportNetwork,
    hydro: &HydroNetwork,
    gridpoints: &SampleSet,
    reachsegments: &SampleSet,
    pb: &ProgressBar,
) -> Result<Vec<ConflationRecord>> {
    info!("Creating mapping for {} reaches", reaches.len());
    let mut mapping: Vec<ConflationRecord> = Vec::new();
    let mut position: HashMap<i64, usize> = HashMap::new();

    for reach in reaches {
        pb.set_message(reach.name.clone());
        for record in conflate_reach(reach, transport, hydro, gridpoints, reachsegments)? {
            match position.get(&record.arc_id) {
                Some(&i) => {
                    warn!(
                        "Arc {} of reach {} was mapped by reach {}, replacing the link",
                        record.arc_id, reach.name, mapping[i].reach
                    );
                    mapping[i] = record;
                }
                None => {
                    position.insert(record.arc_id, mapping.len());
                    mapping.push(record);
                }
            }
        }
        pb.inc(1);
    }

    info!("Mapped {} arcs", mapping.len());
    Ok(mapping)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::network::tests::line_network;
    use crate::network::{NetworkEdge, NetworkGraph, NetworkNode};

    pub(crate) fn hydro_network() -> HydroNetwork {
        let edge = |id: &str, from: &str, to: &str, length: f64| NetworkEdge {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            length,
            name: None,
        };
        NetworkGraph::build(
            vec![
                edge("Upper", "A", "B", 150.0),
                edge("Lower", "B", "C", 150.0),
                edge("Side", "B", "D", 50.0),
            ],
            Vec::new(),
        )
    }

    pub(crate) fn gridpoints() -> SampleSet {
        SampleSet::new([
            Sample::new("Upper_1", Point::new(40.0, 5.0)),
            Sample::new("Upper_2", Point::new(140.0, 5.0)),
            Sample::new("Lower_1", Point::new(260.0, 5.0)),
            // on the side branch, closer to arc 20 than anything else
            Sample::new("Side_1", Point::new(150.0, 1.0)),
        ])
    }

    pub(crate) fn reachsegments() -> SampleSet {
        SampleSet::new([
            Sample::new("Upper_1", Point::new(80.0, -5.0)),
            Sample::new("Lower_1", Point::new(225.0, -5.0)),
        ])
    }

    pub(crate) fn reach() -> ReachConfig {
        ReachConfig {
            name: "Main".to_string(),
            transport: (1, 4),
            hydro: ("A".to_string(), "C".to_string()),
        }
    }

    #[test]
    fn test_conflate_reach() {
        let records = conflate_reach(
            &reach(),
            &line_network(),
            &hydro_network(),
            &gridpoints(),
            &reachsegments(),
        )
        .unwrap();

        let arcs: Vec<i64> = records.iter().map(|r| r.arc_id).collect();
        assert_eq!(arcs, vec![10, 20, 30]);
        let gridpoints: Vec<_> = records.iter().map(|r| r.gridpoint.as_deref()).collect();
        assert_eq!(
            gridpoints,
            vec![Some("Upper_1"), Some("Upper_2"), Some("Lower_1")]
        );
        assert_eq!(records[1].reachsegment.as_deref(), Some("Upper_1"));
        assert_eq!(records[2].reachsegment.as_deref(), Some("Lower_1"));
        assert_eq!(
            records[0].gridpoint_link().as_deref(),
            Some("LINESTRING (50 0, 40 5)")
        );
    }

    #[test]
    fn test_no_candidates_gives_none() {
        let records = conflate_reach(
            &reach(),
            &line_network(),
            &hydro_network(),
            &gridpoints(),
            &SampleSet::default(),
        )
        .unwrap();
        assert!(records.iter().all(|r| r.reachsegment.is_none()));
        assert!(records[0].reachsegment_link().is_none());
    }

    #[test]
    fn test_overlapping_reaches_last_wins() {
        let mut second = reach();
        second.name = "Short".to_string();
        second.transport = (2, 3);
        let mapping = create_mapping(
            &[reach(), second],
            &line_network(),
            &hydro_network(),
            &gridpoints(),
            &reachsegments(),
            &ProgressBar::hidden(),
        )
        .unwrap();
        let arcs: Vec<(i64, &str)> = mapping.iter().map(|r| (r.arc_id, r.reach.as_str())).collect();
        assert_eq!(arcs, vec![(10, "Main"), (20, "Short"), (30, "Main")]);
    }

    #[test]
    fn test_unlocated_arc_fails() {
        let edge = |id: i64, from: i64, to: i64| NetworkEdge {
            id,
            from,
            to,
            length: 100.0,
            name: None,
        };
        let node = |id: i64, location: Option<Point>| NetworkNode { id, location };
        let transport = NetworkGraph::build(
            vec![edge(10, 1, 2), edge(20, 2, 3)],
            vec![
                node(1, Some(Point::new(0.0, 0.0))),
                node(2, Some(Point::new(100.0, 0.0))),
                node(3, None),
            ],
        );
        let mut reach = reach();
        reach.transport = (1, 3);
        let result = conflate_reach(
            &reach,
            &transport,
            &hydro_network(),
            &gridpoints(),
            &reachsegments(),
        );
        assert!(matches!(result, Err(ScenarioError::Precondition(_))));
    }
}
