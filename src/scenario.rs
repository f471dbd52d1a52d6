//! Water scenario table: per arc and season, the water conditions the
//! shipping model loads.
//!
//! The table is filled in three stages, each overriding the previous one for
//! the arcs it touches: conflation with the hydro samples, depths from the
//! channel geometry of the configured sections, and manual points.

use crate::channel::{self, TransectSolution};
use crate::config::{ManualPointConfig, SectionConfig};
use crate::conflation::ConflationRecord;
use crate::cross_section::CrossSectionTable;
use crate::error::{Result, ScenarioError};
use crate::geometry::{self, Point};
use crate::hydro::{SampleStats, Statistic, WATER_DISCHARGE, WATER_LEVEL, WATER_VELOCITY};
use crate::network::{TransportNetwork, nearest_feature};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct WaterScenarioRow {
    pub arc_id: i64,
    pub season_id: i64,
    pub water_level: Option<f64>,
    pub rate_of_flow: Option<f64>,
    pub water_speed: Option<f64>,
    pub water_depth: Option<f64>,
    // Diagnostics, not loaded by the shipping model
    pub width: Option<f64>,
    pub nrow_depth: Option<usize>,
    pub nrow_width: Option<usize>,
    pub mapping_to_grid: Option<String>,
    pub geometry: Option<String>,
}

impl WaterScenarioRow {
    pub fn new(arc_id: i64, season_id: i64) -> Self {
        WaterScenarioRow {
            arc_id,
            season_id,
            water_level: None,
            rate_of_flow: None,
            water_speed: None,
            water_depth: None,
            width: None,
            nrow_depth: None,
            nrow_width: None,
            mapping_to_grid: None,
            geometry: None,
        }
    }
}

/// Rows keyed by `(arc, season)`.
#[derive(Debug, Clone)]
pub struct WaterScenarioTable {
    season_id: i64,
    rows: BTreeMap<(i64, i64), WaterScenarioRow>,
}

/// Solved transects of one section, between its start and end points.
#[derive(Debug, Clone)]
pub struct SectionReach {
    pub name: String,
    pub start: Point,
    pub end: Point,
    pub transects: Vec<TransectSolution>,
}

/// Solves the channel on every transect of `table` and keeps the transects
/// from the one nearest to the section start up to the one nearest to its end.
pub fn solve_section(section: &SectionConfig, table: &CrossSectionTable) -> Result<SectionReach> {
    let solved = channel::solve_table(table, &section.channel)?;
    let nearest = |point: &Point| {
        nearest_feature(point, solved.iter().map(|t| (&t.n, &t.centroid))).ok_or_else(|| {
            ScenarioError::Geometry(format!("section {} has no transects", section.name))
        })
    };
    let (first, last) = (nearest(&section.start)?, nearest(&section.end)?);
    let range = first.min(last)..=first.max(last);
    let transects: Vec<TransectSolution> = solved
        .into_iter()
        .filter(|t| range.contains(&t.n))
        .collect();
    debug!(
        "Section {}: n-rows {} to {}, {} transects",
        section.name,
        range.start(),
        range.end(),
        transects.len()
    );

    Ok(SectionReach {
        name: section.name.clone(),
        start: section.start,
        end: section.end,
        transects,
    })
}

fn shallowest<'a>(
    transects: &[&'a TransectSolution],
    key: impl Fn(&TransectSolution) -> f64,
) -> Option<&'a TransectSolution> {
    transects
        .iter()
        .copied()
        .min_by(|a, b| key(a).total_cmp(&key(b)))
}

impl WaterScenarioTable {
    pub fn new(season_id: i64) -> Self {
        WaterScenarioTable {
            season_id,
            rows: BTreeMap::new(),
        }
    }

    pub fn season_id(&self) -> i64 {
        self.season_id
    }

    /// Inserts or replaces the row for its `(arc, season)`.
    pub fn upsert(&mut self, row: WaterScenarioRow) -> Option<WaterScenarioRow> {
        self.rows.insert((row.arc_id, row.season_id), row)
    }

    pub fn get(&self, arc_id: i64) -> Option<&WaterScenarioRow> {
        self.rows.get(&(arc_id, self.season_id))
    }

    pub fn rows(&self) -> impl Iterator<Item = &WaterScenarioRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn row_mut(&mut self, arc_id: i64) -> &mut WaterScenarioRow {
        let season_id = self.season_id;
        self.rows
            .entry((arc_id, season_id))
            .or_insert_with(|| WaterScenarioRow::new(arc_id, season_id))
    }

    /// Water level is the maximum at the mapped gridpoint; discharge and
    /// velocity are means at the mapped reach segment. Depth is left open.
    pub fn from_conflation(
        records: &[ConflationRecord],
        stats: &SampleStats,
        season_id: i64,
    ) -> Self {
        info!("Applying mapping to {} arcs", records.len());
        let mut table = WaterScenarioTable::new(season_id);
        for record in records {
            let gridpoint = record.gridpoint.as_deref();
            let reachsegment = record.reachsegment.as_deref();
            let lookup = |quantity: &str, sample: Option<&str>, statistic: Statistic| {
                let value = sample.and_then(|s| stats.value(quantity, s, statistic));
                if value.is_none() {
                    debug!("Arc {}: no {} for {:?}", record.arc_id, quantity, sample);
                }
                value
            };

            let mut row = WaterScenarioRow::new(record.arc_id, season_id);
            row.water_level = lookup(WATER_LEVEL, gridpoint, Statistic::Max);
            row.rate_of_flow = lookup(WATER_DISCHARGE, reachsegment, Statistic::Mean);
            row.water_speed = lookup(WATER_VELOCITY, reachsegment, Statistic::Mean);
            table.upsert(row);
        }
        table
    }

    /// Sets depth (and with `extra_columns` the diagnostics) on the arcs of
    /// each section. Transects go to the arc with the nearest centroid and an
    /// arc takes the smallest depth and width among them. Arcs that receive
    /// no transect take the transect nearest to their line.
    pub fn override_with_geometry(
        mut self,
        transport: &TransportNetwork,
        sections: &[SectionReach],
        extra_columns: bool,
    ) -> Result<Self> {
        for section in sections {
            info!("Applying depths of section {}", section.name);
            if section.transects.is_empty() {
                warn!("Section {} has no transects, skipped", section.name);
                continue;
            }
            let (Some(start), Some(end)) = (
                transport.nearest_node(&section.start),
                transport.nearest_node(&section.end),
            ) else {
                warn!("Section {}: transport network has no located nodes", section.name);
                continue;
            };
            let path = transport.shortest_path(&start, &end)?;
            if path.edges.is_empty() {
                warn!(
                    "Section {}: start and end map to the same node {}",
                    section.name, start
                );
                continue;
            }

            let centroids: Vec<(i64, Point)> = path
                .edges
                .iter()
                .filter_map(|arc| transport.edge_centroid(arc).map(|c| (*arc, c)))
                .collect();
            let mut assigned: HashMap<i64, Vec<&TransectSolution>> = HashMap::new();
            for transect in &section.transects {
                if let Some(arc) =
                    nearest_feature(&transect.centroid, centroids.iter().map(|(a, c)| (a, c)))
                {
                    assigned.entry(arc).or_default().push(transect);
                }
            }

            for arc in &path.edges {
                let line = transport.edge_line(arc);
                let picked = match assigned.get(arc) {
                    Some(transects) => shallowest(transects, |t| t.depth)
                        .zip(shallowest(transects, |t| t.width)),
                    None => line.and_then(|(a, b)| {
                        section
                            .transects
                            .iter()
                            .map(|t| (t.centroid.distance_to_segment(&a, &b), t))
                            .min_by(|(da, _), (db, _)| da.total_cmp(db))
                            .map(|(_, t)| (t, t))
                    }),
                };
                let Some((by_depth, by_width)) = picked else {
                    warn!("Section {}: arc {} has no geometry", section.name, arc);
                    continue;
                };

                let row = self.row_mut(*arc);
                row.water_depth = Some(by_depth.depth);
                if extra_columns {
                    row.width = Some(by_width.width);
                    row.nrow_depth = Some(by_depth.n);
                    row.nrow_width = Some(by_width.n);
                    row.geometry = line.map(|(a, b)| geometry::linestring_wkt(&a, &b));
                    row.mapping_to_grid = transport
                        .edge_centroid(arc)
                        .map(|c| geometry::linestring_wkt(&c, &by_depth.centroid));
                }
            }
        }
        Ok(self)
    }

    /// Depth at a named arc from the maximum water level at a gridpoint and a
    /// known bed level. Speed and discharge are set to zero.
    pub fn apply_manual_overrides(
        mut self,
        transport: &TransportNetwork,
        points: &[ManualPointConfig],
        stats: &SampleStats,
    ) -> Result<Self> {
        for point in points {
            let level = stats
                .value(WATER_LEVEL, &point.gridpoint, Statistic::Max)
                .ok_or_else(|| {
                    ScenarioError::Precondition(format!(
                        "manual point {}: no water level at gridpoint {}",
                        point.name, point.gridpoint
                    ))
                })?;
            info!(
                "Manual point {}: arc {} depth {:.2} m",
                point.name,
                point.arc,
                level - point.bed_level
            );

            let row = self.row_mut(point.arc);
            row.water_level = Some(level);
            row.water_depth = Some(level - point.bed_level);
            row.water_speed = Some(0.0);
            row.rate_of_flow = Some(0.0);
            row.geometry = transport
                .edge_line(&point.arc)
                .map(|(a, b)| geometry::linestring_wkt(&a, &b));
        }
        Ok(self)
    }
}
