//! Channel geometry solver: the depth a maintained channel of a given width
//! gets on a transect, read off the transect's width-depth curve.

use crate::cross_section::{CrossSectionTable, WidthDepthCurve};
use crate::error::{Result, ScenarioError};
use crate::geometry::{self, Point};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Top of the synthetic trapezoid lookup line (m).
const LOOKUP_CEILING: f64 = 99.0;

/// Desired channel shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ChannelSpec {
    /// Keep `base_width` everywhere.
    Fixed { base_width: f64 },
    /// Keep `base_width` while that leaves more than `min_depth`; otherwise
    /// narrow down to the width at `min_depth`, never below `min_width`.
    Narrowing {
        base_width: f64,
        min_width: f64,
        min_depth: f64,
    },
    /// Trapezoid with sloped banks reaching `depth_at_full_width` at `base_width`.
    Trapezoid {
        base_width: f64,
        side_slope: f64,
        depth_at_full_width: f64,
    },
}

impl ChannelSpec {
    pub fn base_width(&self) -> f64 {
        match *self {
            ChannelSpec::Fixed { base_width }
            | ChannelSpec::Narrowing { base_width, .. }
            | ChannelSpec::Trapezoid { base_width, .. } => base_width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSolution {
    pub depth: f64,
    pub width: f64,
}

/// Solution for one transect, geo-referenced by the transect centroid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransectSolution {
    pub n: usize,
    pub depth: f64,
    pub width: f64,
    pub centroid: Point,
}

pub fn solve(curve: &WidthDepthCurve, spec: &ChannelSpec) -> Result<ChannelSolution> {
    if curve.len() < 2 {
        return Err(ScenarioError::Geometry(format!(
            "width-depth curve of n-row {} has {} point(s), need at least 2",
            curve.n,
            curve.len()
        )));
    }
    match *spec {
        ChannelSpec::Fixed { base_width } => solve_narrowing(curve, base_width, 0.0, 0.0),
        ChannelSpec::Narrowing {
            base_width,
            min_width,
            min_depth,
        } => solve_narrowing(curve, base_width, min_width, min_depth),
        ChannelSpec::Trapezoid {
            base_width,
            side_slope,
            depth_at_full_width,
        } => solve_trapezoid(curve, base_width, side_slope, depth_at_full_width),
    }
}

fn solve_narrowing(
    curve: &WidthDepthCurve,
    base_width: f64,
    min_width: f64,
    min_depth: f64,
) -> Result<ChannelSolution> {
    let depths = curve.depths();
    let widths = curve.widths();
    // width falls with depth; reversed, the width axis increases
    let depths_rev: Vec<f64> = depths.iter().rev().copied().collect();
    let widths_rev: Vec<f64> = widths.iter().rev().copied().collect();

    let depth_full_width = geometry::interp(base_width, &widths_rev, &depths_rev)?;
    if depth_full_width > min_depth {
        return Ok(ChannelSolution {
            depth: depth_full_width,
            width: base_width,
        });
    }

    let width = geometry::interp(min_depth, &depths, &widths)?;
    if width >= min_width {
        return Ok(ChannelSolution {
            depth: min_depth,
            width,
        });
    }

    Ok(ChannelSolution {
        depth: geometry::interp(min_width, &widths_rev, &depths_rev)?,
        width: min_width,
    })
}

fn solve_trapezoid(
    curve: &WidthDepthCurve,
    base_width: f64,
    side_slope: f64,
    depth_at_full_width: f64,
) -> Result<ChannelSolution> {
    if side_slope <= 0.0 {
        return Err(ScenarioError::Geometry(format!(
            "side slope must be positive, got {}",
            side_slope
        )));
    }

    // depth where the sloped banks meet at zero width
    let depth_lowest = depth_at_full_width - base_width / 2.0 / side_slope;
    let lookup = [
        Point::new(0.0, depth_lowest),
        Point::new(base_width, depth_at_full_width),
        Point::new(base_width, LOOKUP_CEILING.max(depth_at_full_width)),
    ];
    let transect: Vec<Point> = curve
        .points
        .iter()
        .map(|p| Point::new(p.width, p.depth))
        .collect();

    let hits = geometry::polyline_intersections(&transect, &lookup);
    if hits.len() > 1 {
        debug!(
            "n-row {}: {} intersections with the trapezoid, taking the shallowest",
            curve.n,
            hits.len()
        );
    }
    match hits.into_iter().min_by(|a, b| a.y.total_cmp(&b.y)) {
        Some(hit) => Ok(ChannelSolution {
            depth: hit.y,
            width: hit.x,
        }),
        None => {
            let last = curve.points[curve.len() - 1];
            info!(
                "n-row {}: trapezoid not reached, using deepest point ({:.2} m at {:.1} m)",
                curve.n, last.depth, last.width
            );
            Ok(ChannelSolution {
                depth: last.depth,
                width: last.width,
            })
        }
    }
}

/// Solves every transect of `table`, ordered by `n`.
pub fn solve_table(table: &CrossSectionTable, spec: &ChannelSpec) -> Result<Vec<TransectSolution>> {
    info!("Computing depth per n-row");
    table
        .curves()
        .map(|curve| {
            let solution = solve(curve, spec)?;
            Ok(TransectSolution {
                n: curve.n,
                depth: solution.depth,
                width: solution.width,
                centroid: curve.centroid,
            })
        })
        .collect()
}
