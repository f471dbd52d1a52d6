//! Width-depth relation per transect of a wet mesh.
//!
//! For every transect (`n`-row) the curve answers: if only cells with at least
//! `depth` of water are navigable, how wide is the widest contiguous stretch?

use crate::config::CrossSectionSettings;
use crate::geometry::{self, Point};
use crate::mesh::{Cell, GridMesh};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// How a transect's width-depth curve is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurveBuildStrategy {
    /// Interpolated crossings of each depth with the actual depth profile.
    #[default]
    Crossing,
    /// Uniform cell width per transect; width `k·w` reaches the best minimum
    /// depth over any window of `k` adjacent cells.
    RollingMinimum,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub depth: f64,
    pub width: f64,
}

/// Depth-ascending `(depth, width)` points of one transect.
#[derive(Debug, Clone)]
pub struct WidthDepthCurve {
    pub n: usize,
    pub points: Vec<CurvePoint>,
    pub centroid: Point,
}

impl WidthDepthCurve {
    pub fn depths(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.depth).collect()
    }

    pub fn widths(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.width).collect()
    }

    pub fn max_width(&self) -> Option<f64> {
        self.points.iter().map(|p| p.width).reduce(f64::max)
    }

    pub fn max_depth(&self) -> Option<f64> {
        self.points.iter().map(|p| p.depth).reduce(f64::max)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Sign of a finite difference, as `numpy.sign`.
fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Widest contiguous stretch of the profile `(w, z)` where `z >= depth`.
///
/// `w` and `z` must be padded so the profile starts and ends dry. A depth that
/// only touches a local maximum of `z` is not counted as wet there. Returns
/// `None` when the profile never reaches `depth`.
pub fn largest_width_for_depth(w: &[f64], z: &[f64], depth: f64) -> Option<f64> {
    let local_extrema: Vec<bool> = {
        let mut flags = vec![false; z.len()];
        for i in 1..z.len().saturating_sub(1) {
            let before = sign(z[i] - z[i - 1]);
            let after = sign(z[i + 1] - z[i]);
            flags[i] = (after - before).abs() == 2;
        }
        flags
    };

    let mut crossings: Vec<f64> = Vec::new();
    for i in 0..z.len().saturating_sub(1) {
        if (z[i] >= depth) == (z[i + 1] >= depth) {
            continue;
        }
        if z[i] == depth && local_extrema[i] {
            // a zero-width pocket: drop its pending entry too
            if crossings.len() % 2 == 1 {
                crossings.pop();
            }
            continue;
        }
        crossings.push(w[i] + (w[i + 1] - w[i]) / (z[i + 1] - z[i]) * (depth - z[i]));
    }

    if crossings.len() % 2 == 1 {
        warn!(
            "Unpaired crossing at depth {:.2}, ignoring the last one",
            depth
        );
    }

    crossings
        .chunks_exact(2)
        .map(|pair| pair[1] - pair[0])
        .reduce(f64::max)
}

/// Depths of `numpy.arange(0, max_depth, step)` without the first and last value.
fn depth_sweep(max_depth: f64, step: f64) -> Vec<f64> {
    if !(max_depth > 0.0 && step > 0.0) {
        return Vec::new();
    }
    let count = (max_depth / step).ceil() as usize;
    (1..count.saturating_sub(1)).map(|k| k as f64 * step).collect()
}

fn crossing_curve(n: usize, widths: &[f64], depths: &[f64], step: f64) -> Vec<CurvePoint> {
    let mut w = Vec::with_capacity(widths.len() + 2);
    w.push(0.0);
    let mut total = 0.0;
    for width in widths {
        total += width;
        w.push(total);
    }
    w.push(total);

    let mut z = Vec::with_capacity(depths.len() + 2);
    z.push(0.0);
    z.extend_from_slice(depths);
    z.push(0.0);

    let max_depth = z.iter().copied().fold(0.0, f64::max);
    depth_sweep(max_depth, step)
        .into_iter()
        .filter_map(|depth| match largest_width_for_depth(&w, &z, depth) {
            Some(width) => Some(CurvePoint { depth, width }),
            None => {
                error!("Cross-section {} not reaching depth: {:.2}", n, depth);
                None
            }
        })
        .collect()
}

fn rolling_minimum_curve(widths: &[f64], depths: &[f64]) -> Vec<CurvePoint> {
    if depths.is_empty() {
        return Vec::new();
    }
    let cell_width = widths.iter().sum::<f64>() / widths.len() as f64;

    let mut points: Vec<CurvePoint> = Vec::new();
    for k in (1..=depths.len()).rev() {
        let best = depths
            .windows(k)
            .map(|window| window.iter().copied().fold(f64::INFINITY, f64::min))
            .fold(f64::NEG_INFINITY, f64::max);
        let width = k as f64 * cell_width;
        match points.last_mut() {
            Some(last) if last.depth == best => last.width = last.width.max(width),
            _ => points.push(CurvePoint { depth: best, width }),
        }
    }
    points.retain(|p| p.depth > 0.0);
    points
}

/// Curve of one transect from its cell widths and depths (ordered across the
/// channel).
pub fn build_curve(
    n: usize,
    widths: &[f64],
    depths: &[f64],
    centroid: Point,
    strategy: CurveBuildStrategy,
    step: f64,
) -> WidthDepthCurve {
    let points = match strategy {
        CurveBuildStrategy::Crossing => crossing_curve(n, widths, depths, step),
        CurveBuildStrategy::RollingMinimum => rolling_minimum_curve(widths, depths),
    };
    WidthDepthCurve {
        n,
        points,
        centroid,
    }
}

/// Width-depth curves of all transects of one grid, keyed by `n`.
#[derive(Debug, Clone, Default)]
pub struct CrossSectionTable {
    curves: BTreeMap<usize, WidthDepthCurve>,
}

impl CrossSectionTable {
    /// Builds curves for every transect of a wet mesh. Transects whose curve
    /// has fewer than two points cannot be solved and are left out.
    pub fn build(mesh: &GridMesh, settings: &CrossSectionSettings) -> Self {
        info!("Computing width-depth tables per n-row");
        let mut curves = BTreeMap::new();

        for (n, cells) in mesh.transects() {
            debug!("Processing n-row: {}", n);
            let cells: Vec<&Cell> = cells
                .into_iter()
                .filter(|c| c.water_depth.is_some())
                .collect();
            let widths: Vec<f64> = cells.iter().map(|c| c.width).collect();
            let depths: Vec<f64> = cells.iter().filter_map(|c| c.water_depth).collect();

            let Some(centroid) = geometry::union_centroid(cells.iter().map(|c| &c.polygon)) else {
                warn!("Skipping n-row {}: no cell geometry", n);
                continue;
            };

            let curve = build_curve(
                n,
                &widths,
                &depths,
                centroid,
                settings.strategy,
                settings.depth_step,
            );
            if curve.len() < 2 {
                warn!(
                    "Skipping n-row {}: width-depth curve has {} point(s)",
                    n,
                    curve.len()
                );
                continue;
            }
            curves.insert(n, curve);
        }

        info!("Built width-depth curves for {} n-rows", curves.len());
        CrossSectionTable { curves }
    }

    pub fn from_curves(curves: impl IntoIterator<Item = WidthDepthCurve>) -> Self {
        CrossSectionTable {
            curves: curves.into_iter().map(|c| (c.n, c)).collect(),
        }
    }

    pub fn curves(&self) -> impl Iterator<Item = &WidthDepthCurve> {
        self.curves.values()
    }

    pub fn get(&self, n: usize) -> Option<&WidthDepthCurve> {
        self.curves.get(&n)
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }
}
