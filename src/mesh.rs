//! Curvilinear grid → polygon mesh with per-cell width and coverages.
//!
//! A [`Grid`] holds the corner coordinates of a structured hydrodynamic grid.
//! [`GridMesh::from_grid`] turns every quadrilateral of four corners into a
//! [`Cell`] with a derived width, after which scalar [`Coverage`]s (bed level,
//! water level, water depth) can be attached. Every operation returns a new
//! mesh; nothing is mutated after construction.

use crate::error::{Result, ScenarioError};
use crate::geometry::{self, Point};
use crate::io::delft3d;
use geo::{Area, EuclideanLength, Polygon};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Default threshold below which a cell counts as dry.
pub const DEFAULT_MIN_WET_DEPTH: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    BedLevel,
    WaterLevel,
    WaterDepth,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quantity::BedLevel => "bed level",
            Quantity::WaterLevel => "water level",
            Quantity::WaterDepth => "water depth",
        };
        f.write_str(name)
    }
}

/// Corner coordinates, shape `(rows, cols)`.
#[derive(Debug, Clone)]
pub struct Grid {
    corners: Array2<Option<Point>>,
}

impl Grid {
    /// Builds a grid from row-major coordinate arrays. Corners where both `x`
    /// and `y` equal `missing` are treated as undefined.
    pub fn new(rows: usize, cols: usize, x: &[f64], y: &[f64], missing: f64) -> Result<Self> {
        if x.len() != rows * cols || y.len() != rows * cols {
            return Err(ScenarioError::Format(format!(
                "grid of shape ({}, {}) needs {} coordinates, got {} x and {} y",
                rows,
                cols,
                rows * cols,
                x.len(),
                y.len()
            )));
        }
        let corners: Vec<Option<Point>> = x
            .iter()
            .zip(y)
            .map(|(&x, &y)| {
                let undefined = (x == missing && y == missing) || x.is_nan() || y.is_nan();
                (!undefined).then(|| Point::new(x, y))
            })
            .collect();
        Ok(Grid {
            corners: Array2::from_shape_vec((rows, cols), corners)?,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.corners.dim()
    }

    pub fn corner(&self, i: usize, j: usize) -> Option<Point> {
        self.corners.get((i, j)).copied().flatten()
    }
}

/// Scalar values aligned to the grid, shape `(rows + 1, cols + 1)`.
#[derive(Debug, Clone)]
pub struct Coverage {
    pub quantity: Quantity,
    values: Array2<Option<f64>>,
}

impl Coverage {
    pub fn new(
        quantity: Quantity,
        rows: usize,
        cols: usize,
        values: &[f64],
        missing: f64,
    ) -> Result<Self> {
        if values.len() != rows * cols {
            return Err(ScenarioError::Format(format!(
                "{} coverage of shape ({}, {}) needs {} values, got {}",
                quantity,
                rows,
                cols,
                rows * cols,
                values.len()
            )));
        }
        let values = Array2::from_shape_vec((rows, cols), values.to_vec())?
            .mapv(|v| (v != missing && !v.is_nan()).then_some(v));
        Ok(Coverage { quantity, values })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values.get((i, j)).copied().flatten()
    }
}

/// One quadrilateral of the mesh, indexed by `(m, n)`.
#[derive(Debug, Clone)]
pub struct Cell {
    pub m: usize,
    pub n: usize,
    pub polygon: Polygon<f64>,
    pub area: f64,
    /// `2·Area / (sum of the two longest sides)`; the across-channel width when
    /// the cell is much longer than it is wide.
    pub width: f64,
    pub bed_level: Option<f64>,
    pub water_level: Option<f64>,
    pub water_depth: Option<f64>,
}

impl Cell {
    fn from_ring(m: usize, n: usize, ring: [Point; 4]) -> Option<Self> {
        let polygon = geometry::polygon(&ring);
        let area = polygon.unsigned_area();
        let mut sides: Vec<f64> = polygon
            .exterior()
            .lines()
            .map(|side| side.euclidean_length())
            .collect();
        sides.sort_by(|a, b| b.total_cmp(a));
        let longest = sides[0] + sides[1];
        if area <= 0.0 || longest <= 0.0 {
            return None;
        }
        Some(Cell {
            m,
            n,
            polygon,
            area,
            width: 2.0 * area / longest,
            bed_level: None,
            water_level: None,
            water_depth: None,
        })
    }

    pub fn value(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::BedLevel => self.bed_level,
            Quantity::WaterLevel => self.water_level,
            Quantity::WaterDepth => self.water_depth,
        }
    }

    fn with_value(mut self, quantity: Quantity, value: Option<f64>) -> Self {
        match quantity {
            Quantity::BedLevel => self.bed_level = value,
            Quantity::WaterLevel => self.water_level = value,
            Quantity::WaterDepth => self.water_depth = value,
        }
        self
    }
}

/// Cells of one grid.
pub fn to_cells(grid: &Grid) -> Vec<Cell> {
    let (rows, cols) = grid.shape();
    let mut cells = Vec::with_capacity(rows.saturating_sub(1) * cols.saturating_sub(1));
    let mut dropped = 0usize;

    for i in 0..rows.saturating_sub(1) {
        for j in 0..cols.saturating_sub(1) {
            let ring = (
                grid.corner(i, j),
                grid.corner(i, j + 1),
                grid.corner(i + 1, j + 1),
                grid.corner(i + 1, j),
            );
            let cell = match ring {
                (Some(a), Some(b), Some(c), Some(d)) => Cell::from_ring(i, j, [a, b, c, d]),
                _ => None,
            };
            match cell {
                Some(cell) => cells.push(cell),
                None => dropped += 1,
            }
        }
    }

    debug!("Built {} cells, dropped {} undefined", cells.len(), dropped);
    cells
}

#[derive(Debug, Clone)]
pub struct GridMesh {
    shape: (usize, usize),
    cells: Vec<Cell>,
}

impl GridMesh {
    pub fn from_grid(grid: &Grid) -> Self {
        GridMesh {
            shape: grid.shape(),
            cells: to_cells(grid),
        }
    }

    /// Reads a Delft3D `.grd` file.
    pub fn load(grid_file: &Path) -> Result<Self> {
        info!("Loading grid: {}", grid_file.display());
        let grid = delft3d::read_grid(grid_file)?;
        Ok(GridMesh::from_grid(&grid))
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Samples `coverage` at `[m + 1, n + 1]` for every cell.
    pub fn attach_coverage(self, coverage: &Coverage) -> Result<Self> {
        let expected = (self.shape.0 + 1, self.shape.1 + 1);
        if coverage.shape() != expected {
            return Err(ScenarioError::Format(format!(
                "{} coverage has shape {:?}, grid requires {:?}",
                coverage.quantity,
                coverage.shape(),
                expected
            )));
        }
        let quantity = coverage.quantity;
        let cells = self
            .cells
            .into_iter()
            .map(|cell| {
                let value = coverage.get(cell.m + 1, cell.n + 1);
                cell.with_value(quantity, value)
            })
            .collect();
        Ok(GridMesh {
            shape: self.shape,
            cells,
        })
    }

    /// Reads a Delft3D `.dep` file shaped to this grid and attaches it.
    pub fn attach_coverage_file(self, quantity: Quantity, path: &Path) -> Result<Self> {
        info!("Loading {}: {}", quantity, path.display());
        let coverage = delft3d::read_dep(path, quantity, self.shape)?;
        self.attach_coverage(&coverage)
    }

    /// Water depth as `max(water level - bed level, 0)`.
    pub fn compute_water_depth(self) -> Result<Self> {
        let has = |q: Quantity| self.cells.iter().any(|c| c.value(q).is_some());
        if !has(Quantity::WaterLevel) || !has(Quantity::BedLevel) {
            return Err(ScenarioError::Precondition(
                "water level and bed level must both be attached before computing water depth"
                    .into(),
            ));
        }
        info!("Computing water depth from water level and bed level");
        let cells = self
            .cells
            .into_iter()
            .map(|cell| {
                let depth = match (cell.water_level, cell.bed_level) {
                    (Some(wl), Some(bl)) => Some((wl - bl).max(0.0)),
                    _ => None,
                };
                cell.with_value(Quantity::WaterDepth, depth)
            })
            .collect();
        Ok(GridMesh {
            shape: self.shape,
            cells,
        })
    }

    /// Drops dry cells: water depth missing or not above `min_depth`.
    pub fn filter_wet(self, min_depth: f64) -> Self {
        let before = self.cells.len();
        let cells: Vec<Cell> = self
            .cells
            .into_iter()
            .filter(|c| c.water_depth.is_some_and(|d| d > min_depth))
            .collect();
        debug!("Kept {} of {} cells as wet", cells.len(), before);
        GridMesh {
            shape: self.shape,
            cells,
        }
    }

    /// Cells grouped per transect `n`, each ordered by `m`.
    pub fn transects(&self) -> BTreeMap<usize, Vec<&Cell>> {
        let mut rows: BTreeMap<usize, Vec<&Cell>> = BTreeMap::new();
        for cell in &self.cells {
            rows.entry(cell.n).or_default().push(cell);
        }
        for cells in rows.values_mut() {
            cells.sort_by_key(|c| c.m);
        }
        rows
    }
}
