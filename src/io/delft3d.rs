//! Readers for Delft3D structured grid (`.grd`) and depth (`.dep`) files.

use crate::error::{Result, ScenarioError};
use crate::mesh::{Coverage, Grid, Quantity};
use std::fs;
use std::path::Path;

/// Missing value used by `.dep` files.
pub const DEP_MISSING_VALUE: f64 = -999.0;

/// Parses the text of a `.grd` file.
///
/// Layout: `*` comment lines, `key = value` header lines (`Missing Value` is
/// honoured), a line `mmax nmax`, a line `0 0 0`, then `nmax` records of the
/// form `ETA= j x1 .. xmmax` (values may wrap over several lines) for x,
/// followed by the same for y. The grid shape is `(nmax, mmax)`.
pub fn parse_grid(text: &str) -> Result<Grid> {
    let mut missing = 0.0;
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('*'));

    let dims = loop {
        let line = lines
            .next()
            .ok_or_else(|| ScenarioError::Format("grid file has no dimension line".into()))?;
        match line.split_once('=') {
            Some((key, value)) => {
                if key.trim().eq_ignore_ascii_case("missing value") {
                    missing = value.trim().parse::<f64>().map_err(|e| {
                        ScenarioError::Format(format!("invalid missing value '{}': {}", value, e))
                    })?;
                }
            }
            None => break line,
        }
    };

    let mut dims = dims.split_whitespace().map(str::parse::<usize>);
    let (mmax, nmax) = match (dims.next(), dims.next()) {
        (Some(Ok(m)), Some(Ok(n))) => (m, n),
        _ => {
            return Err(ScenarioError::Format(
                "grid dimension line must hold 'mmax nmax'".into(),
            ));
        }
    };

    // the `0 0 0` line
    lines.next();

    let mut values = Vec::with_capacity(2 * mmax * nmax);
    let mut tokens = lines.flat_map(str::split_whitespace);
    while let Some(token) = tokens.next() {
        if token == "ETA=" {
            tokens.next();
            continue;
        }
        if let Some(rest) = token.strip_prefix("ETA=") {
            if rest.parse::<usize>().is_ok() {
                continue;
            }
        }
        let value = token
            .parse::<f64>()
            .map_err(|e| ScenarioError::Format(format!("invalid grid value '{}': {}", token, e)))?;
        values.push(value);
    }

    if values.len() != 2 * mmax * nmax {
        return Err(ScenarioError::Format(format!(
            "grid declares {} x {} points but holds {} coordinates",
            mmax,
            nmax,
            values.len()
        )));
    }
    let (x, y) = values.split_at(mmax * nmax);
    Grid::new(nmax, mmax, x, y, missing)
}

pub fn read_grid(path: &Path) -> Result<Grid> {
    let text = fs::read_to_string(path)?;
    parse_grid(&text)
}

/// Parses the text of a `.dep` file for a grid of shape `grid_shape`. The file
/// holds `(rows + 1) * (cols + 1)` values, row-major.
pub fn parse_dep(text: &str, quantity: Quantity, grid_shape: (usize, usize)) -> Result<Coverage> {
    let values = text
        .split_whitespace()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|e| ScenarioError::Format(format!("invalid depth value '{}': {}", t, e)))
        })
        .collect::<Result<Vec<f64>>>()?;
    Coverage::new(
        quantity,
        grid_shape.0 + 1,
        grid_shape.1 + 1,
        &values,
        DEP_MISSING_VALUE,
    )
}

pub fn read_dep(path: &Path, quantity: Quantity, grid_shape: (usize, usize)) -> Result<Coverage> {
    let text = fs::read_to_string(path)?;
    parse_dep(&text, quantity, grid_shape)
}
