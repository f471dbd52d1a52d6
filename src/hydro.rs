//! Hydrodynamic model samples and their descriptive statistics.

use crate::error::{Result, ScenarioError};
use crate::geometry::Point;
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const WATER_LEVEL: &str = "water_level";
pub const WATER_DISCHARGE: &str = "water_discharge";
pub const WATER_VELOCITY: &str = "water_velocity";

/// Statistics are taken over the last tidal day of each series.
pub fn default_window() -> Duration {
    Duration::hours(24) + Duration::minutes(50)
}

/// A gridpoint or reach segment of the hydrodynamic model.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: String,
    pub location: Point,
    pub branch: String,
}

impl Sample {
    /// Sample ids are `<branch>_<index>`.
    pub fn new(id: impl Into<String>, location: Point) -> Self {
        let id = id.into();
        let branch = match id.rsplit_once('_') {
            Some((branch, _)) => branch.to_string(),
            None => id.clone(),
        };
        Sample {
            id,
            location,
            branch,
        }
    }
}

/// Time series of one quantity for a set of samples.
#[derive(Debug, Clone)]
pub struct HydroSeries {
    pub quantity: String,
    times: Vec<NaiveDateTime>,
    values: BTreeMap<String, Vec<f64>>,
}

impl HydroSeries {
    /// Columns must have one value per time. Rows are sorted by time.
    pub fn new(
        quantity: impl Into<String>,
        times: Vec<NaiveDateTime>,
        values: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self> {
        let quantity = quantity.into();
        if let Some((id, column)) = values.iter().find(|(_, v)| v.len() != times.len()) {
            return Err(ScenarioError::Format(format!(
                "{}: sample {} has {} values for {} times",
                quantity,
                id,
                column.len(),
                times.len()
            )));
        }

        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by_key(|&i| times[i]);
        let times = order.iter().map(|&i| times[i]).collect();
        let values = values
            .into_iter()
            .map(|(id, column)| (id, order.iter().map(|&i| column[i]).collect()))
            .collect();

        Ok(HydroSeries {
            quantity,
            times,
            values,
        })
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn sample_ids(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn values(&self, sample: &str) -> Option<&[f64]> {
        self.values.get(sample).map(Vec::as_slice)
    }

    /// Rows with time in `[last - window, last]`.
    pub fn trailing_window(&self, window: Duration) -> HydroSeries {
        let Some(&end) = self.times.last() else {
            return self.clone();
        };
        let start = end - window;
        let first = self.times.partition_point(|t| *t < start);
        debug!(
            "{}: window {} to {} keeps {} of {} rows",
            self.quantity,
            start,
            end,
            self.times.len() - first,
            self.times.len()
        );
        HydroSeries {
            quantity: self.quantity.clone(),
            times: self.times[first..].to_vec(),
            values: self
                .values
                .iter()
                .map(|(id, column)| (id.clone(), column[first..].to_vec()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Mean,
    Std,
    Min,
    P5,
    P25,
    P50,
    P75,
    P95,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptiveStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
}

impl DescriptiveStats {
    pub fn get(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Mean => self.mean,
            Statistic::Std => self.std,
            Statistic::Min => self.min,
            Statistic::P5 => self.p5,
            Statistic::P25 => self.p25,
            Statistic::P50 => self.p50,
            Statistic::P75 => self.p75,
            Statistic::P95 => self.p95,
            Statistic::Max => self.max,
        }
    }
}

// linear interpolation between closest ranks
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Mean, sample standard deviation, extremes and percentiles. NaN values are
/// skipped; `None` when nothing is left.
pub fn describe(values: &[f64]) -> Option<DescriptiveStats> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / count;
    let std = if sorted.len() > 1 {
        (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1.0)).sqrt()
    } else {
        f64::NAN
    };

    Some(DescriptiveStats {
        mean,
        std,
        min: sorted[0],
        p5: percentile(&sorted, 0.05),
        p25: percentile(&sorted, 0.25),
        p50: percentile(&sorted, 0.5),
        p75: percentile(&sorted, 0.75),
        p95: percentile(&sorted, 0.95),
        max: sorted[sorted.len() - 1],
    })
}

/// Statistics per quantity and sample.
#[derive(Debug, Clone, Default)]
pub struct SampleStats {
    stats: BTreeMap<String, BTreeMap<String, DescriptiveStats>>,
}

impl SampleStats {
    /// Adds the statistics of the trailing `window` of `series`.
    pub fn add_series(&mut self, series: &HydroSeries, window: Duration) {
        let windowed = series.trailing_window(window);
        let per_sample = self.stats.entry(series.quantity.clone()).or_default();
        for id in windowed.sample_ids() {
            match windowed.values(id).and_then(describe) {
                Some(stats) => {
                    per_sample.insert(id.clone(), stats);
                }
                None => warn!("{}: sample {} has no values in window", series.quantity, id),
            }
        }
    }

    pub fn get(&self, quantity: &str, sample: &str) -> Option<&DescriptiveStats> {
        self.stats.get(quantity)?.get(sample)
    }

    pub fn value(&self, quantity: &str, sample: &str, statistic: Statistic) -> Option<f64> {
        self.get(quantity, sample).map(|s| s.get(statistic))
    }

    pub fn quantities(&self) -> impl Iterator<Item = &String> {
        self.stats.keys()
    }
}
