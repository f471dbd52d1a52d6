use crate::channel::ChannelSpec;
use crate::cross_section::CurveBuildStrategy;
use crate::error::{Result, ScenarioError};
use crate::geometry::Point;
use crate::mesh::DEFAULT_MIN_WET_DEPTH;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

// Configuration structure for column name mapping of the shipping database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub arc_id: String,
    pub arc_name: String,
    pub arc_length: String,
    pub from_node: String,
    pub to_node: String,
    pub branch_set: String,
    pub node_id: String,
    pub node_x: String,
    pub node_y: String,
}

impl ColumnConfig {
    pub fn new() -> Self {
        ColumnConfig {
            arc_id: "ID".to_string(),
            arc_name: "Name".to_string(),
            arc_length: "Length__m".to_string(),
            from_node: "FromNodeID".to_string(),
            to_node: "ToNodeID".to_string(),
            branch_set: "BranchSetID".to_string(),
            node_id: "ID".to_string(),
            node_x: "XCoordinate".to_string(),
            node_y: "YCoordinate".to_string(),
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        ColumnConfig::new()
    }
}

// Settings for building width-depth curves
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossSectionSettings {
    pub strategy: CurveBuildStrategy,
    pub depth_step: f64,
    pub min_wet_depth: f64,
}

impl CrossSectionSettings {
    pub fn validate(&self) -> Result<()> {
        if self.depth_step <= 0.0 || self.depth_step.is_nan() {
            return Err(ScenarioError::Config(format!(
                "depth step must be positive, got {}",
                self.depth_step
            )));
        }
        Ok(())
    }
}

impl Default for CrossSectionSettings {
    fn default() -> Self {
        CrossSectionSettings {
            strategy: CurveBuildStrategy::Crossing,
            depth_step: 0.01,
            min_wet_depth: DEFAULT_MIN_WET_DEPTH,
        }
    }
}

// Where the transport network is read from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum TransportSource {
    Sqlite {
        database: PathBuf,
        #[serde(default)]
        scenario_id: Option<i64>,
        #[serde(default)]
        columns: ColumnConfig,
    },
    Csv {
        arcs: PathBuf,
        nodes: PathBuf,
    },
}

// Sample locations plus one time-series file per quantity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleFiles {
    pub locations: PathBuf,
    pub series: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydroConfig {
    /// JSON network definition with the model branches
    pub network: PathBuf,
    #[serde(default)]
    pub exclude_branches: Vec<String>,
    /// Trailing window used for statistics, in minutes
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
    /// Level samples (`water_level`)
    pub gridpoints: SampleFiles,
    /// Flow samples (`water_discharge`, `water_velocity`)
    pub reachsegments: SampleFiles,
}

fn default_window_minutes() -> i64 {
    24 * 60 + 50
}

/// A reach named identically in both networks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachConfig {
    pub name: String,
    pub transport: (i64, i64),
    pub hydro: (String, String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub grid: PathBuf,
    #[serde(default)]
    pub water_depth: Option<PathBuf>,
    #[serde(default)]
    pub water_level: Option<PathBuf>,
    #[serde(default)]
    pub bed_level: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionConfig {
    pub name: String,
    pub grid: String,
    pub start: Point,
    pub end: Point,
    pub channel: ChannelSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualPointConfig {
    pub name: String,
    pub arc: i64,
    pub gridpoint: String,
    pub bed_level: f64,
}

// Scenario configuration read from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_season")]
    pub season_id: i64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_true")]
    pub add_extra_columns: bool,
    #[serde(default = "default_true")]
    pub write_section_netcdf: bool,
    /// Reuse a mapping written by an earlier run instead of conflating again
    #[serde(default)]
    pub mapping: Option<PathBuf>,
    #[serde(default)]
    pub cross_section: CrossSectionSettings,
    pub transport: TransportSource,
    pub hydro: HydroConfig,
    #[serde(default)]
    pub reaches: Vec<ReachConfig>,
    #[serde(default)]
    pub grids: BTreeMap<String, GridConfig>,
    #[serde(default)]
    pub sections: Vec<SectionConfig>,
    #[serde(default)]
    pub manual_points: Vec<ManualPointConfig>,
}

fn default_season() -> i64 {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_true() -> bool {
    true
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl ScenarioConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: ScenarioConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file; relative paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = ScenarioConfig::from_toml(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        resolve(base, &mut self.output_dir);
        if let Some(mapping) = self.mapping.as_mut() {
            resolve(base, mapping);
        }
        match &mut self.transport {
            TransportSource::Sqlite { database, .. } => resolve(base, database),
            TransportSource::Csv { arcs, nodes } => {
                resolve(base, arcs);
                resolve(base, nodes);
            }
        }
        resolve(base, &mut self.hydro.network);
        for files in [&mut self.hydro.gridpoints, &mut self.hydro.reachsegments] {
            resolve(base, &mut files.locations);
            for path in files.series.values_mut() {
                resolve(base, path);
            }
        }
        for grid in self.grids.values_mut() {
            resolve(base, &mut grid.grid);
            for path in [&mut grid.water_depth, &mut grid.water_level, &mut grid.bed_level]
                .into_iter()
                .flatten()
            {
                resolve(base, path);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for reach in &self.reaches {
            if !names.insert(&reach.name) {
                return Err(ScenarioError::Config(format!(
                    "reach '{}' is defined twice",
                    reach.name
                )));
            }
        }
        for (name, grid) in &self.grids {
            let derived = grid.water_level.is_some() && grid.bed_level.is_some();
            if grid.water_depth.is_none() && !derived {
                return Err(ScenarioError::Config(format!(
                    "grid '{}' needs water_depth, or water_level and bed_level",
                    name
                )));
            }
        }
        for section in &self.sections {
            if !self.grids.contains_key(&section.grid) {
                return Err(ScenarioError::Config(format!(
                    "section '{}' refers to unknown grid '{}'",
                    section.name, section.grid
                )));
            }
        }
        self.cross_section.validate()
    }
}
