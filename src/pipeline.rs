//! Scenario run: load both networks and the hydro results, conflate, then
//! apply the grid depths and manual points and write the tables.

use crate::config::{
    CrossSectionSettings, GridConfig, HydroConfig, ScenarioConfig, TransportSource,
};
use crate::conflation::{self, ConflationRecord, SampleSet};
use crate::cross_section::CrossSectionTable;
use crate::error::Result;
use crate::hydro::{SampleStats, WATER_DISCHARGE, WATER_LEVEL, WATER_VELOCITY};
use crate::io;
use crate::io::results::SectionResults;
use crate::mesh::{GridMesh, Quantity};
use crate::network::{self, HydroNetwork, TransportNetwork};
use crate::scenario::{self, WaterScenarioTable};
use chrono::{Duration, Local};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MAPPING_FILE: &str = "mapping.csv";
pub const SCENARIO_FILE: &str = "waterscenario.csv";

pub fn progress_bar(len: usize, unit: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    let template = format!(
        "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} {{msg}} ({{eta}})",
        unit
    );
    pb.set_style(ProgressStyle::default_bar().template(&template)?.progress_chars("#>-"));
    Ok(pb)
}

pub fn load_transport(source: &TransportSource) -> Result<TransportNetwork> {
    match source {
        TransportSource::Sqlite {
            database,
            scenario_id,
            columns,
        } => {
            info!("Loading transport network from {}", database.display());
            let conn = Connection::open(database)?;
            network::load_transport_network(&conn, columns, *scenario_id)
        }
        TransportSource::Csv { arcs, nodes } => {
            info!("Loading transport network from {}", arcs.display());
            io::csv::read_transport_network(arcs, nodes)
        }
    }
}

/// Hydro network, samples and their statistics.
#[derive(Debug, Clone)]
pub struct HydroInputs {
    pub network: HydroNetwork,
    pub gridpoints: SampleSet,
    pub reachsegments: SampleSet,
    pub stats: SampleStats,
}

pub fn load_hydro(config: &HydroConfig) -> Result<HydroInputs> {
    info!("Loading hydro results");
    let network = io::network_def::read_network_definition(&config.network, &config.exclude_branches)?;
    let window = Duration::minutes(config.window_minutes);

    let mut stats = SampleStats::default();
    for files in [&config.gridpoints, &config.reachsegments] {
        for (quantity, path) in &files.series {
            let series = io::csv::read_time_series(path, quantity)?;
            stats.add_series(&series, window);
        }
    }
    for quantity in [WATER_LEVEL, WATER_DISCHARGE, WATER_VELOCITY] {
        if !stats.quantities().any(|q| q == quantity) {
            warn!("No {} series configured, its column stays empty", quantity);
        }
    }

    Ok(HydroInputs {
        network,
        gridpoints: SampleSet::new(io::csv::read_sample_locations(&config.gridpoints.locations)?),
        reachsegments: SampleSet::new(io::csv::read_sample_locations(
            &config.reachsegments.locations,
        )?),
        stats,
    })
}

/// Grid with its coverages attached, reduced to wet cells. Water depth is
/// derived from level and bed level when no depth file is given.
pub fn load_wet_mesh(grid: &GridConfig, settings: &CrossSectionSettings) -> Result<GridMesh> {
    let mut mesh = GridMesh::load(&grid.grid)?;
    for (quantity, path) in [
        (Quantity::BedLevel, &grid.bed_level),
        (Quantity::WaterLevel, &grid.water_level),
        (Quantity::WaterDepth, &grid.water_depth),
    ] {
        if let Some(path) = path {
            mesh = mesh.attach_coverage_file(quantity, path)?;
        }
    }
    if grid.water_depth.is_none() {
        mesh = mesh.compute_water_depth()?;
    }
    Ok(mesh.filter_wet(settings.min_wet_depth))
}

/// Width-depth table of a single grid and depth file.
pub fn width_depth(grid: &Path, depth: &Path, settings: &CrossSectionSettings) -> Result<CrossSectionTable> {
    settings.validate()?;
    let grid = GridConfig {
        grid: grid.to_path_buf(),
        water_depth: Some(depth.to_path_buf()),
        water_level: None,
        bed_level: None,
    };
    let mesh = load_wet_mesh(&grid, settings)?;
    Ok(CrossSectionTable::build(&mesh, settings))
}

fn map_reaches(
    config: &ScenarioConfig,
    transport: &TransportNetwork,
    hydro: &HydroInputs,
) -> Result<Vec<ConflationRecord>> {
    let pb = progress_bar(config.reaches.len(), "reaches")?;
    let mapping = conflation::create_mapping(
        &config.reaches,
        transport,
        &hydro.network,
        &hydro.gridpoints,
        &hydro.reachsegments,
        &pb,
    )?;
    pb.finish_and_clear();
    io::csv::write_mapping(&config.output_dir.join(MAPPING_FILE), &mapping)?;
    Ok(mapping)
}

/// Conflates the reaches and writes the mapping.
pub fn conflate(config: &ScenarioConfig) -> Result<Vec<ConflationRecord>> {
    fs::create_dir_all(&config.output_dir)?;
    let transport = load_transport(&config.transport)?;
    let hydro = load_hydro(&config.hydro)?;
    map_reaches(config, &transport, &hydro)
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub arcs: usize,
    pub sections: usize,
    pub scenario_file: PathBuf,
}

pub fn run(config: &ScenarioConfig) -> Result<RunSummary> {
    fs::create_dir_all(&config.output_dir)?;
    let transport = load_transport(&config.transport)?;
    let hydro = load_hydro(&config.hydro)?;

    let mapping = match &config.mapping {
        Some(path) => io::csv::read_mapping(path)?,
        None => map_reaches(config, &transport, &hydro)?,
    };
    let table = WaterScenarioTable::from_conflation(&mapping, &hydro.stats, config.season_id);

    // width-depth tables of the grids the sections use
    let mut tables: BTreeMap<&str, CrossSectionTable> = BTreeMap::new();
    for section in &config.sections {
        let name = section.grid.as_str();
        if tables.contains_key(name) {
            continue;
        }
        let Some(grid) = config.grids.get(name) else {
            continue;
        };
        info!("Processing grid {}", name);
        let mesh = load_wet_mesh(grid, &config.cross_section)?;
        let cross_sections = CrossSectionTable::build(&mesh, &config.cross_section);
        io::csv::write_width_depth(
            &config.output_dir.join(format!("width_depth_{}.csv", name)),
            &cross_sections,
        )?;
        tables.insert(name, cross_sections);
    }

    let pb = progress_bar(config.sections.len(), "sections")?;
    let created = Local::now().naive_local();
    let mut reaches = Vec::with_capacity(config.sections.len());
    for section in &config.sections {
        pb.set_message(section.name.clone());
        let Some(cross_sections) = tables.get(section.grid.as_str()) else {
            warn!("Section {}: grid {} not loaded", section.name, section.grid);
            continue;
        };
        let reach = scenario::solve_section(section, cross_sections)?;
        if config.write_section_netcdf && !reach.transects.is_empty() {
            let results = SectionResults::from_reach(&reach, &section.channel);
            io::netcdf::write_section_netcdf(
                &config
                    .output_dir
                    .join(format!("waterdepthgrid_{}.nc", section.name)),
                &results,
                &created,
            )?;
        }
        reaches.push(reach);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let table = table
        .override_with_geometry(&transport, &reaches, config.add_extra_columns)?
        .apply_manual_overrides(&transport, &config.manual_points, &hydro.stats)?;

    let scenario_file = config.output_dir.join(SCENARIO_FILE);
    io::csv::write_water_scenario(&scenario_file, &table, config.add_extra_columns)?;

    Ok(RunSummary {
        arcs: table.len(),
        sections: reaches.len(),
        scenario_file,
    })
}
