use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use waterscenario_rs::config::{CrossSectionSettings, ScenarioConfig};
use waterscenario_rs::{io, pipeline};

mod cli;

use cli::{Command, get_args};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = get_args();
    init_logging(args.verbose);

    match args.command {
        Command::Run { config } => {
            let scenario = ScenarioConfig::load(&config)
                .with_context(|| format!("Failed to load configuration: {:?}", config))?;
            let summary = pipeline::run(&scenario).context("Scenario run failed")?;
            info!(
                "Water scenario complete: {} arcs, {} sections. Output saved to {}",
                summary.arcs,
                summary.sections,
                summary.scenario_file.display()
            );
        }
        Command::Conflate { config } => {
            let scenario = ScenarioConfig::load(&config)
                .with_context(|| format!("Failed to load configuration: {:?}", config))?;
            let mapping = pipeline::conflate(&scenario).context("Conflation failed")?;
            info!(
                "Mapping of {} arcs saved to {}",
                mapping.len(),
                scenario.output_dir.join(pipeline::MAPPING_FILE).display()
            );
        }
        Command::WidthDepth {
            grid,
            depth,
            out,
            step,
        } => {
            let settings = CrossSectionSettings {
                depth_step: step,
                ..CrossSectionSettings::default()
            };
            let table = pipeline::width_depth(&grid, &depth, &settings)
                .with_context(|| format!("Failed to build width-depth table for {:?}", grid))?;
            io::csv::write_width_depth(&out, &table)
                .with_context(|| format!("Failed to write {:?}", out))?;
        }
    }
    Ok(())
}
