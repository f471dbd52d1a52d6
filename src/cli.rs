use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Builds water scenarios for the shipping model from hydrodynamic results
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Log debug messages (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full scenario: mapping, grid depths, manual points
    Run {
        /// Scenario configuration (TOML)
        config: PathBuf,
    },
    /// Only conflate the reaches and write the mapping
    Conflate {
        /// Scenario configuration (TOML)
        config: PathBuf,
    },
    /// Width-depth table of one grid
    WidthDepth {
        /// Delft3D grid file (.grd)
        #[arg(long)]
        grid: PathBuf,

        /// Water depth file (.dep)
        #[arg(long)]
        depth: PathBuf,

        /// Output CSV
        #[arg(long, default_value = "width_depth.csv")]
        out: PathBuf,

        /// Depth step of the sweep (m)
        #[arg(long, default_value_t = 0.01)]
        step: f64,
    },
}

pub fn get_args() -> Args {
    Args::parse()
}
