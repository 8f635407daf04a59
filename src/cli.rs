//! Command-line interface
//!
//! Runs an ability scenario headless, or the plain simulation loop.

use clap::Parser;
use std::path::PathBuf;

use crate::abilities::DEFAULT_ABILITIES_PATH;

/// Ability activation simulator
#[derive(Parser, Debug)]
#[command(name = "arena-abilities")]
#[command(about = "Ability activation simulator")]
#[command(version)]
pub struct Args {
    /// Run in headless mode with the specified JSON scenario file
    #[arg(long, value_name = "SCENARIO_FILE")]
    pub headless: Option<PathBuf>,

    /// Output path for the JSON report (headless mode only)
    #[arg(long, value_name = "OUTPUT_PATH")]
    pub output: Option<PathBuf>,

    /// Override the scenario duration in seconds (headless mode only)
    #[arg(long)]
    pub max_duration: Option<f32>,

    /// Ability definitions to load
    #[arg(long, value_name = "RON_FILE", default_value = DEFAULT_ABILITIES_PATH)]
    pub abilities: PathBuf,
}

pub fn parse_args() -> Args {
    Args::parse()
}
