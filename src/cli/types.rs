//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::config::ConfigArgs;
use super::commands::pressure::PressureArgs;
use super::commands::simulate::SimulateArgs;

#[derive(Parser, Debug)]
#[command(name = "variant-forge")]
#[command(about = "Variant Forge - evolutionary artifact optimizer", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file replacing the .variant-forge/ project files
    #[arg(short, long, global = true, env = "VARIANT_FORGE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the pressure table
    Pressure(PressureArgs),

    /// Inspect and validate configuration
    Config(ConfigArgs),

    /// Run optimization against deterministic synthetic services
    Simulate(SimulateArgs),
}
