//! Pressure table command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::display::{list_table, render_list};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, PressureAdjustments, PressureLevel};
use crate::infrastructure::config::ConfigPressureSource;
use crate::services::PressureManager;

#[derive(Args, Debug)]
pub struct PressureArgs {
    /// Only show this level (high/medium/low/training or granular/balanced/generic)
    #[arg(short, long)]
    pub level: Option<String>,

    /// Standalone pressure table (YAML) to validate and show instead
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct PressureRow {
    pub level: String,
    pub alias: String,
    pub similarity_threshold: f64,
    pub niche_radius: f64,
    pub max_distance_from_fittest: f64,
    pub min_cluster_size: usize,
    pub merge_similar_functions: bool,
    pub specialization_bias: f64,
}

impl PressureRow {
    fn new(level: PressureLevel, adjustments: &PressureAdjustments) -> Self {
        Self {
            level: level.as_str().to_string(),
            alias: level.alias().to_string(),
            similarity_threshold: adjustments.similarity_threshold,
            niche_radius: adjustments.niche_radius(),
            max_distance_from_fittest: adjustments.max_distance_from_fittest,
            min_cluster_size: adjustments.min_cluster_size,
            merge_similar_functions: adjustments.merge_similar_functions,
            specialization_bias: adjustments.specialization_bias,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PressureTableOutput {
    pub levels: Vec<PressureRow>,
}

impl CommandOutput for PressureTableOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&[
            "level",
            "alias",
            "similarity",
            "radius",
            "max distance",
            "min size",
            "merge",
            "bias",
        ]);
        for row in &self.levels {
            table.add_row(vec![
                row.level.clone(),
                row.alias.clone(),
                format!("{:.2}", row.similarity_threshold),
                format!("{:.2}", row.niche_radius),
                format!("{:.2}", row.max_distance_from_fittest),
                row.min_cluster_size.to_string(),
                if row.merge_similar_functions { "yes" } else { "no" }.to_string(),
                format!("{:.2}", row.specialization_bias),
            ]);
        }
        render_list("pressure level", &table, self.levels.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn build(args: &PressureArgs, config: &Config) -> Result<PressureTableOutput> {
    let source = match &args.file {
        Some(path) => ConfigPressureSource::from_yaml_file(path)?,
        None => ConfigPressureSource::from_config(config),
    };
    let manager = PressureManager::from_source(&source)?;
    let levels = match args.level.as_deref() {
        Some(level) => {
            let level: PressureLevel = level.parse()?;
            vec![PressureRow::new(level, &manager.get_adjustments(level)?)]
        }
        None => manager
            .levels()
            .map(|(level, adjustments)| PressureRow::new(*level, adjustments))
            .collect(),
    };
    Ok(PressureTableOutput { levels })
}

pub async fn execute(args: PressureArgs, config: &Config, json_mode: bool) -> Result<()> {
    output(&build(&args, config)?, json_mode);
    Ok(())
}
