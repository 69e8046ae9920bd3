//! # Command Line Interface
//!
//! Builds the tackle opportunity table from CSV exports and inspects the
//! effective configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{FailurePolicy, PipelineConfig};
use crate::features::FEATURE_COLUMNS;
use crate::io::{self, CsvPartition};
use crate::pipeline::Pipeline;
use crate::types::{Play, PlayerRecord, TackleRecord};

/// Tackle opportunity feature builder
#[derive(Parser)]
#[command(name = "tackle-cli")]
#[command(about = "Build labeled tackle opportunity features from NFL tracking data")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the defender and opportunity tables
    Build {
        /// plays.csv
        #[arg(long)]
        plays: PathBuf,
        /// players.csv
        #[arg(long)]
        players: PathBuf,
        /// tackles.csv
        #[arg(long)]
        tackles: PathBuf,
        /// Tracking CSVs, one partition each
        #[arg(long, required = true, num_args = 1..)]
        tracking: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long, default_value = "./tackle_output")]
        output: PathBuf,
        /// Override the support-count radius
        #[arg(long)]
        nearby_radius: Option<f64>,
        /// Override the tackle range
        #[arg(long)]
        tackle_dist: Option<f64>,
        /// Process partitions one at a time
        #[arg(long)]
        sequential: bool,
        /// Drop failing partitions instead of aborting
        #[arg(long)]
        isolate_failures: bool,
    },
    /// Print the ordered feature columns
    Features,
    /// Print the effective configuration as TOML
    Config,
}

/// CLI handler
pub struct CliHandler {
    config: PipelineConfig,
}

impl CliHandler {
    /// Load configuration from file (if any) and environment
    pub fn new(config_path: Option<&PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => PipelineConfig::load_from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        let config = config.with_env_overrides()?;
        Ok(Self { config })
    }

    /// Handle CLI commands
    pub fn handle_command(mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Build {
                plays,
                players,
                tackles,
                tracking,
                output,
                nearby_radius,
                tackle_dist,
                sequential,
                isolate_failures,
            } => {
                if let Some(radius) = nearby_radius {
                    self.config.proximity.nearby_radius = radius;
                }
                if let Some(dist) = tackle_dist {
                    self.config.segmentation.tackle_dist = dist;
                }
                if sequential {
                    self.config.execution.parallel = false;
                }
                if isolate_failures {
                    self.config.execution.failure_policy = FailurePolicy::Isolate;
                }
                self.config.validate()?;

                let sources = BuildSources { plays, players, tackles, tracking };
                self.build(sources, &output)?;
            }
            Commands::Features => {
                for column in FEATURE_COLUMNS {
                    println!("{column}");
                }
            }
            Commands::Config => {
                print!("{}", self.config.to_toml()?);
            }
        }
        Ok(())
    }

    fn build(&self, sources: BuildSources, output: &Path) -> Result<()> {
        let plays: Vec<Play> = io::read_table(&sources.plays)
            .with_context(|| format!("reading {}", sources.plays.display()))?;
        let players: Vec<PlayerRecord> = io::read_table(&sources.players)
            .with_context(|| format!("reading {}", sources.players.display()))?;
        let tackles: Vec<TackleRecord> = io::read_table(&sources.tackles)
            .with_context(|| format!("reading {}", sources.tackles.display()))?;

        let partitions: Vec<CsvPartition> =
            sources.tracking.into_iter().map(CsvPartition::new).collect();
        let pipeline = Pipeline::new(self.config.clone(), &plays, &players, &tackles)?;
        let result = pipeline.run(&partitions)?;

        std::fs::create_dir_all(output)?;
        let defenders = io::create_file(output.join("defenders.csv"))?;
        io::write_feature_frames(defenders, &result.defenders)?;
        let opportunities = io::create_file(output.join("opportunities.csv"))?;
        io::write_opportunities(opportunities, &result.opportunities)?;
        io::write_json(output.join("features.json"), &result.feature_columns)?;
        io::write_json(output.join("report.json"), &result.report)?;

        info!("Wrote {} opportunities to {}", result.opportunities.len(), output.display());
        println!(
            "{} tackle opportunities from {} defender frames ({} partitions failed)",
            result.opportunities.len(),
            result.defenders.len(),
            result.report.partitions_failed.len()
        );
        if let Some(rate) = result.report.non_ambiguous_rate {
            println!("Non-ambiguous opportunities: {:.1}%", 100.0 * rate);
        }

        Ok(())
    }
}

struct BuildSources {
    plays: PathBuf,
    players: PathBuf,
    tackles: PathBuf,
    tracking: Vec<PathBuf>,
}
