use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Batch shot-outcome prediction pipeline
#[derive(Parser, Debug, Clone)]
#[command(name = "shotcast", version, about)]
pub struct Cli {
    /// SQLite experiment-tracking database path
    #[arg(
        long,
        env = "TRACKING_DB",
        default_value = "shotcast_tracking.db",
        global = true
    )]
    pub tracking_db: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Filter, clamp and split the development snapshot
    Prepare(PrepareArgs),
    /// Fit the candidate models and persist the best one
    Train(TrainArgs),
    /// Score a snapshot with the persisted model
    Score(ScoreArgs),
    /// Run prepare, train and score end to end
    Run(RunArgs),
    /// Score a single shot and append it to the simulation log
    Simulate(SimulateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PrepareArgs {
    /// Development snapshot (labeled shots)
    pub dev: PathBuf,

    /// Production snapshot
    pub prod: PathBuf,

    /// Directory for the filtered base and the split outputs
    pub out_dir: PathBuf,

    /// Holdout fraction of the stratified split
    #[arg(long, default_value = "0.2")]
    pub test_size: f64,

    /// Seed for the stratified shuffle
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Training base written by `prepare`
    pub train: PathBuf,

    /// Test base written by `prepare`
    pub test: PathBuf,

    /// Directory for the model artifact
    pub out_dir: PathBuf,

    /// Seed for the internal calibration split
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    /// Model artifact written by `train`
    pub model: PathBuf,

    /// Snapshot to score
    pub input: PathBuf,

    /// Directory for the predictions snapshot
    pub out_dir: PathBuf,

    /// Decision threshold: predict made when proba >= threshold
    #[arg(long, default_value = "0.35")]
    pub threshold: f64,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Data directory holding raw/, processed/ and modeling/
    pub data_dir: PathBuf,

    /// Seed forwarded to prepare and train
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Decision threshold forwarded to score
    #[arg(long, default_value = "0.35")]
    pub threshold: f64,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Model artifact written by `train`
    #[arg(long, default_value = "modeling/final_model.json")]
    pub model: PathBuf,

    /// Simulation log to append to
    #[arg(long, default_value = "processed/simulations.csv")]
    pub log_file: PathBuf,

    /// Court latitude of the shot
    #[arg(long, default_value = "33.93")]
    pub lat: f64,

    /// Court longitude of the shot
    #[arg(long, default_value = "-118.05")]
    pub lon: f64,

    /// Minutes remaining in the period
    #[arg(long, default_value = "5")]
    pub minutes_remaining: f64,

    /// Period of the game (1-4, overtime beyond)
    #[arg(long, default_value = "2")]
    pub period: f64,

    /// Playoffs flag (0 or 1)
    #[arg(long, default_value = "0")]
    pub playoffs: f64,

    /// Shot distance in feet
    #[arg(long, default_value = "18")]
    pub shot_distance: f64,

    /// Decision threshold: predict made when proba >= threshold
    #[arg(long, default_value = "0.35")]
    pub threshold: f64,
}

impl Cli {
    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.command {
            Command::Prepare(args) => {
                if !(args.test_size > 0.0 && args.test_size < 1.0) {
                    anyhow::bail!("test_size must be strictly between 0.0 and 1.0");
                }
            }
            Command::Train(_) => {}
            Command::Score(args) => validate_threshold(args.threshold)?,
            Command::Run(args) => validate_threshold(args.threshold)?,
            Command::Simulate(args) => {
                validate_threshold(args.threshold)?;
                if args.playoffs != 0.0 && args.playoffs != 1.0 {
                    anyhow::bail!("playoffs must be 0 or 1");
                }
            }
        }
        Ok(())
    }
}

fn validate_threshold(threshold: f64) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        anyhow::bail!("threshold must be between 0.0 and 1.0");
    }
    Ok(())
}
