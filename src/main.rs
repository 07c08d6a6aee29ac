use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use formforge::cli;

#[derive(Parser)]
#[command(name = "formforge")]
#[command(about = "Football form analytics and betting-signal engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic demo dataset
    Seed {
        #[arg(short, long, default_value = "dataset.json")]
        out: PathBuf,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Replay Elo ratings chronologically and store the snapshots
    Replay {
        #[arg(short, long)]
        dataset: PathBuf,
    },
    /// Recompute form snapshots for every finished match
    Snapshots {
        #[arg(short, long)]
        dataset: PathBuf,
    },
    /// Show a team's current feature vector
    Features {
        #[arg(short, long)]
        dataset: PathBuf,
        #[arg(short, long)]
        team: String,
        /// Cutoff date (RFC3339 or YYYY-MM-DD); defaults to the fixture's kickoff
        #[arg(long)]
        date: Option<String>,
    },
    /// Predict upcoming matches with the baseline model
    Predict {
        #[arg(short, long)]
        dataset: PathBuf,
    },
    /// Score betting opportunities for stored predictions
    Score {
        #[arg(short, long)]
        dataset: PathBuf,
        /// Restrict to a single match id
        #[arg(long)]
        match_id: Option<String>,
        /// Betting configuration file (JSON); defaults are used when absent
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Build the best slip across upcoming matches
    Slip {
        #[arg(short, long)]
        dataset: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Grade historical predictions and refresh accuracy profiles
    Accuracy {
        #[arg(short, long)]
        dataset: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Export the training dataset as CSV
    Export {
        #[arg(short, long)]
        dataset: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        /// Season to export; defaults to the latest on record
        #[arg(long)]
        season: Option<String>,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Seed { out, seed } => cli::seed(&out, seed)?,
        Commands::Replay { dataset } => cli::replay(&dataset)?,
        Commands::Snapshots { dataset } => cli::snapshots(&dataset)?,
        Commands::Features {
            dataset,
            team,
            date,
        } => cli::features(&dataset, &team, date.as_deref())?,
        Commands::Predict { dataset } => cli::predict(&dataset)?,
        Commands::Score {
            dataset,
            match_id,
            config,
        } => cli::score(&dataset, match_id.as_deref(), config.as_deref())?,
        Commands::Slip { dataset, config } => cli::slip(&dataset, config.as_deref())?,
        Commands::Accuracy { dataset, config } => cli::accuracy(&dataset, config.as_deref())?,
        Commands::Export {
            dataset,
            out,
            season,
        } => cli::export(&dataset, &out, season.as_deref())?,
    }

    Ok(())
}
