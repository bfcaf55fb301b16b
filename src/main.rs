use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use daily_insights::{init_engine, InsightsConfig, InsightsError};

#[derive(Parser, Debug)]
#[command(name = "daily-insights", version, about = "Daily behavioral insights from assistant conversations and calendar entries")]
struct Args {
    /// JSON config file; defaults plus environment variables when omitted
    #[arg(long, env = "INSIGHTS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Return cached insights for a day, generating them on a miss
    Get {
        #[arg(long)]
        user: String,
        /// Day to analyze, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        /// Ignore the cache and analyze again
        #[arg(long)]
        regenerate: bool,
    },
    /// Analyze a day again and replace the cached record
    Regenerate {
        #[arg(long)]
        user: String,
        #[arg(long)]
        date: NaiveDate,
    },
}

async fn run(args: Args) -> Result<String, InsightsError> {
    let config = match &args.config {
        Some(path) => InsightsConfig::from_file(path)?,
        None => InsightsConfig::from_env()?,
    };
    let engine = init_engine(&config)?;

    let record = match args.command {
        Command::Get { user, date, regenerate } => engine.get_insights(&user, date, regenerate).await,
        Command::Regenerate { user, date } => engine.regenerate(&user, date).await,
    };
    Ok(serde_json::to_string_pretty(&record)?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
