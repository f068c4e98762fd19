//! subharvest CLI — incremental subreddit ingestion into a local database.
//!
//! Pulls new submissions from a subreddit, stores them without duplicating
//! previously-seen ones, and previews the most recent stored entries.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
