//! coachkb CLI: build the knowledge base behind a video companion and query it.
//!
//! Turns a video's topic keywords into a deduplicated, tagged and enriched
//! knowledge-base export, then answers viewer questions against it.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
