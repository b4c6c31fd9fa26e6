//! qagent CLI: documentation-grounded test cases and Selenium scripts.
//!
//! Builds a local knowledge base from product documentation and the page
//! under test, then generates test cases and automation scripts from it.

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
