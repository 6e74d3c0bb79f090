//! Procline - relay lines between the terminal and a child process.
//!
//! Each line read from stdin is sent to the child; its replies are printed
//! to stdout. Logging goes to stderr.

mod cli;
mod logging;

use anyhow::Result;
use clap::Parser;

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    execute(cli).await
}
