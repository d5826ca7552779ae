mod act;
mod cli;
mod config;
mod error;
mod model;
mod observe;
mod record;
mod storage;
mod watch;

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = cli::run(&cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
