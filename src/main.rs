use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = RootArgs::parse();
    let data_dir = args.data_dir.as_deref();
    match args.command {
        Command::Ingest(cmd) => commands::run_ingest(cmd),
        Command::Enrich(cmd) => commands::run_enrich(data_dir, cmd),
        Command::Export(cmd) => commands::run_export(data_dir, cmd),
        Command::Library(cmd) => commands::run_library(data_dir, cmd),
        Command::History(cmd) => commands::run_history(data_dir, cmd),
        Command::Values(cmd) => commands::run_values(data_dir, cmd),
        Command::Settings(cmd) => commands::run_settings(data_dir, cmd),
        Command::TestConnection(cmd) => commands::run_test_connection(data_dir, cmd),
    }
}
