//! CLI entry point for todo.

mod app;
mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Env var holding the tracing filter directive (e.g. `todo_client=debug`).
const LOG_FILTER_ENV: &str = "TODO_LOG";

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let code = app::entry::run(args).await;
    std::process::exit(code);
}
