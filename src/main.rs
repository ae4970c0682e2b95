//! Pattern Preview Cache (ppc) - CLI entry point

mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use ppc::cli::{Cli, Commands, ConfigCommands};

/// Map `-v` occurrences to a log filter; without `-v`, `RUST_LOG` wins.
fn log_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

#[cfg(not(tarpaulin_include))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::CacheAll => commands::cache_all::handle().await,
        Commands::Warm { patterns } => commands::warm::handle(&patterns).await,
        Commands::Status => commands::status::handle().await,
        Commands::Get { pattern } => commands::get::handle(&pattern).await,
        Commands::Invalidate { pattern } => commands::invalidate::handle_invalidate(&pattern).await,
        Commands::Clear => commands::invalidate::handle_clear().await,
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::handle_show(),
            ConfigCommands::Init => commands::config::handle_init(),
        },
    }
}
