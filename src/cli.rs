//! CLI definitions for ppc
//!
//! The clap structures live in the library so the command surface can be
//! tested without running the binary.

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{ArgAction, Parser, Subcommand};

/// Clap styles for help output.
pub fn build_cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::White.on_default())
        .invalid(AnsiColor::Red.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
}

#[derive(Parser)]
#[command(name = "ppc")]
#[command(about = "[ Pattern Preview Cache ] - keep sand table pattern previews cached locally")]
#[command(
    long_about = "Pattern Preview Cache (ppc) - a two-tier cache for pattern preview images.

Previews are rendered by the pattern server and cached on disk (bounded by a
byte budget, least-recently-used entries evicted first) and in memory for the
lifetime of a command.

QUICK START:
    ppc cache-all                  Cache every pattern the server knows about
    ppc warm clear/sweep.thr       Fetch previews for specific patterns
    ppc status                     Show cache usage
    ppc clear                      Drop every cached preview"
)]
#[command(version)]
#[command(styles = build_cli_styles())]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cache previews for every pattern in the catalog
    #[command(long_about = "Cache previews for every pattern in the server's catalog.

Patterns that are already cached are skipped. The rest are requested in
chunks; progress is printed to stderr after every chunk. Press Ctrl-C to
stop after the current chunk (previews fetched so far stay cached).

EXAMPLE:
    ppc cache-all")]
    CacheAll,

    /// Fetch previews for specific patterns
    #[command(long_about = "Fetch previews for the given patterns.

Requests are coalesced into one batch and only patterns that are not cached
yet hit the server.

EXAMPLE:
    ppc warm clear/sweep.thr custom/spiral.thr")]
    Warm {
        /// Pattern ids (catalog paths)
        #[arg(required = true, help = "Pattern ids (catalog paths)")]
        patterns: Vec<String>,
    },

    /// Show cache statistics
    Status,

    /// Show the cached preview for a pattern
    Get {
        /// Pattern id (catalog path)
        pattern: String,
    },

    /// Remove one pattern's preview from the cache
    Invalidate {
        /// Pattern id (catalog path)
        pattern: String,
    },

    /// Remove every cached preview
    Clear,

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Write the default configuration file if none exists
    Init,
}
