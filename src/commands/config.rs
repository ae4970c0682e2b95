//! Config subcommands handler

use anyhow::{Context, Result};

use ppc::Config;

/// Show the effective configuration as TOML.
#[cfg(not(tarpaulin_include))]
pub fn handle_show() -> Result<()> {
    let config = Config::load()?;
    let path = Config::config_path()?;
    let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;
    println!("# {}", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Write the default configuration unless a file already exists.
#[cfg(not(tarpaulin_include))]
pub fn handle_init() -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }
    Config::default().save()?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
