pub mod config;
pub mod doctor;
pub mod hash;
pub mod sweep;

use clap::{Parser, Subcommand};

/// keyward — session and store-authorization engine tooling.
#[derive(Debug, Parser)]
#[command(name = "keyward", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Derive a password credential block and print it as JSON.
    HashPassword {
        /// Iteration count (defaults to `security.hash_iterations`).
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Remove expired entries from the configured session store.
    Sweep,
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

pub const CONFIG_ENV: &str = "KW_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "keyward.toml";

/// Load the configuration from the path in `KW_CONFIG` (or `keyward.toml`).
/// A missing file yields the defaults. Returns the config and the path used.
pub fn load_config() -> anyhow::Result<(kw_domain::config::Config, String)> {
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> anyhow::Result<kw_domain::config::Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(kw_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}
