use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use kw_gateway::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Doctor => {
            init_cli_tracing();
            let (config, config_path) = kw_gateway::cli::load_config()?;
            let passed = kw_gateway::cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = kw_gateway::cli::load_config()?;
            let valid = kw_gateway::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _config_path) = kw_gateway::cli::load_config()?;
            print!("{}", kw_gateway::cli::config::show(&config)?);
            Ok(())
        }
        Command::HashPassword { iterations } => {
            init_cli_tracing();
            let (config, _) = kw_gateway::cli::load_config()?;
            kw_gateway::cli::hash::run(&config, iterations).await
        }
        Command::Sweep => {
            init_tracing();
            let (config, _) = kw_gateway::cli::load_config()?;
            let removed = kw_gateway::cli::sweep::run(&config).await?;
            println!("removed {removed} expired session(s)");
            Ok(())
        }
        Command::Version => {
            println!("keyward {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured JSON tracing for commands that touch the backends, so the
/// `kw_event` lines can be collected.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kw_sessions=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Compact stderr tracing for interactive one-shot commands.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
