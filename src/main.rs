use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use macropulse::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for macropulse::AppCommand {
    fn from(cmd: Commands) -> macropulse::AppCommand {
        match cmd {
            Commands::Resolve => macropulse::AppCommand::Resolve,
            Commands::Correlate => macropulse::AppCommand::Correlate,
            Commands::Freshness => macropulse::AppCommand::Freshness,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Resolve all configured indicators and show per-source outcomes
    Resolve,
    /// Compute rolling correlations for configured pairs
    Correlate,
    /// Show freshness of each indicator's latest observation
    Freshness,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => macropulse::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = macropulse::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
indicators:
  - id: us_cpi_yoy
    name: "US CPI YoY"
    frequency: M
    transform: yoy
    sources:
      - provider: fred
        series_id: CPIAUCSL
      - provider: dbnomics
        series_id: BLS/cu/CUSR0000SA0
  - id: gold
    name: "Gold (London fix)"
    frequency: D
    sources:
      - provider: fred
        series_id: GOLDAMGBD228NLBM

correlations: []

providers:
  fred:
    base_url: "https://api.stlouisfed.org"
    api_key: ""
  dbnomics:
    base_url: "https://api.db.nomics.world"
  tradingeconomics:
    base_url: "https://api.tradingeconomics.com"
    api_key: ""
    enabled: false
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
