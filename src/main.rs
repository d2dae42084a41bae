use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fundlens::core::log::init_logging;

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

impl From<Commands> for fundlens::AppCommand {
    fn from(cmd: Commands) -> fundlens::AppCommand {
        match cmd {
            Commands::Search { query } => fundlens::AppCommand::Search { query },
            Commands::Popular => fundlens::AppCommand::Popular,
            Commands::Composition { isin, full } => {
                fundlens::AppCommand::Composition { isin, full }
            }
            Commands::Portfolio => fundlens::AppCommand::Portfolio,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Search funds and stocks by name, ISIN or code
    Search {
        /// Free-text query
        query: String,
    },
    /// Show a snapshot of popular/active securities
    Popular,
    /// Show the composition of one fund
    Composition {
        /// Fund ISIN
        isin: String,
        /// Include fund facts, returns and extended holdings
        #[arg(long)]
        full: bool,
    },
    /// Aggregate configured positions into exposure, overlap and costs
    Portfolio,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => fundlens::run_command(cmd.into(), cli.config_path.as_deref()).await,
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

    let path = fundlens::core::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
mode: amount
positions:
  - name: "Vanguard FTSE All-World"
    isin: "IE00B3RBWM25"
    kind: etf
    value: 1000.0

providers:
  justetf:
    base_url: "https://www.justetf.com"
  yahoo:
    base_url: "https://query1.finance.yahoo.com"
  cbonds:
    command: "python3"
    args: ["scripts/cbonds_fetch.py"]
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
