use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxsync::core::log::init_logging;

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

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show exchange rates for a base currency
    Rates {
        /// Base currency code, defaults to the configured one
        base: Option<String>,
        /// Only show currencies whose code contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Show the recent trend of a currency against USD
    Trend {
        base: String,
        /// Number of past days to include
        #[arg(short, long, default_value_t = 14)]
        days: u32,
    },
    /// Convert an amount between two currencies
    Convert {
        from: String,
        to: String,
        amount: f64,
    },
    /// List known currencies
    Currencies {
        /// Re-fetch the list instead of using the cached one
        #[arg(short, long)]
        refresh: bool,
    },
    /// Refresh all cached rates once
    Refresh,
    /// Keep cached rates fresh until interrupted
    Watch,
}

impl From<Commands> for fxsync::AppCommand {
    fn from(cmd: Commands) -> fxsync::AppCommand {
        match cmd {
            Commands::Rates { base, filter } => fxsync::AppCommand::Rates { base, filter },
            Commands::Trend { base, days } => fxsync::AppCommand::Trend { base, days },
            Commands::Convert { from, to, amount } => {
                fxsync::AppCommand::Convert { from, to, amount }
            }
            Commands::Currencies { refresh } => fxsync::AppCommand::Currencies { refresh },
            Commands::Refresh => fxsync::AppCommand::Refresh,
            Commands::Watch => fxsync::AppCommand::Watch,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => fxsync::cli::setup::setup(),
        Some(cmd) => fxsync::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
