use anyhow::Result;
use chainfolio::cli::holdings::HoldingsOptions;
use chainfolio::core::log::init_logging;
use clap::{Args, CommandFactory, Parser, Subcommand};

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

#[derive(Args)]
struct HoldingsArgs {
    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Hide holdings worth less than this many USD
    #[arg(long, default_value_t = 0.0)]
    min_usd: f64,

    /// Show only the top N topline rows
    #[arg(long)]
    top: Option<usize>,

    /// Always fetch fresh balances
    #[arg(long)]
    no_cache: bool,
}

impl From<HoldingsArgs> for HoldingsOptions {
    fn from(args: HoldingsArgs) -> Self {
        HoldingsOptions {
            json: args.json,
            min_usd: args.min_usd,
            top: args.top,
            no_cache: args.no_cache,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display token holdings across wallets and chains
    Holdings(HoldingsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => chainfolio::cli::setup::setup(),
        Some(Commands::Holdings(args)) => {
            chainfolio::run_command(
                chainfolio::AppCommand::Holdings(args.into()),
                cli.config_path.as_deref(),
            )
            .await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "Application failed");
    }
    result
}
