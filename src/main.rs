//! Supertrend trader - main entry point
//!
//! This binary provides two subcommands:
//! - live: Run the paper-trading loop against Binance futures market data
//! - backtest: Replay a CSV bar history through the same controller

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "supertrend-trader")]
#[command(about = "Supertrend trend follower with live paper trading and CSV replay", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the live paper-trading loop
    Live {
        /// Path to configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Symbol (overrides config file), e.g. ETHUSDT
        #[arg(short, long)]
        symbol: Option<String>,
    },

    /// Replay a CSV bar history
    Backtest {
        /// Path to configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// CSV file with datetime,open,high,low,close[,volume] rows
        #[arg(short, long)]
        data: String,

        /// Supertrend ATR period (overrides config file)
        #[arg(long)]
        period: Option<usize>,

        /// Supertrend band multiplier (overrides config file)
        #[arg(long)]
        multiplier: Option<f64>,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // keep HTTP and websocket internals quiet
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn,tungstenite=warn,tokio_tungstenite=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Live { .. } => "live",
        Commands::Backtest { .. } => "backtest",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Live { config, symbol } => commands::live::run(config, symbol),

        Commands::Backtest {
            config,
            data,
            period,
            multiplier,
        } => commands::backtest::run(config, data, period, multiplier),
    }
}
