//! Breakout trader - main entry point
//!
//! This binary provides three subcommands:
//! - backtest: Run the breakout strategy over historical candles
//! - optimize: Search for the best strategy parameters
//! - download: Fetch historical candles and save them to CSV

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "breakout-trader")]
#[command(about = "Range-breakout backtesting and parameter search for Bitfinex candle data", long_about = None)]
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
    /// Run the strategy backtest
    Backtest {
        /// Path to configuration file (built-in defaults when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Load candles from a CSV file instead of the exchange API
        #[arg(long)]
        csv: Option<String>,

        /// Initial capital
        #[arg(long)]
        capital: Option<f64>,

        /// Buy-trigger multiplier
        #[arg(long)]
        k1: Option<f64>,

        /// Sell-trigger multiplier
        #[arg(long)]
        k2: Option<f64>,

        /// Trailing window length
        #[arg(long)]
        window: Option<usize>,
    },

    /// Search for the best strategy parameters
    Optimize {
        /// Path to configuration file (built-in defaults when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Load candles from a CSV file instead of the exchange API
        #[arg(long)]
        csv: Option<String>,

        /// Evaluation budget for the search
        #[arg(long)]
        evals: Option<usize>,

        /// Seed for a reproducible search
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Download historical candles to CSV
    Download {
        /// Path to configuration file (built-in defaults when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Output CSV path (defaults to data/{symbol}_{timeframe}.csv)
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    // File appender
    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // For optimizer: only log to file, keep console clean for progress bar
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        // File layer - same format but without ANSI colors
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
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine command name and whether to use file-only logging
    let (command_name, file_only) = match &cli.command {
        Commands::Backtest { .. } => ("backtest", false),
        Commands::Optimize { .. } => ("optimize", true), // File-only for clean progress bar
        Commands::Download { .. } => ("download", false),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Backtest {
            config,
            csv,
            capital,
            k1,
            k2,
            window,
        } => commands::backtest::run(config, csv, capital, k1, k2, window),

        Commands::Optimize {
            config,
            csv,
            evals,
            seed,
        } => commands::optimize::run(config, csv, evals, seed),

        Commands::Download { config, output } => commands::download::run(config, output),
    }
}
