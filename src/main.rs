mod config;
mod loader;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::pipeline::{Pipeline, missing_label_policy};
use crate::scraper::FundamentusScraper;

#[derive(Parser)]
#[command(name = "fundamentus-etl", about = "Fundamentals snapshot scraper for B3 tickers", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape every ticker and export one CSV row per ticker
    Run {
        /// Ticker list with a `Ticker` column (default: output.tickers_file)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Scrape these tickers instead of reading the list file
        #[arg(short, long = "ticker")]
        tickers: Vec<String>,

        /// Output CSV (default: data/output_YYYYmmdd.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Scrape a single ticker and print its cleaned fields
    Show {
        ticker: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    storage::create_dirs(&[config.output.data_dir.as_path(), config.output.logs_dir.as_path()])?;
    let log_path = init_logging(&config.output.logs_dir, cli.verbose)?;
    info!("Logging to {:?}", log_path);

    match cli.command {
        Command::Run { input, tickers, output } => {
            let _t = utils::Timer::start("Scrape run");

            let tickers = if tickers.is_empty() {
                let path = input.unwrap_or_else(|| config.output.tickers_file.clone());
                loader::load_tickers(&path, &config.output.ticker_column)?
            } else {
                tickers
            };

            let pipeline = Pipeline::new(&config)?;
            let (table, stats) = pipeline.run(tickers).collect().await;
            info!(
                "Done: {} requested, {} scraped, {} errors",
                stats.tickers_requested, stats.tickers_scraped, stats.errors
            );

            let output = output
                .unwrap_or_else(|| utils::output_file_path(&config.output.data_dir, Local::now()));
            if table.is_empty() {
                warn!("No ticker was scraped; {:?} will be empty", output);
            }
            storage::export_csv(&table, &output)?;

            println!("{}", table);
        }

        Command::Show { ticker } => {
            let scraper = FundamentusScraper::new(&config.scraper)?;
            let record = pipeline::process(&scraper, &ticker, missing_label_policy(&config.pipeline))
                .await
                .with_context(|| format!("Failed to scrape {}", ticker))?;

            let width = record.columns().map(|c| c.chars().count()).max().unwrap_or(0);
            println!("{} ({} fields)", record.ticker, record.len());
            for (label, value) in &record.fields {
                println!("  {:<width$} : {}", label, value);
            }
        }
    }

    Ok(())
}

/// File layer gets everything the filter allows; stderr only warnings unless `-v`.
fn init_logging(logs_dir: &Path, verbose: u8) -> Result<PathBuf> {
    let filter = match verbose {
        0 => "fundamentus_etl=info,warn",
        1 => "fundamentus_etl=debug,info",
        _ => "trace",
    };
    let stderr_level = if verbose == 0 { LevelFilter::WARN } else { LevelFilter::TRACE };

    let path = utils::log_file_path(logs_dir, Local::now());
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create log file {:?}", path))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(stderr_level),
        )
        .init();

    Ok(path)
}
