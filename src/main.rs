mod app;
mod config;
mod data;
mod error;
mod portfolio;
mod results;
mod stats;
mod tui;
mod ui;

use anyhow::{anyhow, Result};
use app::App;
use clap::Parser;
use config::SimulationConfig;
use data::PriceTable;
use portfolio::EstimationModel;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Markowitz MC: Monte Carlo sampling of random long-only portfolios",
    after_help = "EXAMPLES:
    # Sample 1000 portfolios from a CSV of daily prices (first column = date)
    cargo run --release -- --csv prices.csv

    # Download prices and save the cloud
    cargo run --release -- --symbols NVDA,MSFT,AAPL --output cloud.csv

    # Explore a synthetic universe in the terminal
    cargo run --release -- --demo --tui"
)]
struct Args {
    /// CSV of prices: a date column followed by one column per asset
    #[arg(long, conflicts_with_all = ["symbols", "demo"])]
    csv: Option<PathBuf>,

    /// Comma-separated symbols to download (e.g., NVDA,MSFT,AAPL)
    #[arg(long, conflicts_with = "demo")]
    symbols: Option<String>,

    /// History range to download with --symbols (e.g., 1y, 5y, max)
    #[arg(long, default_value = config::DATA_RANGE)]
    range: String,

    /// Use a synthetic random-walk universe instead of real prices
    #[arg(long)]
    demo: bool,

    /// Number of portfolios to sample (default: 1000, or MARKOWITZ_SAMPLES)
    #[arg(long)]
    samples: Option<usize>,

    /// Generator seed (default: 75, or MARKOWITZ_SEED)
    #[arg(long)]
    seed: Option<u64>,

    /// Return/variance estimation model (default: literal, or MARKOWITZ_MODEL)
    #[arg(long, value_enum)]
    model: Option<EstimationModel>,

    /// Write the Return/Variance table to this path (.csv or .json)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Show the sampled cloud in an interactive terminal chart
    #[arg(long)]
    tui: bool,
}

impl Args {
    fn simulation_config(&self) -> SimulationConfig {
        let mut cfg = SimulationConfig::from_env();
        if let Some(samples) = self.samples {
            cfg.sample_count = samples;
        }
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
        if let Some(model) = self.model {
            cfg.model = model;
        }
        cfg
    }
}

async fn load_prices(args: &Args) -> Result<PriceTable> {
    if let Some(path) = &args.csv {
        return PriceTable::from_csv(path);
    }

    if let Some(symbols_str) = &args.symbols {
        let symbols: Vec<String> = symbols_str
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            return Err(anyhow!("--symbols needs at least one symbol. Example: --symbols NVDA,MSFT,AAPL"));
        }
        return data::fetch_price_table(&symbols, &args.range).await;
    }

    if args.demo {
        info!("Using synthetic demo universe");
        return Ok(PriceTable::new_mock(&["ALFA", "BRVO", "CHRL", "DLTA"], 3 * 365, config::DEFAULT_SEED));
    }

    Err(anyhow!("No input given. Use --csv <path>, --symbols A,B,C or --demo"))
}

async fn run(args: Args) -> Result<()> {
    let cfg = args.simulation_config();
    let prices = load_prices(&args).await?;

    let returns = stats::annualized_returns(&prices)?;
    let covariance = stats::covariance_matrix(&prices)?;
    let universe = prices.assets.clone();

    let table = portfolio::run_simulation(&universe, &returns, &covariance, &cfg)?;
    info!("Simulation produced {} samples", table.len());

    if let Some(path) = &args.output {
        table.write_to(path)?;
    }

    if args.tui {
        let mut terminal = tui::init()?;
        let mut app = App::new(&table, &universe);
        let res = app.run(&mut terminal);
        tui::restore()?;
        res?;
    } else {
        results::print_summary(&table, &universe);
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    config::init_cpu_parallelism();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("markowitz_mc=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Run failed: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_override_config() {
        let args = Args::parse_from([
            "markowitz-mc",
            "--demo",
            "--samples",
            "42",
            "--seed",
            "7",
            "--model",
            "textbook",
        ]);
        let cfg = args.simulation_config();
        assert_eq!(cfg.sample_count, 42);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.model, EstimationModel::Textbook);
    }

    #[test]
    fn test_cli_rejects_conflicting_inputs() {
        let res = Args::try_parse_from(["markowitz-mc", "--csv", "p.csv", "--demo"]);
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_demo_pipeline_end_to_end() {
        let args = Args::parse_from(["markowitz-mc", "--demo", "--samples", "25"]);
        let cfg = args.simulation_config();
        let prices = load_prices(&args).await.unwrap();
        let returns = stats::annualized_returns(&prices).unwrap();
        let covariance = stats::covariance_matrix(&prices).unwrap();

        let table = portfolio::run_simulation(&prices.assets, &returns, &covariance, &cfg).unwrap();
        assert_eq!(table.len(), 25);
        assert!(table.variances().iter().all(|v| *v >= 0.0));
    }

    #[tokio::test]
    async fn test_missing_input_is_an_error() {
        let args = Args::parse_from(["markowitz-mc"]);
        assert!(load_prices(&args).await.is_err());
    }
}
