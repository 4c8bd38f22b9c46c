//! Batch fraud scoring binary

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use fraud_engine::{batch, load_config, BatchReport, Config, ConfigOverrides};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Score a CSV of transactions for fraud risk", long_about = None)]
struct Cli {
    /// Transactions CSV to score
    #[arg(long, default_value = "transactions_examples.csv")]
    input: PathBuf,

    /// Where to write the scored CSV
    #[arg(long, default_value = "decisions.csv")]
    output: PathBuf,

    /// TOML rule configuration replacing the built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rows to print after scoring
    #[arg(long, default_value_t = 10)]
    preview: usize,

    /// Print preview rows as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    let config = load_config(base, ConfigOverrides::from_env());
    tracing::info!(
        "Decision thresholds: review_at={} reject_at={}",
        config.score_to_decision.review_at,
        config.score_to_decision.reject_at
    );

    let report = batch::run(&cli.input, &cli.output, &config).with_context(|| {
        format!(
            "Failed to score {} into {}",
            cli.input.display(),
            cli.output.display()
        )
    })?;

    print_preview(&report, cli.preview, cli.json)?;
    println!("{}", report.summary());

    Ok(())
}

fn print_preview(report: &BatchReport, limit: usize, json: bool) -> Result<()> {
    for (index, row) in report.rows.iter().take(limit).enumerate() {
        if json {
            println!("{}", serde_json::to_string(&row.assessment)?);
        } else {
            println!(
                "{:>4}  {:<10} {:>4}  {}",
                index + 1,
                row.assessment.decision,
                row.assessment.risk_score,
                row.assessment.reasons_joined()
            );
        }
    }

    if report.len() > limit {
        println!("... {} more rows", report.len() - limit);
    }

    Ok(())
}
