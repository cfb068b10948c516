use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use largest_banks::{
    DocumentSource, FileSource, Pipeline, PipelineConfig, ProgressLog, RateSource, RunReport,
};

/// Rank the world's largest banks, convert market caps, persist to CSV + SQLite
#[derive(Debug, Parser)]
#[command(name = "largest-banks", version)]
struct Cli {
    /// TOML config file (flags below override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ranking page URL
    #[arg(long)]
    source_url: Option<String>,

    /// Saved copy of the ranking page (skips the HTTP fetch)
    #[arg(long)]
    source_file: Option<PathBuf>,

    /// Exchange-rate CSV URL
    #[arg(long)]
    rates_url: Option<String>,

    /// Local exchange-rate CSV (Currency,Rate)
    #[arg(long)]
    rates_file: Option<PathBuf>,

    /// CSV snapshot path
    #[arg(long)]
    csv: Option<PathBuf>,

    /// SQLite database path
    #[arg(long)]
    db: Option<PathBuf>,

    /// Table name inside the database
    #[arg(long)]
    table: Option<String>,

    /// Target currencies, comma separated (e.g. GBP,EUR,INR)
    #[arg(long, value_delimiter = ',')]
    currencies: Option<Vec<String>>,

    /// Progress log path
    #[arg(long)]
    log: Option<PathBuf>,

    /// Print query results as JSON
    #[arg(long)]
    json: bool,

    /// Stop after loading; skip the default queries
    #[arg(long)]
    no_queries: bool,
}

impl Cli {
    fn into_config(self) -> Result<(PipelineConfig, bool, bool)> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(url) = self.source_url {
            config.source_url = url;
        }
        if let Some(path) = self.source_file {
            config.source_file = Some(path);
        }
        if let Some(url) = self.rates_url {
            config.rates_url = url;
        }
        if let Some(path) = self.rates_file {
            config.rates_file = Some(path);
        }
        if let Some(path) = self.csv {
            config.csv_path = path;
        }
        if let Some(path) = self.db {
            config.db_path = path;
        }
        if let Some(table) = self.table {
            config.db_table_name = table;
        }
        if let Some(currencies) = self.currencies {
            config.target_currencies = currencies;
        }
        if let Some(path) = self.log {
            config.log_path = path;
        }

        Ok((config, self.json, self.no_queries))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let (config, json, no_queries) = Cli::parse().into_config()?;

    let document = document_source(&config)?;
    let rates = rate_source(&config)?;
    let progress = ProgressLog::new(&config.log_path);

    let mut pipeline = Pipeline::new(config, document.as_ref(), rates.as_ref(), &progress)
        .context("Invalid configuration")?;
    if no_queries {
        pipeline = pipeline.with_queries(Vec::new());
    }

    let report = pipeline.run().context("ETL run failed")?;
    print_report(&report, json)?;

    Ok(())
}

fn document_source(config: &PipelineConfig) -> Result<Box<dyn DocumentSource>> {
    if let Some(path) = &config.source_file {
        return Ok(Box::new(FileSource::new(path)));
    }
    remote_document(config)
}

fn rate_source(config: &PipelineConfig) -> Result<Box<dyn RateSource>> {
    if let Some(path) = &config.rates_file {
        return Ok(Box::new(FileSource::new(path)));
    }
    remote_rates(config)
}

#[cfg(feature = "http")]
fn remote_document(config: &PipelineConfig) -> Result<Box<dyn DocumentSource>> {
    let source = largest_banks::HttpSource::new(&config.source_url, config.fetch_timeout_secs)?;
    Ok(Box::new(source))
}

#[cfg(feature = "http")]
fn remote_rates(config: &PipelineConfig) -> Result<Box<dyn RateSource>> {
    let source = largest_banks::HttpSource::new(&config.rates_url, config.fetch_timeout_secs)?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "http"))]
fn remote_document(_config: &PipelineConfig) -> Result<Box<dyn DocumentSource>> {
    anyhow::bail!("built without the `http` feature: pass --source-file")
}

#[cfg(not(feature = "http"))]
fn remote_rates(_config: &PipelineConfig) -> Result<Box<dyn RateSource>> {
    anyhow::bail!("built without the `http` feature: pass --rates-file")
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for result in &report.results {
        println!("\n> {}", result.statement);
        println!("{}", result);
    }

    println!("\n✓ {} banks written to {}", report.ack.rows, report.ack.csv_path.display());
    println!("✓ {} rows in table {}", report.ack.stored_rows, report.ack.table_name);
    println!("  csv sha256 {}", report.ack.csv_sha256);

    Ok(())
}
