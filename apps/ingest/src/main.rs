mod config;
mod db;
mod errors;
mod fetcher;
mod ingestor;
mod models;
mod pipeline;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::Config;
use crate::db::create_pool;
use crate::fetcher::{page_count, HttpListingSource, ListingSource};
use crate::pipeline::{Pipeline, RunMode, RunReport};
use crate::store::PgListingStore;

#[derive(Parser, Debug)]
#[command(
    name = "listings-ingest",
    version,
    about = "Ingest contractor job listings into PostgreSQL"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a single page (default: page 1)
    Page {
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
        /// Listings per page (overrides PAGE_SIZE)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        page_size: Option<u32>,
    },
    /// Count the catalog and ingest every page
    All {
        /// Listings per page (overrides PAGE_SIZE)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        page_size: Option<u32>,
    },
    /// Print the catalog size and page count without touching the database
    Count {
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        page_size: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration before logging so RUST_LOG from .env applies
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting listings-ingest v{}", env!("CARGO_PKG_VERSION"));

    let source = HttpListingSource::new(&config.api_base_url, config.http_timeout)?;

    let mode = match cli.command {
        None => RunMode::SinglePage {
            page: 1,
            page_size: config.page_size,
        },
        Some(Command::Page { page, page_size }) => RunMode::SinglePage {
            page,
            page_size: page_size.unwrap_or(config.page_size),
        },
        Some(Command::All { page_size }) => RunMode::AllPages {
            page_size: page_size.unwrap_or(config.page_size),
        },
        Some(Command::Count { page_size }) => {
            let page_size = page_size.unwrap_or(config.page_size);
            let total = source.total_count().await?;
            println!(
                "{total} listings, {} pages of {page_size}",
                page_count(total, page_size)
            );
            return Ok(());
        }
    };

    let pool = create_pool(config.require_database_url()?, config.db_acquire_timeout).await?;
    let store = PgListingStore::new(pool.clone(), config.write_strategy);

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("ingest_run", %run_id);
    let outcome = async {
        info!(?mode, strategy = ?config.write_strategy, "Run started");
        Pipeline::new(&source, store).run(mode).await
    }
    .instrument(span)
    .await;

    pool.close().await;

    match outcome {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(abort) => {
            print_report(&abort.report);
            Err(abort.into())
        }
    }
}

fn print_report(report: &RunReport) {
    for batch in &report.batches {
        println!(
            "page {}: {} inserted, {} skipped, {} failed",
            batch.page, batch.inserted, batch.skipped, batch.failed
        );
    }
    println!(
        "{} pages: {} inserted, {} skipped, {} failed",
        report.batches.len(),
        report.inserted(),
        report.skipped(),
        report.failed()
    );
}
