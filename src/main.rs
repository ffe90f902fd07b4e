mod catalog;
mod engine;
mod extract;
mod record;
mod settings;
mod sites;
mod watch;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use catalog::CatalogClient;
use engine::Engine;
use settings::Settings;
use sites::SiteConfig;
use watch::{WatchEvent, Watcher};

#[derive(Parser)]
#[command(name = "job_harvest", about = "Job posting extraction + catalog reconciliation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one page and print the reconciled record as JSON
    Extract {
        url: String,
        /// Read markup from a file instead of fetching the URL
        #[arg(long)]
        html_file: Option<String>,
        /// Skip the catalog existence check
        #[arg(long)]
        no_check: bool,
    },
    /// Run passes over a file of URLs (one per line), printing JSON Lines
    Batch {
        file: String,
        /// Max URLs to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Seed a pass for URL, then follow navigation events from stdin
    /// (one URL per line; a blank line forces an immediate re-extract)
    Watch { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let settings = Settings::load()?;
    let sites = match settings.sites_path.as_deref() {
        Some(path) => SiteConfig::load(path)?,
        None => SiteConfig::bundled()?,
    };
    let engine = Arc::new(Engine::new(sites, CatalogClient::new(&settings.catalog_url)));

    match cli.command {
        Commands::Extract {
            url,
            html_file,
            no_check,
        } => {
            let html = match html_file {
                Some(path) => std::fs::read_to_string(path)?,
                None => engine.fetch_page(&url).await?,
            };
            if no_check {
                match engine.assemble(&url, &html) {
                    Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                    None => eprintln!("No job data found at {url}"),
                }
            } else {
                match engine.reconcile_markup(&url, &html).await {
                    Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                    None => eprintln!("No job data found at {url}"),
                }
            }
        }
        Commands::Batch { file, limit } => {
            let mut urls: Vec<String> = std::fs::read_to_string(&file)?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(String::from)
                .collect();
            if let Some(n) = limit {
                urls.truncate(n);
            }
            if urls.is_empty() {
                eprintln!("No URLs in {file}.");
                return Ok(());
            }

            eprintln!("Checking {} URLs...", urls.len());
            let (tx, mut rx) = mpsc::channel(16);
            let stats = tokio::spawn(engine::run_batch_streaming(Arc::clone(&engine), urls, tx));
            while let Some(record) = rx.recv().await {
                println!("{}", serde_json::to_string(&record)?);
            }
            let stats = stats.await??;
            eprintln!(
                "Done: {} checked ({} records, {} empty, {} errors).",
                stats.total, stats.ok, stats.empty, stats.errors
            );
        }
        Commands::Watch { url } => {
            let (events_tx, events_rx) = mpsc::channel(16);
            let (records_tx, mut records_rx) = mpsc::channel(16);
            let watcher = Watcher::new(Duration::from_millis(settings.settle_ms));

            tokio::spawn(watch::run(
                watcher,
                url,
                events_rx,
                Arc::clone(&engine),
                records_tx,
            ));

            // stdin is the navigation backend: each line is the current
            // location, a blank line is the host's extract-now signal.
            tokio::spawn(async move {
                let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim().to_string();
                    let event = if line.is_empty() {
                        WatchEvent::Extract
                    } else {
                        WatchEvent::Navigated(line)
                    };
                    if events_tx.send(event).await.is_err() {
                        break;
                    }
                }
            });

            while let Some(record) = records_rx.recv().await {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    Ok(())
}
