use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::catalog::CatalogClient;
use crate::extract;
use crate::record::{CandidateRecord, ReconciledRecord};
use crate::sites::SiteConfig;

const CONCURRENCY: usize = 8;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

/// Everything a pass needs: compiled site rules, an HTTP client for page
/// markup, and the catalog client. Read-only after construction and shared
/// across passes.
pub struct Engine {
    sites: SiteConfig,
    http: Client,
    catalog: CatalogClient,
}

impl Engine {
    pub fn new(sites: SiteConfig, catalog: CatalogClient) -> Self {
        Self {
            sites,
            http: Client::new(),
            catalog,
        }
    }

    /// One clean pass: fetch, assemble, reconcile. `Ok(None)` means the page
    /// yielded neither structured data nor a configured pattern match.
    pub async fn run_pass(&self, url: &str) -> Result<Option<ReconciledRecord>> {
        let html = self.fetch_page(url).await?;
        Ok(self.reconcile_markup(url, &html).await)
    }

    /// Assemble pre-fetched markup without touching the catalog.
    pub fn assemble(&self, url: &str, html: &str) -> Option<CandidateRecord> {
        extract::assemble(url, html, &self.sites)
    }

    /// Assemble pre-fetched markup and merge the catalog check.
    pub async fn reconcile_markup(&self, url: &str, html: &str) -> Option<ReconciledRecord> {
        let record = self.assemble(url, html)?;
        info!(url, source = %record.source, title = record.title(), "record assembled");
        Some(self.catalog.reconcile(record).await)
    }

    /// Fetch page markup, backing off on throttling and upstream errors.
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        for attempt in 0..=MAX_RETRIES {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .with_context(|| format!("fetching {url}"))?;
            let status = response.status();

            let transient = status.as_u16() == 429 || status.is_server_error();
            if transient && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    url,
                    %status,
                    "transient upstream status (attempt {}/{}), backing off {:.1}s",
                    attempt + 1,
                    MAX_RETRIES,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            anyhow::ensure!(status.is_success(), "{url} answered {status}");
            return Ok(response.text().await?);
        }
        unreachable!("retry loop always returns");
    }
}

/// Batch outcome counts.
pub struct BatchStats {
    pub total: usize,
    pub ok: usize,
    pub empty: usize,
    pub errors: usize,
}

/// Run passes over many URLs with bounded concurrency, streaming each
/// reconciled record to `out` as it completes.
pub async fn run_batch_streaming(
    engine: Arc<Engine>,
    urls: Vec<String>,
    out: mpsc::Sender<ReconciledRecord>,
) -> Result<BatchStats> {
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let total = urls.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = mpsc::channel::<Result<Option<ReconciledRecord>>>(CONCURRENCY * 2);

    for url in urls {
        let engine = Arc::clone(&engine);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let result = engine.run_pass(&url).await;
            if let Err(e) = &result {
                warn!(url, error = %e, "batch pass failed");
            }
            let _ = tx.send(result).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish.
    drop(tx);

    let mut ok = 0usize;
    let mut empty = 0usize;
    let mut errors = 0usize;

    while let Some(outcome) = rx.recv().await {
        match outcome {
            Ok(Some(record)) => {
                ok += 1;
                let _ = out.send(record).await;
            }
            Ok(None) => empty += 1,
            Err(_) => errors += 1,
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(total, ok, empty, errors, "batch complete");

    Ok(BatchStats {
        total,
        ok,
        empty,
        errors,
    })
}
