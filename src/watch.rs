use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::record::ReconciledRecord;

/// Inbound trigger for the extraction pipeline. Navigation backends (routing
/// events, location polling, stdin) all reduce to this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The page location changed.
    Navigated(String),
    /// Host-issued "extract now": re-run on the current location immediately.
    Extract,
}

/// A scheduled extraction pass. Its generation decides whether the result is
/// still wanted once the pass completes.
#[derive(Debug, Clone)]
pub struct Pass {
    pub url: String,
    pub generation: u64,
    pub delay: Duration,
}

/// Tracks the current location and the pass generation.
///
/// Every accepted trigger bumps the generation, so a newer trigger
/// invalidates all in-flight passes: last triggered wins, deterministically.
/// Passes are never cancelled mid-flight; stale ones are discarded at
/// completion instead of forwarded.
pub struct Watcher {
    last_known_url: Option<String>,
    generation: Arc<AtomicU64>,
    settle: Duration,
}

impl Watcher {
    pub fn new(settle: Duration) -> Self {
        Self {
            last_known_url: None,
            generation: Arc::new(AtomicU64::new(0)),
            settle,
        }
    }

    /// Seed the initial location. The document is assumed already rendered at
    /// load, so the first pass runs without a settle delay.
    pub fn seed(&mut self, url: impl Into<String>) -> Pass {
        let url = url.into();
        self.last_known_url = Some(url.clone());
        Pass {
            url,
            generation: self.bump(),
            delay: Duration::ZERO,
        }
    }

    /// Decide whether an event schedules a pass. Navigations to the current
    /// URL are ignored; changed ones wait out the settle delay so the new
    /// view can render before sampling.
    pub fn observe(&mut self, event: WatchEvent) -> Option<Pass> {
        match event {
            WatchEvent::Navigated(url) => {
                if self.last_known_url.as_deref() == Some(url.as_str()) {
                    return None;
                }
                self.last_known_url = Some(url.clone());
                Some(Pass {
                    url,
                    generation: self.bump(),
                    delay: self.settle,
                })
            }
            WatchEvent::Extract => {
                let url = self.last_known_url.clone()?;
                Some(Pass {
                    url,
                    generation: self.bump(),
                    delay: Duration::ZERO,
                })
            }
        }
    }

    /// Shared handle for pass tasks to re-check currency at completion.
    pub fn generation_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.generation)
    }

    fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Drive the pipeline from a stream of watch events.
///
/// Each accepted trigger runs a full clean rebuild; overlapping passes run to
/// completion independently, and only the currently-newest one is forwarded.
pub async fn run(
    mut watcher: Watcher,
    initial_url: String,
    mut events: mpsc::Receiver<WatchEvent>,
    engine: Arc<Engine>,
    out: mpsc::Sender<ReconciledRecord>,
) {
    spawn_pass(watcher.seed(initial_url), &watcher, &engine, &out);

    while let Some(event) = events.recv().await {
        if let Some(pass) = watcher.observe(event) {
            spawn_pass(pass, &watcher, &engine, &out);
        }
    }
}

fn spawn_pass(
    pass: Pass,
    watcher: &Watcher,
    engine: &Arc<Engine>,
    out: &mpsc::Sender<ReconciledRecord>,
) {
    let generation = watcher.generation_handle();
    let engine = Arc::clone(engine);
    let out = out.clone();

    tokio::spawn(async move {
        if !pass.delay.is_zero() {
            tokio::time::sleep(pass.delay).await;
        }

        let record = match engine.run_pass(&pass.url).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(url = %pass.url, "pass produced no record");
                return;
            }
            Err(e) => {
                warn!(url = %pass.url, error = %e, "pass failed");
                return;
            }
        };

        if generation.load(Ordering::SeqCst) != pass.generation {
            debug!(url = %pass.url, generation = pass.generation, "discarding stale pass");
            return;
        }
        let _ = out.send(record).await;
    });
}
