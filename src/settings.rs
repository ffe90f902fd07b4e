use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

/// Runtime settings, environment-overridable with the HARVEST_ prefix
/// (e.g. HARVEST_CATALOG_URL, HARVEST_SETTLE_MS, HARVEST_SITES_PATH).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Base URL of the job catalog service.
    pub catalog_url: String,
    /// How long to let a view render after navigation before sampling.
    pub settle_ms: u64,
    /// Optional site-config document replacing the bundled one.
    pub sites_path: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings: Settings = config::Config::builder()
            .set_default("catalog_url", "http://localhost:8000")?
            .set_default("settle_ms", 500_u64)?
            .add_source(config::Environment::with_prefix("HARVEST").try_parsing(true))
            .build()?
            .try_deserialize()?;
        debug!(?settings, "settings loaded");
        Ok(settings)
    }
}
