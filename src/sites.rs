use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::extract::fields::FieldSelector;
use crate::record::Source;

/// Site configuration shipped with the engine.
const BUNDLED: &str = include_str!("../config/sites.json");

/// A configuration-load fault is fatal to the pass and surfaced distinctly;
/// it is never silently turned into an empty record.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unreadable site config {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed site config")]
    Parse(#[from] serde_json::Error),
    #[error("invalid URL pattern `{pattern}`")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Extraction rule for one site: URL pattern plus its field selectors, kept
/// in declaration order.
#[derive(Debug)]
pub struct SiteRule {
    pub pattern: String,
    regex: Regex,
    /// Canonical source derived from the pattern string.
    pub source: Source,
    pub fields: Vec<(String, FieldSelector)>,
}

/// Ordered site rules. Order is semantically significant: the first declared
/// pattern matching a URL wins.
#[derive(Debug)]
pub struct SiteConfig {
    rules: Vec<SiteRule>,
}

#[derive(Deserialize)]
struct RawConfig {
    scraper: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawSite {
    job: Map<String, Value>,
}

impl SiteConfig {
    /// Compile the bundled configuration.
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_json(BUNDLED)
    }

    /// Compile a configuration document from disk (settings override).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        let mut rules = Vec::with_capacity(raw.scraper.len());

        for (pattern, value) in raw.scraper {
            let site: RawSite = serde_json::from_value(value)?;
            let regex = Regex::new(&pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            let fields = site
                .job
                .iter()
                .map(|(name, selector)| (name.clone(), FieldSelector::from_value(selector)))
                .collect();
            rules.push(SiteRule {
                source: Source::normalize(&pattern),
                pattern,
                regex,
                fields,
            });
        }

        let config = Self { rules };
        if config.is_empty() {
            warn!("site config has no rules; only structured data extraction will apply");
        } else {
            info!(sites = config.rules.len(), "site config compiled");
        }
        Ok(config)
    }

    /// First declared pattern matching the URL wins; no match means only
    /// structured-data extraction applies to the page.
    pub fn match_url(&self, url: &str) -> Option<&SiteRule> {
        self.rules.iter().find(|rule| rule.regex.is_match(url))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
