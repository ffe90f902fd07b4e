use anyhow::Result;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::record::{CandidateRecord, CheckUrl, ReconciledRecord};

const CHECK_PATH: &str = "/jobs/check-url";

/// Client for the remote job catalog.
pub struct CatalogClient {
    http: Client,
    base: String,
}

impl CatalogClient {
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            http: Client::new(),
            base,
        }
    }

    /// Merge a candidate with its catalog check. A failed check degrades to
    /// `exists=false`; the record is always delivered.
    pub async fn reconcile(&self, record: CandidateRecord) -> ReconciledRecord {
        match self.check_url(&record.url).await {
            Ok(check) => ReconciledRecord::merged(record, check),
            Err(e) => {
                warn!(error = %e, "existence check failed, delivering unchecked record");
                ReconciledRecord::unchecked(record)
            }
        }
    }

    /// Ask the catalog whether a URL is already tracked.
    ///
    /// The check-url contract changed across server generations, so three
    /// request shapes are tried in order; the first 2xx answer wins.
    /// Transport errors and rejection statuses both advance the chain.
    pub async fn check_url(&self, raw: &str) -> Result<CheckUrl> {
        let url = coerce_https(raw);
        let endpoint = format!("{}{}", self.base, CHECK_PATH);

        let result = self
            .http
            .get(&endpoint)
            .query(&[("url", url.as_str())])
            .send()
            .await;
        if let Some(response) = accepted(result, "url param") {
            return Ok(response.json().await?);
        }

        let result = self
            .http
            .get(&endpoint)
            .query(&[("job_url", url.as_str())])
            .send()
            .await;
        if let Some(response) = accepted(result, "job_url param") {
            return Ok(response.json().await?);
        }

        let result = self
            .http
            .post(&endpoint)
            .json(&json!({ "url": url }))
            .send()
            .await;
        match accepted(result, "json body") {
            Some(response) => Ok(response.json().await?),
            None => anyhow::bail!("every check-url request shape failed for {url}"),
        }
    }
}

fn accepted(result: reqwest::Result<reqwest::Response>, shape: &str) -> Option<reqwest::Response> {
    match result {
        Ok(response) if response.status().is_success() => Some(response),
        Ok(response) => {
            debug!(shape, status = %response.status(), "check-url shape rejected");
            None
        }
        Err(e) => {
            debug!(shape, error = %e, "check-url transport failure");
            None
        }
    }
}

/// Best-effort repair: a URL that fails to parse and carries no scheme gets a
/// secure one prefixed. The string is sent regardless of whether the repair
/// made it well-formed.
fn coerce_https(raw: &str) -> String {
    if Url::parse(raw).is_ok()
        || raw.starts_with("http://")
        || raw.starts_with("https://")
    {
        raw.to_string()
    } else {
        format!("https://{raw}")
    }
}
