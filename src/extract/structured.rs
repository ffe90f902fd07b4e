use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::debug;

static LD_JSON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

/// Scan every linked-data block for a JobPosting payload.
///
/// Blocks that fail to parse are skipped. A block qualifies when its `@type`
/// is exactly `"JobPosting"`; the last qualifying block wins.
pub fn find_job_posting(doc: &Html) -> Option<Map<String, Value>> {
    let mut posting = None;

    for script in doc.select(&LD_JSON) {
        let raw = script.text().collect::<String>();
        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "skipping malformed linked-data block");
                continue;
            }
        };
        if let Value::Object(map) = parsed {
            if map.get("@type").and_then(Value::as_str) == Some("JobPosting") {
                posting = Some(map);
            }
        }
    }

    posting
}
