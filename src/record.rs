use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical source tokens accepted by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Seek,
    Linkedin,
    Jora,
    Remoteok,
    Cryptojobslist,
    Upwork,
    Angellist,
    Extension,
}

/// Containment is tested in this order; first hit wins.
const SOURCE_TOKENS: &[(&str, Source)] = &[
    ("seek", Source::Seek),
    ("linkedin", Source::Linkedin),
    ("jora", Source::Jora),
    ("remoteok", Source::Remoteok),
    ("cryptojobslist", Source::Cryptojobslist),
    ("upwork", Source::Upwork),
    ("angellist", Source::Angellist),
];

impl Source {
    /// Map a raw token (URL pattern, page URL, payload hint) to a canonical
    /// source. Case-insensitive substring containment; anything unmatched is
    /// `extension`.
    pub fn normalize(raw: &str) -> Source {
        let lower = raw.to_lowercase();
        SOURCE_TOKENS
            .iter()
            .find(|(needle, _)| lower.contains(needle))
            .map(|(_, source)| *source)
            .unwrap_or(Source::Extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Seek => "seek",
            Source::Linkedin => "linkedin",
            Source::Jora => "jora",
            Source::Remoteok => "remoteok",
            Source::Cryptojobslist => "cryptojobslist",
            Source::Upwork => "upwork",
            Source::Angellist => "angellist",
            Source::Extension => "extension",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one extraction pass over a page. Built fresh every pass and
/// never mutated after handoff; reconciliation wraps it instead.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateRecord {
    pub url: String,
    pub source: Source,
    /// Field values in extraction order. Selector-derived fields are always
    /// strings; structured-data payloads keep their original JSON values.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Raw-markup snapshot of the application region, attached only for
    /// LinkedIn records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
}

impl CandidateRecord {
    pub fn new(url: impl Into<String>, source: Source) -> Self {
        Self {
            url: url.into(),
            source,
            fields: Map::new(),
            html_content: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Convenience for log lines.
    pub fn title(&self) -> &str {
        self.field("title").and_then(Value::as_str).unwrap_or("")
    }
}

/// Body shape shared by all three check-url request variants.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckUrl {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub job: Option<Value>,
    #[serde(default)]
    pub application: Option<Value>,
}

/// A candidate merged with its catalog check.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciledRecord {
    #[serde(flatten)]
    pub record: CandidateRecord,
    pub exists: bool,
    #[serde(rename = "existingJob", skip_serializing_if = "Option::is_none")]
    pub existing_job: Option<Value>,
    #[serde(rename = "existingApplication", skip_serializing_if = "Option::is_none")]
    pub existing_application: Option<Value>,
}

impl ReconciledRecord {
    pub fn merged(record: CandidateRecord, check: CheckUrl) -> Self {
        Self {
            record,
            exists: check.exists,
            existing_job: check.job,
            existing_application: check.application,
        }
    }

    /// Degraded continuation when every check-url shape failed. The record is
    /// still delivered.
    pub fn unchecked(record: CandidateRecord) -> Self {
        Self {
            record,
            exists: false,
            existing_job: None,
            existing_application: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_known_tokens() {
        assert_eq!(Source::normalize("https://www.seek.com.au/job/123"), Source::Seek);
        assert_eq!(Source::normalize("jora\\.com"), Source::Jora);
        assert_eq!(Source::normalize("remoteok.com/remote-jobs/1"), Source::Remoteok);
        assert_eq!(Source::normalize("cryptojobslist"), Source::Cryptojobslist);
        assert_eq!(Source::normalize("upwork.com"), Source::Upwork);
        assert_eq!(Source::normalize("angellist"), Source::Angellist);
    }

    #[test]
    fn normalize_is_case_insensitive() {
        assert_eq!(Source::normalize("LinkedIn"), Source::Linkedin);
        assert_eq!(Source::normalize("https://WWW.LINKEDIN.COM/jobs/view/42"), Source::Linkedin);
        assert_eq!(Source::normalize("something-LiNkEdIn-something"), Source::Linkedin);
    }

    #[test]
    fn normalize_unmatched_defaults_to_extension() {
        assert_eq!(Source::normalize(""), Source::Extension);
        assert_eq!(Source::normalize("example.com"), Source::Extension);
        assert_eq!(Source::normalize("greenhouse.io"), Source::Extension);
    }

    #[test]
    fn normalize_priority_order_on_multiple_hits() {
        // "seek" is tested before "linkedin".
        assert_eq!(Source::normalize("seek-via-linkedin"), Source::Seek);
        assert_eq!(Source::normalize("linkedin-jora"), Source::Linkedin);
    }

    #[test]
    fn record_serializes_flat() {
        let mut record = CandidateRecord::new("https://example.com/job/1", Source::Extension);
        record
            .fields
            .insert("title".into(), Value::String("Backend Engineer".into()));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["url"], "https://example.com/job/1");
        assert_eq!(json["source"], "extension");
        assert_eq!(json["title"], "Backend Engineer");
        assert!(json.get("html_content").is_none());
    }

    #[test]
    fn reconciled_keeps_wire_names() {
        let record = CandidateRecord::new("https://example.com/job/1", Source::Seek);
        let check = CheckUrl {
            exists: true,
            job: Some(serde_json::json!({ "id": 7 })),
            application: None,
        };
        let json = serde_json::to_value(ReconciledRecord::merged(record, check)).unwrap();
        assert_eq!(json["exists"], true);
        assert_eq!(json["existingJob"]["id"], 7);
        assert!(json.get("existingApplication").is_none());
    }
}
