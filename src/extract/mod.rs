pub mod fields;
pub mod structured;

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::debug;

use crate::record::{CandidateRecord, Source};
use crate::sites::{SiteConfig, SiteRule};

/// LinkedIn renders the posting inside this container; its outer HTML is the
/// snapshot attached to records from that site.
static SNAPSHOT_REGION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".application-outlet").unwrap());

/// Networking-professional host that does not reliably self-report a source
/// in its structured data.
const FORCED_SOURCE_HOST: &str = "linkedin.com";

/// One extraction pass over a page: structured data first, then the
/// configured selector pipelines. Returns None when neither applies.
pub fn assemble(url: &str, html: &str, config: &SiteConfig) -> Option<CandidateRecord> {
    let doc = Html::parse_document(html);

    let mut record = match structured::find_job_posting(&doc) {
        Some(payload) => from_structured(url, payload),
        None => {
            let rule = config.match_url(url)?;
            debug!(pattern = %rule.pattern, "extracting via site rule");
            from_rule(url, &doc, rule)
        }
    };

    // The snapshot is bounded to the one high-value site; other sources never
    // carry page markup.
    if record.source == Source::Linkedin || url.contains(FORCED_SOURCE_HOST) {
        record.html_content = snapshot(&doc);
    }

    Some(record)
}

fn from_structured(url: &str, mut payload: Map<String, Value>) -> CandidateRecord {
    // url, source and the snapshot are stamped by the engine, never trusted
    // from the payload.
    let hint = payload.shift_remove("source");
    payload.shift_remove("url");
    payload.shift_remove("html_content");

    let source = if url.contains(FORCED_SOURCE_HOST) {
        Source::Linkedin
    } else {
        match hint.as_ref().and_then(Value::as_str) {
            Some(hint) => Source::normalize(hint),
            None => Source::normalize(url),
        }
    };

    let mut record = CandidateRecord::new(url, source);
    record.fields = payload;
    record
}

fn from_rule(url: &str, doc: &Html, rule: &SiteRule) -> CandidateRecord {
    let mut record = CandidateRecord::new(url, rule.source);
    for (name, selector) in &rule.fields {
        record
            .fields
            .insert(name.clone(), Value::String(selector.eval(doc)));
    }
    record
}

fn snapshot(doc: &Html) -> Option<String> {
    doc.select(&SNAPSHOT_REGION).next().map(|el| el.html())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{name}.html")).unwrap()
    }

    fn bundled() -> SiteConfig {
        SiteConfig::bundled().unwrap()
    }

    #[test]
    fn linkedin_posting_via_structured_data() {
        let html = fixture("linkedin");
        let url = "https://www.linkedin.com/jobs/view/4012345678";
        let record = assemble(url, &html, &bundled()).unwrap();

        assert_eq!(record.source, Source::Linkedin);
        assert_eq!(record.field("title").and_then(Value::as_str), Some("Backend Engineer"));
        assert!(record.html_content.is_some());
        assert!(record.html_content.unwrap().contains("application-outlet"));
    }

    #[test]
    fn structured_data_beats_site_rules() {
        // A seek URL whose page carries JSON-LD: the payload wins, and the
        // selectors are never consulted.
        let html = fixture("linkedin");
        let record = assemble("https://www.seek.com.au/job/1", &html, &bundled()).unwrap();
        assert_eq!(record.field("title").and_then(Value::as_str), Some("Backend Engineer"));
        // No linkedin URL and no payload hint: the URL feeds the normalizer.
        assert_eq!(record.source, Source::Seek);
        assert!(record.html_content.is_none());
    }

    #[test]
    fn selector_miss_degrades_to_empty_title() {
        let html = r#"<html><body>
            <span data-automation="advertiser-name">Acme Pty Ltd</span>
        </body></html>"#;
        let record = assemble("https://www.seek.com.au/job/86243101", html, &bundled()).unwrap();

        assert_eq!(record.source, Source::Seek);
        assert_eq!(record.field("title").and_then(Value::as_str), Some(""));
        assert_eq!(
            record.field("company").and_then(Value::as_str),
            Some("Acme Pty Ltd")
        );
        assert!(record.html_content.is_none());
    }

    #[test]
    fn unmatched_url_without_structured_data_yields_nothing() {
        let html = "<html><body><h1>Careers</h1></body></html>";
        assert!(assemble("https://example.com/careers/1", html, &bundled()).is_none());
    }

    #[test]
    fn payload_url_and_source_are_not_trusted() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@type":"JobPosting","title":"Engineer","url":"https://spoof.example","source":"seek"}
        </script></head><body></body></html>"#;
        let record = assemble("https://www.linkedin.com/jobs/view/1", html, &bundled()).unwrap();
        // The linkedin URL forces the source over the payload hint, and the
        // page URL wins over the payload's.
        assert_eq!(record.source, Source::Linkedin);
        assert_eq!(record.url, "https://www.linkedin.com/jobs/view/1");
        assert!(record.field("url").is_none());
        assert!(record.field("source").is_none());
    }

    #[test]
    fn payload_source_hint_is_normalized_elsewhere() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@type":"JobPosting","title":"Engineer","source":"Jora AU"}
        </script></head><body></body></html>"#;
        let record = assemble("https://jobs.example.com/1", html, &bundled()).unwrap();
        assert_eq!(record.source, Source::Jora);
    }

    #[test]
    fn pipeline_fields_extract_via_site_rule() {
        let html = fixture("remoteok");
        let record = assemble("https://remoteok.com/remote-jobs/301", &html, &bundled()).unwrap();

        assert_eq!(record.source, Source::Remoteok);
        assert_eq!(
            record.field("title").and_then(Value::as_str),
            Some("Rust Engineer")
        );
        assert_eq!(
            record.field("company").and_then(Value::as_str),
            Some("Ferric Labs")
        );
        // No salary node on the page: defaultString keeps the empty value.
        assert_eq!(record.field("salary").and_then(Value::as_str), Some(""));
        assert!(record.html_content.is_none());
    }

    #[test]
    fn assembly_is_idempotent() {
        let html = fixture("remoteok");
        let config = bundled();
        let url = "https://remoteok.com/remote-jobs/301";

        let first = serde_json::to_value(assemble(url, &html, &config).unwrap()).unwrap();
        let second = serde_json::to_value(assemble(url, &html, &config).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn linkedin_url_forces_snapshot_even_for_rule_records() {
        // No structured data, but the URL is linkedin: any record assembled
        // for it carries the snapshot when the region exists.
        let html = r#"<html><body>
            <div class="application-outlet"><p>apply here</p></div>
        </body></html>"#;
        let config = SiteConfig::from_json(
            r#"{ "scraper": { "linkedin\\.com": { "job": { "title": "h1" } } } }"#,
        )
        .unwrap();
        let record = assemble("https://www.linkedin.com/jobs/view/2", html, &config).unwrap();
        assert_eq!(record.source, Source::Linkedin);
        assert!(record.html_content.unwrap().contains("apply here"));
    }

    #[test]
    fn snapshot_absent_when_region_missing() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@type":"JobPosting","title":"Engineer"}
        </script></head><body></body></html>"#;
        let record = assemble("https://www.linkedin.com/jobs/view/3", html, &bundled()).unwrap();
        assert_eq!(record.source, Source::Linkedin);
        assert!(record.html_content.is_none());
    }
}
