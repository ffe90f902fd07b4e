use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;

static SELECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^domSelect\("([^"]+)"\)$"#).unwrap());
static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^domGetAttribute\("([^"]+)"\)$"#).unwrap());

/// One step of a selector pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Descend to the first match under the current cursor.
    Select(String),
    /// Read an attribute off the cursor and stop.
    GetAttribute(String),
    /// Read the cursor's trimmed text and stop.
    Text,
    /// Keep whatever value has accumulated (empty otherwise) and stop.
    Default,
}

impl Step {
    fn parse(raw: &str) -> Option<Step> {
        match raw {
            "domText" => Some(Step::Text),
            "defaultString" => Some(Step::Default),
            _ => SELECT_RE
                .captures(raw)
                .map(|c| Step::Select(c[1].to_string()))
                .or_else(|| ATTR_RE.captures(raw).map(|c| Step::GetAttribute(c[1].to_string()))),
        }
    }
}

/// Extraction recipe for a single record field.
#[derive(Debug, Clone)]
pub enum FieldSelector {
    /// Plain CSS query; the first match's trimmed text.
    Query(String),
    /// Ordered steps over a cursor seeded at the document root.
    Pipeline(Vec<Step>),
}

impl FieldSelector {
    /// Build from a site-config value. Unrecognized steps and unsupported
    /// shapes are dropped rather than failing the whole config; the field
    /// then evaluates to the empty string.
    pub fn from_value(value: &Value) -> FieldSelector {
        match value {
            Value::String(css) => FieldSelector::Query(css.clone()),
            Value::Array(steps) => FieldSelector::Pipeline(
                steps
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|raw| {
                        let step = Step::parse(raw);
                        if step.is_none() {
                            debug!(raw, "dropping unrecognized selector step");
                        }
                        step
                    })
                    .collect(),
            ),
            other => {
                debug!(shape = ?other, "dropping unsupported selector shape");
                FieldSelector::Pipeline(Vec::new())
            }
        }
    }

    /// Evaluate against a parsed document. Always yields a string; selector
    /// faults of any kind degrade to the empty string.
    pub fn eval(&self, doc: &Html) -> String {
        match self {
            FieldSelector::Query(css) => query_text(doc.root_element(), css),
            FieldSelector::Pipeline(steps) => eval_pipeline(doc.root_element(), steps),
        }
    }
}

fn query_text(root: ElementRef<'_>, css: &str) -> String {
    let Ok(selector) = Selector::parse(css) else {
        debug!(css, "unparseable field selector");
        return String::new();
    };
    root.select(&selector).next().map(element_text).unwrap_or_default()
}

fn eval_pipeline(root: ElementRef<'_>, steps: &[Step]) -> String {
    let mut cursor = Some(root);
    let mut value = String::new();

    for step in steps {
        match step {
            Step::Select(css) => {
                cursor = Selector::parse(css)
                    .ok()
                    .and_then(|selector| cursor.and_then(|el| el.select(&selector).next()));
            }
            Step::GetAttribute(name) => {
                value = cursor
                    .and_then(|el| el.value().attr(name))
                    .unwrap_or_default()
                    .to_string();
                break;
            }
            Step::Text => {
                value = cursor.map(element_text).unwrap_or_default();
                break;
            }
            Step::Default => break,
        }
    }

    value
}

/// Trimmed text content of an element, descendants included.
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
