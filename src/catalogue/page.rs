//! Recovery of JSON payloads from rendered browser pages
//!
//! A browser asked for an API URL does not hand back the raw body: the JSON
//! ends up inside the rendered HTML (a `<pre>` block, or a hidden `<div>` on
//! catalogues that wrap their responses). The payload is recovered in order:
//! 1. the whole page parsed as JSON
//! 2. the decoded text of a hidden `<div>`, a `<pre>` or the `<body>`
//! 3. the first `{...}` block found in that text or in the raw page

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

static JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("JSON block pattern is valid"));

const CONTAINERS: [&str; 3] = ["div[hidden]", "pre", "body"];

/// Extracts the JSON payload embedded in a rendered page
///
/// # Returns
///
/// * `Some(Value)` - The first candidate that parses as JSON
/// * `None` - No JSON could be recovered from the page
pub fn extract_json_payload(page: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(page.trim()) {
        return Some(value);
    }

    let document = Html::parse_document(page);
    for container in CONTAINERS {
        let Ok(selector) = Selector::parse(container) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = element.text().collect::<String>();
            if let Some(value) = parse_text(&text) {
                return Some(value);
            }
        }
    }

    parse_block(page)
}

fn parse_text(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim())
        .ok()
        .or_else(|| parse_block(text))
}

fn parse_block(text: &str) -> Option<Value> {
    let block = JSON_BLOCK.find(text)?;
    serde_json::from_str(block.as_str()).ok()
}
