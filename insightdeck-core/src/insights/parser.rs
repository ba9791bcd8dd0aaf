//! Lenient extraction of insight records from free-form model output.
//!
//! Never fails: text without headings yields no records, and a block missing
//! a field yields an empty string for it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Insight\s*(\d{1,9})\s*:").expect("valid heading regex"));
static INSIGHT_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Insight:").expect("valid insight regex"));
static TAKEAWAY_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Takeaway:").expect("valid takeaway regex"));
static INSIGHT_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Takeaway:|Visualization").expect("valid marker regex"));
static TAKEAWAY_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Visualization").expect("valid marker regex"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid emphasis regex"));

/// One numbered insight block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightRecord {
    pub ordinal: u32,
    /// `Insight <ordinal>`.
    pub title: String,
    pub insight: String,
    pub takeaway: String,
}

impl InsightRecord {
    /// Heading line shown in the report: `<ordinal>: Insight <ordinal>`.
    pub fn heading(&self) -> String {
        format!("{}: {}", self.ordinal, self.title)
    }
}

/// A run of text with a single weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub bold: bool,
}

impl TextSpan {
    fn new(text: &str, bold: bool) -> Self {
        Self {
            text: text.to_string(),
            bold,
        }
    }
}

/// Split `raw` into insight records, one per `Insight <N>:` heading, in source order.
pub fn parse_insights(raw: &str) -> Vec<InsightRecord> {
    let headings: Vec<(usize, u32)> = HEADING
        .captures_iter(raw)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            let ordinal = caps.get(1)?.as_str().parse().ok()?;
            Some((start, ordinal))
        })
        .collect();

    headings
        .iter()
        .enumerate()
        .map(|(idx, &(start, ordinal))| {
            let end = headings.get(idx + 1).map_or(raw.len(), |next| next.0);
            let block = strip_separator(raw[start..end].trim());
            InsightRecord {
                ordinal,
                title: format!("Insight {}", ordinal),
                insight: field(block, &INSIGHT_FIELD, &INSIGHT_END),
                takeaway: field(block, &TAKEAWAY_FIELD, &TAKEAWAY_END),
            }
        })
        .collect()
}

/// Text after the first `label` up to the first `end` marker, trimmed.
fn field(block: &str, label: &Regex, end: &Regex) -> String {
    let Some(found) = label.find(block) else {
        return String::new();
    };
    let rest = &block[found.end()..];
    let stop = end.find(rest).map_or(rest.len(), |m| m.start());
    rest[..stop].trim().to_string()
}

/// Drop a trailing `---` separator line.
fn strip_separator(block: &str) -> &str {
    match block.rsplit_once('\n') {
        Some((head, last)) if last.trim().len() >= 3 && last.trim().chars().all(|c| c == '-') => {
            head.trim_end()
        }
        _ => block,
    }
}

/// Convert `**bold**` markers into styled spans. Unmatched markers stay literal.
pub fn emphasis_spans(text: &str) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut last = 0;
    for caps in BOLD.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            spans.push(TextSpan::new(&text[last..whole.start()], false));
        }
        if !inner.as_str().is_empty() {
            spans.push(TextSpan::new(inner.as_str(), true));
        }
        last = whole.end();
    }
    if last < text.len() {
        spans.push(TextSpan::new(&text[last..], false));
    }
    spans
}
