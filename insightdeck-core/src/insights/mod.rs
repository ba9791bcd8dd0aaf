//! Business insights: generation through the LLM and parsing of its output.

pub mod generator;
pub mod parser;

pub use generator::InsightGenerator;
pub use parser::{InsightRecord, TextSpan, emphasis_spans, parse_insights};
