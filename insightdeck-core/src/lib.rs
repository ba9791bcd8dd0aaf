//! # InsightDeck Core
//!
//! Turns a spreadsheet into a PDF business report. Each dataset is profiled,
//! a language model phrases insights and proposes charts, the charts are
//! rasterized and everything is laid out into one PDF per dataset.

pub mod brain;
pub mod charts;
pub mod config;
pub mod data;
pub mod error;
pub mod fonts;
pub mod gateway;
pub mod insights;
pub mod pipeline;
pub mod providers;
pub mod report;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{LlmProvider, MockLlmProvider};
pub use config::{AppConfig, LlmConfig, load_config};
pub use error::{InsightDeckError, Result};
pub use pipeline::{Pipeline, PipelineState, SheetState, Stage};
pub use providers::create_provider;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
