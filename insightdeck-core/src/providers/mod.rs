//! LLM provider implementations.
//!
//! Provides the OpenAI-compatible implementation of the `LlmProvider` trait,
//! covering OpenAI, Azure OpenAI deployments, and local OpenAI-style servers.
//!
//! Use `create_provider()` to instantiate the appropriate provider based on config.

pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use std::sync::Arc;

pub use openai_compat::OpenAiCompatibleProvider;

/// Build the provider described by `config`.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    for warning in config.validate() {
        tracing::warn!(provider = %config.provider, "{}", warning);
    }
    let provider = OpenAiCompatibleProvider::new(config)?;
    Ok(Arc::new(provider))
}
