//! Insight generation: one LLM round trip per dataset.

use crate::brain::LlmProvider;
use crate::config::InsightConfig;
use crate::data::{DatasetProfile, DatasetSummary};
use crate::error::Result;
use crate::types::{CompletionRequest, Message};
use std::sync::Arc;
use tracing::{debug, info};

/// Instruction template sent as the system message.
pub fn system_prompt(max_insights: usize) -> String {
    format!(
        r#"You are a business insights agent. Your role is to generate clear, actionable, and relevant textual insights based on structured data.

You have been provided with two key inputs:

A basic summary of a spreadsheet, including row/column counts, data types, missing values, unique values, and sample entries.
A data profile, which includes detailed statistical and structural metadata about the same data.

Analyze this information and generate at most {max_insights} applicable business insights that can be inferred from the data.
These insights should reflect patterns, anomalies, opportunities, risks, or strategic observations that would be useful to a business decision-maker.

Every insight must strictly use this format, every time:
Insight 1:
Insight:
Takeaway:
Visualization Suggestion:
---
Insight 2:
Insight:
Takeaway:
Visualization Suggestion:

Keep in mind that:
Insight should be grounded in the data, clearly stated and context-aware.
Takeaway must be framed as a meaningful takeaway.
Visualization Suggestion means that each insight should be expressed so that a graph, chart, or dashboard element can be created from it later (e.g., trends, comparisons, distributions, correlations, rankings, outliers).

Avoid generic statements. Focus on clarity, relevance, and impact."#
    )
}

/// User message carrying the serialized summary and profile.
pub fn user_prompt(
    sheet_name: &str,
    summary: &DatasetSummary,
    profile: &DatasetProfile,
) -> Result<String> {
    Ok(format!(
        "Sheet:{}\n Summary:{}\n Profile:{}",
        sheet_name,
        serde_json::to_string(summary)?,
        serde_json::to_string(profile)?
    ))
}

/// Asks the model for free-text insights about a dataset.
pub struct InsightGenerator {
    provider: Arc<dyn LlmProvider>,
    config: InsightConfig,
}

impl InsightGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: InsightConfig) -> Self {
        Self { provider, config }
    }

    /// Return the raw model text for one dataset.
    ///
    /// A failed service call is an error; malformed text is returned as-is
    /// for the parser to deal with.
    pub async fn generate(
        &self,
        sheet_name: &str,
        summary: &DatasetSummary,
        profile: &DatasetProfile,
    ) -> Result<String> {
        let request = CompletionRequest {
            messages: vec![
                Message::system(system_prompt(self.config.max_insights)),
                Message::user(user_prompt(sheet_name, summary, profile)?),
            ],
            temperature: self.config.temperature,
            top_p: Some(self.config.top_p),
            ..Default::default()
        };

        debug!(sheet = %sheet_name, model = %self.provider.model_name(), "Requesting insights");
        let response = self.provider.complete(request).await?;
        info!(
            sheet = %sheet_name,
            tokens = response.usage.total(),
            "Insights generated"
        );
        Ok(response.message.content)
    }
}
