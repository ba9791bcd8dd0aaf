//! Chart planning: turn insight text into declarative chart specs.

use super::spec::ChartSpec;
use crate::brain::LlmProvider;
use crate::config::ChartConfig;
use crate::error::{ChartError, Result};
use crate::types::{CompletionRequest, Message};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Instruction template listing the only columns the model may use.
pub fn system_prompt(columns: &[String], max_charts: usize) -> String {
    let column_list = serde_json::to_string(columns).unwrap_or_else(|_| format!("{:?}", columns));
    format!(
        r#"You are a data visualization assistant. Based on the business insights provided to you, generate at most {max_charts} chart suggestions that help visualize those insights.

Your output must strictly be a JSON object structured as follows:

{{
  "chart1": {{
    "plot": {{
      "kind": "bar",
      "x": "<column name>",
      "y": "<column name or null>",
      "aggregation": "count | sum | mean | null",
      "title": "Chart title"
    }},
    "description": "A short explanation of what the chart reveals."
  }},
  "chart2": {{
    "plot": {{ ... }},
    "description": "..."
  }}
}}

Requirements:
- Each chart must be based on a specific insight.
- "kind" must be one of: "bar", "line", "scatter", "histogram".
- bar: "x" is a grouping column; "y" is aggregated per group with "aggregation" (count needs no "y").
- line and scatter: "y" must be a numeric column plotted against "x".
- histogram: "x" must be a numeric column; "y" and "aggregation" are null.
- Use only these column names, exactly as written: {column_list}
- Do not invent or assume any other columns.
- The "description" field should briefly explain what the chart shows and why it is useful.
- Focus on clarity, variety, and relevance to the insights."#
    )
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest.trim_start();
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }
    text
}

/// Parse a (possibly fenced) chart plan, keeping the model's order.
///
/// Only a body that is not a JSON object is an error. Entries that do not
/// describe a supported chart are logged and dropped.
pub fn parse_chart_plan(raw: &str) -> std::result::Result<IndexMap<String, ChartSpec>, ChartError> {
    let body = strip_code_fence(raw);
    let entries: IndexMap<String, serde_json::Value> =
        serde_json::from_str(body).map_err(|e| ChartError::PlanParse {
            message: e.to_string(),
        })?;

    let mut plan = IndexMap::with_capacity(entries.len());
    for (id, value) in entries {
        match serde_json::from_value::<ChartSpec>(value) {
            Ok(mut spec) => {
                spec.id = id.clone();
                plan.insert(id, spec);
            }
            Err(e) => warn!(chart = %id, error = %e, "Dropping unsupported chart entry"),
        }
    }
    Ok(plan)
}

/// Asks the model for chart specs grounded in a dataset's columns.
pub struct ChartPlanner {
    provider: Arc<dyn LlmProvider>,
    config: ChartConfig,
}

impl ChartPlanner {
    pub fn new(provider: Arc<dyn LlmProvider>, config: ChartConfig) -> Self {
        Self { provider, config }
    }

    /// Plan charts for `insights` using only `columns`.
    ///
    /// A plan that is not a JSON object is an error for the whole request.
    pub async fn plan(
        &self,
        sheet_name: &str,
        insights: &str,
        columns: &[String],
    ) -> Result<IndexMap<String, ChartSpec>> {
        let request = CompletionRequest {
            messages: vec![
                Message::system(system_prompt(columns, self.config.max_charts)),
                Message::user(format!("Business Insights: {}", insights)),
            ],
            temperature: self.config.temperature,
            top_p: Some(1.0),
            ..Default::default()
        };

        debug!(sheet = %sheet_name, columns = columns.len(), "Requesting chart plan");
        let response = self.provider.complete(request).await?;
        let plan = parse_chart_plan(response.text())?;

        if plan.len() > self.config.max_charts {
            warn!(
                sheet = %sheet_name,
                planned = plan.len(),
                cap = self.config.max_charts,
                "Chart plan exceeds requested cap"
            );
        }
        info!(sheet = %sheet_name, charts = plan.len(), "Chart plan ready");
        Ok(plan)
    }
}
