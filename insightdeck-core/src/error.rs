//! Error types for the InsightDeck core library.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering LLM, data loading, chart, report, configuration, and pipeline domains.

use std::path::PathBuf;

use crate::pipeline::Stage;

/// Top-level error type for the InsightDeck core library.
#[derive(Debug, thiserror::Error)]
pub enum InsightDeckError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<InsightDeckError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl InsightDeckError {
    /// Wrap an error with the pipeline stage it escaped from.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ InsightDeckError::Stage { .. } => already,
            other => InsightDeckError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from loading and profiling tabular input.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Unsupported file extension: {}", .path.display())]
    UnsupportedExtension { path: PathBuf },

    #[error("Failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("Workbook error: {message}")]
    Workbook { message: String },

    #[error("Sheet '{sheet}' has no header row")]
    EmptySheet { sheet: String },

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

/// Errors from chart planning and chart materialization.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("Chart plan could not be parsed: {message}")]
    PlanParse { message: String },

    #[error("Chart '{chart}' references unknown column '{column}'")]
    UnknownColumn { chart: String, column: String },

    #[error("Chart '{chart}' needs a numeric column, '{column}' is not numeric")]
    NonNumericColumn { chart: String, column: String },

    #[error("Chart '{chart}' needs a {axis} column")]
    MissingAxis { chart: String, axis: String },

    #[error("Chart '{chart}' has no plottable data")]
    NoData { chart: String },

    #[error("Chart '{chart}' failed to draw: {message}")]
    Draw { chart: String, message: String },
}

/// Errors from PDF report assembly.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("No usable font family ({families}) found in: {searched}")]
    FontsUnavailable { families: String, searched: String },

    #[error("Image conversion failed: {message}")]
    Image { message: String },

    #[error("Failed to render PDF {}: {message}", .path.display())]
    Render { path: PathBuf, message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `InsightDeckError`.
pub type Result<T> = std::result::Result<T, InsightDeckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = InsightDeckError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_chart_plan() {
        let err = InsightDeckError::Chart(ChartError::PlanParse {
            message: "expected value at line 1".into(),
        });
        assert_eq!(
            err.to_string(),
            "Chart error: Chart plan could not be parsed: expected value at line 1"
        );
    }

    #[test]
    fn test_stage_wrapping_names_stage() {
        let err = InsightDeckError::Chart(ChartError::PlanParse {
            message: "bad".into(),
        })
        .in_stage(Stage::Charts);
        assert!(err.to_string().starts_with("plan-charts stage failed"));
    }

    #[test]
    fn test_stage_wrapping_is_idempotent() {
        let err = InsightDeckError::Io(std::io::Error::other("disk"))
            .in_stage(Stage::Extract)
            .in_stage(Stage::Report);
        match err {
            InsightDeckError::Stage { stage, .. } => assert_eq!(stage, Stage::Extract),
            other => panic!("Expected Stage, got {other:?}"),
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: InsightDeckError = io_err.into();
        assert!(matches!(err, InsightDeckError::Io(_)));
    }

    #[test]
    fn test_unsupported_extension_display() {
        let err = DataError::UnsupportedExtension {
            path: PathBuf::from("notes.txt"),
        };
        assert_eq!(err.to_string(), "Unsupported file extension: notes.txt");
    }
}
