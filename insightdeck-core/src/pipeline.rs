//! The fixed four-stage report pipeline.
//!
//! `extract → generate-insights → plan-charts → render-report`. One owned
//! [`PipelineState`] is threaded through every stage in order; a failing stage
//! aborts the run with [`InsightDeckError::Stage`].

use crate::brain::LlmProvider;
use crate::charts::{ChartPlanner, ChartSpec, RenderedChart, render_all};
use crate::config::AppConfig;
use crate::data::{self, DatasetProfile, DatasetSummary};
use crate::error::{InsightDeckError, Result};
use crate::fonts;
use crate::insights::InsightGenerator;
use crate::report;
use indexmap::IndexMap;
use polars::prelude::DataFrame;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, info, info_span};

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Insights,
    Charts,
    Report,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Extract, Stage::Insights, Stage::Charts, Stage::Report];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extract => write!(f, "extract"),
            Stage::Insights => write!(f, "generate-insights"),
            Stage::Charts => write!(f, "plan-charts"),
            Stage::Report => write!(f, "render-report"),
        }
    }
}

/// Everything known about one dataset as it moves through the stages.
#[derive(Debug, Clone)]
pub struct SheetState {
    pub sheet_name: String,
    pub summary: DatasetSummary,
    pub profile: DatasetProfile,
    pub dataset: DataFrame,
    /// Raw model output from the insight stage.
    pub insights: String,
    /// Chart plan, keyed by chart id in the model's order.
    pub visuals: IndexMap<String, ChartSpec>,
    /// File name of the generated report, relative to the report directory.
    pub pdf_path: Option<String>,
    pub images: Vec<RenderedChart>,
}

impl From<data::ExtractedSheet> for SheetState {
    fn from(sheet: data::ExtractedSheet) -> Self {
        Self {
            sheet_name: sheet.sheet_name,
            summary: sheet.summary,
            profile: sheet.profile,
            dataset: sheet.dataset,
            insights: String::new(),
            visuals: IndexMap::new(),
            pdf_path: None,
            images: Vec::new(),
        }
    }
}

/// State of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub filepath: PathBuf,
    pub sheets: Vec<SheetState>,
}

impl PipelineState {
    pub fn new(filepath: impl Into<PathBuf>) -> Self {
        Self {
            filepath: filepath.into(),
            sheets: Vec::new(),
        }
    }

    /// File names of all generated reports, in sheet order.
    pub fn report_files(&self) -> Vec<String> {
        self.sheets
            .iter()
            .filter_map(|sheet| sheet.pdf_path.clone())
            .collect()
    }
}

/// Runs the stages against one input file.
pub struct Pipeline {
    provider: Arc<dyn LlmProvider>,
    config: AppConfig,
}

impl Pipeline {
    pub fn new(provider: Arc<dyn LlmProvider>, config: AppConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run every stage in order on the file at `path`.
    pub async fn run(&self, path: impl Into<PathBuf>) -> Result<PipelineState> {
        let mut state = PipelineState::new(path);
        info!(path = %state.filepath.display(), "Pipeline started");
        for stage in Stage::ALL {
            let span = info_span!("stage", stage = %stage);
            state = self
                .run_stage(stage, state)
                .instrument(span)
                .await
                .map_err(|e| e.in_stage(stage))?;
        }
        info!(
            path = %state.filepath.display(),
            reports = state.report_files().len(),
            "Pipeline finished"
        );
        Ok(state)
    }

    async fn run_stage(&self, stage: Stage, state: PipelineState) -> Result<PipelineState> {
        match stage {
            Stage::Extract => self.extract(state).await,
            Stage::Insights => self.generate_insights(state).await,
            Stage::Charts => self.plan_charts(state).await,
            Stage::Report => self.render_reports(state).await,
        }
    }

    async fn extract(&self, mut state: PipelineState) -> Result<PipelineState> {
        let path = state.filepath.clone();
        let profile_config = self.config.profile.clone();
        let sheets = blocking(move || data::extract(&path, &profile_config).map_err(Into::into)).await?;
        info!(sheets = sheets.len(), "Datasets extracted");
        state.sheets = sheets.into_iter().map(SheetState::from).collect();
        Ok(state)
    }

    async fn generate_insights(&self, mut state: PipelineState) -> Result<PipelineState> {
        let generator = InsightGenerator::new(self.provider.clone(), self.config.insights.clone());
        for sheet in &mut state.sheets {
            sheet.insights = generator
                .generate(&sheet.sheet_name, &sheet.summary, &sheet.profile)
                .await?;
        }
        Ok(state)
    }

    async fn plan_charts(&self, mut state: PipelineState) -> Result<PipelineState> {
        let planner = ChartPlanner::new(self.provider.clone(), self.config.charts.clone());
        for sheet in &mut state.sheets {
            let columns: Vec<String> = sheet
                .dataset
                .get_column_names()
                .into_iter()
                .map(|name| name.to_string())
                .collect();
            sheet.visuals = planner
                .plan(&sheet.sheet_name, &sheet.insights, &columns)
                .await?;
        }
        Ok(state)
    }

    async fn render_reports(&self, mut state: PipelineState) -> Result<PipelineState> {
        let report_dir = self.config.server.report_dir.clone();
        let config = self.config.clone();
        let sheets = std::mem::take(&mut state.sheets);
        state.sheets = blocking(move || {
            fonts::ensure_chart_font(&config.report);
            sheets
                .into_iter()
                .map(|sheet| render_sheet(sheet, &report_dir, &config))
                .collect()
        })
        .await?;
        Ok(state)
    }
}

fn render_sheet(mut sheet: SheetState, report_dir: &Path, config: &AppConfig) -> Result<SheetState> {
    sheet.images = render_all(&sheet.visuals, &sheet.dataset, &config.charts);
    let file_name = report::render_report(
        &sheet.sheet_name,
        &sheet.insights,
        &sheet.dataset,
        &sheet.images,
        report_dir,
        &config.report,
    )?;
    sheet.pdf_path = Some(file_name);
    Ok(sheet)
}

/// Run CPU-bound work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| InsightDeckError::Io(std::io::Error::other(format!("Blocking task failed: {e}"))))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use crate::error::{ChartError, LlmError};
    use std::io::Write;

    fn write_csv(dir: &Path) -> PathBuf {
        let path = dir.join("input.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "A,B\n1,x\n2,y").unwrap();
        path
    }

    fn config_in(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.server.report_dir = dir.join("reports");
        config.server.upload_dir = dir.join("uploads");
        config
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<String> = Stage::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec!["extract", "generate-insights", "plan-charts", "render-report"]
        );
    }

    #[test]
    fn test_report_files_skip_missing() {
        let mut state = PipelineState::new("x.csv");
        let df = polars::df!["A" => [1i64]].unwrap();
        let extracted = data::ExtractedSheet {
            sheet_name: "a".into(),
            summary: data::summary::summarize(&df, 5).unwrap(),
            profile: data::profile::profile(&df, &Default::default()).unwrap(),
            dataset: df,
        };
        let mut with_pdf = SheetState::from(extracted.clone());
        with_pdf.pdf_path = Some("a.pdf".into());
        state.sheets = vec![SheetState::from(extracted), with_pdf];
        assert_eq!(state.report_files(), vec!["a.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_unsupported_extension_fails_in_extract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let pipeline = Pipeline::new(Arc::new(MockLlmProvider::new()), config_in(dir.path()));
        match pipeline.run(&path).await.unwrap_err() {
            InsightDeckError::Stage { stage, .. } => assert_eq!(stage, Stage::Extract),
            other => panic!("Expected stage error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unparsable_file_yields_no_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a workbook").unwrap();
        let mock = Arc::new(MockLlmProvider::new());
        let pipeline = Pipeline::new(mock.clone(), config_in(dir.path()));
        let state = pipeline.run(&path).await.unwrap();
        assert!(state.sheets.is_empty());
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_aborts_in_insights_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path());
        let mock = Arc::new(MockLlmProvider::new());
        mock.queue_error(LlmError::Connection {
            message: "refused".into(),
        });
        let pipeline = Pipeline::new(mock, config_in(dir.path()));
        let err = pipeline.run(&path).await.unwrap_err();
        assert!(err.to_string().starts_with("generate-insights stage failed"));
    }

    #[tokio::test]
    async fn test_bad_chart_plan_aborts_in_charts_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path());
        let mock = Arc::new(MockLlmProvider::with_responses([
            "Insight 1: Insight: a Takeaway: b",
            "I cannot produce JSON today",
        ]));
        let pipeline = Pipeline::new(mock, config_in(dir.path()));
        match pipeline.run(&path).await.unwrap_err() {
            InsightDeckError::Stage { stage, source } => {
                assert_eq!(stage, Stage::Charts);
                assert!(matches!(
                    *source,
                    InsightDeckError::Chart(ChartError::PlanParse { .. })
                ));
            }
            other => panic!("Expected stage error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stages_fill_sheet_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path());
        let mut config = config_in(dir.path());
        let font_dir = dir.path().join("fonts");
        std::fs::create_dir_all(&font_dir).unwrap();
        config.report = crate::fonts::testing::fixture_config(&font_dir);
        let mock = Arc::new(MockLlmProvider::with_responses([
            "Insight 1: Insight: A grows. Takeaway: Watch A.",
            r#"{"chart1": {"plot": {"kind": "histogram", "x": "A"}, "description": "A"}}"#,
        ]));
        let pipeline = Pipeline::new(mock, config);
        let state = pipeline.run(&path).await.unwrap();

        assert_eq!(state.sheets.len(), 1);
        let sheet = &state.sheets[0];
        assert_eq!(sheet.sheet_name.len(), 16);
        assert_eq!(sheet.summary.n_rows, 2);
        assert!(sheet.insights.contains("Insight 1"));
        assert_eq!(sheet.visuals.len(), 1);
        assert_eq!(sheet.images.len(), 1);
        let pdf = sheet.pdf_path.clone().unwrap();
        assert_eq!(pdf, format!("{}.pdf", sheet.sheet_name));
        assert!(dir.path().join("reports").join(pdf).is_file());
    }
}
