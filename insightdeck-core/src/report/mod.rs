//! Report rendering: one PDF per dataset.

pub mod layout;
pub mod pdf;
pub mod summary;

pub use layout::{ChartSlot, GridLayout, fit_image, paginate};
pub use pdf::{ReportContent, load_font_family, write_report};
pub use summary::{RowShade, SummaryTable, summary_tables};

use crate::charts::RenderedChart;
use crate::config::ReportConfig;
use crate::error::Result;
use crate::insights::parse_insights;
use polars::prelude::DataFrame;
use std::path::Path;
use tracing::info;

/// File name of the report for `sheet_name`.
pub fn report_file_name(sheet_name: &str) -> String {
    format!("{}.pdf", sheet_name)
}

/// Build the report for one dataset into `report_dir` and return its file name.
pub fn render_report(
    sheet_name: &str,
    insights: &str,
    dataset: &DataFrame,
    charts: &[RenderedChart],
    report_dir: &Path,
    config: &ReportConfig,
) -> Result<String> {
    let records = parse_insights(insights);
    let tables = summary_tables(dataset)?;
    let font_family = load_font_family(config)?;

    std::fs::create_dir_all(report_dir)?;
    let file_name = report_file_name(sheet_name);
    let path = report_dir.join(&file_name);
    let content = ReportContent {
        title: sheet_name,
        insights: &records,
        tables: &tables,
        charts,
    };
    write_report(&path, font_family, &content, config)?;

    info!(
        sheet = %sheet_name,
        insights = records.len(),
        charts = charts.len(),
        file = %file_name,
        "Report written"
    );
    Ok(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_report_file_name() {
        assert_eq!(report_file_name("Sheet1"), "Sheet1.pdf");
        assert_eq!(report_file_name("0123abcd"), "0123abcd.pdf");
    }

    #[test]
    fn test_render_report_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::fonts::testing::fixture_config(dir.path());
        let df = df!["A" => [1i64, 2], "B" => ["x", "y"]].unwrap();
        let name = render_report("Sales", "no headings here", &df, &[], dir.path(), &config).unwrap();
        assert_eq!(name, "Sales.pdf");
        // Placeholder insights page, then the two summary tables
        assert_eq!(pdf::tests::page_count(&dir.path().join("Sales.pdf")), 2);
    }

    #[test]
    fn test_render_report_without_fonts_fails() {
        let config = ReportConfig {
            font_dirs: vec![],
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let df = df!["A" => [1i64]].unwrap();
        let err = render_report("S", "", &df, &[], dir.path(), &config).unwrap_err();
        assert!(err.to_string().contains("LiberationSans"));
        assert!(!dir.path().join("S.pdf").exists());
    }
}
