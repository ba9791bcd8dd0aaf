//! PDF assembly with genpdf: insights page, summary tables, chart grid pages.

use super::layout::{ChartSlot, GridLayout, MARGIN_X_MM, MARGIN_Y_MM, paginate};
use super::summary::{RowShade, SummaryTable};
use crate::charts::RenderedChart;
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::fonts;
use crate::insights::{InsightRecord, emphasis_spans};
use genpdf::elements::{
    Break, FrameCellDecorator, Image, LinearLayout, PageBreak, Paragraph, TableLayout,
    UnorderedList,
};
use genpdf::error::Error as PdfError;
use genpdf::fonts::{FontData, FontFamily};
use genpdf::render::Area;
use genpdf::style::{Color, Style};
use genpdf::{
    Context, Document, Element, Margins, Mm, Position, RenderResult, Scale, SimplePageDecorator,
    Size,
};
use image::{DynamicImage, RgbImage};
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, warn};

const BODY_FONT_SIZE: u8 = 9;
const TABLE_FONT_SIZE: u8 = 7;
const DESCRIPTION_FONT_SIZE: u8 = 8;
const TEXT_PAGE_PADDING_MM: f64 = 12.0;
const CELL_TEXT_PADDING_MM: f64 = 0.8;
/// Spacing of the strokes that paint a row background; below the default
/// stroke width so they overlap.
const FILL_STROKE_STEP_MM: f64 = 0.3;
/// Extra room around a placed image so genpdf never considers it overflowing.
const IMAGE_SLACK_MM: f64 = 1.0;

/// Load the first configured font family found on disk.
pub fn load_font_family(config: &ReportConfig) -> Result<FontFamily<FontData>, ReportError> {
    let files = fonts::locate_family(&config.font_dirs, &config.font_families).ok_or_else(|| {
        ReportError::FontsUnavailable {
            families: config.font_families.join(", "),
            searched: fonts::searched(&config.font_dirs),
        }
    })?;
    debug!(family = %files.family, "Using report font");
    files.load().map_err(|e| ReportError::Render {
        path: files.regular.clone(),
        message: e.to_string(),
    })
}

/// Everything that goes into one report file.
pub struct ReportContent<'a> {
    pub title: &'a str,
    pub insights: &'a [InsightRecord],
    pub tables: &'a [SummaryTable],
    pub charts: &'a [RenderedChart],
}

/// Write `content` to `path` as a PDF.
pub fn write_report(
    path: &Path,
    font_family: FontFamily<FontData>,
    content: &ReportContent<'_>,
    config: &ReportConfig,
) -> Result<(), ReportError> {
    let render_err = |e: PdfError| ReportError::Render {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut doc = Document::new(font_family);
    doc.set_title(content.title);
    doc.set_font_size(BODY_FONT_SIZE);
    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(Margins::trbl(MARGIN_Y_MM, MARGIN_X_MM, MARGIN_Y_MM, MARGIN_X_MM));
    doc.set_page_decorator(decorator);

    doc.push(insights_section(content.insights).padded(Margins::all(TEXT_PAGE_PADDING_MM)));
    doc.push(PageBreak::new());
    doc.push(
        tables_section(content.tables)
            .map_err(render_err)?
            .padded(Margins::all(TEXT_PAGE_PADDING_MM)),
    );

    let charts = chart_pages(content.charts, config.chart_dpi);
    if !charts.is_empty() {
        doc.push(PageBreak::new());
        doc.push(charts);
    }

    doc.render_to_file(path).map_err(render_err)?;
    debug!(path = %path.display(), charts = content.charts.len(), "Wrote report");
    Ok(())
}

fn chart_pages(charts: &[RenderedChart], dpi: f64) -> ChartPages {
    let grid = GridLayout::a4();
    let mut pages = VecDeque::new();
    for page in paginate(charts.len()) {
        let mut cells = Vec::with_capacity(page.len());
        for (slot, &index) in page.iter().enumerate() {
            let chart = &charts[index];
            let placement = grid.place(index, slot, chart.image.width(), chart.image.height(), dpi);
            match ChartCell::new(chart, placement, dpi) {
                Ok(cell) => cells.push(cell),
                Err(e) => warn!(chart = %chart.id, error = %e, "Skipping chart image"),
            }
        }
        if !cells.is_empty() {
            pages.push_back(cells);
        }
    }
    ChartPages { pages }
}

fn insights_section(records: &[InsightRecord]) -> LinearLayout {
    let mut layout = LinearLayout::vertical();
    layout.push(Paragraph::new("Business Insights").styled(Style::new().bold().with_font_size(13)));
    layout.push(Break::new(1));

    if records.is_empty() {
        layout.push(Paragraph::new("No insights available"));
        return layout;
    }

    for record in records {
        layout.push(Paragraph::new(record.heading()).styled(Style::new().bold().with_font_size(10)));
        let mut list = UnorderedList::new();
        list.push(labelled("Insight: ", &record.insight));
        list.push(labelled("Takeaway: ", &record.takeaway));
        layout.push(list);
        layout.push(Break::new(0.5));
    }
    layout
}

/// A bold label followed by the text with `**emphasis**` rendered bold.
fn labelled(label: &str, text: &str) -> Paragraph {
    let mut paragraph = Paragraph::default();
    paragraph.push_styled(label, Style::new().bold());
    for span in emphasis_spans(&single_line(text)) {
        if span.bold {
            paragraph.push_styled(span.text, Style::new().bold());
        } else {
            paragraph.push(span.text);
        }
    }
    paragraph
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Greedy word wrap; a word wider than `max_width` gets a line of its own.
fn wrap_words(text: &str, max_width: Mm, width_of: impl Fn(&str) -> Mm) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if width_of(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn tables_section(tables: &[SummaryTable]) -> Result<LinearLayout, PdfError> {
    let mut layout = LinearLayout::vertical();
    for table in tables {
        layout.push(Paragraph::new(table.title.as_str()).styled(Style::new().bold().with_font_size(11)));
        layout.push(Break::new(0.5));
        layout.push(table_element(table)?);
        layout.push(Break::new(1.5));
    }
    Ok(layout)
}

fn table_element(table: &SummaryTable) -> Result<TableLayout, PdfError> {
    let mut element = TableLayout::new(table.column_weights.clone());
    element.set_cell_decorator(FrameCellDecorator::new(true, true, false));
    for (index, row) in table.rows.iter().enumerate() {
        let shaded = Rc::new(ShadedRow::new(row, &table.column_weights, table.shade(index)));
        let mut table_row = element.row();
        for column in 0..row.len() {
            table_row = table_row.element(ShadedCell {
                row: Rc::clone(&shaded),
                column,
            });
        }
        table_row.push()?;
    }
    Ok(element)
}

/// Text and background shared by the cells of one table row.
struct ShadedRow {
    texts: Vec<String>,
    weights: Vec<usize>,
    style: Style,
    fill: Color,
}

impl ShadedRow {
    fn new(texts: &[String], weights: &[usize], shade: RowShade) -> Self {
        let mut style = Style::new().with_font_size(TABLE_FONT_SIZE);
        if shade == RowShade::Header {
            style = style.bold();
        }
        let (r, g, b) = shade.rgb();
        Self {
            texts: texts.to_vec(),
            weights: weights.to_vec(),
            style,
            fill: Color::Rgb(r, g, b),
        }
    }

    /// Wrapped lines of `column` when that column is `width` wide.
    fn lines(&self, column: usize, width: Mm, context: &Context, style: Style) -> Vec<String> {
        let padding = Mm::from(CELL_TEXT_PADDING_MM);
        wrap_words(&self.texts[column], width - padding - padding, |s| {
            style.str_width(&context.font_cache, s)
        })
    }
}

/// One table cell. Every cell of a row is painted to the height of the row's
/// tallest wrapped text.
struct ShadedCell {
    row: Rc<ShadedRow>,
    column: usize,
}

impl Element for ShadedCell {
    fn render(
        &mut self,
        context: &Context,
        area: Area<'_>,
        mut style: Style,
    ) -> Result<RenderResult, PdfError> {
        let row = &self.row;
        style.merge(row.style);
        let width = area.size().width;
        let own_weight = row.weights.get(self.column).copied().unwrap_or(1).max(1) as f64;
        let row_lines = (0..row.texts.len())
            .map(|column| {
                let weight = row.weights.get(column).copied().unwrap_or(1) as f64;
                row.lines(column, width * (weight / own_weight), context, style).len()
            })
            .max()
            .unwrap_or(1);

        let padding = Mm::from(CELL_TEXT_PADDING_MM);
        let line_height = style.line_height(&context.font_cache);
        let height = line_height * row_lines as f64 + padding + padding;
        if height > area.size().height {
            // Whole row moves to the next page.
            return Ok(RenderResult {
                size: Size::new(0, 0),
                has_more: true,
            });
        }

        fill(&area, width, height, row.fill);
        let mut y = padding;
        for line in row.lines(self.column, width, context, style) {
            area.print_str(&context.font_cache, Position::new(padding, y), style, line)?;
            y += line_height;
        }
        Ok(RenderResult {
            size: Size::new(width, height),
            has_more: false,
        })
    }
}

/// Paint a `width`×`height` box at the area's origin with stacked strokes.
fn fill(area: &Area<'_>, width: Mm, height: Mm, color: Color) {
    let style = Style::new().with_color(color);
    let step = Mm::from(FILL_STROKE_STEP_MM);
    let mut y = step / 2.0;
    while y < height {
        area.draw_line(vec![Position::new(0, y), Position::new(width, y)], style);
        y += step;
    }
}

/// One chart image prepared for a grid position.
struct ChartCell {
    slot: ChartSlot,
    image: Image,
    description: Vec<String>,
}

impl ChartCell {
    fn new(chart: &RenderedChart, slot: ChartSlot, dpi: f64) -> Result<Self, ReportError> {
        let image = pdf_image(chart.image.clone())?
            .with_dpi(dpi)
            .with_scale(Scale::new(slot.scale, slot.scale));
        let description = chart
            .description
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self {
            slot,
            image,
            description,
        })
    }

    fn render(self, context: &Context, area: &Area<'_>, style: Style) -> Result<(), PdfError> {
        let ChartCell {
            slot,
            mut image,
            description,
        } = self;
        let image_rect = slot.image;
        let mut image_area = area.clone();
        image_area.add_offset(Position::new(image_rect.x, image_rect.y));
        image_area.set_size(Size::new(
            image_rect.width + IMAGE_SLACK_MM,
            image_rect.height + IMAGE_SLACK_MM,
        ));
        image.render(context, image_area, style)?;

        let text_rect = slot.description;
        let mut text_area = area.clone();
        text_area.add_offset(Position::new(text_rect.x, text_rect.y));
        text_area.set_size(Size::new(text_rect.width, text_rect.height));
        let mut layout = LinearLayout::vertical();
        for line in description {
            layout.push(Paragraph::new(line));
        }
        layout
            .styled(Style::new().with_font_size(DESCRIPTION_FONT_SIZE))
            .render(context, text_area, style)?;
        Ok(())
    }
}

fn pdf_image(image: RgbImage) -> Result<Image, ReportError> {
    Image::from_dynamic_image(DynamicImage::ImageRgb8(image)).map_err(|e| ReportError::Image {
        message: e.to_string(),
    })
}

/// The chart grid, four charts per page. Each render fills one page and asks
/// for another while charts remain.
struct ChartPages {
    pages: VecDeque<Vec<ChartCell>>,
}

impl ChartPages {
    fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl Element for ChartPages {
    fn render(
        &mut self,
        context: &Context,
        area: Area<'_>,
        style: Style,
    ) -> Result<RenderResult, PdfError> {
        let Some(cells) = self.pages.pop_front() else {
            return Ok(RenderResult::default());
        };
        for cell in cells {
            cell.render(context, &area, style)?;
        }
        Ok(RenderResult {
            size: area.size(),
            has_more: !self.pages.is_empty(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fonts::testing::fixture_config;
    use crate::insights::parse_insights;
    use image::Rgb;
    use pretty_assertions::assert_eq;

    /// Number of page objects in a written PDF.
    pub(crate) fn page_count(path: &Path) -> usize {
        let bytes = std::fs::read(path).unwrap();
        let page = regex::bytes::Regex::new(r"(?-u)/Type\s*/Page\b").unwrap();
        page.find_iter(&bytes).count()
    }

    fn chart(id: &str) -> RenderedChart {
        RenderedChart {
            id: id.to_string(),
            image: RgbImage::from_pixel(400, 300, Rgb([200, 30, 30])),
            description: format!("{id} description\nsecond line"),
        }
    }

    fn small_table() -> SummaryTable {
        SummaryTable {
            title: "Dataset Summary".to_string(),
            column_weights: vec![1, 1],
            rows: vec![
                vec!["Dataset statistics".to_string(), String::new()],
                vec!["Number of variables".to_string(), "2".to_string()],
            ],
            header_rows: vec![0],
        }
    }

    /// Write a report with `chart_count` charts and return its page count.
    fn pages_for(chart_count: usize, insights: &str) -> usize {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture_config(dir.path());
        let family = load_font_family(&config).unwrap();
        let path = dir.path().join("report.pdf");
        let records = parse_insights(insights);
        let charts: Vec<_> = (1..=chart_count).map(|i| chart(&format!("chart{i}"))).collect();
        let table = small_table();
        let content = ReportContent {
            title: "report",
            insights: &records,
            tables: std::slice::from_ref(&table),
            charts: &charts,
        };
        write_report(&path, family, &content, &config).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        page_count(&path)
    }

    const INSIGHTS: &str = "Insight 1: Insight: **Sales** rose. Takeaway: Stock up.";

    #[test]
    fn test_single_line_collapses_whitespace() {
        assert_eq!(single_line(" a\n  b\tc "), "a b c");
    }

    #[test]
    fn test_wrap_words_greedy() {
        let width_of = |s: &str| Mm::from(s.len() as f64);
        assert_eq!(
            wrap_words("aa bb cc dddd", Mm::from(5.0_f64), width_of),
            vec!["aa bb", "cc", "dddd"]
        );
        assert_eq!(wrap_words("", Mm::from(5.0_f64), width_of), vec![String::new()]);
        // An overlong word still gets its own line
        assert_eq!(
            wrap_words("a verylongword b", Mm::from(3.0_f64), width_of),
            vec!["a", "verylongword", "b"]
        );
    }

    #[test]
    fn test_missing_fonts_reported() {
        let config = ReportConfig {
            font_families: vec!["NoSuchFamily".to_string(), "AlsoMissing".to_string()],
            font_dirs: vec!["/nonexistent".into()],
            ..Default::default()
        };
        let err = load_font_family(&config).unwrap_err();
        assert!(matches!(err, ReportError::FontsUnavailable { .. }));
        let message = err.to_string();
        assert!(message.contains("/nonexistent"));
        assert!(message.contains("NoSuchFamily, AlsoMissing"));
    }

    #[test]
    fn test_no_charts_gives_insights_and_tables_pages() {
        assert_eq!(pages_for(0, INSIGHTS), 2);
    }

    #[test]
    fn test_full_chart_page() {
        assert_eq!(pages_for(4, INSIGHTS), 3);
    }

    #[test]
    fn test_charts_fill_consecutive_pages() {
        assert_eq!(pages_for(1, INSIGHTS), 3);
        assert_eq!(pages_for(7, INSIGHTS), 4);
        assert_eq!(pages_for(9, INSIGHTS), 5);
    }

    #[test]
    fn test_headingless_insights_keep_first_page() {
        assert!(parse_insights("nothing structured here").is_empty());
        assert_eq!(pages_for(0, "nothing structured here"), 2);
        assert_eq!(pages_for(2, "nothing structured here"), 3);
    }

    #[test]
    fn test_wrapping_table_cells_render() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture_config(dir.path());
        let family = load_font_family(&config).unwrap();
        let path = dir.path().join("wide.pdf");
        let long = "a very long variable name that certainly wraps inside a narrow column";
        let table = SummaryTable {
            title: "Variable Summary".to_string(),
            column_weights: vec![8, 4, 5, 4, 5, 6, 6],
            rows: vec![
                ["Variable", "Distinct", "Distinct (%)", "Missing", "Missing (%)", "Memory", "Type"]
                    .map(String::from)
                    .to_vec(),
                [long, "3", "100.0%", "0", "0.0%", "0.1 KiB", "Text"]
                    .map(String::from)
                    .to_vec(),
            ],
            header_rows: vec![0],
        };
        let content = ReportContent {
            title: "wide",
            insights: &[],
            tables: std::slice::from_ref(&table),
            charts: &[],
        };
        write_report(&path, family, &content, &config).unwrap();
        assert_eq!(page_count(&path), 2);
    }
}
