//! Chart page geometry, in millimetres with the origin at the top-left of the
//! printable area.

pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;
pub const MARGIN_X_MM: f64 = 6.35;
pub const MARGIN_Y_MM: f64 = 8.47;
pub const GRID_COLS: usize = 2;
pub const GRID_ROWS: usize = 2;
pub const CHARTS_PER_PAGE: usize = GRID_COLS * GRID_ROWS;
pub const CELL_PADDING_MM: f64 = 2.1;
pub const DESCRIPTION_GAP_MM: f64 = 2.1;
/// Share of a cell's height given to the image, padding included.
pub const IMAGE_AREA_RATIO: f64 = 0.62;

const MM_PER_INCH: f64 = 25.4;

/// An axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Where one chart and its description go on a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartSlot {
    /// Index into the chart list.
    pub chart: usize,
    pub image: Rect,
    /// Uniform factor applied to the image's natural size; never above 1.
    pub scale: f64,
    pub description: Rect,
}

/// Cell dimensions of the 2×2 chart grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub cell_width: f64,
    pub cell_height: f64,
    pub image_area_height: f64,
    pub description_height: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::a4()
    }
}

impl GridLayout {
    pub fn a4() -> Self {
        let cell_width = (PAGE_WIDTH_MM - 2.0 * MARGIN_X_MM) / GRID_COLS as f64;
        let cell_height = (PAGE_HEIGHT_MM - 2.0 * MARGIN_Y_MM) / GRID_ROWS as f64;
        let image_area_height = cell_height * IMAGE_AREA_RATIO - CELL_PADDING_MM;
        let description_height =
            cell_height - image_area_height - DESCRIPTION_GAP_MM - 2.0 * CELL_PADDING_MM;
        Self {
            cell_width,
            cell_height,
            image_area_height,
            description_height,
        }
    }

    /// Top-left corner of grid position `slot` (row-major).
    pub fn cell_origin(&self, slot: usize) -> (f64, f64) {
        let col = slot % GRID_COLS;
        let row = (slot / GRID_COLS) % GRID_ROWS;
        (col as f64 * self.cell_width, row as f64 * self.cell_height)
    }

    /// Place an image of `px_width`×`px_height` rendered at `dpi` into `slot`.
    pub fn place(&self, chart: usize, slot: usize, px_width: u32, px_height: u32, dpi: f64) -> ChartSlot {
        let (cell_x, cell_y) = self.cell_origin(slot);
        let natural_w = px_to_mm(px_width, dpi);
        let natural_h = px_to_mm(px_height, dpi);
        let max_w = self.cell_width - 2.0 * CELL_PADDING_MM;
        let (width, height, scale) = fit_image(natural_w, natural_h, max_w, self.image_area_height);

        let image = Rect {
            x: cell_x + (self.cell_width - width) / 2.0,
            y: cell_y + CELL_PADDING_MM,
            width,
            height,
        };
        let description = Rect {
            x: cell_x + CELL_PADDING_MM,
            y: image.y + height + DESCRIPTION_GAP_MM,
            width: max_w,
            height: self.description_height,
        };
        ChartSlot {
            chart,
            image,
            scale,
            description,
        }
    }
}

pub fn px_to_mm(px: u32, dpi: f64) -> f64 {
    px as f64 / dpi * MM_PER_INCH
}

/// Scale `width`×`height` down to fit `max_width`×`max_height`, keeping aspect.
///
/// Returns the fitted size and the factor used. Images that already fit keep
/// their size.
pub fn fit_image(width: f64, height: f64, max_width: f64, max_height: f64) -> (f64, f64, f64) {
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0, 1.0);
    }
    let scale = (max_width / width).min(max_height / height).min(1.0);
    (width * scale, height * scale, scale)
}

/// Split `count` charts into pages of at most four slots.
pub fn paginate(count: usize) -> Vec<Vec<usize>> {
    (0..count)
        .collect::<Vec<_>>()
        .chunks(CHARTS_PER_PAGE)
        .map(<[usize]>::to_vec)
        .collect()
}
