//! Charts: planning via the LLM, the declarative spec format, and rasterization.

pub mod planner;
pub mod render;
pub mod spec;

pub use planner::{ChartPlanner, parse_chart_plan, strip_code_fence};
pub use render::{Figure, RenderedChart, render_all, render_chart};
pub use spec::{Aggregation, ChartKind, ChartSpec, PlotSpec};
