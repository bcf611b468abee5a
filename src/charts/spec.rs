//! Render-target-agnostic chart description.
//!
//! A `ChartSpec` is built fresh for each render and handed to whatever sink
//! draws it. It is intentionally not `Clone`.

use serde::Serialize;

/// How a series is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Line,
    Markers,
    LineMarkers,
    Bar,
}

/// Which y-axis a series is plotted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum YAxis {
    #[default]
    Primary,
    Secondary,
}

/// How bar series sharing an x value are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BarMode {
    Group,
    Stack,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Axis {
    pub title: String,
    /// Fixed `[min, max]`; auto-scaled when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
}

impl Axis {
    pub fn titled(title: &str) -> Self {
        Axis {
            title: title.to_string(),
            range: None,
        }
    }
}

/// One named series. `x` and `y` have the same length; `None` in `y` is a
/// gap, not zero.
#[derive(Debug, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub x: Vec<String>,
    pub y: Vec<Option<f64>>,
    pub mode: RenderMode,
    pub axis: YAxis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ChartSpec {
    /// Catalog id of the builder that produced this chart
    pub id: String,
    pub title: String,
    pub x_axis: Axis,
    pub y_axis: Axis,
    /// Present only for dual-axis charts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y2_axis: Option<Axis>,
    pub series: Vec<Series>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_mode: Option<BarMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend_title: Option<String>,
}

impl ChartSpec {
    pub fn series_named(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }

    pub fn is_dual_axis(&self) -> bool {
        self.y2_axis.is_some()
    }
}
