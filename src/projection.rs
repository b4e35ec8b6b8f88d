//! Chart projection: which columns of a series to draw, in what colour and
//! under what name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::color::{hue_for, HexColor, SeriesColor};
use crate::data::model::NormalizedSeries;

// ---------------------------------------------------------------------------
// View modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartShape {
    #[default]
    Line,
    Area,
    Bar,
}

/// A named preset: column selection, shape, and per-column overrides.
///
/// Switching view modes only changes the projection; the series is shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewMode {
    pub name: String,
    pub title: String,
    /// `None` plots every column except the time axis and non-plottable keys.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub shape: ChartShape,
    #[serde(default)]
    pub colors: BTreeMap<String, HexColor>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub y_axis_label: Option<String>,
}

impl ViewMode {
    /// Every plottable column as lines, generated colours, raw names.
    pub fn all_columns() -> Self {
        Self {
            name: "all".into(),
            title: "All columns".into(),
            columns: None,
            shape: ChartShape::Line,
            colors: BTreeMap::new(),
            labels: BTreeMap::new(),
            y_axis_label: None,
        }
    }

    /// U-rate against its floor, as lines.
    pub fn urate_line() -> Self {
        Self {
            name: "urate-line".into(),
            title: "U-rate and U-rate floor".into(),
            columns: Some(vec!["urate".into(), "urate_ceiling".into()]),
            shape: ChartShape::Line,
            colors: hex_map(&[("urate", "#000000"), ("urate_ceiling", "#FF0000")]),
            labels: label_map(&[("urate", "U-rate"), ("urate_ceiling", "U-rate floor")]),
            y_axis_label: Some("%".into()),
        }
    }

    /// The u-rate gap alone, as a filled area.
    pub fn urate_gap() -> Self {
        Self {
            name: "urate-gap".into(),
            title: "U-rate gap".into(),
            columns: Some(vec!["urate_gap".into()]),
            shape: ChartShape::Area,
            colors: hex_map(&[("urate_gap", "#FF7F50")]),
            labels: label_map(&[("urate_gap", "U-rate gap")]),
            y_axis_label: Some("pp".into()),
        }
    }
}

fn hex_map(pairs: &[(&str, &str)]) -> BTreeMap<String, HexColor> {
    pairs
        .iter()
        .filter_map(|(k, v)| Some((k.to_string(), v.parse::<HexColor>().ok()?)))
        .collect()
}

fn label_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// PlotSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlottedSeries {
    pub column: String,
    pub label: String,
    pub color: SeriesColor,
}

/// Everything a renderer needs to draw one chart, independent of the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotSpec {
    pub time_axis_key: String,
    pub shape: ChartShape,
    pub series: Vec<PlottedSeries>,
    pub y_axis_label: String,
}

impl PlotSpec {
    pub fn plotted_columns(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.column.as_str())
    }

    pub fn color_of(&self, column: &str) -> Option<SeriesColor> {
        self.find(column).map(|s| s.color)
    }

    pub fn label_of(&self, column: &str) -> Option<&str> {
        self.find(column).map(|s| s.label.as_str())
    }

    fn find(&self, column: &str) -> Option<&PlottedSeries> {
        self.series.iter().find(|s| s.column == column)
    }
}

/// Resolve the plotted columns, colours and labels for one chart.
///
/// Deterministic: the same inputs always produce the same [`PlotSpec`].
pub fn project(series: &NormalizedSeries, view: &ViewMode, non_plottable: &[String]) -> PlotSpec {
    let time_axis_key = series.time_axis_key();

    let columns: Vec<String> = match &view.columns {
        Some(explicit) => {
            let mut unique: Vec<String> = Vec::with_capacity(explicit.len());
            for c in explicit {
                if !unique.contains(c) {
                    unique.push(c.clone());
                }
            }
            unique
        }
        None => series
            .records()
            .first()
            .map(|first| {
                first
                    .columns()
                    .filter(|c| *c != time_axis_key && !non_plottable.iter().any(|n| n == *c))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    let count = columns.len();
    let plotted: Vec<PlottedSeries> = columns
        .into_iter()
        .enumerate()
        .map(|(position, column)| {
            let color = match view.colors.get(&column) {
                Some(hex) => SeriesColor::Explicit(*hex),
                None => SeriesColor::Derived {
                    hue: hue_for(position, count),
                },
            };
            let label = view
                .labels
                .get(&column)
                .cloned()
                .unwrap_or_else(|| column.clone());
            PlottedSeries {
                column,
                label,
                color,
            }
        })
        .collect();

    let y_axis_label = view.y_axis_label.clone().unwrap_or_else(|| {
        if plotted.iter().any(|s| s.column == "urate_gap") {
            "pp".to_string()
        } else {
            "%".to_string()
        }
    });

    PlotSpec {
        time_axis_key: time_axis_key.to_string(),
        shape: view.shape,
        series: plotted,
        y_axis_label,
    }
}

/// Numeric values of `column` in row order; `None` where missing or non-numeric.
pub fn numeric_column(series: &NormalizedSeries, column: &str) -> Vec<Option<f64>> {
    series
        .records()
        .iter()
        .map(|r| r.get(column).and_then(|v| v.parse::<f64>().ok()))
        .collect()
}
