use eframe::egui::{Color32, Ui};
use egui_plot::{Bar, BarChart, GridMark, Legend, Line, Plot, PlotPoints};
use plucking_dashboard::color::SeriesColor;
use plucking_dashboard::data::model::NormalizedSeries;
use plucking_dashboard::projection::{numeric_column, ChartShape, PlotSpec};

// ---------------------------------------------------------------------------
// Per-source chart
// ---------------------------------------------------------------------------

fn to_color32(color: SeriesColor) -> Color32 {
    let rgb = color.to_srgb();
    Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
}

/// Split a column into runs of consecutive numeric values.
///
/// x is the row index; missing values break the line instead of joining
/// across the gap.
pub fn segments(values: &[Option<f64>]) -> Vec<Vec<[f64; 2]>> {
    let mut runs = Vec::new();
    let mut current: Vec<[f64; 2]> = Vec::new();
    for (i, v) in values.iter().enumerate() {
        match v {
            Some(y) => current.push([i as f64, *y]),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Render one source's series according to its [`PlotSpec`].
pub fn source_chart(ui: &mut Ui, plot_id: &str, series: &NormalizedSeries, spec: &PlotSpec) {
    let ticks: Vec<String> = series.time_axis().map(str::to_string).collect();

    Plot::new(plot_id)
        .legend(Legend::default())
        .height(300.0)
        .x_axis_label(spec.time_axis_key.clone())
        .y_axis_label(spec.y_axis_label.clone())
        .x_axis_formatter(move |mark: GridMark, _range| {
            let x = mark.value;
            if x < 0.0 || x.fract() != 0.0 {
                return String::new();
            }
            ticks.get(x as usize).cloned().unwrap_or_default()
        })
        .allow_scroll(false)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for plotted in &spec.series {
                let color = to_color32(plotted.color);
                let values = numeric_column(series, &plotted.column);

                match spec.shape {
                    ChartShape::Line | ChartShape::Area => {
                        for run in segments(&values) {
                            let points: PlotPoints = run.into_iter().collect();
                            let mut line = Line::new(points)
                                .name(&plotted.label)
                                .color(color)
                                .width(2.0);
                            if spec.shape == ChartShape::Area {
                                line = line.fill(0.0_f32);
                            }
                            plot_ui.line(line);
                        }
                    }
                    ChartShape::Bar => {
                        let bars: Vec<Bar> = values
                            .iter()
                            .enumerate()
                            .filter_map(|(i, v)| Some(Bar::new(i as f64, (*v)?)))
                            .collect();
                        let chart = BarChart::new(bars)
                            .name(&plotted.label)
                            .color(color)
                            .width(0.8);
                        plot_ui.bar_chart(chart);
                    }
                }
            }
        });
}
