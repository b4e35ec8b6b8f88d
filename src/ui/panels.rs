use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};
use plucking_dashboard::data::export::write_csv;
use plucking_dashboard::pipeline::{LoadStatus, SourceData, SourceOutcome};
use plucking_dashboard::projection::{project, ViewMode};

use crate::state::AppState;
use crate::ui::plot;

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top toolbar: view selector, reload, load summary.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.strong("U-rate gaps");
        ui.separator();

        ui.label("Chart type:");
        let current = state
            .view()
            .map(|v| v.title.clone())
            .unwrap_or_default();
        let mut selected: Option<String> = None;
        egui::ComboBox::from_id_salt("view_mode")
            .selected_text(current)
            .show_ui(ui, |ui: &mut Ui| {
                for view in &state.config.views {
                    if ui
                        .selectable_label(view.name == state.view_name, &view.title)
                        .clicked()
                    {
                        selected = Some(view.name.clone());
                    }
                }
            });
        if let Some(name) = selected {
            state.set_view(&name);
        }

        ui.separator();

        if ui
            .add_enabled(!state.loading(), egui::Button::new("Reload"))
            .clicked()
        {
            let ctx = ui.ctx().clone();
            state.start_load(&ctx);
        }

        if state.loading() {
            ui.spinner();
        } else if let Some(report) = &state.report {
            ui.label(format!(
                "{} of {} sources loaded",
                report.loaded(),
                report.sources.len()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Left side panel – source listing
// ---------------------------------------------------------------------------

/// Render the configured sources with their last load status.
pub fn side_panel(ui: &mut Ui, state: &AppState) {
    ui.heading("Sources");
    ui.separator();

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto())
        .column(Column::remainder())
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("Country");
            });
            header.col(|ui| {
                ui.strong("Status");
            });
        })
        .body(|mut body| {
            for entry in state.config.sources.entries() {
                let outcome = state.report.as_ref().and_then(|r| r.outcome(&entry.key));
                body.row(18.0, |mut row| {
                    row.col(|ui| {
                        ui.label(&entry.label).on_hover_text(&entry.locator);
                    });
                    row.col(|ui| match outcome.map(|o| &o.result) {
                        None => {
                            ui.weak("pending");
                        }
                        Some(Ok(data)) => {
                            ui.label(format!("{} rows", data.series.len()));
                        }
                        Some(Err(e)) => {
                            ui.label(RichText::new("unavailable").color(Color32::from_rgb(176, 110, 0)))
                                .on_hover_text(e.to_string());
                        }
                    });
                });
            }
        });
}

// ---------------------------------------------------------------------------
// Central panel – charts
// ---------------------------------------------------------------------------

/// Render one card per source, two per row, in registry order.
pub fn charts(ui: &mut Ui, state: &mut AppState) {
    let Some(report) = &state.report else {
        ui.centered_and_justified(|ui: &mut Ui| {
            if state.loading() {
                ui.spinner();
            } else {
                ui.heading("No data loaded.");
            }
        });
        return;
    };

    match report.status {
        LoadStatus::TotalFailure => {
            ui.label(
                RichText::new("Error: failed to load data for any source. Check the logs for details.")
                    .color(Color32::RED)
                    .strong(),
            );
            ui.separator();
        }
        LoadStatus::NoSources => {
            ui.label("No sources configured.");
            return;
        }
        LoadStatus::Complete | LoadStatus::Partial => {}
    }

    let Some(view) = state.view() else {
        return;
    };
    let non_plottable = &state.config.non_plottable_keys;
    let delimiter = state.config.parser.delimiter;
    let mut export: Option<&SourceData> = None;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for pair in report.sources.chunks(2) {
                ui.columns(2, |cols| {
                    for (col, outcome) in cols.iter_mut().zip(pair) {
                        if source_card(col, outcome, view, non_plottable) {
                            export = outcome.result.as_ref().ok();
                        }
                    }
                });
                ui.add_space(12.0);
            }
        });

    if let Some(data) = export {
        let result = export_csv_dialog(data, delimiter);
        if let Err(e) = result {
            log::error!("Failed to export CSV: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}

/// Draw one source. Returns true when its export button was clicked.
fn source_card(
    ui: &mut Ui,
    outcome: &SourceOutcome,
    view: &ViewMode,
    non_plottable: &[String],
) -> bool {
    let entry = &outcome.entry;
    let mut export_clicked = false;

    egui::Frame::group(ui.style()).show(ui, |ui: &mut Ui| {
        match &outcome.result {
            Ok(data) => {
                ui.horizontal(|ui: &mut Ui| {
                    ui.heading(&entry.label);
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        export_clicked = ui.button("Export CSV…").clicked();
                    });
                });

                let spec = project(&data.series, view, non_plottable);
                plot::source_chart(ui, &format!("plot_{}", entry.key), &data.series, &spec);

                ui.separator();
                ui.small(format!("Source: {}", data.meta.origin_locator));
                ui.small(format!(
                    "Last updated: {}",
                    data.meta.fetched_at.format("%Y-%m-%d %H:%M UTC")
                ));
                if !data.meta.warnings.is_empty() {
                    ui.small(
                        RichText::new(format!("{} parse warnings", data.meta.warnings.len()))
                            .color(Color32::from_rgb(176, 110, 0)),
                    )
                    .on_hover_text(
                        data.meta
                            .warnings
                            .iter()
                            .map(|w| w.to_string())
                            .collect::<Vec<_>>()
                            .join("\n"),
                    );
                }
            }
            Err(e) => {
                ui.heading(&entry.label);
                ui.label(
                    RichText::new("Data not available.").color(Color32::from_rgb(176, 110, 0)),
                );
                ui.small(e.to_string());
            }
        }
    });

    export_clicked
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn export_csv_dialog(data: &SourceData, delimiter: u8) -> Result<()> {
    let file = rfd::FileDialog::new()
        .set_title("Export data")
        .set_file_name(format!("{}.csv", data.meta.source_key))
        .add_filter("CSV", &["csv"])
        .save_file();

    if let Some(path) = file {
        write_export(&path, data, delimiter)?;
        log::info!("Exported {} rows to {}", data.series.len(), path.display());
    }
    Ok(())
}

fn write_export(path: &Path, data: &SourceData, delimiter: u8) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_csv(&data.series, delimiter, BufWriter::new(file))
        .with_context(|| format!("writing CSV to {}", path.display()))
}
