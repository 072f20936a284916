use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};
use solar_anomaly::data::loader::DATA_EXTENSIONS;
use solar_anomaly::detect::Stage;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – month list
// ---------------------------------------------------------------------------

/// Render the month selector.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Months");
    ui.separator();

    if state.months.is_empty() {
        ui.label("No data loaded.");
        return;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for (i, month) in state.months.iter().enumerate() {
                let count = month.detection.anomalies.len();
                let mut text = RichText::new(format!(
                    "{}-{:02}   {} rec   {} anomalies",
                    month.year(),
                    month.month(),
                    month.raw.len(),
                    count
                ));
                if count > 0 {
                    text = text.strong();
                }
                if !month.has_enough_data() {
                    text = text.color(Color32::GRAY);
                }
                if ui.selectable_label(state.selected == Some(i), text).clicked() {
                    state.selected = Some(i);
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Bottom panel – anomaly table
// ---------------------------------------------------------------------------

/// Table of the selected month's extreme anomalies.
pub fn anomaly_table(ui: &mut Ui, state: &AppState) {
    let Some(month) = state.selected_month() else {
        return;
    };
    let detection = &month.detection;

    ui.horizontal(|ui: &mut Ui| {
        ui.strong(format!("{}-{:02}", month.year(), month.month()));
        ui.label(format!(
            "{} valid, {} after range filter, {} flagged, {} extreme",
            month.valid_count,
            if detection.stage == Stage::RangeFiltered {
                detection.table.len().to_string()
            } else {
                "-".to_string()
            },
            detection.flagged_count(),
            detection.anomalies.len()
        ));
        if let Some(sc) = &detection.short_circuit {
            ui.label(
                RichText::new(format!("skipped: {} of {} records needed", sc.got, sc.needed))
                    .color(Color32::GRAY),
            );
        }
    });

    if detection.anomalies.is_empty() {
        return;
    }

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().at_least(150.0))
        .column(Column::auto().at_least(110.0))
        .column(Column::auto().at_least(80.0))
        .column(Column::auto().at_least(110.0))
        .column(Column::remainder())
        .header(20.0, |mut header| {
            for title in ["Time", "Density (cm^-3)", "Density Z", "Speed (km/s)", "Speed Z"] {
                header.col(|ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|mut body| {
            for a in &detection.anomalies {
                body.row(18.0, |mut row| {
                    row.col(|ui| {
                        ui.label(a.datetime.format("%Y-%m-%d %H:%M").to_string());
                    });
                    row.col(|ui| {
                        ui.label(format!("{:.2}", a.proton_density));
                    });
                    row.col(|ui| {
                        ui.label(format!("{:.2}", a.density_zscore));
                    });
                    row.col(|ui| {
                        ui.label(format!("{:.1}", a.proton_speed));
                    });
                    row.col(|ui| {
                        ui.label(format!("{:.2}", a.speed_zscore));
                    });
                });
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if state.source.is_some() {
            ui.label(format!(
                "{}: {} months, {} anomalies",
                state.label,
                state.months.len(),
                state.total_anomalies()
            ));
            ui.separator();

            ui.label("Seed");
            let seed_changed = ui
                .add(egui::DragValue::new(&mut state.config.seed))
                .lost_focus();
            let rerun_clicked = ui.button("Re-run").clicked();
            if seed_changed || rerun_clicked {
                state.rerun();
            }

            ui.separator();
            ui.checkbox(&mut state.show_normal, "Normal readings");
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open yearly proton data")
        .add_filter("Supported files", &DATA_EXTENSIONS[..])
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        match state.load_year(&path) {
            Ok(()) => {
                log::info!(
                    "Loaded {}: {} months, {} anomalies",
                    path.display(),
                    state.months.len(),
                    state.total_anomalies()
                );
            }
            Err(e) => {
                log::error!("Failed to load file: {e}");
                state.status_message = Some(format!("Error: {e}"));
            }
        }
    }
}
