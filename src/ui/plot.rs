use eframe::egui::{Color32, Ui};
use egui_plot::{Legend, MarkerShape, Plot, PlotPoints, Points};
use solar_anomaly::color::{SpeedScale, ANOMALY_RGB};
use solar_anomaly::data::model::{Label, Record};

use crate::state::AppState;

/// Speed bins used to colour normal readings.
const SPEED_BINS: usize = 8;

fn unix_seconds(record_time: chrono::NaiveDateTime) -> f64 {
    record_time.and_utc().timestamp() as f64
}

// ---------------------------------------------------------------------------
// Month scatter plot (central panel)
// ---------------------------------------------------------------------------

/// Proton density against time for the selected month.
pub fn month_plot(ui: &mut Ui, state: &AppState) {
    let Some(month) = state.selected_month() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a yearly data file to begin  (File → Open…)");
        });
        return;
    };

    let detection = &month.detection;
    let normal: Vec<&Record> = match &detection.labels {
        Some(labels) => detection
            .table
            .records
            .iter()
            .zip(labels)
            .filter(|(_, l)| **l == Label::Normal)
            .map(|(r, _)| r)
            .collect(),
        None => detection.table.records.iter().filter(|r| r.is_valid()).collect(),
    };

    // Bucket normal points by speed so each bucket is one coloured series.
    let scale = SpeedScale::from_values(normal.iter().filter_map(|r| r.proton_speed));
    let mut bins: Vec<Vec<[f64; 2]>> = vec![Vec::new(); SPEED_BINS];
    for r in &normal {
        let (Some(density), Some(speed)) = (r.proton_density, r.proton_speed) else {
            continue;
        };
        let bin = scale.map_or(0, |s| {
            ((s.fraction(speed) * (SPEED_BINS - 1) as f32).round() as usize).min(SPEED_BINS - 1)
        });
        bins[bin].push([unix_seconds(r.datetime), density]);
    }

    let anomalies: Vec<[f64; 2]> = detection
        .anomalies
        .iter()
        .map(|a| [unix_seconds(a.datetime), a.proton_density])
        .collect();

    Plot::new("month_plot")
        .legend(Legend::default())
        .x_axis_label("Time (UTC)")
        .y_axis_label("Proton density (cm^-3)")
        .x_axis_formatter(|mark, _range| {
            chrono::DateTime::from_timestamp(mark.value as i64, 0)
                .map(|t| t.format("%m-%d %H:%M").to_string())
                .unwrap_or_default()
        })
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            if state.show_normal {
                let stops = scale.map(|s| s.stops(SPEED_BINS)).unwrap_or_default();
                for (i, points) in bins.into_iter().enumerate() {
                    if points.is_empty() {
                        continue;
                    }
                    let (speed, [r, g, b]) = stops.get(i).copied().unwrap_or((0.0, [70, 110, 180]));
                    plot_ui.points(
                        Points::new(PlotPoints::from(points))
                            .name(format!("≈{speed:.0} km/s"))
                            .color(Color32::from_rgb(r, g, b))
                            .radius(1.5),
                    );
                }
            }

            let [r, g, b] = ANOMALY_RGB;
            plot_ui.points(
                Points::new(PlotPoints::from(anomalies))
                    .name("Extreme anomaly")
                    .shape(MarkerShape::Cross)
                    .color(Color32::from_rgb(r, g, b))
                    .radius(7.0),
            );
        });
}
