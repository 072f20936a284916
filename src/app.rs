use eframe::egui;

use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct AnomalyViewerApp {
    pub state: AppState,
}

impl eframe::App for AnomalyViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: months ----
        egui::SidePanel::left("month_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Bottom panel: anomaly table ----
        egui::TopBottomPanel::bottom("anomaly_panel")
            .resizable(true)
            .default_height(180.0)
            .show(ctx, |ui| {
                panels::anomaly_table(ui, &self.state);
            });

        // ---- Central panel: plot ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::month_plot(ui, &self.state);
        });
    }
}
