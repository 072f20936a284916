mod app;
mod state;
mod ui;

use app::AnomalyViewerApp;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    let mut app = AnomalyViewerApp::default();
    if let Some(path) = std::env::args_os().nth(1) {
        let path = std::path::PathBuf::from(path);
        if let Err(e) = app.state.load_year(&path) {
            log::error!("Failed to load {}: {e}", path.display());
            app.state.status_message = Some(format!("Error: {e}"));
        }
    }

    eframe::run_native(
        "Solar Wind Anomaly Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(app))),
    )
}
