use std::path::{Path, PathBuf};

use solar_anomaly::batch::{analyze_year_file, MonthAnalysis};
use solar_anomaly::config::DetectionConfig;
use solar_anomaly::data::loader::year_label;
use solar_anomaly::Result;

const FILE_PREFIX: &str = "ACE_SW_Proton_Data_";

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Yearly file currently shown (None until the user opens one).
    pub source: Option<PathBuf>,

    /// Year label derived from the file name.
    pub label: String,

    /// Detection results, one per calendar month present in the file.
    pub months: Vec<MonthAnalysis>,

    /// Index into `months` of the month being plotted.
    pub selected: Option<usize>,

    /// Parameters used for the current results.
    pub config: DetectionConfig,

    /// Draw normal readings as well as anomalies.
    pub show_normal: bool,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            source: None,
            label: String::new(),
            months: Vec::new(),
            selected: None,
            config: DetectionConfig::default(),
            show_normal: true,
            status_message: None,
        }
    }
}

impl AppState {
    /// Load and analyse a yearly file, selecting its first month.
    pub fn load_year(&mut self, path: &Path) -> Result<()> {
        let months = analyze_year_file(path, &self.config)?;
        self.label = year_label(path, FILE_PREFIX);
        self.selected = if months.is_empty() { None } else { Some(0) };
        self.months = months;
        self.source = Some(path.to_path_buf());
        self.status_message = None;
        Ok(())
    }

    /// Re-run detection on the current file with the current config.
    pub fn rerun(&mut self) {
        let Some(path) = self.source.clone() else {
            return;
        };
        let previous = self.selected;
        if let Err(e) = self.load_year(&path) {
            log::error!("Re-running detection failed: {e}");
            self.status_message = Some(format!("Error: {e}"));
            return;
        }
        if previous.is_some_and(|i| i < self.months.len()) {
            self.selected = previous;
        }
    }

    pub fn selected_month(&self) -> Option<&MonthAnalysis> {
        self.selected.and_then(|i| self.months.get(i))
    }

    pub fn total_anomalies(&self) -> usize {
        self.months.iter().map(|m| m.detection.anomalies.len()).sum()
    }
}
