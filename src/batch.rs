//! Batch driver: every yearly file in a directory, every month in a file.

use std::path::{Path, PathBuf};

use crate::chart::{chart_path, render_month_chart};
use crate::config::{DetectionConfig, RunConfig};
use crate::data::calendar::partition_by_month;
use crate::data::filter::sanitize;
use crate::data::loader::{list_year_files, load_year_file, repair_headers, year_label};
use crate::data::model::MonthlyTable;
use crate::detect::{detect_anomalies, Detection, Stage, MIN_VALID_RECORDS};
use crate::error::Result;
use crate::report::AnomalyLog;

/// One month after detection.
#[derive(Debug, Clone)]
pub struct MonthAnalysis {
    pub raw: MonthlyTable,
    pub detection: Detection,
    /// Valid records before range filtering.
    pub valid_count: usize,
}

impl MonthAnalysis {
    pub fn year(&self) -> i32 {
        self.raw.year
    }

    pub fn month(&self) -> u32 {
        self.raw.month
    }

    /// Enough valid data to analyse and chart.
    pub fn has_enough_data(&self) -> bool {
        self.valid_count >= MIN_VALID_RECORDS
    }
}

/// Run detection on one month.
///
/// Scoring failures and degenerate distributions are logged and the month is
/// reported with no anomalies; anything else propagates.
pub fn analyze_month(raw: MonthlyTable, config: &DetectionConfig) -> Result<MonthAnalysis> {
    let clean = sanitize(&raw);
    let valid_count = clean.len();

    let detection = match detect_anomalies(&raw, config) {
        Ok(detection) => detection,
        Err(e) if e.is_recoverable() => {
            log::warn!("{}-{:02}: detection failed: {e}", raw.year, raw.month);
            Detection {
                table: clean,
                stage: Stage::Sanitized,
                labels: None,
                anomalies: Vec::new(),
                short_circuit: None,
            }
        }
        Err(e) => return Err(e),
    };

    Ok(MonthAnalysis {
        raw,
        detection,
        valid_count,
    })
}

/// Load, partition and analyse one yearly file.
pub fn analyze_year_file(path: &Path, config: &DetectionConfig) -> Result<Vec<MonthAnalysis>> {
    let rows = load_year_file(path)?;
    let months = partition_by_month(&rows)?;
    months
        .into_iter()
        .map(|month| analyze_month(month, config))
        .collect()
}

/// Outcome of one yearly file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearSummary {
    pub label: String,
    pub months: usize,
    pub records: usize,
    pub anomalies: usize,
    pub charts: usize,
}

/// Process one yearly file, appending its anomalies to `log`.
///
/// Chart failures are logged and do not abort the year.
pub fn process_year(path: &Path, config: &RunConfig, log: &mut AnomalyLog) -> Result<YearSummary> {
    let label = year_label(path, &config.file_prefix);
    log::info!("Processing {label} ({})", path.display());

    if config.repair_headers {
        repair_headers(path)?;
    }

    let analyses = analyze_year_file(path, &config.detection)?;
    let mut summary = YearSummary {
        label: label.clone(),
        months: analyses.len(),
        records: 0,
        anomalies: 0,
        charts: 0,
    };

    for analysis in &analyses {
        summary.records += analysis.raw.len();
        summary.anomalies += analysis.detection.anomalies.len();
        log.push_month(&analysis.detection.anomalies);

        if !config.graphs {
            continue;
        }
        if !analysis.has_enough_data() {
            log::info!(
                "Skipping chart for {label} month {:02}: {} valid records",
                analysis.month(),
                analysis.valid_count
            );
            continue;
        }
        let out = chart_path(&config.graphs_dir(), &label, analysis.month());
        match render_month_chart(&analysis.raw, &analysis.detection, &out) {
            Ok(()) => summary.charts += 1,
            Err(e) => log::warn!("Chart for {label} month {:02} failed: {e}", analysis.month()),
        }
    }

    log::info!(
        "{label}: {} months, {} records, {} anomalies",
        summary.months,
        summary.records,
        summary.anomalies
    );
    Ok(summary)
}

/// Outcome of a whole batch run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub years: Vec<YearSummary>,
    /// Files that failed, with the error text.
    pub failed: Vec<(PathBuf, String)>,
    pub total_anomalies: usize,
    /// Master log path, when one was written.
    pub log_path: Option<PathBuf>,
}

/// Process every yearly file under `config.input_dir`.
///
/// A failing file is logged and skipped; the master log is written only
/// when at least one anomaly was found.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    config.detection.validate()?;
    std::fs::create_dir_all(&config.output_dir)?;
    if config.graphs {
        std::fs::create_dir_all(config.graphs_dir())?;
    }

    let files = list_year_files(&config.input_dir)?;
    if files.is_empty() {
        log::warn!("No data files found in {}", config.input_dir.display());
    }

    let mut log = AnomalyLog::new();
    let mut summary = RunSummary::default();

    for path in files {
        let mut year_log = AnomalyLog::new();
        match process_year(&path, config, &mut year_log) {
            Ok(year) => {
                log.merge(year_log);
                summary.years.push(year);
            }
            Err(e) => {
                log::error!("Failed to process {}: {e}", path.display());
                summary.failed.push((path, e.to_string()));
            }
        }
    }

    summary.total_anomalies = log.len();
    let log_path = config.log_path();
    if log.write_to(&log_path)? {
        log::info!("Wrote {} anomalies to {}", log.len(), log_path.display());
        summary.log_path = Some(log_path);
    } else {
        log::info!("No anomalies detected across all data.");
    }

    Ok(summary)
}
