/// Monthly anomaly-detection pipeline.
///
/// ```text
///   MonthlyTable
///        │
///        ▼
///   sanitize        (data::filter)   < 50 valid  → original table, no anomalies
///        │
///        ▼
///   range_filter    (range)          < 20 kept   → sanitized table, no anomalies
///        │
///        ▼
///   score_table     (isolation)      normal / anomalous labels
///        │
///        ▼
///   select_extremes (extreme)        anomalies with any |z| > 3
/// ```
///
/// Every stage builds a new table; the input is never modified.
pub mod extreme;
pub mod isolation;
pub mod range;
pub mod stats;

pub use extreme::{select_extremes, FeatureStats};
pub use isolation::{score_table, IsolationForest};
pub use range::{range_filter, FilterBounds};

use crate::config::DetectionConfig;
use crate::data::filter::sanitize;
use crate::data::model::{AnomalyRecord, Label, MonthlyTable};
use crate::error::Result;

/// Minimum valid records for a month to be analysed at all.
pub const MIN_VALID_RECORDS: usize = 50;

/// Minimum records that must survive the range filter.
pub const MIN_FILTERED_RECORDS: usize = 20;

/// Which table a [`Detection`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The input table, unchanged.
    Original,
    /// After missing/sentinel/non-positive readings were dropped.
    Sanitized,
    /// After the IQR range filter.
    RangeFiltered,
}

/// Why the pipeline stopped before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortCircuit {
    pub stage: Stage,
    pub needed: usize,
    pub got: usize,
}

/// Result of one pipeline run over a monthly table.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Range-filtered table, or the earlier-stage table on a short-circuit.
    pub table: MonthlyTable,
    pub stage: Stage,
    /// One label per row of `table`; `None` when scoring did not run.
    pub labels: Option<Vec<Label>>,
    /// Extreme anomalies, possibly empty.
    pub anomalies: Vec<AnomalyRecord>,
    pub short_circuit: Option<ShortCircuit>,
}

impl Detection {
    fn stopped(table: MonthlyTable, stage: Stage, needed: usize, got: usize) -> Self {
        log::debug!(
            "{}-{:02}: {got} records after {stage:?} stage, need {needed}; skipping detection",
            table.year,
            table.month
        );
        Detection {
            table,
            stage,
            labels: None,
            anomalies: Vec::new(),
            short_circuit: Some(ShortCircuit { stage, needed, got }),
        }
    }

    /// `(filtered_table, extreme_anomalies)`.
    pub fn into_parts(self) -> (MonthlyTable, Vec<AnomalyRecord>) {
        (self.table, self.anomalies)
    }

    /// Count of records the isolation forest labeled anomalous.
    pub fn flagged_count(&self) -> usize {
        self.labels
            .as_ref()
            .map_or(0, |l| l.iter().filter(|x| **x == Label::Anomalous).count())
    }
}

/// Run sanitize → range filter → isolation forest → extreme selection.
///
/// Fails with `Scoring` when the forest cannot be fitted and with
/// `DegenerateDistribution` under [`crate::config::DegeneratePolicy::Reject`].
pub fn detect_anomalies(table: &MonthlyTable, config: &DetectionConfig) -> Result<Detection> {
    config.validate()?;

    let clean = sanitize(table);
    if clean.len() < MIN_VALID_RECORDS {
        return Ok(Detection::stopped(
            table.clone(),
            Stage::Original,
            MIN_VALID_RECORDS,
            clean.len(),
        ));
    }

    let (filtered, _bounds) = range_filter(&clean, config.iqr_multiplier);
    if filtered.len() < MIN_FILTERED_RECORDS {
        let got = filtered.len();
        return Ok(Detection::stopped(clean, Stage::Sanitized, MIN_FILTERED_RECORDS, got));
    }

    let labeled = score_table(&filtered, config)?;
    let anomalies = select_extremes(&labeled, config)?;

    log::debug!(
        "{}-{:02}: {} valid, {} in range, {} flagged, {} extreme",
        table.year,
        table.month,
        clean.len(),
        filtered.len(),
        labeled.anomalous_count(),
        anomalies.len()
    );

    Ok(Detection {
        table: labeled.table,
        stage: Stage::RangeFiltered,
        labels: Some(labeled.labels),
        anomalies,
        short_circuit: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Record, MISSING_SENTINEL};
    use crate::error::DetectionError;
    use chrono::{Duration, NaiveDate};

    fn table(values: &[(f64, f64)]) -> MonthlyTable {
        let base = NaiveDate::from_ymd_opt(2003, 10, 28)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        MonthlyTable::new(
            2003,
            10,
            values
                .iter()
                .enumerate()
                .map(|(i, &(d, s))| Record::new(base + Duration::minutes(i as i64), d, s))
                .collect(),
        )
    }

    fn quiet(n: usize) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                (5.0 + (t * 0.37).sin(), 420.0 + 25.0 * (t * 0.11).cos())
            })
            .collect()
    }

    #[test]
    fn too_few_valid_records_returns_original() {
        let mut values = quiet(55);
        for v in values.iter_mut().take(10) {
            v.0 = MISSING_SENTINEL;
        }
        let t = table(&values);
        let d = detect_anomalies(&t, &DetectionConfig::default()).unwrap();

        assert_eq!(d.stage, Stage::Original);
        assert_eq!(d.table, t);
        assert!(d.anomalies.is_empty());
        assert!(d.labels.is_none());
        assert_eq!(
            d.short_circuit,
            Some(ShortCircuit {
                stage: Stage::Original,
                needed: 50,
                got: 45
            })
        );
    }

    #[test]
    fn too_few_in_range_returns_sanitized() {
        // Each feature keeps only its own tight middle band of 32 rows, and
        // the two bands overlap in 4 rows.
        let band = |i: usize, start: usize| {
            if (start..start + 32).contains(&i) {
                1000.0 + 0.001 * (i - start) as f64
            } else if i % 2 == 0 {
                1.0
            } else {
                1.0e7
            }
        };
        let mut values: Vec<(f64, f64)> = (0..60).map(|i| (band(i, 0), band(i, 28))).collect();
        values.push((MISSING_SENTINEL, 400.0));
        let t = table(&values);

        let clean = sanitize(&t);
        let (filtered, _) = range_filter(&clean, 3.0);
        assert!(clean.len() >= MIN_VALID_RECORDS);
        assert!(filtered.len() < MIN_FILTERED_RECORDS, "{}", filtered.len());

        let d = detect_anomalies(&t, &DetectionConfig::default()).unwrap();
        assert_eq!(d.stage, Stage::Sanitized);
        let (table, anomalies) = d.into_parts();
        assert_eq!(table, clean);
        assert!(anomalies.is_empty());
    }

    #[test]
    fn full_run_labels_every_filtered_row() {
        let mut values = quiet(400);
        values[200] = (9.5, 420.0);
        let t = table(&values);
        let d = detect_anomalies(&t, &DetectionConfig::default()).unwrap();

        assert_eq!(d.stage, Stage::RangeFiltered);
        assert_eq!(d.labels.as_ref().map(Vec::len), Some(d.table.len()));
        assert!(d.flagged_count() >= 1);
        assert!(d.table.is_chronological());
        assert!(d.anomalies.iter().any(|a| a.proton_density == 9.5));
        for a in &d.anomalies {
            assert!(a.density_zscore > 3.0 || a.speed_zscore > 3.0);
        }
    }

    #[test]
    fn repeated_runs_agree() {
        let t = table(&quiet(300));
        let config = DetectionConfig::default();
        let a = detect_anomalies(&t, &config).unwrap();
        let b = detect_anomalies(&t, &config).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.anomalies, b.anomalies);
    }

    #[test]
    fn constant_month_is_a_scoring_error() {
        let t = table(&[(5.0, 400.0); 80]);
        let err = detect_anomalies(&t, &DetectionConfig::default()).unwrap_err();
        assert!(matches!(err, DetectionError::Scoring(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = DetectionConfig {
            contamination: 0.9,
            ..Default::default()
        };
        assert!(detect_anomalies(&table(&quiet(60)), &config).is_err());
    }
}
