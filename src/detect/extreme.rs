//! Narrows isolation-forest anomalies to statistically extreme readings.

use super::stats::{mean, std_dev};
use crate::config::{DegeneratePolicy, DetectionConfig};
use crate::data::model::{AnomalyRecord, Feature, LabeledTable, MonthlyTable, Record};
use crate::error::{DetectionError, Result};

/// Mean and sample standard deviation of one feature over a table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl FeatureStats {
    pub fn of(table: &MonthlyTable, feature: Feature) -> Self {
        let values = table.values(feature);
        FeatureStats {
            mean: mean(&values),
            std_dev: std_dev(&values),
        }
    }

    /// Zero or undefined spread.
    pub fn is_degenerate(&self) -> bool {
        !(self.std_dev.is_finite() && self.std_dev > 0.0)
    }

    pub fn zscore(&self, value: f64) -> f64 {
        ((value - self.mean) / self.std_dev).abs()
    }
}

/// Keep the anomalous records whose z-score exceeds the threshold on at
/// least one feature.
///
/// Statistics come from the whole labeled table, not only the anomalous
/// rows. With no anomalous rows nothing is computed.
pub fn select_extremes(labeled: &LabeledTable, config: &DetectionConfig) -> Result<Vec<AnomalyRecord>> {
    let anomalous: Vec<&Record> = labeled.anomalous().collect();
    if anomalous.is_empty() {
        return Ok(Vec::new());
    }

    let density = usable_stats(&labeled.table, Feature::ProtonDensity, config.degenerate_policy)?;
    let speed = usable_stats(&labeled.table, Feature::ProtonSpeed, config.degenerate_policy)?;

    let zscore = |stats: Option<FeatureStats>, value: f64| stats.map_or(0.0, |s| s.zscore(value));

    Ok(anomalous
        .into_iter()
        .filter_map(|record| {
            let proton_density = record.proton_density?;
            let proton_speed = record.proton_speed?;
            Some(AnomalyRecord {
                year: labeled.table.year,
                month: labeled.table.month,
                datetime: record.datetime,
                proton_density,
                proton_speed,
                density_zscore: zscore(density, proton_density),
                speed_zscore: zscore(speed, proton_speed),
            })
        })
        .filter(|a| a.density_zscore > config.zscore_threshold || a.speed_zscore > config.zscore_threshold)
        .collect())
}

/// `None` when the feature is degenerate and the policy says to ignore it.
fn usable_stats(
    table: &MonthlyTable,
    feature: Feature,
    policy: DegeneratePolicy,
) -> Result<Option<FeatureStats>> {
    let stats = FeatureStats::of(table, feature);
    if !stats.is_degenerate() {
        return Ok(Some(stats));
    }
    match policy {
        DegeneratePolicy::NonExtreme => {
            log::debug!(
                "{feature} has zero spread in {}-{:02}; treating as non-extreme",
                table.year,
                table.month
            );
            Ok(None)
        }
        DegeneratePolicy::Reject => Err(DetectionError::DegenerateDistribution { feature }),
    }
}
