//! Quartile-based range filter.
//!
//! Removes gross instrument-fault outliers before the isolation forest is
//! fitted. The multiplier defaults to 3 (wider than the usual 1.5) so that
//! genuine solar-wind disturbances survive.

use super::stats::quantile_sorted;
use crate::data::model::{Feature, MonthlyTable, Record};

/// Inclusive acceptance interval for one feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterBounds {
    pub feature: Feature,
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl FilterBounds {
    /// Bounds `[Q1 - k·IQR, Q3 + k·IQR]` over the feature's present values.
    ///
    /// Returns `None` when the table has no value for the feature.
    pub fn compute(table: &MonthlyTable, feature: Feature, multiplier: f64) -> Option<Self> {
        let mut values = table.values(feature);
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let q1 = quantile_sorted(&values, 0.25);
        let q3 = quantile_sorted(&values, 0.75);
        let iqr = q3 - q1;

        Some(FilterBounds {
            feature,
            q1,
            q3,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    fn accepts(&self, record: &Record) -> bool {
        record.value(self.feature).is_some_and(|v| self.contains(v))
    }
}

/// Keep records inside the bounds of every feature, in their original order.
///
/// Returns the filtered table and the bounds used.
pub fn range_filter(table: &MonthlyTable, multiplier: f64) -> (MonthlyTable, Vec<FilterBounds>) {
    let bounds: Vec<FilterBounds> = Feature::ALL
        .iter()
        .filter_map(|&f| FilterBounds::compute(table, f, multiplier))
        .collect();

    if bounds.len() < Feature::ALL.len() {
        return (table.derive(Vec::new()), bounds);
    }

    let records = table
        .records
        .iter()
        .filter(|r| bounds.iter().all(|b| b.accepts(r)))
        .cloned()
        .collect();

    (table.derive(records), bounds)
}
