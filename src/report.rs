//! Cross-month anomaly accumulation and the master log.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::data::model::{AnomalyRecord, Feature};
use crate::error::Result;

/// Accumulates extreme anomalies over a run.
///
/// Owned by the driver and passed explicitly; per-year logs can be built
/// independently and combined with [`AnomalyLog::merge`].
#[derive(Debug, Clone, Default)]
pub struct AnomalyLog {
    entries: Vec<AnomalyRecord>,
}

impl AnomalyLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one month's anomalies.
    pub fn push_month(&mut self, anomalies: &[AnomalyRecord]) {
        self.entries.extend_from_slice(anomalies);
    }

    pub fn merge(&mut self, other: AnomalyLog) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by timestamp ascending (stable for equal timestamps).
    pub fn sorted(&self) -> Vec<&AnomalyRecord> {
        let mut sorted: Vec<&AnomalyRecord> = self.entries.iter().collect();
        sorted.sort_by_key(|a| a.datetime);
        sorted
    }

    /// Anomaly count per year, ascending by year.
    pub fn year_counts(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for a in &self.entries {
            *counts.entry(a.year).or_insert(0) += 1;
        }
        counts
    }

    /// Render the master log text.
    pub fn render(&self, generated_at: NaiveDateTime) -> String {
        let sorted = self.sorted();
        let mut out = String::new();
        let rule = "=".repeat(60);

        let _ = writeln!(out, "MASTER ANOMALY LOG - SOLAR WIND DATA");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Total anomalies detected: {}", sorted.len());
        let _ = writeln!(out, "Generated on: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "{rule}");
        out.push('\n');

        let mut current: Option<i32> = None;
        let mut year_count = 0usize;

        for a in &sorted {
            if current != Some(a.year) {
                if let Some(year) = current {
                    write_year_total(&mut out, year, year_count);
                }
                current = Some(a.year);
                year_count = 0;
                let _ = writeln!(out, "YEAR {}", a.year);
                let _ = writeln!(out, "{}", "=".repeat(20));
            }

            year_count += 1;
            let _ = writeln!(
                out,
                "#{year_count:03} | Month {:02} | {}",
                a.month,
                a.datetime.format("%Y-%m-%d %H:%M:%S")
            );
            for (name, feature, value) in [
                ("Proton Density", Feature::ProtonDensity, a.proton_density),
                ("Proton Speed", Feature::ProtonSpeed, a.proton_speed),
            ] {
                let _ = writeln!(
                    out,
                    "     {name}: {value:.2} {} (Z-score: {:.2})",
                    feature.unit(),
                    a.zscore(feature)
                );
            }
            out.push('\n');
        }

        if let Some(year) = current {
            write_year_total(&mut out, year, year_count);
        }

        let _ = writeln!(out, "SUMMARY STATISTICS");
        let _ = writeln!(out, "{}", "=".repeat(30));
        for (year, count) in self.year_counts() {
            let _ = writeln!(out, "{year}: {count} anomalies");
        }

        out
    }

    /// Write the master log to `path`, stamped with the current local time.
    ///
    /// Returns `false` without touching the filesystem when the log is empty.
    pub fn write_to(&self, path: &Path) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = self.render(chrono::Local::now().naive_local());
        std::fs::write(path, text)?;
        Ok(true)
    }
}

fn write_year_total(out: &mut String, year: i32, count: usize) {
    let _ = writeln!(out, "Year {year} total: {count} anomalies");
    let _ = writeln!(out, "{}", "-".repeat(40));
    out.push('\n');
}
