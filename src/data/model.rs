use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Value used by the ACE exports for "measurement unavailable".
pub const MISSING_SENTINEL: f64 = -9999.9;

/// Canonical column order of a yearly proton file.
pub const COLUMNS: [&str; 6] = [
    "Year",
    "Day",
    "Hour",
    "Minute",
    "proton_density",
    "proton_speed",
];

/// Turn a raw reading into an optional value: NaN and the sentinel become `None`.
pub fn normalize_reading(value: f64) -> Option<f64> {
    if value.is_nan() || value == MISSING_SENTINEL {
        None
    } else {
        Some(value)
    }
}

// ---------------------------------------------------------------------------
// Feature – one measured quantity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    ProtonDensity,
    ProtonSpeed,
}

impl Feature {
    /// Both features, in column order.
    pub const ALL: [Feature; 2] = [Feature::ProtonDensity, Feature::ProtonSpeed];

    pub fn column(self) -> &'static str {
        match self {
            Feature::ProtonDensity => "proton_density",
            Feature::ProtonSpeed => "proton_speed",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Feature::ProtonDensity => "cm^-3",
            Feature::ProtonSpeed => "km/s",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

// ---------------------------------------------------------------------------
// RawRow – one line of a yearly file, before date reconstruction
// ---------------------------------------------------------------------------

/// A row as read from disk. Readings are already sentinel-normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub year: i32,
    pub day: i64,
    pub hour: i64,
    pub minute: i64,
    pub proton_density: Option<f64>,
    pub proton_speed: Option<f64>,
}

// ---------------------------------------------------------------------------
// Record – one sensor sample with a reconstructed timestamp
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub datetime: NaiveDateTime,
    pub proton_density: Option<f64>,
    pub proton_speed: Option<f64>,
}

impl Record {
    pub fn new(datetime: NaiveDateTime, proton_density: f64, proton_speed: f64) -> Self {
        Record {
            datetime,
            proton_density: normalize_reading(proton_density),
            proton_speed: normalize_reading(proton_speed),
        }
    }

    pub fn value(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::ProtonDensity => self.proton_density,
            Feature::ProtonSpeed => self.proton_speed,
        }
    }

    /// Both readings present, not the sentinel, and strictly positive.
    pub fn is_valid(&self) -> bool {
        Feature::ALL.iter().all(|&f| {
            self.value(f)
                .is_some_and(|v| v != MISSING_SENTINEL && v > 0.0)
        })
    }
}

// ---------------------------------------------------------------------------
// MonthlyTable – records of one calendar month
// ---------------------------------------------------------------------------

/// Records of a single calendar month, ordered by `datetime` ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTable {
    pub year: i32,
    /// Calendar month, 1–12.
    pub month: u32,
    pub records: Vec<Record>,
}

impl MonthlyTable {
    pub fn new(year: i32, month: u32, records: Vec<Record>) -> Self {
        MonthlyTable {
            year,
            month,
            records,
        }
    }

    /// A table derived from this one (same year/month, different rows).
    pub fn derive(&self, records: Vec<Record>) -> Self {
        MonthlyTable::new(self.year, self.month, records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of `feature`, skipping missing readings.
    pub fn values(&self, feature: Feature) -> Vec<f64> {
        self.records.iter().filter_map(|r| r.value(feature)).collect()
    }

    pub fn is_chronological(&self) -> bool {
        self.records
            .windows(2)
            .all(|w| w[0].datetime <= w[1].datetime)
    }
}

// ---------------------------------------------------------------------------
// Labels and anomaly records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Normal,
    Anomalous,
}

/// A filtered table with one isolation label and score per record.
#[derive(Debug, Clone)]
pub struct LabeledTable {
    pub table: MonthlyTable,
    pub labels: Vec<Label>,
    pub scores: Vec<f64>,
}

impl LabeledTable {
    /// Records labeled [`Label::Anomalous`], in table order.
    pub fn anomalous(&self) -> impl Iterator<Item = &Record> {
        self.table
            .records
            .iter()
            .zip(&self.labels)
            .filter(|(_, label)| **label == Label::Anomalous)
            .map(|(record, _)| record)
    }

    pub fn anomalous_count(&self) -> usize {
        self.labels
            .iter()
            .filter(|l| **l == Label::Anomalous)
            .count()
    }
}

/// An extreme anomaly, ready for the master log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub year: i32,
    /// Calendar month, 1-indexed.
    pub month: u32,
    pub datetime: NaiveDateTime,
    pub proton_density: f64,
    pub proton_speed: f64,
    pub density_zscore: f64,
    pub speed_zscore: f64,
}

impl AnomalyRecord {
    pub fn zscore(&self, feature: Feature) -> f64 {
        match feature {
            Feature::ProtonDensity => self.density_zscore,
            Feature::ProtonSpeed => self.speed_zscore,
        }
    }
}
