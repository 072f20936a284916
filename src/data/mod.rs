/// Data layer: core types, loading, month partitioning and sanitizing.
///
/// Architecture:
/// ```text
///  ACE_SW_Proton_Data_<year>.csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Vec<RawRow> (sentinel → None)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ calendar  │  (year, day-of-year, hour, minute) → datetime, split by month
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  keep records with valid positive readings
///   └──────────┘
/// ```

pub mod calendar;
pub mod filter;
pub mod loader;
pub mod model;
