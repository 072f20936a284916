use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use super::model::{MonthlyTable, RawRow, Record};
use crate::error::{DetectionError, Result};

// ---------------------------------------------------------------------------
// Day-of-year reconstruction
// ---------------------------------------------------------------------------

/// Build a timestamp from `(year, day-of-year, hour, minute)`.
///
/// Day 366 is accepted only in leap years.
pub fn reconstruct_datetime(year: i32, day: i64, hour: i64, minute: i64) -> Result<NaiveDateTime> {
    let malformed = || {
        DetectionError::DataFormat(format!(
            "invalid timestamp components year={year} day={day} hour={hour} minute={minute}"
        ))
    };

    let day = u32::try_from(day).map_err(|_| malformed())?;
    let hour = u32::try_from(hour).map_err(|_| malformed())?;
    let minute = u32::try_from(minute).map_err(|_| malformed())?;

    NaiveDate::from_yo_opt(year, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(malformed)
}

// ---------------------------------------------------------------------------
// Month partitioning
// ---------------------------------------------------------------------------

/// Split a year of raw rows into monthly tables, ascending by month.
///
/// Within a month, records are ordered by timestamp; rows sharing a
/// timestamp keep their file order. The first malformed row fails the
/// whole year.
pub fn partition_by_month(rows: &[RawRow]) -> Result<Vec<MonthlyTable>> {
    let mut months: BTreeMap<(i32, u32), Vec<Record>> = BTreeMap::new();

    for (line, row) in rows.iter().enumerate() {
        let datetime = reconstruct_datetime(row.year, row.day, row.hour, row.minute)
            .map_err(|e| DetectionError::DataFormat(format!("row {line}: {e}")))?;
        months
            .entry((datetime.year(), datetime.month()))
            .or_default()
            .push(Record {
                datetime,
                proton_density: row.proton_density,
                proton_speed: row.proton_speed,
            });
    }

    Ok(months
        .into_iter()
        .map(|((year, month), mut records)| {
            records.sort_by_key(|r| r.datetime);
            MonthlyTable::new(year, month, records)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn row(year: i32, day: i64, hour: i64, minute: i64, density: f64) -> RawRow {
        RawRow {
            year,
            day,
            hour,
            minute,
            proton_density: Some(density),
            proton_speed: Some(400.0),
        }
    }

    #[test]
    fn day_one_is_january_first() {
        let dt = reconstruct_datetime(2008, 1, 0, 0).unwrap();
        assert_eq!((dt.month(), dt.day()), (1, 1));
    }

    #[test]
    fn day_365_differs_between_leap_and_common_years() {
        let leap = reconstruct_datetime(2008, 365, 12, 30).unwrap();
        assert_eq!((leap.month(), leap.day()), (12, 30));
        assert_eq!((leap.hour(), leap.minute()), (12, 30));

        let common = reconstruct_datetime(2007, 365, 0, 0).unwrap();
        assert_eq!((common.month(), common.day()), (12, 31));
    }

    #[test]
    fn day_366_only_in_leap_years() {
        let leap = reconstruct_datetime(2008, 366, 23, 59).unwrap();
        assert_eq!((leap.month(), leap.day()), (12, 31));

        assert!(reconstruct_datetime(2000, 366, 0, 0).is_ok());
        assert!(matches!(
            reconstruct_datetime(2007, 366, 0, 0),
            Err(DetectionError::DataFormat(_))
        ));
        assert!(reconstruct_datetime(1900, 366, 0, 0).is_err());
    }

    #[test]
    fn leap_day_is_day_60() {
        let dt = reconstruct_datetime(2012, 60, 0, 0).unwrap();
        assert_eq!((dt.month(), dt.day()), (2, 29));
        let dt = reconstruct_datetime(2011, 60, 0, 0).unwrap();
        assert_eq!((dt.month(), dt.day()), (3, 1));
    }

    #[test]
    fn out_of_range_components_are_rejected() {
        assert!(reconstruct_datetime(2008, 0, 0, 0).is_err());
        assert!(reconstruct_datetime(2008, 367, 0, 0).is_err());
        assert!(reconstruct_datetime(2008, 10, 24, 0).is_err());
        assert!(reconstruct_datetime(2008, 10, 0, 60).is_err());
        assert!(reconstruct_datetime(2008, -1, 0, 0).is_err());
    }

    #[test]
    fn partition_groups_by_month_in_order() {
        let rows = vec![
            row(2008, 32, 0, 0, 1.0),  // Feb 1
            row(2008, 1, 0, 0, 2.0),   // Jan 1
            row(2008, 31, 23, 0, 3.0), // Jan 31
            row(2008, 60, 0, 0, 4.0),  // Feb 29
            row(2008, 61, 0, 0, 5.0),  // Mar 1
        ];
        let months = partition_by_month(&rows).unwrap();
        let keys: Vec<u32> = months.iter().map(|m| m.month).collect();
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(months[0].values(crate::data::model::Feature::ProtonDensity), vec![2.0, 3.0]);
        assert_eq!(months[1].values(crate::data::model::Feature::ProtonDensity), vec![1.0, 4.0]);
        assert!(months.iter().all(|m| m.is_chronological()));
    }

    #[test]
    fn partition_keeps_row_order_for_equal_timestamps() {
        let rows = vec![row(2008, 5, 1, 0, 10.0), row(2008, 5, 1, 0, 20.0)];
        let months = partition_by_month(&rows).unwrap();
        assert_eq!(
            months[0].values(crate::data::model::Feature::ProtonDensity),
            vec![10.0, 20.0]
        );
    }

    #[test]
    fn partition_fails_on_malformed_row() {
        let rows = vec![row(2008, 1, 0, 0, 1.0), row(2007, 366, 0, 0, 1.0)];
        let err = partition_by_month(&rows).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn partition_preserves_missing_readings() {
        let mut r = row(2008, 1, 0, 0, 1.0);
        r.proton_speed = None;
        let months = partition_by_month(&[r]).unwrap();
        assert_eq!(months[0].records[0].proton_speed, None);
    }
}
