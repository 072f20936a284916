use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::{normalize_reading, RawRow, COLUMNS};
use crate::error::{DetectionError, Result};

/// Extensions recognised as yearly data files.
pub const DATA_EXTENSIONS: [&str; 3] = ["csv", "parquet", "pq"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load one year of proton data.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – `Year,Day,Hour,Minute,proton_density,proton_speed`, with or
///   without the header row (raw ACE exports have none)
/// * `.parquet` – the same column names, integer and float columns
pub fn load_year_file(path: &Path) -> Result<Vec<RawRow>> {
    match extension(path).as_str() {
        "parquet" | "pq" => load_parquet(path),
        "csv" => load_csv(path),
        other => Err(DetectionError::DataFormat(format!(
            "unsupported file extension: .{other}"
        ))),
    }
}

/// Yearly data files in `dir`, sorted by file name.
pub fn list_year_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && DATA_EXTENSIONS.contains(&extension(&path).as_str()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Year label of a data file: the file stem with `prefix` removed.
///
/// `ACE_SW_Proton_Data_2008.csv` → `2008`.
pub fn year_label(path: &Path, prefix: &str) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    stem.strip_prefix(prefix).unwrap_or(stem).to_string()
}

/// Prepend the canonical header to a header-less CSV, in place.
///
/// Returns `false` when the file already has a header.
pub fn repair_headers(path: &Path) -> Result<bool> {
    let rows: Vec<csv::StringRecord> = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?
        .into_records()
        .collect::<std::result::Result<_, _>>()?;

    if rows.first().is_some_and(|first| !is_data_row(first)) {
        return Ok(false);
    }

    // Ragged files are left untouched.
    if let Some((line, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != COLUMNS.len())
    {
        return Err(DetectionError::DataFormat(format!(
            "{}: line {} has {} fields, expected {}; header not added",
            path.display(),
            line + 1,
            row.len(),
            COLUMNS.len()
        )));
    }

    // Write beside the original, then swap it in.
    let staging = staging_path(path);
    if let Err(e) = write_with_header(&staging, &rows) {
        let _ = std::fs::remove_file(&staging);
        return Err(e);
    }
    std::fs::rename(&staging, path)?;

    log::info!("Added header row to {}", path.display());
    Ok(true)
}

fn write_with_header(path: &Path, rows: &[csv::StringRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// `<name>.repair` in the same directory as `path`.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".repair");
    path.with_file_name(name)
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Header-less files are recognised by a numeric first field.
fn is_data_row(record: &csv::StringRecord) -> bool {
    record
        .get(0)
        .is_some_and(|field| field.trim().parse::<f64>().is_ok())
}

fn load_csv(path: &Path) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut layout: Option<[usize; 6]> = None;
    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let idx = match layout {
            Some(idx) => idx,
            None if is_data_row(&record) => {
                let idx = [0, 1, 2, 3, 4, 5];
                layout = Some(idx);
                idx
            }
            None => {
                layout = Some(header_layout(&record)?);
                continue;
            }
        };

        rows.push(parse_csv_row(&record, &idx, row_no)?);
    }

    Ok(rows)
}

/// Column positions of [`COLUMNS`] within a header row.
fn header_layout(header: &csv::StringRecord) -> Result<[usize; 6]> {
    let mut idx = [0usize; 6];
    for (slot, name) in idx.iter_mut().zip(COLUMNS) {
        *slot = header
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| DetectionError::DataFormat(format!("CSV missing '{name}' column")))?;
    }
    Ok(idx)
}

fn parse_csv_row(record: &csv::StringRecord, idx: &[usize; 6], row: usize) -> Result<RawRow> {
    let field = |i: usize| record.get(idx[i]).unwrap_or("");

    let int = |i: usize| -> Result<i64> {
        let text = field(i);
        text.parse::<i64>().map_err(|_| {
            DetectionError::DataFormat(format!(
                "CSV row {row}, {}: '{text}' is not an integer",
                COLUMNS[i]
            ))
        })
    };

    let reading = |i: usize| -> Result<Option<f64>> {
        let text = field(i);
        if text.is_empty() {
            return Ok(None);
        }
        text.parse::<f64>().map(normalize_reading).map_err(|_| {
            DetectionError::DataFormat(format!(
                "CSV row {row}, {}: '{text}' is not a number",
                COLUMNS[i]
            ))
        })
    };

    let year = i32::try_from(int(0)?)
        .map_err(|_| DetectionError::DataFormat(format!("CSV row {row}: year out of range")))?;

    Ok(RawRow {
        year,
        day: int(1)?,
        hour: int(2)?,
        minute: int(3)?,
        proton_density: reading(4)?,
        proton_speed: reading(5)?,
    })
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with the yearly column layout.
///
/// Integer columns may be Int32 or Int64, readings Float32 or Float64;
/// null readings become `None`.
fn load_parquet(path: &Path) -> Result<Vec<RawRow>> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result?;
        let schema = batch.schema();

        let mut cols = Vec::with_capacity(COLUMNS.len());
        for name in COLUMNS {
            let i = schema.index_of(name).map_err(|_| {
                DetectionError::DataFormat(format!("Parquet file missing '{name}' column"))
            })?;
            cols.push(batch.column(i));
        }

        for row in 0..batch.num_rows() {
            let year = extract_int(cols[0], row, COLUMNS[0])?;
            rows.push(RawRow {
                year: i32::try_from(year).map_err(|_| {
                    DetectionError::DataFormat(format!("Row {row}: year out of range"))
                })?,
                day: extract_int(cols[1], row, COLUMNS[1])?,
                hour: extract_int(cols[2], row, COLUMNS[2])?,
                minute: extract_int(cols[3], row, COLUMNS[3])?,
                proton_density: extract_reading(cols[4], row, COLUMNS[4])?,
                proton_speed: extract_reading(cols[5], row, COLUMNS[5])?,
            });
        }
    }

    Ok(rows)
}

// -- Arrow helpers --

fn extract_int(col: &Arc<dyn Array>, row: usize, name: &str) -> Result<i64> {
    if col.is_null(row) {
        return Err(DetectionError::DataFormat(format!(
            "Row {row}: null value in '{name}'"
        )));
    }
    if let Some(arr) = col.as_any().downcast_ref::<Int64Array>() {
        Ok(arr.value(row))
    } else if let Some(arr) = col.as_any().downcast_ref::<Int32Array>() {
        Ok(i64::from(arr.value(row)))
    } else {
        Err(column_type_error(name, col.data_type(), "Int32 or Int64"))
    }
}

fn extract_reading(col: &Arc<dyn Array>, row: usize, name: &str) -> Result<Option<f64>> {
    if col.is_null(row) {
        return Ok(None);
    }
    let value = if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
        arr.value(row)
    } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
        f64::from(arr.value(row))
    } else {
        return Err(column_type_error(name, col.data_type(), "Float32 or Float64"));
    };
    Ok(normalize_reading(value))
}

fn column_type_error(name: &str, found: &DataType, expected: &str) -> DetectionError {
    DetectionError::DataFormat(format!(
        "column '{name}' has type {found:?}, expected {expected}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_headerless_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "ACE_SW_Proton_Data_2008.csv",
            "2008,1,0,0,5.1,402.5\n2008,1,0,1,-9999.9,401.0\n",
        );
        let rows = load_year_file(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].proton_density, Some(5.1));
        assert_eq!(rows[1].proton_density, None);
        assert_eq!(rows[1].proton_speed, Some(401.0));
    }

    #[test]
    fn loads_csv_with_reordered_header_and_blank_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "data.csv",
            "proton_speed,proton_density,Year,Day,Hour,Minute\n450.0,,2009,40,12,30\n",
        );
        let rows = load_year_file(&path).unwrap();
        assert_eq!(
            rows,
            vec![RawRow {
                year: 2009,
                day: 40,
                hour: 12,
                minute: 30,
                proton_density: None,
                proton_speed: Some(450.0),
            }]
        );
    }

    #[test]
    fn rejects_unparsable_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "bad.csv", "2008,1,zero,0,5.0,400.0\n");
        let err = load_year_file(&path).unwrap_err();
        assert!(matches!(err, DetectionError::DataFormat(_)));
        assert!(err.to_string().contains("Hour"));
    }

    #[test]
    fn rejects_header_without_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "bad.csv", "Year,Day,Hour,proton_density\n");
        assert!(load_year_file(&path).is_err());
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = load_year_file(Path::new("notes.txt")).unwrap_err();
        assert!(err.to_string().contains(".txt"));
    }

    #[test]
    fn repair_headers_prepends_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "y.csv", "2008,1,0,0,5.0,400.0\n");

        assert!(repair_headers(&path).unwrap());
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Year,Day,Hour,Minute,proton_density,proton_speed\n"));

        assert!(!repair_headers(&path).unwrap());
        assert_eq!(load_year_file(&path).unwrap().len(), 1);
    }

    #[test]
    fn repair_headers_leaves_ragged_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let original = "2008,1,0,0,5.0,400.0,extra\n2008,1,0,1,5.1,401.0\n";
        let path = write_file(dir.path(), "ragged.csv", original);

        let err = repair_headers(&path).unwrap_err();
        assert!(matches!(err, DetectionError::DataFormat(_)));
        assert!(err.to_string().contains("line 1 has 7 fields"), "{err}");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
        assert!(!dir.path().join("ragged.csv.repair").exists());
    }

    #[test]
    fn repair_headers_keeps_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "y.csv",
            "2008,1,0,0,5.0,400.0\n2008,1,0,1,5.1,401.0\n2008,1,0,2,,402.0\n",
        );

        assert!(repair_headers(&path).unwrap());
        let rows = load_year_file(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].proton_density, None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn lists_only_data_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "ACE_SW_Proton_Data_2009.csv", "");
        write_file(dir.path(), "ACE_SW_Proton_Data_2008.csv", "");
        write_file(dir.path(), "readme.txt", "");
        std::fs::create_dir(dir.path().join("sub.csv")).unwrap();

        let files = list_year_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| year_label(p, "ACE_SW_Proton_Data_"))
            .collect();
        assert_eq!(names, vec!["2008", "2009"]);
    }

    #[test]
    fn year_label_without_prefix_is_stem() {
        assert_eq!(year_label(Path::new("/x/2010.parquet"), "ACE_SW_Proton_Data_"), "2010");
    }
}
