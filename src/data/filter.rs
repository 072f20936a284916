use super::model::{MonthlyTable, Record};

// ---------------------------------------------------------------------------
// Sanitizer: which records carry usable readings
// ---------------------------------------------------------------------------

/// Return indices of records that pass [`Record::is_valid`].
///
/// A record passes when:
/// * both readings are present (missing and sentinel values were normalized
///   to `None` at load time),
/// * neither reading equals the sentinel,
/// * both readings are strictly positive.
pub fn valid_indices(table: &MonthlyTable) -> Vec<usize> {
    table
        .records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.is_valid())
        .map(|(i, _)| i)
        .collect()
}

/// New table holding only valid records, in their original order.
pub fn sanitize(table: &MonthlyTable) -> MonthlyTable {
    let records: Vec<Record> = valid_indices(table)
        .into_iter()
        .map(|i| table.records[i].clone())
        .collect();
    table.derive(records)
}
