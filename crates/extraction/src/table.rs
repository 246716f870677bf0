use chrono::{NaiveDate, NaiveDateTime};
use models::{FieldMapping, RawGrid, Transaction};

use crate::error::MappingError;
use crate::numeric::normalize_amount;

/// Scans rows top-to-bottom for the first one containing `date_column` as an
/// exact cell value. That row is the header; everything below it is data.
pub fn find_header_row(grid: &RawGrid, date_column: &str) -> Option<usize> {
    grid.rows()
        .iter()
        .position(|row| row.iter().any(|cell| cell == date_column))
}

/// Builds the transaction table from all rows below the header.
///
/// The date column anchors the header row; the income and expense columns
/// must exist in it. Source columns are optional — a configured name that is
/// not present among the headers simply disables clean-filtering for that
/// side. Unparseable dates become `None` and unparseable amounts become 0.0;
/// neither aborts the build.
pub fn build_transactions(
    grid: &RawGrid,
    mapping: &FieldMapping,
) -> Result<Vec<Transaction>, MappingError> {
    let header_index = find_header_row(grid, &mapping.col_date)
        .ok_or_else(|| MappingError::HeaderNotFound(mapping.col_date.clone()))?;
    let header = &grid.rows()[header_index];

    let position = |name: &str| header.iter().position(|cell| cell == name);

    let date_col = position(&mapping.col_date)
        .ok_or_else(|| MappingError::ColumnNotFound(mapping.col_date.clone()))?;
    let income_col = position(&mapping.col_income)
        .ok_or_else(|| MappingError::ColumnNotFound(mapping.col_income.clone()))?;
    let expense_col = position(&mapping.col_expense)
        .ok_or_else(|| MappingError::ColumnNotFound(mapping.col_expense.clone()))?;
    let income_source_col = mapping.col_source_income.as_deref().and_then(position);
    let expense_source_col = mapping.col_source_expense.as_deref().and_then(position);

    let transactions = grid
        .rows()
        .iter()
        .skip(header_index + 1)
        .map(|row| {
            let cell = |col: usize| row.get(col).map(String::as_str).unwrap_or("");
            let source = |col: Option<usize>| col.map(|c| cell(c).to_string());

            Transaction {
                date: parse_row_date(cell(date_col)),
                income: normalize_amount(cell(income_col)),
                expense: normalize_amount(cell(expense_col)),
                income_source: source(income_source_col),
                expense_source: source(expense_source_col),
            }
        })
        .collect();

    Ok(transactions)
}

/// Best-effort date parse over the shapes Google Forms and hand-edited
/// sheets produce. `None` is the invalid-date sentinel.
pub fn parse_row_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }

    // Timestamp shapes; the dotted variant is the Indonesian Forms locale.
    const DATETIME_FORMATS: [&str; 3] = [
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H.%M.%S",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }

    None
}
