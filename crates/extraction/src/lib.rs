//! Sheet extraction pipeline: turns one worksheet grid plus a field mapping
//! into dashboard metrics (KPI summaries, daily trend, category pies).
//!
//! The pipeline is a single-pass, stateless transform. Identical inputs
//! yield identical outputs; nothing is cached between calls. Cell-level
//! problems (bad numbers, bad addresses) degrade to zero values, while
//! configuration problems (missing header or column) surface as
//! [`MappingError`] so the caller can report a mapping mistake instead of
//! silently misparsing.

use std::collections::BTreeMap;

use models::{
    CategoryDefinition, CategoryKind, ExtractionResult, FieldMapping, PieSeries, RawGrid, Summary,
    Transaction, TrendSeries,
};

mod cells;
mod error;
mod numeric;
mod table;

pub use cells::{parse_address, resolve_cell, sum_cell_list};
pub use error::{MappingError, PipelineError};
pub use numeric::normalize_amount;
pub use table::{build_transactions, find_header_row, parse_row_date};

/// Runs the whole pipeline over one fetched grid.
pub fn extract(
    grid: &RawGrid,
    mapping: &FieldMapping,
    categories: &[CategoryDefinition],
) -> Result<ExtractionResult, MappingError> {
    let transactions = build_transactions(grid, mapping)?;
    let keywords = mapping.debt_keyword_list();
    let clean = clean_view(&transactions, &keywords);
    let pies = aggregate_categories(grid, categories);

    Ok(ExtractionResult {
        summary: raw_summary(grid, mapping),
        summary_clean: clean_summary(grid, mapping),
        trend: aggregate_trend(&transactions),
        trend_clean: aggregate_trend(&clean),
        pie_income: pies.income,
        pie_expense: pies.expense,
        pie_income_clean: pies.income_clean,
        pie_expense_clean: pies.expense_clean,
    })
}

/// Produces the "clean" view of the table: rows whose source text matches a
/// debt keyword (case-insensitive substring) get the matching side zeroed.
/// Rows are never removed, so clean and dirty tables stay the same length
/// and date-grouped totals differ only in the zeroed amounts. A side without
/// source text is left untouched.
pub fn clean_view(transactions: &[Transaction], keywords: &[String]) -> Vec<Transaction> {
    if keywords.is_empty() {
        return transactions.to_vec();
    }

    let matches_keyword = |source: &Option<String>| {
        source.as_deref().is_some_and(|text| {
            let text = text.to_lowercase();
            keywords.iter().any(|k| text.contains(k.as_str()))
        })
    };

    transactions
        .iter()
        .map(|t| {
            let mut t = t.clone();
            if matches_keyword(&t.income_source) {
                t.income = 0.0;
            }
            if matches_keyword(&t.expense_source) {
                t.expense = 0.0;
            }
            t
        })
        .collect()
}

/// Raw KPI summary: the three configured cells read straight off the grid.
/// This reflects whatever formula lives in the spreadsheet and is entirely
/// independent of the transaction table.
pub fn raw_summary(grid: &RawGrid, mapping: &FieldMapping) -> Summary {
    let resolve = |addr: &Option<String>| {
        addr.as_deref().map(|a| resolve_cell(grid, a)).unwrap_or(0.0)
    };
    Summary {
        income: resolve(&mapping.kpi_income_cell),
        expense: resolve(&mapping.kpi_expense_cell),
        balance: resolve(&mapping.kpi_balance_cell),
    }
}

/// Clean KPI summary: pipeline-side recomputation from the configured
/// clean-cell lists. May legitimately disagree with [`raw_summary`].
pub fn clean_summary(grid: &RawGrid, mapping: &FieldMapping) -> Summary {
    let income = sum_cell_list(grid, mapping.clean_income_cells.as_deref());
    let expense = sum_cell_list(grid, mapping.clean_expense_cells.as_deref());
    Summary {
        income,
        expense,
        balance: income - expense,
    }
}

/// Groups the table by calendar date, summing income and expense per day.
/// Rows with the invalid-date sentinel are excluded. Output is sorted
/// ascending by date; empty input yields empty series.
pub fn aggregate_trend(transactions: &[Transaction]) -> TrendSeries {
    let mut by_date: BTreeMap<_, (f64, f64)> = BTreeMap::new();
    for t in transactions {
        let Some(date) = t.date else { continue };
        let entry = by_date.entry(date).or_default();
        entry.0 += t.income;
        entry.1 += t.expense;
    }

    let mut series = TrendSeries::default();
    for (date, (income, expense)) in by_date {
        series.labels.push(date.format("%Y-%m-%d").to_string());
        series.income.push(income);
        series.expense.push(expense);
    }
    series
}

pub struct CategoryCharts {
    pub income: PieSeries,
    pub expense: PieSeries,
    pub income_clean: PieSeries,
    pub expense_clean: PieSeries,
}

/// Resolves each category's cell and distributes it into the pie series.
/// A category contributes to the dirty pie of its kind only when its value
/// is strictly positive, and additionally to the clean pie when flagged
/// `is_clean`. Output order follows the configuration's stored order.
pub fn aggregate_categories(grid: &RawGrid, categories: &[CategoryDefinition]) -> CategoryCharts {
    let mut charts = CategoryCharts {
        income: PieSeries::default(),
        expense: PieSeries::default(),
        income_clean: PieSeries::default(),
        expense_clean: PieSeries::default(),
    };

    for category in categories {
        let value = resolve_cell(grid, &category.cell);
        if value <= 0.0 {
            continue;
        }
        let (dirty, clean) = match category.kind {
            CategoryKind::Income => (&mut charts.income, &mut charts.income_clean),
            CategoryKind::Expense => (&mut charts.expense, &mut charts.expense_clean),
        };
        dirty.push(&category.name, value);
        if category.is_clean {
            clean.push(&category.name, value);
        }
    }

    charts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn mapping() -> FieldMapping {
        FieldMapping {
            col_date: "Timestamp".to_string(),
            col_income: "Nominal Pemasukan".to_string(),
            col_expense: "Nominal Pengeluaran".to_string(),
            col_source_income: Some("Sumber Pemasukan".to_string()),
            col_source_expense: Some("Sumber Pengeluaran".to_string()),
            debt_keywords: Some("hutang,pinjaman".to_string()),
            kpi_income_cell: Some("F1".to_string()),
            kpi_expense_cell: Some("F2".to_string()),
            kpi_balance_cell: Some("F3".to_string()),
            clean_income_cells: Some("F1".to_string()),
            clean_expense_cells: Some("F2,F4".to_string()),
        }
    }

    fn grid() -> RawGrid {
        RawGrid::new(vec![
            vec![
                "Timestamp".into(),
                "Nominal Pemasukan".into(),
                "Nominal Pengeluaran".into(),
                "Sumber Pemasukan".into(),
                "Sumber Pengeluaran".into(),
                "Rp 250.000".into(), // F1
            ],
            vec![
                "2025-01-05".into(),
                "Rp 100.000,00".into(),
                "Rp 40.000,00".into(),
                "Gaji".into(),
                "Makan".into(),
                "Rp 90.000".into(), // F2
            ],
            vec![
                "2025-01-05".into(),
                "Rp 150.000".into(),
                "Rp 50.000".into(),
                "Hutang teman".into(),
                "Bayar pinjaman".into(),
                "Rp 160.000".into(), // F3
            ],
            vec![
                "2025-01-06".into(),
                "".into(),
                "Rp 20.000".into(),
                "".into(),
                "Transport".into(),
                "Rp 10.000".into(), // F4
            ],
        ])
    }

    fn transactions() -> Vec<Transaction> {
        build_transactions(&grid(), &mapping()).unwrap()
    }

    #[test]
    fn test_clean_view_zeroes_matched_sides() {
        let dirty = transactions();
        let clean = clean_view(&dirty, &mapping().debt_keyword_list());

        assert_eq!(clean.len(), dirty.len());
        // Row 2 matches on both sides and is zeroed, not removed
        assert_eq!(dirty[1].income, 150000.0);
        assert_eq!(clean[1].income, 0.0);
        assert_eq!(dirty[1].expense, 50000.0);
        assert_eq!(clean[1].expense, 0.0);
        // Row 1 matches nothing
        assert_eq!(clean[0], dirty[0]);
    }

    #[test]
    fn test_clean_never_exceeds_dirty() {
        let dirty = transactions();
        let clean = clean_view(&dirty, &mapping().debt_keyword_list());
        for (c, d) in clean.iter().zip(&dirty) {
            assert!(c.income <= d.income);
            assert!(c.expense <= d.expense);
        }
    }

    #[test]
    fn test_clean_view_without_keywords_is_identity() {
        let dirty = transactions();
        assert_eq!(clean_view(&dirty, &[]), dirty);
    }

    #[test]
    fn test_missing_source_column_disables_filtering() {
        // Mapping points at a source column the sheet does not have:
        // the expense side must stay identical to the dirty view.
        let mut m = mapping();
        m.col_source_expense = Some("Jenis".to_string());
        let rows = build_transactions(&grid(), &m).unwrap();
        let clean = clean_view(&rows, &m.debt_keyword_list());
        let dirty_trend = aggregate_trend(&rows);
        let clean_trend = aggregate_trend(&clean);
        assert_eq!(clean_trend.expense, dirty_trend.expense);
        // Income filtering still applies
        assert!(clean_trend.income[0] < dirty_trend.income[0]);
    }

    #[test]
    fn test_raw_summary_reads_cells_directly() {
        let summary = raw_summary(&grid(), &mapping());
        assert_eq!(summary.income, 250000.0);
        assert_eq!(summary.expense, 90000.0);
        // Raw balance mirrors the sheet's own cell, not income - expense
        assert_eq!(summary.balance, 160000.0);
    }

    #[test]
    fn test_clean_summary_recomputes_balance() {
        let summary = clean_summary(&grid(), &mapping());
        assert_eq!(summary.income, 250000.0);
        assert_eq!(summary.expense, 100000.0);
        assert_eq!(summary.balance, 150000.0);
    }

    #[test]
    fn test_unconfigured_kpi_cells_are_zero() {
        let summary = raw_summary(&grid(), &FieldMapping::default());
        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn test_trend_groups_by_date_ascending() {
        let trend = aggregate_trend(&transactions());
        assert_eq!(trend.labels, vec!["2025-01-05", "2025-01-06"]);
        assert_eq!(trend.income, vec![250000.0, 0.0]);
        assert_eq!(trend.expense, vec![90000.0, 20000.0]);
    }

    #[test]
    fn test_trend_skips_invalid_dates_and_handles_empty_input() {
        let rows = vec![Transaction {
            date: None,
            income: 10.0,
            expense: 0.0,
            income_source: None,
            expense_source: None,
        }];
        assert_eq!(aggregate_trend(&rows), TrendSeries::default());
        assert_eq!(aggregate_trend(&[]), TrendSeries::default());
    }

    fn category(name: &str, cell: &str, kind: CategoryKind, is_clean: bool) -> CategoryDefinition {
        CategoryDefinition {
            id: 0,
            config_id: 1,
            name: name.to_string(),
            cell: cell.to_string(),
            kind,
            is_clean,
            position: 0,
        }
    }

    #[test]
    fn test_category_aggregation() {
        let categories = vec![
            category("Makan", "F2", CategoryKind::Expense, true),
            category("Transport", "F4", CategoryKind::Expense, false),
            category("Gaji", "F1", CategoryKind::Income, true),
            category("Kosong", "Z99", CategoryKind::Expense, true),
        ];
        let charts = aggregate_categories(&grid(), &categories);

        // Stored order preserved; zero-valued category dropped everywhere
        assert_eq!(charts.expense.labels, vec!["Makan", "Transport"]);
        assert_eq!(charts.expense.data, vec![90000.0, 10000.0]);
        assert_eq!(charts.expense_clean.labels, vec!["Makan"]);
        assert_eq!(charts.income.labels, vec!["Gaji"]);
        assert_eq!(charts.income_clean.labels, vec!["Gaji"]);
    }

    #[test]
    fn test_extract_end_to_end() {
        let grid = RawGrid::new(vec![
            vec![
                "Timestamp".into(),
                "Nominal Pemasukan".into(),
                "Nominal Pengeluaran".into(),
                "Sumber Pengeluaran".into(),
            ],
            vec![
                "2025-01-05".into(),
                "Rp 100.000,00".into(),
                "Rp 40.000,00".into(),
                "Makan".into(),
            ],
        ]);
        let mapping = FieldMapping {
            col_date: "Timestamp".to_string(),
            col_income: "Nominal Pemasukan".to_string(),
            col_expense: "Nominal Pengeluaran".to_string(),
            ..FieldMapping::default()
        };
        let categories = vec![category("Makan", "C2", CategoryKind::Expense, true)];

        let result = extract(&grid, &mapping, &categories).unwrap();
        assert_eq!(result.trend.labels, vec!["2025-01-05"]);
        assert_eq!(result.trend.income, vec![100000.0]);
        assert_eq!(result.trend.expense, vec![40000.0]);
        assert_eq!(result.pie_expense.labels, vec!["Makan"]);
        assert_eq!(result.pie_expense.data, vec![40000.0]);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let first = extract(&grid(), &mapping(), &[]).unwrap();
        let second = extract(&grid(), &mapping(), &[]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_extract_reports_header_mapping_error() {
        let mut m = mapping();
        m.col_date = "Tanggal".to_string();
        let err = extract(&grid(), &m, &[]).unwrap_err();
        assert_eq!(err, MappingError::HeaderNotFound("Tanggal".to_string()));
        assert_eq!(
            err.to_string(),
            "header row with column 'Tanggal' was not found in the worksheet"
        );
    }

    #[test]
    fn test_dates_survive_grouping() {
        let rows = transactions();
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2025, 1, 5));
        assert_eq!(rows[2].date, NaiveDate::from_ymd_opt(2025, 1, 6));
    }
}
