use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// Input models

/// Row-major snapshot of one worksheet, exactly as the Sheets API returned it.
/// Rows may have irregular lengths; no type coercion happens here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGrid {
    rows: Vec<Vec<String>>,
}

impl RawGrid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Returns the cell at 0-based (row, col), or None when out of bounds.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// Configuration models

/// Maps worksheet columns and cell addresses to semantic fields.
/// Column fields hold header names as they appear in the sheet; cell fields
/// hold A1-style addresses ("K1") or comma-separated lists of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub col_date: String,
    pub col_income: String,
    pub col_expense: String,
    pub col_source_income: Option<String>,
    pub col_source_expense: Option<String>,
    /// Comma-separated keywords marking debt/loan-like rows ("hutang, pinjaman").
    pub debt_keywords: Option<String>,
    pub kpi_income_cell: Option<String>,
    pub kpi_expense_cell: Option<String>,
    pub kpi_balance_cell: Option<String>,
    /// Comma-separated cell addresses summed into the clean income total.
    pub clean_income_cells: Option<String>,
    /// Comma-separated cell addresses summed into the clean expense total.
    pub clean_expense_cells: Option<String>,
}

impl FieldMapping {
    /// Debt keywords lower-cased and trimmed, blanks dropped.
    pub fn debt_keyword_list(&self) -> Vec<String> {
        split_list(self.debt_keywords.as_deref())
            .into_iter()
            .map(|k| k.to_lowercase())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(CategoryKind::Income),
            "expense" => Some(CategoryKind::Expense),
            _ => None,
        }
    }
}

/// One pie-chart slice definition: a named cell read off the grid.
/// Belongs to exactly one monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub id: i64,
    pub config_id: i64,
    pub name: String,
    /// A1-style address of the category total ("K5").
    pub cell: String,
    pub kind: CategoryKind,
    /// Whether the category also counts toward the debt-excluded pies.
    pub is_clean: bool,
    pub position: i64,
}

/// One monitored spreadsheet with its field mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub spreadsheet_url: String,
    /// Comma-separated worksheet names, one tab per month/period.
    pub worksheets: String,
    #[serde(flatten)]
    pub mapping: FieldMapping,
}

impl MonitorConfig {
    pub fn worksheet_list(&self) -> Vec<String> {
        split_list(Some(self.worksheets.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

/// Splits a comma-separated configuration list, trimming and dropping blanks.
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// Derived models (recomputed on every request, never persisted)

/// One parsed transaction row. A `None` date marks a row whose date cell
/// could not be parsed; such rows stay in the table but are excluded from
/// date-grouped aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub date: Option<NaiveDate>,
    pub income: f64,
    pub expense: f64,
    pub income_source: Option<String>,
    pub expense_source: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

impl Summary {
    pub fn formatted(&self) -> SummaryView {
        SummaryView {
            income: group_thousands(self.income),
            expense: group_thousands(self.expense),
            balance: group_thousands(self.balance),
        }
    }
}

/// Presentation form of a summary: thousands-grouped, no decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryView {
    pub income: String,
    pub expense: String,
    pub balance: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub labels: Vec<String>,
    pub income: Vec<f64>,
    pub expense: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PieSeries {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

impl PieSeries {
    pub fn push(&mut self, label: &str, value: f64) {
        self.labels.push(label.to_string());
        self.data.push(value);
    }
}

/// Complete output of one extraction run. `Default` yields the all-zero,
/// all-empty result the dashboard falls back to when the pipeline reports
/// an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub summary: Summary,
    pub summary_clean: Summary,
    pub trend: TrendSeries,
    pub trend_clean: TrendSeries,
    pub pie_income: PieSeries,
    pub pie_expense: PieSeries,
    pub pie_income_clean: PieSeries,
    pub pie_expense_clean: PieSeries,
}

/// Formats an amount with comma thousands separators and no decimals.
pub fn group_thousands(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
