use models::RawGrid;

use crate::numeric::normalize_amount;

/// Parses an A1-style address ("K5", "AA10") into a 0-based (row, col) pair.
/// Returns None for malformed input: missing letters, missing digits,
/// interleaved characters, or a row number of 0.
pub fn parse_address(addr: &str) -> Option<(usize, usize)> {
    let addr = addr.trim();
    let mut col_letters = String::new();
    let mut row_digits = String::new();
    let mut in_digits = false;

    for ch in addr.chars() {
        if ch.is_ascii_digit() {
            in_digits = true;
            row_digits.push(ch);
        } else if ch.is_ascii_alphabetic() && !in_digits {
            col_letters.push(ch.to_ascii_uppercase());
        } else {
            return None;
        }
    }

    if col_letters.is_empty() || row_digits.is_empty() {
        return None;
    }

    // A=1, B=2, ..., Z=26, AA=27; shifted to 0-based below.
    let mut col: usize = 0;
    for ch in col_letters.chars() {
        col = col.checked_mul(26)?;
        col = col.checked_add((ch as u8 - b'A') as usize + 1)?;
    }

    let row: usize = row_digits.parse().ok()?;
    if row == 0 {
        return None;
    }

    Some((row - 1, col - 1))
}

/// Resolves a single cell address against the grid and normalizes its value.
/// Malformed addresses and out-of-range positions resolve to 0.0.
pub fn resolve_cell(grid: &RawGrid, addr: &str) -> f64 {
    let Some((row, col)) = parse_address(addr) else {
        return 0.0;
    };
    grid.cell(row, col).map(normalize_amount).unwrap_or(0.0)
}

/// Sums the normalized values of a comma-separated address list, skipping
/// blank entries. An absent or empty list sums to 0.0.
pub fn sum_cell_list(grid: &RawGrid, list: Option<&str>) -> f64 {
    list.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| resolve_cell(grid, a))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> RawGrid {
        RawGrid::new(vec![
            vec![
                "a".into(), "b".into(), "c".into(), "d".into(), "e".into(),
                "f".into(), "g".into(), "h".into(), "i".into(), "j".into(),
                "Rp 7.173.670,00".into(),
            ],
            vec!["Rp 100.000".into(), "Rp 40.000".into()],
        ])
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("A1"), Some((0, 0)));
        assert_eq!(parse_address("K1"), Some((0, 10)));
        assert_eq!(parse_address("b2"), Some((1, 1)));
        assert_eq!(parse_address("AA10"), Some((9, 26)));
    }

    #[test]
    fn test_parse_address_malformed() {
        assert_eq!(parse_address(""), None);
        assert_eq!(parse_address("12"), None);
        assert_eq!(parse_address("AB"), None);
        assert_eq!(parse_address("A0"), None);
        assert_eq!(parse_address("A1B"), None);
        assert_eq!(parse_address("K-5"), None);
    }

    #[test]
    fn test_resolve_cell() {
        // K1 is row 1, column 11 in spreadsheet terms
        assert_eq!(resolve_cell(&grid(), "K1"), 7173670.0);
        assert_eq!(resolve_cell(&grid(), "A2"), 100000.0);
    }

    #[test]
    fn test_resolve_out_of_range_is_zero() {
        assert_eq!(resolve_cell(&grid(), "Z99"), 0.0);
        assert_eq!(resolve_cell(&grid(), "C2"), 0.0);
        assert_eq!(resolve_cell(&grid(), "not-an-address"), 0.0);
    }

    #[test]
    fn test_sum_cell_list() {
        assert_eq!(sum_cell_list(&grid(), Some("A2, B2")), 140000.0);
        // Blank entries are skipped, unknown cells contribute 0
        assert_eq!(sum_cell_list(&grid(), Some("A2,, Z99 ,")), 100000.0);
        assert_eq!(sum_cell_list(&grid(), Some("")), 0.0);
        assert_eq!(sum_cell_list(&grid(), None), 0.0);
    }
}
