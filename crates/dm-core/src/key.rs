//! Join key normalization

use crate::error::{Error, Result};
use crate::table::{CellValue, Table};

/// Column both input files must carry, matched case-sensitively
pub const KEY_COLUMN: &str = "UPC";

/// Replace every key cell with its canonical string form.
///
/// `123`, `123.0` and `"123.00"` all become `"123"`. Blank keys become
/// `Empty` and are never matched.
pub fn normalize_keys(table: &Table, key: &str) -> Result<Table> {
    let column = table.find_column(key).ok_or_else(|| Error::MissingKeyColumn {
        column: key.to_string(),
        table: table.name.clone(),
        available: table.column_names().join(", "),
    })?;
    let index = column.index;

    let mut normalized = table.clone();
    for row in &mut normalized.rows {
        if let Some(cell) = row.cells.get_mut(index) {
            *cell = match normalize_key(cell) {
                Some(k) => CellValue::String(k),
                None => CellValue::Empty,
            };
        }
    }

    Ok(normalized)
}

/// Canonical string form of a key cell; `None` for the unkeyed bucket
pub fn normalize_key(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Integer(i) => Some(i.to_string()),
        CellValue::Float(f) => Some(canonical_float(*f)),
        CellValue::String(s) => normalize_key_str(s),
        CellValue::Empty => None,
    }
}

/// Canonical form of a textual key.
///
/// Text that would load as a number normalizes like that number, so
/// `"+123"` and `"1.50"` match `123` and `1.5`.
pub fn normalize_key_str(s: &str) -> Option<String> {
    match CellValue::parse(s) {
        CellValue::Empty => None,
        CellValue::Integer(i) => Some(i.to_string()),
        CellValue::Float(f) => Some(canonical_float(f)),
        CellValue::String(text) => Some(strip_zero_fraction(&text).to_string()),
    }
}

fn canonical_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

/// "123.00" -> "123"; anything else unchanged
fn strip_zero_fraction(s: &str) -> &str {
    let Some((whole, fraction)) = s.split_once('.') else {
        return s;
    };

    let digits = whole.strip_prefix('-').unwrap_or(whole);
    let is_number = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b == b'0');

    if is_number {
        whole
    } else {
        s
    }
}
