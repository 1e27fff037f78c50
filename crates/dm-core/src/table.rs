//! Core table types shared by every pipeline stage

use serde::{Deserialize, Serialize};

/// An in-memory table loaded from a POS or supplier file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Label used in messages (file name, or "merged" etc.)
    pub name: String,
    /// Column definitions
    pub columns: Vec<Column>,
    /// Row data, one cell per column
    pub rows: Vec<Row>,
}

impl Table {
    /// Create a new empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Build a table from column names and rows of cells.
    ///
    /// Rows are padded or truncated to the column count so the
    /// one-cell-per-column invariant always holds.
    pub fn from_parts(name: impl Into<String>, names: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let columns: Vec<Column> = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Column::new(name, i))
            .collect();
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut cells| {
                cells.resize(width, CellValue::Empty);
                Row::new(cells)
            })
            .collect();

        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Find a column by exact name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Iterate over the cells of one column
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |r| r.get(index))
    }

    /// Type of a column: its pinned type if one is set, otherwise resolved
    /// from its non-null cells
    pub fn column_type(&self, index: usize) -> ColumnType {
        self.columns
            .iter()
            .find(|c| c.index == index)
            .and_then(|c| c.kind)
            .unwrap_or_else(|| self.resolve_type(index))
    }

    fn resolve_type(&self, index: usize) -> ColumnType {
        self.column_values(index)
            .fold(ColumnType::Null, |acc, cell| acc.widen(cell))
    }

    /// Columns with their current types pinned.
    ///
    /// Row subsets keep these so a column does not change type when the rows
    /// that made it a string are filtered out.
    pub fn pinned_columns(&self) -> Vec<Column> {
        self.columns
            .iter()
            .map(|c| Column {
                kind: Some(self.column_type(c.index)),
                ..c.clone()
            })
            .collect()
    }

    /// Copy of this table under another name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// A column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as it appeared in the header (trimmed)
    pub name: String,
    /// Column index (0-based)
    pub index: usize,
    /// Type fixed by an earlier step; `None` resolves from the cells
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ColumnType>,
}

impl Column {
    /// Create a new column
    pub fn new(name: String, index: usize) -> Self {
        Self {
            name,
            index,
            kind: None,
        }
    }
}

/// A row of data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Cell values for each column
    pub cells: Vec<CellValue>,
}

impl Row {
    /// Create a new row
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }
}

/// A cell value with type detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// Integer value
    Integer(i64),
    /// Floating-point value
    Float(f64),
    /// String value
    String(String),
    /// Empty/null cell
    Empty,
}

impl CellValue {
    /// Parse a string into a CellValue, detecting the type
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        // "0123" is a code, not the number 123
        if has_leading_zero(trimmed) {
            return CellValue::String(trimmed.to_string());
        }

        // Try parsing as integer first
        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Integer(i);
        }

        // Only plain decimal notation; "inf" and "NaN" stay text
        if trimmed.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(f) = trimmed.parse::<f64>() {
                if f.is_finite() {
                    return CellValue::Float(f);
                }
            }
        }

        // Otherwise, keep as string
        CellValue::String(trimmed.to_string())
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Numeric view of the cell, if it holds a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert to a display string
    pub fn to_string_value(&self) -> String {
        match self {
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::String(s) => s.clone(),
            CellValue::Empty => String::new(),
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Float(fl) => write!(f, "{}", fl),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Empty => write!(f, ""),
        }
    }
}

/// Resolved type of a whole column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Float,
    String,
    /// No non-null cells
    Null,
}

impl ColumnType {
    fn widen(self, cell: &CellValue) -> Self {
        match (self, cell) {
            (acc, CellValue::Empty) => acc,
            (ColumnType::String, _) | (_, CellValue::String(_)) => ColumnType::String,
            (ColumnType::Null, CellValue::Integer(_)) => ColumnType::Integer,
            (ColumnType::Integer, CellValue::Integer(_)) => ColumnType::Integer,
            (_, CellValue::Float(_)) | (ColumnType::Float, CellValue::Integer(_)) => ColumnType::Float,
        }
    }

    /// Whether values of this type compare numerically
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Null => "null",
        };
        write!(f, "{}", name)
    }
}

fn has_leading_zero(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let bytes = digits.as_bytes();
    bytes.len() > 1 && bytes[0] == b'0' && bytes[1].is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_parse_integer() {
        assert_eq!(CellValue::parse("42"), CellValue::Integer(42));
        assert_eq!(CellValue::parse("-123"), CellValue::Integer(-123));
        assert_eq!(CellValue::parse("0"), CellValue::Integer(0));
    }

    #[test]
    fn test_cell_value_parse_float() {
        assert_eq!(CellValue::parse("3.25"), CellValue::Float(3.25));
        assert_eq!(CellValue::parse("-2.5"), CellValue::Float(-2.5));
        assert_eq!(CellValue::parse("0.5"), CellValue::Float(0.5));
    }

    #[test]
    fn test_cell_value_parse_string() {
        assert_eq!(
            CellValue::parse("hello"),
            CellValue::String("hello".to_string())
        );
        assert_eq!(CellValue::parse("NaN"), CellValue::String("NaN".to_string()));
        assert_eq!(CellValue::parse("inf"), CellValue::String("inf".to_string()));
    }

    #[test]
    fn test_cell_value_keeps_leading_zeros() {
        assert_eq!(
            CellValue::parse("012345678905"),
            CellValue::String("012345678905".to_string())
        );
    }

    #[test]
    fn test_cell_value_parse_empty() {
        assert_eq!(CellValue::parse(""), CellValue::Empty);
        assert_eq!(CellValue::parse("   "), CellValue::Empty);
    }

    #[test]
    fn test_column_type_resolution() {
        let table = Table::from_parts(
            "t",
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec![
                vec![CellValue::Integer(1), CellValue::Integer(1), CellValue::Integer(1), CellValue::Empty],
                vec![CellValue::Integer(2), CellValue::Float(1.5), CellValue::String("x".into()), CellValue::Empty],
            ],
        );
        assert_eq!(table.column_type(0), ColumnType::Integer);
        assert_eq!(table.column_type(1), ColumnType::Float);
        assert_eq!(table.column_type(2), ColumnType::String);
        assert_eq!(table.column_type(3), ColumnType::Null);
    }

    #[test]
    fn test_from_parts_pads_rows() {
        let table = Table::from_parts(
            "t",
            vec!["a".into(), "b".into()],
            vec![vec![CellValue::Integer(1)]],
        );
        assert_eq!(table.rows[0].cells, vec![CellValue::Integer(1), CellValue::Empty]);
    }
}
