//! dm-core: Core library for merging POS and supplier data files
//!
//! This library provides functionality to:
//! - Detect input formats and load CSV, TSV, delimited text and Excel files
//! - Normalize the `UPC` join key so numeric and text forms compare equal
//! - Merge two tables (inner, left, outer) and partition unmatched rows
//! - Select, rename and filter the merged result
//! - Export to Excel, JSON or Parquet
//! - Journal every step for later inspection

pub mod error;
pub mod export;
pub mod format;
pub mod journal;
pub mod key;
pub mod merger;
pub mod parser;
pub mod session;
pub mod table;
pub mod transform;

pub use error::{Error, Result};
pub use export::{export, parse_json_table, ExportFormat, ExportSheets};
pub use format::FileFormat;
pub use journal::{Journal, JournalEntry, Operation, Outcome};
pub use key::{normalize_key, normalize_keys, KEY_COLUMN};
pub use merger::{merge, JoinMode, MergeResult};
pub use parser::{load_file, load_table, parse_csv_str, read_input};
pub use session::{Session, Side};
pub use table::{CellValue, Column, ColumnType, Row, Table};
pub use transform::{FilterOperator, FilterSpec, TransformSpec};
