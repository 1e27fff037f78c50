//! Table loader for CSV, TSV, delimited text and Excel input

use crate::error::{Error, Result};
use crate::format::FileFormat;
use crate::table::{CellValue, Table};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use encoding_rs::Encoding;
use std::borrow::Cow;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

/// Separators probed for `.txt` input, in order
pub const SEPARATORS: [u8; 4] = [b',', b'\t', b';', b'|'];

/// Rows checked for a consistent field count when probing a separator
const SEPARATOR_SAMPLE_ROWS: usize = 20;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Text encodings tried for delimited input, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Iso8859_1,
    Cp1252,
}

impl TextEncoding {
    pub const ORDER: [TextEncoding; 4] = [
        TextEncoding::Utf8,
        TextEncoding::Latin1,
        TextEncoding::Iso8859_1,
        TextEncoding::Cp1252,
    ];

    /// WHATWG label
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin1",
            TextEncoding::Iso8859_1 => "iso-8859-1",
            TextEncoding::Cp1252 => "windows-1252",
        }
    }

    fn encoding(&self) -> &'static Encoding {
        Encoding::for_label(self.label().as_bytes()).unwrap_or(encoding_rs::WINDOWS_1252)
    }

    /// Strict decode; `None` on malformed input
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        self.encoding()
            .decode_without_bom_handling_and_without_replacement(bytes)
    }
}

/// Read a file from disk, returning its file name and contents
pub fn read_input<P: AsRef<Path>>(path: P) -> Result<(String, Vec<u8>)> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    Ok((name, bytes))
}

/// Read a file from disk, detect its format and load it
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Table> {
    let (name, bytes) = read_input(path)?;
    let format = FileFormat::detect(&name, FileFormat::sample(&bytes))?;

    load_table(&bytes, format, &name)
}

/// Parse raw bytes of a detected format into a Table
pub fn load_table(bytes: &[u8], format: FileFormat, name: &str) -> Result<Table> {
    match format {
        FileFormat::Excel => load_excel(bytes, name),
        FileFormat::Csv => parse_delimited(&decode_text(bytes, name)?, b',', name),
        FileFormat::Tsv => parse_delimited(&decode_text(bytes, name)?, b'\t', name),
        FileFormat::DelimitedText => {
            let text = decode_text(bytes, name)?;
            let separator = detect_separator(&text)
                .ok_or_else(|| Error::load(name, "could not determine separator"))?;
            let shown = (separator as char).escape_default().to_string();
            tracing::debug!(file = name, separator = %shown, "separator detected");
            parse_delimited(&text, separator, name)
        }
    }
}

/// Parse CSV from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<Table> {
    parse_delimited(content, b',', source_name)
}

/// Decode text by trying each encoding in order
fn decode_text(bytes: &[u8], name: &str) -> Result<String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    for encoding in TextEncoding::ORDER {
        if let Some(text) = encoding.decode(bytes) {
            tracing::debug!(file = name, encoding = encoding.label(), "decoded text");
            return Ok(text.into_owned());
        }
    }

    Err(Error::load(name, "encoding not supported"))
}

/// First separator that yields several columns and a stable field count
pub fn detect_separator(text: &str) -> Option<u8> {
    SEPARATORS.into_iter().find(|&separator| {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(separator)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let width = match reader.headers() {
            Ok(headers) if headers.len() > 1 => headers.len(),
            _ => return false,
        };

        reader
            .records()
            .take(SEPARATOR_SAMPLE_ROWS)
            .all(|record| record.map(|r| r.len() == width).unwrap_or(false))
    })
}

fn parse_delimited(content: &str, delimiter: u8, name: &str) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .from_reader(content.as_bytes());

    let headers = csv_reader
        .headers()
        .map_err(|e| Error::load(name, e.to_string()))?;

    let names = header_names(headers.iter());
    if names.is_empty() {
        return Err(Error::load(name, "missing header row"));
    }

    let mut rows = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| Error::load(name, e.to_string()))?;

        let mut cells: Vec<CellValue> = record.iter().map(CellValue::parse).collect();

        // Warn if row is longer than header (truncate)
        if cells.len() > names.len() {
            tracing::warn!(
                file = name,
                row = row_idx + 1,
                "row has more cells than columns, truncating"
            );
            cells.truncate(names.len());
        }

        rows.push(cells);
    }

    Ok(Table::from_parts(name, names, rows))
}

fn load_excel(bytes: &[u8], name: &str) -> Result<Table> {
    let excel_error = |cause: String| Error::load(name, format!("Could not read Excel file: {}", cause));

    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| excel_error(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| excel_error("workbook has no sheets".to_string()))?
        .map_err(|e| excel_error(e.to_string()))?;

    let mut sheet_rows = range.rows();
    let header = sheet_rows
        .next()
        .ok_or_else(|| excel_error("missing header row".to_string()))?;

    let header_text: Vec<String> = header.iter().map(|c| c.to_string()).collect();
    let names = header_names(header_text.iter().map(String::as_str));

    let rows = sheet_rows
        .map(|row| row.iter().map(excel_cell).collect())
        .collect();

    Ok(Table::from_parts(name, names, rows))
}

fn excel_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => CellValue::Integer(*f as i64),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::String(s.trim().to_string()),
        other => CellValue::String(other.to_string()),
    }
}

/// Trimmed, unique header names.
///
/// Blank headers get a positional name; repeats get `_2`, `_3`, ...
fn header_names<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.enumerate()
        .map(|(i, h)| {
            let base = match h.trim() {
                "" => format!("column_{}", i + 1),
                trimmed => trimmed.to_string(),
            };
            let mut name = base.clone();
            let mut n = 2;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            if name != base {
                tracing::warn!(column = %base, renamed = %name, "duplicate header renamed");
            }
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{parse_json_table, to_json};
    use crate::transform::TransformSpec;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn test_parse_simple_csv() {
        let csv = "UPC,Name,Price\n1,foo,100\n2,bar,2.5\n";
        let table = parse_csv_str(csv, "test.csv").unwrap();

        assert_eq!(table.column_names(), vec!["UPC", "Name", "Price"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0].cells[0], CellValue::Integer(1));
        assert_eq!(table.rows[1].cells[2], CellValue::Float(2.5));
    }

    #[test]
    fn test_parse_trims_header_names() {
        let csv = " UPC , Name \n1,foo\n";
        let table = parse_csv_str(csv, "test.csv").unwrap();
        assert_eq!(table.column_names(), vec!["UPC", "Name"]);
    }

    #[test]
    fn test_parse_with_empty_cells() {
        let csv = "UPC,Name,Value\n1,,100\n2,bar,\n";
        let table = parse_csv_str(csv, "test.csv").unwrap();

        assert_eq!(table.rows[0].cells[1], CellValue::Empty);
        assert_eq!(table.rows[1].cells[2], CellValue::Empty);
    }

    #[test]
    fn test_parse_ragged_rows() {
        let csv = "UPC,Name\n1\n2,bar,extra\n";
        let table = parse_csv_str(csv, "test.csv").unwrap();

        assert_eq!(table.rows[0].cells, vec![CellValue::Integer(1), CellValue::Empty]);
        assert_eq!(table.rows[1].cells.len(), 2);
    }

    #[test]
    fn test_empty_input_has_no_header() {
        let err = load_table(b"", FileFormat::Csv, "empty.csv").unwrap_err();
        assert!(err.to_string().contains("missing header row"));
    }

    #[test]
    fn test_tsv_uses_tab() {
        let table = load_table(b"UPC\tQty\n7\t3\n", FileFormat::Tsv, "s.tsv").unwrap();
        assert_eq!(table.column_names(), vec!["UPC", "Qty"]);
        assert_eq!(table.rows[0].cells[1], CellValue::Integer(3));
    }

    #[test]
    fn test_latin1_fallback() {
        let bytes = b"UPC,Name\n1,caf\xe9\n";
        let table = load_table(bytes, FileFormat::Csv, "latin.csv").unwrap();
        assert_eq!(table.rows[0].cells[1], CellValue::String("caf\u{e9}".to_string()));
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let bytes = b"\xEF\xBB\xBFUPC,Name\n1,a\n";
        let table = load_table(bytes, FileFormat::Csv, "bom.csv").unwrap();
        assert!(table.find_column("UPC").is_some());
    }

    #[test]
    fn test_encoding_order() {
        assert!(TextEncoding::Utf8.decode(b"\xe9").is_none());
        assert_eq!(TextEncoding::Latin1.decode(b"\xe9").unwrap(), "\u{e9}");
    }

    #[test]
    fn test_detect_pipe_separator() {
        let table = load_table(b"a|b|c\n1|2|3", FileFormat::DelimitedText, "d.txt").unwrap();

        assert_eq!(table.column_count(), 3);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows[0].cells[2], CellValue::Integer(3));
    }

    #[test]
    fn test_detect_separator_order() {
        assert_eq!(detect_separator("a;b\n1;2\n"), Some(b';'));
        assert_eq!(detect_separator("a\tb\n1\t2\n"), Some(b'\t'));
        // Commas inside the data break consistency for comma
        assert_eq!(detect_separator("a;b\n1,5;2\n"), Some(b';'));
    }

    #[test]
    fn test_undetermined_separator() {
        let err = load_table(b"single\n1\n2\n", FileFormat::DelimitedText, "one.txt").unwrap_err();
        assert!(err.to_string().contains("could not determine separator"));
    }

    #[test]
    fn test_load_excel_first_sheet() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "UPC").unwrap();
        sheet.write_string(0, 1, " Price ").unwrap();
        sheet.write_number(1, 0, 123.0).unwrap();
        sheet.write_number(1, 1, 1.5).unwrap();
        sheet.write_string(2, 0, "0456").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = load_table(&bytes, FileFormat::Excel, "pos.xlsx").unwrap();

        assert_eq!(table.column_names(), vec!["UPC", "Price"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0].cells[0], CellValue::Integer(123));
        assert_eq!(table.rows[0].cells[1], CellValue::Float(1.5));
        assert_eq!(table.rows[1].cells[0], CellValue::String("0456".to_string()));
        assert_eq!(table.rows[1].cells[1], CellValue::Empty);
    }

    #[test]
    fn test_duplicate_headers_made_unique() {
        let table = parse_csv_str("UPC,note,note,,note\n1,a,b,c,d\n", "pos.csv").unwrap();

        assert_eq!(table.column_names(), vec!["UPC", "note", "note_2", "column_4", "note_3"]);
        assert_eq!(table.rows[0].cells[2], CellValue::String("b".to_string()));

        let identity = TransformSpec::default().apply(&table).unwrap();
        assert_eq!(identity.column_names(), table.column_names());

        let json = to_json(&identity).unwrap();
        let back = parse_json_table(&json, "pos.json").unwrap();
        assert_eq!(back.rows[0].cells[1], CellValue::String("a".to_string()));
        assert_eq!(back.rows[0].cells[2], CellValue::String("b".to_string()));
    }

    #[test]
    fn test_corrupt_excel() {
        let err = load_table(b"PK\x03\x04garbage", FileFormat::Excel, "bad.xlsx").unwrap_err();
        assert!(err.to_string().contains("Could not read Excel file"));
        assert!(err.hint().is_some());
    }
}
