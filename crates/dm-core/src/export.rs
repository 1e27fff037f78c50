//! Exporters for Excel, JSON and Parquet output

use crate::error::{Error, Result};
use crate::merger::MergeResult;
use crate::table::{CellValue, ColumnType, Table};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::str::FromStr;
use std::sync::Arc;

pub const SHEET_MERGED: &str = "Merged";
pub const SHEET_UNMATCHED_POS: &str = "Unmatched POS";
pub const SHEET_UNMATCHED_SUPPLIER: &str = "Unmatched Supplier";

/// Output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Excel,
    Json,
    Parquet,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Excel => "xlsx",
            ExportFormat::Json => "json",
            ExportFormat::Parquet => "parquet",
        }
    }

    /// Default download name
    pub fn file_name(&self) -> String {
        format!("Data_Merger_Export.{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "json" => Ok(ExportFormat::Json),
            "parquet" => Ok(ExportFormat::Parquet),
            other => Err(format!(
                "unknown export format '{}' (expected xlsx, json or parquet)",
                other
            )),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Tables written by an export. JSON and Parquet only use `merged`.
#[derive(Debug, Clone, Copy)]
pub struct ExportSheets<'a> {
    pub merged: &'a Table,
    pub unmatched_pos: &'a Table,
    pub unmatched_supplier: &'a Table,
}

impl<'a> ExportSheets<'a> {
    /// Untransformed merge output
    pub fn from_result(result: &'a MergeResult) -> Self {
        Self::with_merged(result, &result.merged)
    }

    /// Transformed table alongside the unmatched partitions of `result`
    pub fn with_merged(result: &'a MergeResult, merged: &'a Table) -> Self {
        Self {
            merged,
            unmatched_pos: &result.unmatched_pos,
            unmatched_supplier: &result.unmatched_supplier,
        }
    }
}

/// Serialize to the requested format
pub fn export(sheets: &ExportSheets<'_>, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Excel => to_excel(sheets),
        ExportFormat::Json => to_json(sheets.merged),
        ExportFormat::Parquet => to_parquet(sheets.merged),
    }
}

/// Workbook with the merged table and both unmatched partitions
pub fn to_excel(sheets: &ExportSheets<'_>) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let layout = [
        (SHEET_MERGED, sheets.merged, "No merged data available"),
        (SHEET_UNMATCHED_POS, sheets.unmatched_pos, "No unmatched POS records"),
        (
            SHEET_UNMATCHED_SUPPLIER,
            sheets.unmatched_supplier,
            "No unmatched Supplier records",
        ),
    ];

    for (sheet_name, table, note) in layout {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(sheet_name)
            .map_err(|e| Error::export_write("xlsx", e))?;
        write_sheet(worksheet, table, note)?;
    }

    workbook
        .save_to_buffer()
        .map_err(|e| Error::export_write("xlsx", e))
}

fn write_sheet(worksheet: &mut Worksheet, table: &Table, note: &str) -> Result<()> {
    if table.columns.is_empty() {
        worksheet
            .write_string(0, 0, "Message")
            .and_then(|w| w.write_string(1, 0, note))
            .map_err(|e| Error::export_write("xlsx", e))?;
        return Ok(());
    }

    for column in &table.columns {
        let col = u16::try_from(column.index)
            .map_err(|_| Error::export(&column.name, "too many columns for a worksheet"))?;

        worksheet
            .write_string(0, col, &column.name)
            .map_err(|e| Error::export(&column.name, e))?;

        for (r, row) in table.rows.iter().enumerate() {
            let excel_row = u32::try_from(r + 1)
                .map_err(|_| Error::export(&column.name, "too many rows for a worksheet"))?;

            let written = match row.get(column.index) {
                Some(CellValue::Integer(i)) => worksheet.write_number(excel_row, col, *i as f64),
                Some(CellValue::Float(f)) => worksheet.write_number(excel_row, col, *f),
                Some(CellValue::String(s)) => worksheet.write_string(excel_row, col, s),
                Some(CellValue::Empty) | None => continue,
            };
            written.map_err(|e| Error::export(&column.name, e))?;
        }
    }

    Ok(())
}

/// Array of row objects in row order; empty cells become `null`
pub fn to_json(table: &Table) -> Result<Vec<u8>> {
    let mut records = Vec::with_capacity(table.row_count());

    for row in &table.rows {
        let mut object = Map::new();
        for column in &table.columns {
            let value = match row.get(column.index) {
                Some(CellValue::Integer(i)) => Value::from(*i),
                Some(CellValue::Float(f)) => Number::from_f64(*f)
                    .map(Value::Number)
                    .ok_or_else(|| Error::export(&column.name, format!("{} cannot be represented in JSON", f)))?,
                Some(CellValue::String(s)) => Value::String(s.clone()),
                Some(CellValue::Empty) | None => Value::Null,
            };
            object.insert(column.name.clone(), value);
        }
        records.push(Value::Object(object));
    }

    Ok(serde_json::to_vec_pretty(&records)?)
}

/// Read a JSON export back into a table
pub fn parse_json_table(bytes: &[u8], name: &str) -> Result<Table> {
    let records: Vec<Map<String, Value>> =
        serde_json::from_slice(bytes).map_err(|e| Error::load(name, e.to_string()))?;

    let mut names: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .map(|record| {
            names
                .iter()
                .map(|n| record.get(n).map(json_cell).unwrap_or(CellValue::Empty))
                .collect()
        })
        .collect();

    Ok(Table::from_parts(name, names, rows))
}

fn json_cell(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Integer(i),
            None => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Empty),
        },
        Value::String(s) => CellValue::String(s.clone()),
        other => CellValue::String(other.to_string()),
    }
}

/// Single-row-group Parquet file, one typed column per table column
pub fn to_parquet(table: &Table) -> Result<Vec<u8>> {
    if table.columns.is_empty() {
        return Err(Error::export_write("parquet", "table has no columns"));
    }

    let mut fields = Vec::with_capacity(table.column_count());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.column_count());

    for column in &table.columns {
        let values = table.column_values(column.index);
        let (data_type, array): (DataType, ArrayRef) = match table.column_type(column.index) {
            ColumnType::Integer => (
                DataType::Int64,
                Arc::new(
                    values
                        .map(|c| match c {
                            CellValue::Integer(i) => Some(*i),
                            _ => None,
                        })
                        .collect::<Int64Array>(),
                ),
            ),
            ColumnType::Float => (
                DataType::Float64,
                Arc::new(values.map(CellValue::as_f64).collect::<Float64Array>()),
            ),
            ColumnType::String | ColumnType::Null => (
                DataType::Utf8,
                Arc::new(
                    values
                        .map(|c| (!c.is_empty()).then(|| c.to_string_value()))
                        .collect::<StringArray>(),
                ),
            ),
        };

        fields.push(Field::new(column.name.as_str(), data_type, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).map_err(|e| Error::export_write("parquet", e))?;

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, None).map_err(|e| Error::export_write("parquet", e))?;
    writer.write(&batch).map_err(|e| Error::export_write("parquet", e))?;
    writer.close().map_err(|e| Error::export_write("parquet", e))?;

    Ok(buffer)
}
