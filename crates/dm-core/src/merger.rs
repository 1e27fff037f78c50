//! Merge engine joining POS and supplier tables on the normalized key

use crate::error::{Error, Result};
use crate::key::normalize_key;
use crate::table::{CellValue, Column, Row, Table};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Appended to supplier column names that clash with a POS column
pub const COLLISION_SUFFIX: &str = "_right";

/// Which unmatched rows the merged table keeps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Only keys present on both sides
    #[default]
    Inner,
    /// Every POS row, supplier columns empty when unmatched
    Left,
    /// Every row from both sides
    Outer,
}

impl FromStr for JoinMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinMode::Inner),
            "left" => Ok(JoinMode::Left),
            "outer" | "full" => Ok(JoinMode::Outer),
            other => Err(format!("unknown merge mode '{}' (expected inner, left or outer)", other)),
        }
    }
}

impl std::fmt::Display for JoinMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JoinMode::Inner => "inner",
            JoinMode::Left => "left",
            JoinMode::Outer => "outer",
        };
        write!(f, "{}", name)
    }
}

/// Output of a merge: the joined table plus both unmatched partitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    /// Join mode that produced `merged`
    pub mode: JoinMode,
    /// Joined table for `mode`
    pub merged: Table,
    /// POS rows whose key has no supplier counterpart
    pub unmatched_pos: Table,
    /// Supplier rows whose key has no POS counterpart
    pub unmatched_supplier: Table,
    /// Rows an inner join produces
    pub matched_rows: usize,
}

/// Join two key-normalized tables.
///
/// Duplicate keys expand to every pairing. Row order follows the POS table,
/// with supplier-only rows appended in supplier order for outer joins.
pub fn merge(pos: &Table, supplier: &Table, key: &str, mode: JoinMode) -> Result<MergeResult> {
    let pos_key = key_index(pos, key)?;
    let supplier_key = key_index(supplier, key)?;

    // Supplier rows grouped by key, in supplier order
    let mut supplier_rows: HashMap<String, Vec<&Row>> = HashMap::new();
    for row in &supplier.rows {
        if let Some(k) = row.get(supplier_key).and_then(normalize_key) {
            supplier_rows.entry(k).or_default().push(row);
        }
    }

    let columns = merged_columns(pos, supplier, supplier_key);
    let supplier_width = supplier.column_count().saturating_sub(1);

    let mut merged_rows = Vec::new();
    let mut unmatched_pos = Vec::new();
    let mut pos_keys: HashSet<String> = HashSet::new();
    let mut matched_rows = 0;

    for row in &pos.rows {
        let key_value = row.get(pos_key).and_then(normalize_key);
        let matches = key_value.as_ref().and_then(|k| supplier_rows.get(k));

        match matches {
            Some(partners) => {
                for partner in partners {
                    let mut cells = row.cells.clone();
                    cells.extend(non_key_cells(partner, supplier_key));
                    merged_rows.push(Row::new(cells));
                    matched_rows += 1;
                }
            }
            None => {
                unmatched_pos.push(row.clone());
                if mode != JoinMode::Inner {
                    let mut cells = row.cells.clone();
                    cells.extend(std::iter::repeat(CellValue::Empty).take(supplier_width));
                    merged_rows.push(Row::new(cells));
                }
            }
        }

        if let Some(k) = key_value {
            pos_keys.insert(k);
        }
    }

    let mut unmatched_supplier = Vec::new();
    for row in &supplier.rows {
        let is_matched = row
            .get(supplier_key)
            .and_then(normalize_key)
            .is_some_and(|k| pos_keys.contains(&k));
        if is_matched {
            continue;
        }

        unmatched_supplier.push(row.clone());
        if mode == JoinMode::Outer {
            let mut cells = vec![CellValue::Empty; pos.column_count()];
            cells[pos_key] = row.get(supplier_key).cloned().unwrap_or(CellValue::Empty);
            cells.extend(non_key_cells(row, supplier_key));
            merged_rows.push(Row::new(cells));
        }
    }

    tracing::debug!(
        mode = %mode,
        merged = merged_rows.len(),
        matched = matched_rows,
        unmatched_pos = unmatched_pos.len(),
        unmatched_supplier = unmatched_supplier.len(),
        "merge complete"
    );

    Ok(MergeResult {
        mode,
        merged: Table {
            name: "merged".to_string(),
            columns,
            rows: merged_rows,
        },
        unmatched_pos: Table {
            name: format!("unmatched {}", pos.name),
            columns: pos.columns.clone(),
            rows: unmatched_pos,
        },
        unmatched_supplier: Table {
            name: format!("unmatched {}", supplier.name),
            columns: supplier.columns.clone(),
            rows: unmatched_supplier,
        },
        matched_rows,
    })
}

fn key_index(table: &Table, key: &str) -> Result<usize> {
    table
        .find_column(key)
        .map(|c| c.index)
        .ok_or_else(|| Error::MissingKeyColumn {
            column: key.to_string(),
            table: table.name.clone(),
            available: table.column_names().join(", "),
        })
}

/// POS columns, then supplier columns without the key, suffixed on clashes
fn merged_columns(pos: &Table, supplier: &Table, supplier_key: usize) -> Vec<Column> {
    let mut used: HashSet<String> = pos.columns.iter().map(|c| c.name.clone()).collect();
    let mut names: Vec<String> = pos.columns.iter().map(|c| c.name.clone()).collect();

    for column in supplier.columns.iter().filter(|c| c.index != supplier_key) {
        let mut name = column.name.clone();
        while used.contains(&name) {
            name.push_str(COLLISION_SUFFIX);
        }
        used.insert(name.clone());
        names.push(name);
    }

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| Column::new(name, i))
        .collect()
}

fn non_key_cells(row: &Row, key: usize) -> impl Iterator<Item = CellValue> + '_ {
    row.cells
        .iter()
        .enumerate()
        .filter(move |(i, _)| *i != key)
        .map(|(_, c)| c.clone())
}
