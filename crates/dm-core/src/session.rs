//! One user workflow: load both files, merge, transform, export
//!
//! Each action runs to completion and is recorded in the caller's journal.
//! A failed action leaves the session as it was before the call.

use crate::error::{Error, Result};
use crate::export::{export, ExportFormat, ExportSheets};
use crate::format::FileFormat;
use crate::journal::{Journal, Operation};
use crate::key::{normalize_keys, KEY_COLUMN};
use crate::merger::{merge, JoinMode, MergeResult};
use crate::parser::{load_table, read_input};
use crate::table::Table;
use crate::transform::TransformSpec;
use std::path::Path;

/// Which input a file is loaded as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Pos,
    Supplier,
}

/// State of one merge workflow
pub struct Session<'j> {
    journal: &'j mut Journal,
    pos: Option<Table>,
    supplier: Option<Table>,
    result: Option<MergeResult>,
    working: Option<Table>,
}

impl<'j> Session<'j> {
    /// Start a session that logs into `journal`
    pub fn new(journal: &'j mut Journal) -> Self {
        Self {
            journal,
            pos: None,
            supplier: None,
            result: None,
            working: None,
        }
    }

    /// Load raw file bytes as the POS or supplier table.
    ///
    /// Replacing an input discards any earlier merge.
    pub fn load(&mut self, side: Side, bytes: &[u8], file_name: &str) -> Result<&Table> {
        let result = FileFormat::detect(file_name, FileFormat::sample(bytes)).and_then(|format| {
            let table = load_table(bytes, format, file_name)?;
            if table.rows.is_empty() {
                return Err(Error::EmptyTable {
                    table: file_name.to_string(),
                });
            }
            Ok((format, table))
        });

        let (_, table) = self.journal.track(Operation::Load, file_name, result, |(format, t)| {
            format!("{} rows, {} columns ({})", t.row_count(), t.column_count(), format)
        })?;

        self.result = None;
        self.working = None;
        let slot = match side {
            Side::Pos => &mut self.pos,
            Side::Supplier => &mut self.supplier,
        };
        Ok(slot.insert(table))
    }

    /// Read `path` and load it; read failures are journaled like any other
    /// load failure
    pub fn load_path(&mut self, side: Side, path: &Path) -> Result<&Table> {
        match read_input(path) {
            Ok((name, bytes)) => self.load(side, &bytes, &name),
            Err(e) => {
                self.journal.failure(Operation::Load, &path.display().to_string(), &e);
                Err(e)
            }
        }
    }

    /// Normalize keys and join the two inputs
    pub fn merge(&mut self, mode: JoinMode) -> Result<&MergeResult> {
        let pos = self.pos.as_ref().ok_or(Error::NotReady("loading the POS file"))?;
        let supplier = self
            .supplier
            .as_ref()
            .ok_or(Error::NotReady("loading the Supplier file"))?;

        let outcome = normalize_keys(pos, KEY_COLUMN).and_then(|pos| {
            let supplier = normalize_keys(supplier, KEY_COLUMN)?;
            merge(&pos, &supplier, KEY_COLUMN, mode)
        });

        let subject = format!("{} + {}", pos.name, supplier.name);
        let merged = self.journal.track(Operation::Merge, &subject, outcome, |r| {
            format!(
                "{} merge: {} rows, {} columns; unmatched POS {}, unmatched Supplier {}",
                r.mode,
                r.merged.row_count(),
                r.merged.column_count(),
                r.unmatched_pos.row_count(),
                r.unmatched_supplier.row_count()
            )
        })?;

        if merged.merged.rows.is_empty() {
            tracing::warn!("merge produced no matching records, check the UPC values");
        }

        self.working = None;
        Ok(self.result.insert(merged))
    }

    /// Apply `spec` to the merged table.
    ///
    /// Always starts from the untransformed merge output, so calling it again
    /// with an edited spec replaces the previous preview.
    pub fn transform(&mut self, spec: &TransformSpec) -> Result<&Table> {
        let result = self.result.as_ref().ok_or(Error::NotReady("the merge"))?;

        let transformed = self.journal.track(
            Operation::Transform,
            &result.merged.name,
            spec.apply(&result.merged),
            |t| format!("{} rows, {} columns", t.row_count(), t.column_count()),
        )?;

        Ok(self.working.insert(transformed))
    }

    /// Serialize the current table (transformed if a transform ran)
    pub fn export(&mut self, format: ExportFormat) -> Result<Vec<u8>> {
        let result = self.result.as_ref().ok_or(Error::NotReady("the merge"))?;
        let table = self.working.as_ref().unwrap_or(&result.merged);
        let sheets = ExportSheets::with_merged(result, table);

        self.journal.track(
            Operation::Export,
            &format.file_name(),
            export(&sheets, format),
            |bytes| format!("{} rows, {} bytes", table.row_count(), bytes.len()),
        )
    }

    pub fn pos(&self) -> Option<&Table> {
        self.pos.as_ref()
    }

    pub fn supplier(&self) -> Option<&Table> {
        self.supplier.as_ref()
    }

    pub fn merge_result(&self) -> Option<&MergeResult> {
        self.result.as_ref()
    }

    /// Table an export would write
    pub fn current(&self) -> Option<&Table> {
        self.working
            .as_ref()
            .or_else(|| self.result.as_ref().map(|r| &r.merged))
    }

    pub fn journal(&self) -> &Journal {
        &*self.journal
    }
}
