//! Operation journal
//!
//! Every load, merge, transform and export attempt is recorded here and
//! emitted as a `tracing` event. The journal is owned by the caller and passed
//! into the pipeline explicitly.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Pipeline step an entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Load,
    Merge,
    Transform,
    Export,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Load => "load",
            Operation::Merge => "merge",
            Operation::Transform => "transform",
            Operation::Export => "export",
        };
        write!(f, "{}", name)
    }
}

/// Whether the attempt succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// A record of one attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    /// File name or table the attempt worked on
    pub subject: String,
    pub outcome: Outcome,
    /// Summary on success, error message on failure
    pub detail: String,
}

/// Ordered list of entries for one session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Journal {
    pub entries: Vec<JournalEntry>,
}

impl Journal {
    /// Create a new empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful attempt
    pub fn success(&mut self, operation: Operation, subject: &str, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::info!(%operation, subject, outcome = "success", %detail);
        self.push(operation, subject, Outcome::Success, detail);
    }

    /// Record a failed attempt
    pub fn failure(&mut self, operation: Operation, subject: &str, error: &Error) {
        let detail = error.to_string();
        tracing::error!(%operation, subject, outcome = "failure", %detail);
        self.push(operation, subject, Outcome::Failure, detail);
    }

    /// Record the outcome of `result` and pass it through.
    ///
    /// `summary` renders the success detail from the produced value.
    pub fn track<T>(
        &mut self,
        operation: Operation,
        subject: &str,
        result: Result<T>,
        summary: impl FnOnce(&T) -> String,
    ) -> Result<T> {
        match &result {
            Ok(value) => self.success(operation, subject, summary(value)),
            Err(e) => self.failure(operation, subject, e),
        }
        result
    }

    fn push(&mut self, operation: Operation, subject: &str, outcome: Outcome, detail: String) {
        self.entries.push(JournalEntry {
            timestamp: Utc::now(),
            operation,
            subject: subject.to_string(),
            outcome,
            detail,
        });
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&JournalEntry> {
        self.entries.last()
    }

    /// Entries that record a failure
    pub fn failures(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter().filter(|e| e.outcome == Outcome::Failure)
    }

    /// Get total number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a journal from a file, or create empty if not exists
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the journal to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
