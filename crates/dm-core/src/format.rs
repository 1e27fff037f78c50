//! Input format detection from file name and content sample

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bytes of content needed by [`FileFormat::detect`]
pub const SAMPLE_LEN: usize = 8;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Supported input formats, each with its own loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    /// Comma-separated values
    Csv,
    /// Excel workbook (.xlsx or .xls), first sheet only
    Excel,
    /// Tab-separated values
    Tsv,
    /// Text with an undetermined separator (.txt)
    DelimitedText,
}

impl FileFormat {
    /// Leading bytes of `bytes` to pass as the detection sample
    pub fn sample(bytes: &[u8]) -> &[u8] {
        &bytes[..bytes.len().min(SAMPLE_LEN)]
    }

    /// Pick a format from the file extension, checking the first bytes for
    /// workbooks saved under a text extension.
    pub fn detect(file_name: &str, sample: &[u8]) -> Result<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let format = match extension.as_deref() {
            Some("csv") => FileFormat::Csv,
            Some("xlsx") | Some("xls") => FileFormat::Excel,
            Some("tsv") => FileFormat::Tsv,
            Some("txt") => FileFormat::DelimitedText,
            _ => {
                return Err(Error::UnsupportedFormat {
                    file: file_name.to_string(),
                })
            }
        };

        if format != FileFormat::Excel && looks_like_workbook(sample) {
            tracing::warn!(file = file_name, "text extension holds a workbook, reading as Excel");
            return Ok(FileFormat::Excel);
        }

        Ok(format)
    }

    /// Short lowercase label for messages
    pub fn label(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Excel => "excel",
            FileFormat::Tsv => "tsv",
            FileFormat::DelimitedText => "txt",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label().to_uppercase())
    }
}

fn looks_like_workbook(sample: &[u8]) -> bool {
    sample.starts_with(ZIP_MAGIC) || sample.starts_with(CFB_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(FileFormat::detect("pos.csv", b"UPC,x").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::detect("pos.xlsx", ZIP_MAGIC).unwrap(), FileFormat::Excel);
        assert_eq!(FileFormat::detect("pos.xls", CFB_MAGIC).unwrap(), FileFormat::Excel);
        assert_eq!(FileFormat::detect("pos.tsv", b"UPC\tx").unwrap(), FileFormat::Tsv);
        assert_eq!(
            FileFormat::detect("pos.txt", b"UPC|x").unwrap(),
            FileFormat::DelimitedText
        );
    }

    #[test]
    fn test_detect_is_case_insensitive() {
        assert_eq!(FileFormat::detect("POS.CSV", b"").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::detect("Supplier.XLSX", b"").unwrap(), FileFormat::Excel);
    }

    #[test]
    fn test_detect_unsupported() {
        let err = FileFormat::detect("pos.pdf", b"%PDF").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { ref file } if file == "pos.pdf"));
        assert!(FileFormat::detect("noextension", b"").is_err());
    }

    #[test]
    fn test_detect_mislabeled_workbook() {
        let mut sample = ZIP_MAGIC.to_vec();
        sample.extend_from_slice(b"rest");
        assert_eq!(FileFormat::detect("export.csv", &sample).unwrap(), FileFormat::Excel);
    }
}
