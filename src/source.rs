//! Sheet loading.
//!
//! A [`SheetSource`] hands back a worksheet as a [`RawTable`]: the header row
//! and the data rows, all strings, exactly as written. [`CsvWorkbookSource`]
//! serves spreadsheets exported to disk, one directory per spreadsheet and
//! one `.csv`/`.tsv` file per worksheet.

use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use log::debug;
use thiserror::Error;

use crate::{io_utils, mapping::HeaderCleanup};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("the spreadsheet '{0}' was not found")]
    SpreadsheetNotFound(String),
    #[error("the sheet '{worksheet}' was not found in '{spreadsheet}'")]
    WorksheetNotFound {
        spreadsheet: String,
        worksheet: String,
    },
    #[error("reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("row {row} of {path:?}: {source}")]
    Decode {
        path: PathBuf,
        row: usize,
        #[source]
        source: io_utils::DecodeError,
    },
}

impl SourceError {
    /// Missing spreadsheets and worksheets skip the load instead of failing it.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            SourceError::SpreadsheetNotFound(_) | SourceError::WorksheetNotFound { .. }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn clean_header(&mut self, cleanup: HeaderCleanup) {
        for label in &mut self.header {
            *label = cleanup.apply(label);
        }
    }
}

pub trait SheetSource {
    fn fetch(&self, spreadsheet: &str, worksheet: &str) -> Result<RawTable, SourceError>;
}

#[derive(Debug, Clone)]
pub struct CsvWorkbookSource {
    root: PathBuf,
    encoding: &'static Encoding,
}

impl CsvWorkbookSource {
    pub fn new(root: impl Into<PathBuf>, encoding: &'static Encoding) -> Self {
        Self {
            root: root.into(),
            encoding,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn worksheet_path(&self, spreadsheet: &str, worksheet: &str) -> Result<PathBuf, SourceError> {
        let dir = self.root.join(spreadsheet);
        if !dir.is_dir() {
            return Err(SourceError::SpreadsheetNotFound(spreadsheet.to_string()));
        }
        ["csv", "tsv"]
            .iter()
            .map(|ext| dir.join(format!("{worksheet}.{ext}")))
            .find(|path| path.is_file())
            .ok_or_else(|| SourceError::WorksheetNotFound {
                spreadsheet: spreadsheet.to_string(),
                worksheet: worksheet.to_string(),
            })
    }
}

impl SheetSource for CsvWorkbookSource {
    fn fetch(&self, spreadsheet: &str, worksheet: &str) -> Result<RawTable, SourceError> {
        let path = self.worksheet_path(spreadsheet, worksheet)?;
        debug!("Reading worksheet {path:?}");
        let mut reader =
            io_utils::open_csv_reader_from_path(&path).map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            })?;
        let mut table = RawTable::default();
        for (idx, record) in reader.byte_records().enumerate() {
            let record = record.map_err(|source| SourceError::Csv {
                path: path.clone(),
                source,
            })?;
            let decoded = io_utils::decode_record(&record, self.encoding).map_err(|source| {
                SourceError::Decode {
                    path: path.clone(),
                    row: idx + 1,
                    source,
                }
            })?;
            if idx == 0 {
                table.header = decoded;
            } else {
                table.rows.push(decoded);
            }
        }
        Ok(table)
    }
}
