//! YAML job definitions.
//!
//! One job file describes the load of one destination table: where the
//! sheets live, which worksheets to read, and how their headers map onto
//! warehouse columns.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    mapping::{ColumnMapping, HeaderCleanup},
    sink::Paramstyle,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    pub spreadsheet: String,
    /// Defaults to the destination table name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worksheet: Option<String>,
}

impl SourceSpec {
    pub fn worksheet_or<'a>(&'a self, table: &'a str) -> &'a str {
        self.worksheet.as_deref().unwrap_or(table)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_column: Option<String>,
    #[serde(default)]
    pub header_cleanup: HeaderCleanup,
    #[serde(default)]
    pub replace_existing: bool,
    /// Placeholder style of the statement shown by dry runs and previews.
    #[serde(default)]
    pub paramstyle: Paramstyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_encoding: Option<String>,
    pub mapping: ColumnMapping,
    pub sources: Vec<SourceSpec>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl JobConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Opening job file {path:?}"))?;
        let mut job = Self::from_yaml(&raw).with_context(|| format!("Parsing job file {path:?}"))?;
        job.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(job)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let job: JobConfig = serde_yaml::from_str(raw)?;
        job.validate()?;
        Ok(job)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.table.trim().is_empty(), "Job 'table' must not be empty");
        ensure!(
            !self.mapping.is_empty(),
            "Job for table '{}' defines no column mapping",
            self.table
        );
        ensure!(
            !self.sources.is_empty(),
            "Job for table '{}' lists no sources",
            self.table
        );
        for source in &self.sources {
            ensure!(
                !source.spreadsheet.trim().is_empty(),
                "Source spreadsheet names must not be empty"
            );
        }
        Ok(())
    }

    /// Resolves a path from the job file against the job file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// CLI value first, then the job file, then nothing.
    pub fn database_path(&self, cli: Option<&Path>) -> Option<PathBuf> {
        cli.map(Path::to_path_buf)
            .or_else(|| self.database.as_deref().map(|p| self.resolve(p)))
    }

    /// CLI value first, then the job file, then the job file's directory.
    pub fn source_root(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.source_root.as_deref().map(|p| self.resolve(p)))
            .unwrap_or_else(|| self.base_dir.clone())
    }
}
