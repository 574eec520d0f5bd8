//! Destination table access: connection, schema lookup, and batch insert.
//!
//! Every batch goes in through one prepared multi-row insert inside a single
//! transaction. Any row failing rolls the whole batch back.

use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info};
use rusqlite::{Connection, OpenFlags, params_from_iter};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    catalog::{self, ColumnTypeCatalog},
    coerce::CoercedBatch,
};

#[derive(Debug, Error)]
pub enum InsertError {
    #[error("no destination columns to insert into table '{0}'")]
    NoColumns(String),
    #[error("row {row} of the batch was rejected: {source}")]
    Row {
        row: usize,
        #[source]
        source: rusqlite::Error,
    },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Placeholder convention of the target driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Paramstyle {
    /// `?` placeholders, double-quoted identifiers (SQLite, ODBC).
    #[default]
    Qmark,
    /// `%s` placeholders, backtick-quoted identifiers (MySQL connector).
    Format,
}

impl Paramstyle {
    fn placeholder(self) -> &'static str {
        match self {
            Paramstyle::Qmark => "?",
            Paramstyle::Format => "%s",
        }
    }

    fn quote(self, identifier: &str) -> String {
        match self {
            Paramstyle::Qmark => format!("\"{}\"", identifier.replace('"', "\"\"")),
            Paramstyle::Format => format!("`{}`", identifier.replace('`', "``")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    table: String,
    columns: Vec<String>,
}

impl InsertStatement {
    pub fn new(table: &str, columns: &[String]) -> Result<Self, InsertError> {
        if columns.is_empty() {
            return Err(InsertError::NoColumns(table.to_string()));
        }
        Ok(Self {
            table: table.to_string(),
            columns: columns.to_vec(),
        })
    }

    pub fn render(&self, style: Paramstyle) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| style.quote(c))
            .join(", ");
        let placeholders =
            std::iter::repeat_n(style.placeholder(), self.columns.len()).join(", ");
        format!(
            "INSERT INTO {} ({columns}) VALUES ({placeholders})",
            style.quote(&self.table)
        )
    }

    pub fn render_delete(&self, style: Paramstyle) -> String {
        format!("DELETE FROM {}", style.quote(&self.table))
    }
}

#[derive(Debug)]
pub struct Destination {
    conn: Connection,
}

impl Destination {
    /// Opens an existing database file. A missing file is a connection
    /// failure rather than a new empty database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Connecting to database {path:?}"))?;
        info!("Connected to database {path:?}");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn introspect(&self, table: &str) -> Result<ColumnTypeCatalog> {
        catalog::introspect(&self.conn, table)
    }

    /// Inserts `batch` into `table` in one transaction, optionally clearing
    /// the table first. Returns the number of rows written.
    pub fn insert_batch(
        &mut self,
        table: &str,
        batch: &CoercedBatch,
        replace_existing: bool,
    ) -> Result<usize, InsertError> {
        let statement = InsertStatement::new(table, &batch.columns)?;
        let sql = statement.render(Paramstyle::Qmark);
        debug!("{sql}");

        let tx = self.conn.transaction()?;
        if replace_existing {
            let removed = tx.execute(&statement.render_delete(Paramstyle::Qmark), [])?;
            debug!("Cleared {removed} existing row(s) from '{table}'");
        }
        {
            let mut stmt = tx.prepare(&sql)?;
            for (idx, row) in batch.rows.iter().enumerate() {
                stmt.execute(params_from_iter(row.iter()))
                    .map_err(|source| InsertError::Row {
                        row: idx + 1,
                        source,
                    })?;
            }
        }
        tx.commit()?;
        Ok(batch.row_count())
    }
}
