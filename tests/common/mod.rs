#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::{TempDir, tempdir};

pub const CANARA_DDL: &str = "CREATE TABLE CANARA (
    Data_Month VARCHAR(20),
    Channel VARCHAR(50),
    TotalAlert INT,
    Total_Amount_Saved DECIMAL(14,2),
    Scenario_Last_Modified_date DATE
)";

/// Scratch directory holding a destination database, exported sheets, and
/// job files. Everything is removed on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Writes `<root>/sheets/<spreadsheet>/<worksheet>.csv`.
    pub fn write_sheet(&self, spreadsheet: &str, worksheet: &str, csv: &str) -> PathBuf {
        self.write(&format!("sheets/{spreadsheet}/{worksheet}.csv"), csv)
    }

    pub fn sheets_root(&self) -> PathBuf {
        self.path().join("sheets")
    }

    /// Creates `reports.db` and runs `ddl` against it.
    pub fn create_database(&self, ddl: &str) -> PathBuf {
        let path = self.path().join("reports.db");
        let conn = Connection::open(&path).expect("create database");
        conn.execute_batch(ddl).expect("apply ddl");
        path
    }

    pub fn query_strings(&self, sql: &str) -> Vec<Vec<String>> {
        let conn = Connection::open(self.path().join("reports.db")).expect("open database");
        let mut stmt = conn.prepare(sql).expect("prepare query");
        let columns = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                (0..columns)
                    .map(|idx| {
                        let value: rusqlite::types::Value = row.get(idx)?;
                        Ok(match value {
                            rusqlite::types::Value::Null => "NULL".to_string(),
                            rusqlite::types::Value::Integer(i) => i.to_string(),
                            rusqlite::types::Value::Real(f) => format!("{f:?}"),
                            rusqlite::types::Value::Text(s) => s,
                            rusqlite::types::Value::Blob(_) => "<blob>".to_string(),
                        })
                    })
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .expect("run query")
            .collect::<rusqlite::Result<Vec<_>>>()
            .expect("read rows");
        rows
    }
}
