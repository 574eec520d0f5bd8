//! Load orchestration.
//!
//! Each source listed in a job walks the same linear path:
//!
//! ```text
//! CONNECTED -> SCHEMA_READ -> SOURCE_FETCHED -> MAPPED -> COERCED -> INSERTED
//!                     \______________ any stage error ______________-> FAILED
//! ```
//!
//! A missing or empty sheet is skipped, a failed stage is recorded, and in
//! both cases the job moves on to the next source.

use std::fmt;

use anyhow::{Result, bail};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::{
    catalog::ColumnTypeCatalog,
    coerce::{self, CoercedBatch},
    config::{JobConfig, SourceSpec},
    sink::{Destination, InsertStatement},
    source::SheetSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStage {
    Connected,
    SchemaRead,
    SourceFetched,
    Mapped,
    Coerced,
    Inserted,
    Failed,
}

impl RunStage {
    fn next(self) -> Option<RunStage> {
        match self {
            RunStage::Connected => Some(RunStage::SchemaRead),
            RunStage::SchemaRead => Some(RunStage::SourceFetched),
            RunStage::SourceFetched => Some(RunStage::Mapped),
            RunStage::Mapped => Some(RunStage::Coerced),
            RunStage::Coerced => Some(RunStage::Inserted),
            RunStage::Inserted | RunStage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStage::Inserted | RunStage::Failed)
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStage::Connected => "CONNECTED",
            RunStage::SchemaRead => "SCHEMA_READ",
            RunStage::SourceFetched => "SOURCE_FETCHED",
            RunStage::Mapped => "MAPPED",
            RunStage::Coerced => "COERCED",
            RunStage::Inserted => "INSERTED",
            RunStage::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Strictly forward stage tracker for one source.
#[derive(Debug, Clone)]
pub struct RunState {
    stage: RunStage,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            stage: RunStage::Connected,
        }
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub fn advance(&mut self, next: RunStage) -> Result<()> {
        if self.stage.next() != Some(next) {
            bail!("Cannot move from {} to {}", self.stage, next);
        }
        debug!("{} -> {}", self.stage, next);
        self.stage = next;
        Ok(())
    }

    /// Moves to `FAILED` and returns the stage that was being attempted.
    pub fn fail(&mut self) -> RunStage {
        let attempted = self.stage.next().unwrap_or(self.stage);
        debug!("{} -> {}", self.stage, RunStage::Failed);
        self.stage = RunStage::Failed;
        attempted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SheetOutcome {
    Inserted { rows: usize },
    DryRun { rows: usize, statement: String },
    Skipped { reason: String },
    Failed { stage: RunStage, error: String },
}

impl SheetOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SheetOutcome::Inserted { .. } => "inserted",
            SheetOutcome::DryRun { .. } => "dry-run",
            SheetOutcome::Skipped { .. } => "skipped",
            SheetOutcome::Failed { .. } => "failed",
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            SheetOutcome::Inserted { rows } | SheetOutcome::DryRun { rows, .. } => *rows,
            SheetOutcome::Skipped { .. } | SheetOutcome::Failed { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetReport {
    pub spreadsheet: String,
    pub worksheet: String,
    pub dropped_columns: Vec<String>,
    pub outcome: SheetOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub table: String,
    pub sheets: Vec<SheetReport>,
}

impl RunReport {
    pub fn inserted_rows(&self) -> usize {
        self.sheets
            .iter()
            .filter(|s| matches!(s.outcome, SheetOutcome::Inserted { .. }))
            .map(|s| s.outcome.rows())
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.sheets
            .iter()
            .filter(|s| matches!(s.outcome, SheetOutcome::Failed { .. }))
            .count()
    }
}

/// What became of a sheet once it was fetched, mapped, and coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum Staged {
    Ready {
        batch: CoercedBatch,
        dropped: Vec<String>,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub dry_run: bool,
}

/// Fetches, maps, and coerces one source. Missing and empty sheets come back
/// as [`Staged::Skipped`]; every other problem is an error.
pub fn stage_sheet<S>(
    job: &JobConfig,
    source: &S,
    catalog: &ColumnTypeCatalog,
    spec: &SourceSpec,
    state: &mut RunState,
) -> Result<Staged>
where
    S: SheetSource + ?Sized,
{
    let worksheet = spec.worksheet_or(&job.table);
    let mut raw = match source.fetch(&spec.spreadsheet, worksheet) {
        Ok(raw) => raw,
        Err(err) if err.is_missing() => {
            warn!("Error: {err}");
            return Ok(Staged::Skipped {
                reason: err.to_string(),
            });
        }
        Err(err) => return Err(err.into()),
    };
    if raw.is_empty() {
        warn!(
            "No data found in the sheet '{worksheet}' of '{}'. Database update skipped.",
            spec.spreadsheet
        );
        return Ok(Staged::Skipped {
            reason: "no data rows".to_string(),
        });
    }
    state.advance(RunStage::SourceFetched)?;

    raw.clean_header(job.header_cleanup);
    let mapped = job.mapping.map_table(&raw);
    if !mapped.dropped.is_empty() {
        debug!("Unmapped sheet columns dropped: {:?}", mapped.dropped);
    }
    let dropped = mapped.dropped.clone();
    state.advance(RunStage::Mapped)?;

    let batch = coerce::transform(mapped, catalog, job.month_column.as_deref())?;
    state.advance(RunStage::Coerced)?;
    Ok(Staged::Ready { batch, dropped })
}

pub fn load_sheet<S>(
    job: &JobConfig,
    source: &S,
    catalog: &ColumnTypeCatalog,
    spec: &SourceSpec,
    destination: &mut Destination,
    options: LoadOptions,
) -> SheetReport
where
    S: SheetSource + ?Sized,
{
    let worksheet = spec.worksheet_or(&job.table).to_string();
    let mut state = RunState::new();
    let mut dropped_columns = Vec::new();
    let outcome = match state
        .advance(RunStage::SchemaRead)
        .and_then(|_| stage_sheet(job, source, catalog, spec, &mut state))
    {
        Ok(Staged::Skipped { reason }) => SheetOutcome::Skipped { reason },
        Ok(Staged::Ready { batch, dropped }) => {
            dropped_columns = dropped;
            if options.dry_run {
                match InsertStatement::new(&job.table, &batch.columns) {
                    Ok(statement) => {
                        let statement = statement.render(job.paramstyle);
                        info!(
                            "Dry run: {} row(s) from '{}' ready for: {statement}",
                            batch.row_count(),
                            spec.spreadsheet
                        );
                        SheetOutcome::DryRun {
                            rows: batch.row_count(),
                            statement,
                        }
                    }
                    Err(err) => {
                        let stage = state.fail();
                        error!("Dry run of '{}' failed: {err}", spec.spreadsheet);
                        SheetOutcome::Failed {
                            stage,
                            error: err.to_string(),
                        }
                    }
                }
            } else {
                info!("Inserting data from: {}", spec.spreadsheet);
                match destination.insert_batch(&job.table, &batch, job.replace_existing) {
                    Ok(rows) => {
                        if let Err(err) = state.advance(RunStage::Inserted) {
                            debug!("{err}");
                        }
                        info!(
                            "Inserted {rows} row(s) into '{}' for: {}",
                            job.table, spec.spreadsheet
                        );
                        SheetOutcome::Inserted { rows }
                    }
                    Err(err) => {
                        let stage = state.fail();
                        error!(
                            "Error inserting data from {}: {err}. Batch rolled back.",
                            spec.spreadsheet
                        );
                        SheetOutcome::Failed {
                            stage,
                            error: err.to_string(),
                        }
                    }
                }
            }
        }
        Err(err) => {
            let stage = state.fail();
            error!(
                "Loading '{worksheet}' of '{}' failed at {stage}: {err:#}",
                spec.spreadsheet
            );
            SheetOutcome::Failed {
                stage,
                error: format!("{err:#}"),
            }
        }
    };
    SheetReport {
        spreadsheet: spec.spreadsheet.clone(),
        worksheet,
        dropped_columns,
        outcome,
    }
}

/// Runs every source of `job` against `destination`. Only a failure to read
/// the destination catalog aborts the run.
pub fn run_job<S>(
    job: &JobConfig,
    source: &S,
    destination: &mut Destination,
    options: LoadOptions,
) -> Result<RunReport>
where
    S: SheetSource + ?Sized,
{
    let catalog = destination.introspect(&job.table)?;
    info!(
        "Column data types fetched for '{}': {} column(s)",
        job.table,
        catalog.len()
    );
    let sheets = job
        .sources
        .iter()
        .map(|spec| load_sheet(job, source, &catalog, spec, destination, options))
        .collect();
    Ok(RunReport {
        table: job.table.clone(),
        sheets,
    })
}
