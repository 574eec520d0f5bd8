pub mod catalog;
pub mod cli;
pub mod coerce;
pub mod config;
pub mod data;
pub mod io_utils;
pub mod mapping;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, error, info, warn};

use crate::{
    cli::{Cli, Commands, JobArgs},
    config::JobConfig,
    data::display_cell,
    pipeline::{LoadOptions, RunReport, RunStage, RunState, SheetOutcome, Staged},
    sink::{Destination, InsertStatement},
    source::CsvWorkbookSource,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("report_etl", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Load(args) => handle_load(&args),
        Commands::Schema(args) => handle_schema(&args),
        Commands::Preview(args) => handle_preview(&args),
    }
}

struct OpenedJob {
    job: JobConfig,
    source: CsvWorkbookSource,
    destination: Destination,
}

fn open_job(args: &JobArgs) -> Result<OpenedJob> {
    let job = JobConfig::load(&args.job)?;
    let database = job.database_path(args.database.as_deref()).ok_or_else(|| {
        anyhow!(
            "No destination database; pass --database or set 'database' in {:?}",
            args.job
        )
    })?;
    let encoding = io_utils::resolve_encoding(job.input_encoding.as_deref())?;
    let root = job.source_root(args.source_root.as_deref());
    info!(
        "Job '{}': {} source(s) from {:?} into '{}'",
        args.job.display(),
        job.sources.len(),
        root,
        job.table
    );
    let destination = Destination::open(&database)?;
    Ok(OpenedJob {
        source: CsvWorkbookSource::new(root, encoding),
        job,
        destination,
    })
}

fn handle_load(args: &cli::LoadArgs) -> Result<()> {
    let OpenedJob {
        job,
        source,
        mut destination,
    } = open_job(&args.job)?;
    let options = LoadOptions {
        dry_run: args.dry_run,
    };
    let report = pipeline::run_job(&job, &source, &mut destination, options)
        .with_context(|| format!("Loading table '{}'", job.table))?;
    print_report(&report);
    info!(
        "Loaded {} row(s) into '{}' from {} source(s); {} failed",
        report.inserted_rows(),
        report.table,
        report.sheets.len(),
        report.failures()
    );
    Ok(())
}

fn print_report(report: &RunReport) {
    let headers = ["spreadsheet", "worksheet", "status", "rows", "detail"]
        .map(String::from)
        .to_vec();
    let rows = report
        .sheets
        .iter()
        .map(|sheet| {
            let detail = match &sheet.outcome {
                SheetOutcome::Skipped { reason } => reason.clone(),
                SheetOutcome::Failed { stage, error } => format!("{stage}: {error}"),
                SheetOutcome::DryRun { statement, .. } => statement.clone(),
                SheetOutcome::Inserted { .. } => {
                    if sheet.dropped_columns.is_empty() {
                        String::new()
                    } else {
                        format!("{} unmapped column(s) dropped", sheet.dropped_columns.len())
                    }
                }
            };
            vec![
                sheet.spreadsheet.clone(),
                sheet.worksheet.clone(),
                sheet.outcome.label().to_string(),
                sheet.outcome.rows().to_string(),
                detail,
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
}

fn handle_schema(args: &cli::SchemaArgs) -> Result<()> {
    let destination = Destination::open(&args.database)?;
    let catalog = destination.introspect(&args.table)?;
    if args.json {
        let rendered =
            serde_json::to_string_pretty(catalog.columns()).context("Serializing catalog")?;
        println!("{rendered}");
        return Ok(());
    }
    if catalog.is_empty() {
        warn!("Table '{}' has no columns in {:?}", args.table, args.database);
        return Ok(());
    }
    let headers = ["#", "column", "declared", "tag", "class"]
        .map(String::from)
        .to_vec();
    let rows = catalog
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            vec![
                (idx + 1).to_string(),
                column.name.clone(),
                column.declared.clone(),
                column.tag.to_string(),
                column.tag.class().to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let OpenedJob {
        job,
        source,
        destination,
    } = open_job(&args.job)?;
    let catalog = destination.introspect(&job.table)?;
    for spec in &job.sources {
        let worksheet = spec.worksheet_or(&job.table);
        let mut state = RunState::new();
        state.advance(RunStage::SchemaRead)?;
        match pipeline::stage_sheet(&job, &source, &catalog, spec, &mut state) {
            Ok(Staged::Ready { batch, .. }) => {
                println!("== {} / {worksheet} ==", spec.spreadsheet);
                if let Ok(statement) = InsertStatement::new(&job.table, &batch.columns) {
                    println!("{}", statement.render(job.paramstyle));
                }
                let rows = batch
                    .rows
                    .iter()
                    .take(args.rows)
                    .map(|row| row.iter().map(display_cell).collect::<Vec<_>>())
                    .collect::<Vec<_>>();
                table::print_table(&batch.columns, &rows);
                info!(
                    "Displayed {} of {} row(s) from '{}'",
                    rows.len(),
                    batch.row_count(),
                    spec.spreadsheet
                );
            }
            Ok(Staged::Skipped { reason }) => {
                info!("Skipping '{}': {reason}", spec.spreadsheet);
            }
            Err(err) => {
                let stage = state.fail();
                error!("Preview of '{}' failed at {stage}: {err:#}", spec.spreadsheet);
            }
        }
    }
    Ok(())
}
