use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Load bank report sheets into warehouse tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Map, coerce, and insert every source listed in a job file
    Load(LoadArgs),
    /// Show the column types of a destination table
    Schema(SchemaArgs),
    /// Print the first coerced rows of each source without inserting
    Preview(PreviewArgs),
}

#[derive(Debug, Args)]
pub struct JobArgs {
    /// YAML job file describing the table, mapping, and sources
    #[arg(short, long)]
    pub job: PathBuf,
    /// Destination database (overrides the job file)
    #[arg(short, long)]
    pub database: Option<PathBuf>,
    /// Directory holding one folder per spreadsheet (overrides the job file)
    #[arg(long = "source-root")]
    pub source_root: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub job: JobArgs,
    /// Stop after coercion and report what would be inserted
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Destination database
    #[arg(short, long)]
    pub database: PathBuf,
    /// Destination table
    #[arg(short, long)]
    pub table: String,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub job: JobArgs,
    /// Number of rows to display per source
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}
