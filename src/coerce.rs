//! Typed coercion of mapped sheet rows.
//!
//! The passes run in a fixed order and each one is exposed on its own:
//!
//! 1. [`fill_missing()`] turns absent cells into empty strings.
//! 2. [`sort_by_month()`] (optional) orders rows by a month-label column.
//! 3. [`coerce_rows()`] converts every cell to its catalog type; blank and
//!    unparseable cells become NULL.
//! 4. [`select_catalog_columns()`] reorders columns to the catalog order.
//! 5. [`zero_fill_numeric()`] replaces the NULLs left in numeric columns with zero.
//!
//! Numeric columns therefore pass through an observable NULL state before
//! they are zeroed.

use anyhow::{Result, bail};
use log::{debug, warn};

use crate::{
    catalog::{ColumnTypeCatalog, TypeClass, TypeTag},
    data::{Cell, Value, parse_float, parse_integer, parse_timestamp},
    mapping::MappedTable,
};

pub type TypedRow = Vec<Cell>;

/// Rows ready for insertion, positionally aligned with `columns`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoercedBatch {
    pub columns: Vec<String>,
    pub rows: Vec<TypedRow>,
}

impl CoercedBatch {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }
}

pub fn fill_missing(rows: Vec<Vec<Option<String>>>) -> Vec<Vec<String>> {
    rows.into_iter()
        .map(|row| row.into_iter().map(Option::unwrap_or_default).collect())
        .collect()
}

/// Stable ascending sort on the raw text of `column`. Labels such as
/// `Jan-25` compare as strings, so `Feb-25` sorts before `Jan-25`.
/// Returns `false` and leaves the rows alone when the column is absent.
pub fn sort_by_month(header: &[String], rows: &mut [Vec<String>], column: &str) -> bool {
    let Some(idx) = header.iter().position(|h| h == column) else {
        warn!("Month column '{column}' is not among the mapped columns; row order kept");
        return false;
    };
    rows.sort_by(|a, b| a[idx].cmp(&b[idx]));
    true
}

pub fn coerce_value(value: &str, tag: &TypeTag) -> Cell {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match tag.class() {
        TypeClass::Integer => parse_integer(trimmed).map(Value::Integer),
        TypeClass::Float => parse_float(trimmed).map(Value::Float),
        TypeClass::Temporal => parse_timestamp(trimmed).map(Value::Timestamp),
        TypeClass::Text => Some(Value::Text(trimmed.to_string())),
    }
}

pub fn coerce_rows(
    header: &[String],
    rows: &[Vec<String>],
    catalog: &ColumnTypeCatalog,
) -> Vec<TypedRow> {
    let tags = header
        .iter()
        .map(|name| catalog.tag_for(name))
        .collect::<Vec<_>>();
    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&tags)
                .map(|(value, tag)| coerce_value(value, tag))
                .collect()
        })
        .collect()
}

/// Reorders each row to the catalog's column order. Mapped columns the
/// catalog does not declare are discarded; a catalog column with no mapped
/// source is an error because the insert lists every catalog column.
pub fn select_catalog_columns(
    header: &[String],
    rows: Vec<TypedRow>,
    catalog: &ColumnTypeCatalog,
) -> Result<CoercedBatch> {
    let columns = catalog.column_names();
    let mut positions = Vec::with_capacity(columns.len());
    let mut missing = Vec::new();
    for name in &columns {
        match header.iter().position(|h| h == name) {
            Some(idx) => positions.push(idx),
            None => missing.push(name.clone()),
        }
    }
    if !missing.is_empty() {
        bail!(
            "Destination column(s) {} have no mapped source column",
            missing.join(", ")
        );
    }
    let unused = header
        .iter()
        .filter(|h| !columns.contains(*h))
        .collect::<Vec<_>>();
    if !unused.is_empty() {
        debug!("Columns not in destination catalog discarded: {unused:?}");
    }
    let rows = rows
        .into_iter()
        .map(|mut row| {
            positions
                .iter()
                .map(|&idx| row[idx].take())
                .collect::<TypedRow>()
        })
        .collect();
    Ok(CoercedBatch { columns, rows })
}

pub fn zero_fill_numeric(batch: &mut CoercedBatch, catalog: &ColumnTypeCatalog) {
    let zeros = batch
        .columns
        .iter()
        .map(|name| match catalog.tag_for(name).class() {
            TypeClass::Integer => Some(Value::Integer(0)),
            TypeClass::Float => Some(Value::Float(0.0)),
            TypeClass::Temporal | TypeClass::Text => None,
        })
        .collect::<Vec<_>>();
    for row in &mut batch.rows {
        for (cell, zero) in row.iter_mut().zip(&zeros) {
            if cell.is_none() {
                *cell = zero.clone();
            }
        }
    }
}

/// Runs every pass over a mapped table.
pub fn transform(
    mapped: MappedTable,
    catalog: &ColumnTypeCatalog,
    month_column: Option<&str>,
) -> Result<CoercedBatch> {
    let MappedTable { header, rows, .. } = mapped;
    let mut rows = fill_missing(rows);
    if let Some(column) = month_column {
        sort_by_month(&header, &mut rows, column);
    }
    let typed = coerce_rows(&header, &rows, catalog);
    let mut batch = select_catalog_columns(&header, typed, catalog)?;
    zero_fill_numeric(&mut batch, catalog);
    Ok(batch)
}
