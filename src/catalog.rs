//! Destination schema introspection and type-tag normalization.
//!
//! [`introspect()`] reads the declared column types of a destination table and
//! returns a [`ColumnTypeCatalog`]: the ordered list of warehouse columns and
//! the coarse [`TypeTag`] each one is coerced to. The catalog order is the
//! order of the generated `INSERT` column list.

use std::{fmt, str::FromStr};

use anyhow::{Context, Result};
use log::{debug, warn};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    Int,
    BigInt,
    Decimal,
    Float,
    Numeric,
    Date,
    DateTime,
    Varchar,
    Text,
    NVarchar,
    Other(String),
}

/// How a [`TypeTag`] is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeClass {
    Integer,
    Float,
    Temporal,
    Text,
}

impl TypeTag {
    pub fn class(&self) -> TypeClass {
        match self {
            TypeTag::Int | TypeTag::BigInt => TypeClass::Integer,
            TypeTag::Decimal | TypeTag::Float | TypeTag::Numeric => TypeClass::Float,
            TypeTag::Date | TypeTag::DateTime => TypeClass::Temporal,
            TypeTag::Varchar | TypeTag::Text | TypeTag::NVarchar | TypeTag::Other(_) => {
                TypeClass::Text
            }
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.class(), TypeClass::Integer | TypeClass::Float)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TypeTag::Int => "INT",
            TypeTag::BigInt => "BIGINT",
            TypeTag::Decimal => "DECIMAL",
            TypeTag::Float => "FLOAT",
            TypeTag::Numeric => "NUMERIC",
            TypeTag::Date => "DATE",
            TypeTag::DateTime => "DATETIME",
            TypeTag::Varchar => "VARCHAR",
            TypeTag::Text => "TEXT",
            TypeTag::NVarchar => "NVARCHAR",
            TypeTag::Other(name) => name,
        }
    }

    /// Normalizes a declared column type such as `varchar(255)` or
    /// `DECIMAL(12, 2)` to its upper-case base tag.
    pub fn from_declared(declared: &str) -> Self {
        let base = declared
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_uppercase();
        match base.as_str() {
            "INT" | "INTEGER" => TypeTag::Int,
            "BIGINT" => TypeTag::BigInt,
            "DECIMAL" => TypeTag::Decimal,
            "FLOAT" | "REAL" | "DOUBLE" => TypeTag::Float,
            "NUMERIC" => TypeTag::Numeric,
            "DATE" => TypeTag::Date,
            "DATETIME" => TypeTag::DateTime,
            "VARCHAR" => TypeTag::Varchar,
            "TEXT" => TypeTag::Text,
            "NVARCHAR" => TypeTag::NVarchar,
            "" => TypeTag::Varchar,
            _ => TypeTag::Other(base),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(TypeTag::from_declared(s))
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TypeClass::Integer => "integer",
            TypeClass::Float => "float",
            TypeClass::Temporal => "temporal",
            TypeClass::Text => "text",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogColumn {
    pub name: String,
    pub declared: String,
    pub tag: TypeTag,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTypeCatalog {
    columns: Vec<CatalogColumn>,
}

impl ColumnTypeCatalog {
    pub fn new(columns: Vec<CatalogColumn>) -> Self {
        Self { columns }
    }

    /// Builds a catalog from `(name, declared type)` pairs, keeping their order.
    pub fn from_declared<I, N, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        let columns = pairs
            .into_iter()
            .map(|(name, declared)| {
                let declared = declared.into();
                CatalogColumn {
                    name: name.into(),
                    tag: TypeTag::from_declared(&declared),
                    declared,
                }
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[CatalogColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn get(&self, name: &str) -> Option<&TypeTag> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| &column.tag)
    }

    /// Type used to coerce `name`. Columns the catalog does not know are text.
    pub fn tag_for(&self, name: &str) -> TypeTag {
        self.get(name).cloned().unwrap_or(TypeTag::Varchar)
    }
}

/// Reads the declared column types of `table`. An unknown table yields an
/// empty catalog, which makes every lookup fall back to `VARCHAR`.
pub fn introspect(conn: &Connection, table: &str) -> Result<ColumnTypeCatalog> {
    let mut stmt = conn
        .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
        .context("Preparing catalog query")?;
    let rows = stmt
        .query_map([table], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .with_context(|| format!("Querying catalog for table '{table}'"))?;
    let mut pairs = Vec::new();
    for row in rows {
        pairs.push(row.with_context(|| format!("Reading catalog row for '{table}'"))?);
    }
    let catalog = ColumnTypeCatalog::from_declared(pairs);
    if catalog.is_empty() {
        warn!("Catalog for table '{table}' returned no columns; values will be treated as VARCHAR");
    } else {
        debug!(
            "Column data types for '{table}': {}",
            catalog
                .columns()
                .iter()
                .map(|c| format!("{}={}", c.name, c.tag))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_declared_strips_precision_and_uppercases() {
        assert_eq!(TypeTag::from_declared("varchar(255)"), TypeTag::Varchar);
        assert_eq!(TypeTag::from_declared("DECIMAL(12, 2)"), TypeTag::Decimal);
        assert_eq!(TypeTag::from_declared(" bigint "), TypeTag::BigInt);
        assert_eq!(TypeTag::from_declared("nvarchar(max)"), TypeTag::NVarchar);
        assert_eq!(TypeTag::from_declared("datetime"), TypeTag::DateTime);
    }

    #[test]
    fn from_declared_folds_sqlite_spellings() {
        assert_eq!(TypeTag::from_declared("INTEGER"), TypeTag::Int);
        assert_eq!(TypeTag::from_declared("REAL"), TypeTag::Float);
        assert_eq!(TypeTag::from_declared(""), TypeTag::Varchar);
        assert_eq!(
            TypeTag::from_declared("blob"),
            TypeTag::Other("BLOB".to_string())
        );
    }

    #[test]
    fn classes_group_tags() {
        assert_eq!(TypeTag::BigInt.class(), TypeClass::Integer);
        assert_eq!(TypeTag::Numeric.class(), TypeClass::Float);
        assert_eq!(TypeTag::Date.class(), TypeClass::Temporal);
        assert_eq!(TypeTag::Other("CHAR".into()).class(), TypeClass::Text);
        assert!(TypeTag::Decimal.is_numeric());
        assert!(!TypeTag::DateTime.is_numeric());
    }

    #[test]
    fn tag_for_defaults_to_varchar() {
        let catalog = ColumnTypeCatalog::from_declared([("Channel", "VARCHAR(50)")]);
        assert_eq!(catalog.tag_for("Channel"), TypeTag::Varchar);
        assert_eq!(catalog.tag_for("Missing"), TypeTag::Varchar);
        assert_eq!(ColumnTypeCatalog::default().tag_for("x"), TypeTag::Varchar);
    }

    #[test]
    fn introspect_reads_declared_order_and_types() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE CANARA (Data_Month VARCHAR(20), TotalAlert INT, Total_Amount_Saved DECIMAL(14,2), Scenario_Last_Modified_date DATE)",
        )
        .unwrap();
        let catalog = introspect(&conn, "CANARA").unwrap();
        assert_eq!(
            catalog.column_names(),
            vec![
                "Data_Month",
                "TotalAlert",
                "Total_Amount_Saved",
                "Scenario_Last_Modified_date"
            ]
        );
        assert_eq!(catalog.tag_for("TotalAlert"), TypeTag::Int);
        assert_eq!(catalog.tag_for("Total_Amount_Saved"), TypeTag::Decimal);
        assert_eq!(catalog.columns()[0].declared, "VARCHAR(20)");
    }

    #[test]
    fn introspect_unknown_table_is_empty() {
        let conn = Connection::open_in_memory().unwrap();
        let catalog = introspect(&conn, "NOPE").unwrap();
        assert!(catalog.is_empty());
    }
}
