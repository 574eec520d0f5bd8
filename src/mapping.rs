//! Column mapping from human-authored sheet headers to warehouse columns.
//!
//! A [`ColumnMapping`] is a fixed table of `source label -> warehouse column`.
//! Projecting a header through it keeps the header's own column order, renames
//! every label the mapping knows, and drops the rest. The dropped labels are
//! returned alongside the projection so callers can report them.

use std::{collections::HashSet, fmt};

use anyhow::{Result, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser::SerializeMap};

use crate::source::RawTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderCleanup {
    /// Trim surrounding whitespace only.
    #[default]
    Trim,
    /// Trim, remove `*`, and turn `/` into `_`.
    StripSymbols,
}

impl HeaderCleanup {
    pub fn apply(self, label: &str) -> String {
        let trimmed = label.trim();
        match self {
            HeaderCleanup::Trim => trimmed.to_string(),
            HeaderCleanup::StripSymbols => trimmed.replace('*', "").replace('/', "_"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    entries: Vec<(String, String)>,
}

impl ColumnMapping {
    /// Builds a mapping from `(source label, warehouse column)` pairs. Two
    /// labels may not share a warehouse column, and a label may appear once.
    pub fn new<I, S, T>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut entries: Vec<(String, String)> = Vec::new();
        for (source, target) in pairs {
            let source = source.into();
            let target = target.into();
            if entries.iter().any(|(s, _)| *s == source) {
                bail!("Column mapping lists source column '{source}' more than once");
            }
            if let Some((other, _)) = entries.iter().find(|(_, t)| *t == target) {
                bail!(
                    "Column mapping sends both '{other}' and '{source}' to warehouse column '{target}'"
                );
            }
            entries.push((source, target));
        }
        Ok(Self { entries })
    }

    /// The identity mapping over this mapping's warehouse columns.
    pub fn canonical(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(_, target)| (target.clone(), target.clone()))
                .collect(),
        }
    }

    pub fn lookup(&self, source: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(s, _)| s == source)
            .map(|(_, target)| target.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn project(&self, header: &[String]) -> Projection {
        let mut projection = Projection::default();
        let mut produced = HashSet::new();
        for (idx, label) in header.iter().enumerate() {
            match self.lookup(label) {
                Some(target) if produced.insert(target.to_string()) => {
                    projection.header.push(target.to_string());
                    projection.indices.push(idx);
                }
                _ => projection.dropped.push(label.clone()),
            }
        }
        projection
    }

    /// Projects every row of `raw`. Cells a short row does not have come back
    /// as `None`; the fill pass turns them into empty strings.
    pub fn map_table(&self, raw: &RawTable) -> MappedTable {
        let projection = self.project(&raw.header);
        let rows = raw
            .rows
            .iter()
            .map(|row| projection.apply(row))
            .collect();
        MappedTable {
            header: projection.header,
            rows,
            dropped: projection.dropped,
        }
    }
}

impl Serialize for ColumnMapping {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (source, target) in &self.entries {
            map.serialize_entry(source, target)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ColumnMapping {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MappingVisitor;

        impl<'de> de::Visitor<'de> for MappingVisitor {
            type Value = ColumnMapping;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of sheet column labels to warehouse column names")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut pairs = Vec::new();
                while let Some((source, target)) = access.next_entry::<String, String>()? {
                    pairs.push((source, target));
                }
                ColumnMapping::new(pairs).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}

/// Result of projecting a header through a [`ColumnMapping`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub header: Vec<String>,
    /// Source position of each output column.
    pub indices: Vec<usize>,
    pub dropped: Vec<String>,
}

impl Projection {
    pub fn apply(&self, row: &[String]) -> Vec<Option<String>> {
        self.indices.iter().map(|&idx| row.get(idx).cloned()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub dropped: Vec<String>,
}

impl MappedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
