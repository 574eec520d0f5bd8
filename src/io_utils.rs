//! CSV reader construction, encoding resolution, and record decoding.
//!
//! Worksheets exported from the report spreadsheets are read through here:
//!
//! - **Delimiter resolution**: `.tsv` files are tab separated, everything else
//!   is comma separated.
//! - **Encoding**: cells are decoded with `encoding_rs`, defaulting to UTF-8.
//! - **Ragged rows**: readers are flexible; the transform pads short rows.

use std::{fs::File, io::BufReader, io::Read, path::Path};

use anyhow::{Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

#[derive(Debug, Error)]
#[error("failed to decode text with encoding {encoding}")]
pub struct DecodeError {
    pub encoding: &'static str,
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

/// Header rows are returned as ordinary records so the caller sees the labels
/// exactly as written.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path) -> std::io::Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(open_csv_reader(
        BufReader::new(file),
        resolve_input_delimiter(path),
    ))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String, DecodeError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(DecodeError {
            encoding: encoding.name(),
        })
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> Result<Vec<String>, DecodeError> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}
