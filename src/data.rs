use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use log::warn;
use rusqlite::types::{ToSql, ToSqlOutput};
use serde::{Deserialize, Serialize};

/// A coerced cell. `None` is the database NULL.
pub type Cell = Option<Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Integer(i) => i.to_sql(),
            Value::Float(f) => f.to_sql(),
            Value::Timestamp(ts) => ts.to_sql(),
            Value::Text(s) => s.to_sql(),
        }
    }
}

pub fn display_cell(cell: &Cell) -> String {
    cell.as_ref().map(Value::as_display).unwrap_or_default()
}

/// Drops thousands separators and surrounding whitespace from a numeric token.
pub fn strip_thousands(value: &str) -> String {
    value.replace(',', "").trim().to_string()
}

pub fn parse_integer(value: &str) -> Option<i64> {
    let token = strip_thousands(value);
    match token.parse::<i64>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            if is_whole_number(&token) {
                warn!("Integer '{token}' does not fit in 64 bits; treated as missing");
            }
            None
        }
    }
}

fn is_whole_number(token: &str) -> bool {
    let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// NaN parses but counts as missing, so it is folded into `None` here.
pub fn parse_float(value: &str) -> Option<f64> {
    strip_thousands(value)
        .parse::<f64>()
        .ok()
        .filter(|parsed| !parsed.is_nan())
}

// Slash and dash dates are ambiguous; month-first wins and day-first only
// catches what month-first rejects (`15/01/2025`).
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

// Month labels carry no day; they are parsed as the first of the month.
const MONTH_LABEL_FORMATS: &[&str] = &["%d-%b-%y", "%d-%b-%Y", "%d %B %Y", "%d %b %Y", "%d-%B-%y"];

/// Parses the date and datetime spellings found in the report sheets.
/// Returns `None` for anything it cannot read; callers treat that as NULL.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(parsed);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(parsed.and_time(NaiveTime::MIN));
        }
    }
    parse_month_label(trimmed).map(|date| date.and_time(NaiveTime::MIN))
}

fn parse_month_label(value: &str) -> Option<NaiveDate> {
    let separator = if value.contains('-') { "-" } else { " " };
    let candidate = format!("01{separator}{value}");
    MONTH_LABEL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&candidate, fmt).ok())
}
