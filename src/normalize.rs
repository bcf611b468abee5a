//! Date normalization: parses each source's temporal key into a canonical
//! calendar date and applies the inclusive date-range filter.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::table::{DateRange, NormalizedRecord, NormalizedTable, RawTable};

/// Formats tried, in order, for timestamps without an offset.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Formats tried for day-granularity keys.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"];

/// Offset-carrying formats that are not strict RFC 3339.
const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// How a timestamp is reduced to a calendar date.
///
/// Naive timestamps (no offset) are always read as wall-clock time. The
/// policy only matters for timestamps that carry an explicit offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampPolicy {
    /// Truncate in the offset the timestamp was written in.
    #[default]
    WallClock,
    /// Convert to UTC, then truncate.
    Utc,
}

impl FromStr for TimestampPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wall-clock" | "wallclock" | "local" => Ok(TimestampPolicy::WallClock),
            "utc" => Ok(TimestampPolicy::Utc),
            other => Err(format!("unknown timestamp policy: {}", other)),
        }
    }
}

/// A row whose temporal key could not be parsed. The row is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedTimestamp {
    /// Index of the row in the raw table
    pub row: usize,
    /// The unparseable value
    pub value: String,
}

impl std::fmt::Display for MalformedTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Malformed timestamp '{}' in row {}", self.value, self.row)
    }
}

impl std::error::Error for MalformedTimestamp {}

/// Parses a timestamp or date string.
///
/// Day-only values map to midnight. Offset-carrying values are resolved
/// according to `policy`.
pub fn parse_timestamp(raw: &str, policy: TimestampPolicy) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    let with_offset = DateTime::parse_from_rfc3339(value).ok().or_else(|| {
        OFFSET_DATETIME_FORMATS
            .iter()
            .find_map(|format| DateTime::parse_from_str(value, format).ok())
    });
    if let Some(timestamp) = with_offset {
        return Some(match policy {
            TimestampPolicy::WallClock => timestamp.naive_local(),
            TimestampPolicy::Utc => timestamp.naive_utc(),
        });
    }

    if let Some(timestamp) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    {
        return Some(timestamp);
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Parses every record's temporal key, truncates it to a calendar date and
/// keeps the rows inside `range` (all rows when `range` is `None`).
///
/// Rows with an unparseable key are dropped and listed in
/// [`NormalizedTable::dropped`]; they never fail the whole table. Kept rows
/// are returned in timestamp order (stable for equal timestamps).
pub fn normalize(
    table: &RawTable,
    policy: TimestampPolicy,
    range: Option<&DateRange>,
) -> NormalizedTable {
    let mut records = Vec::with_capacity(table.len());
    let mut dropped = Vec::new();

    for (row, record) in table.records.iter().enumerate() {
        let Some(timestamp) = parse_timestamp(&record.time, policy) else {
            warn!(
                source = %table.source,
                column = %table.time_column,
                row,
                value = %record.time,
                "dropping row with malformed timestamp"
            );
            dropped.push(MalformedTimestamp {
                row,
                value: record.time.clone(),
            });
            continue;
        };

        let date = timestamp.date();
        if range.is_some_and(|range| !range.contains(date)) {
            continue;
        }

        records.push(NormalizedRecord {
            date,
            timestamp,
            values: record.values.clone(),
            labels: record.labels.clone(),
        });
    }

    records.sort_by_key(|record| record.timestamp);

    debug!(
        source = %table.source,
        kept = records.len(),
        dropped = dropped.len(),
        "normalized source"
    );

    NormalizedTable {
        source: table.source.clone(),
        columns: table.columns.clone(),
        records,
        dropped,
    }
}
