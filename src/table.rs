//! Tables flowing through the pipeline: raw source rows, normalized rows
//! keyed by calendar date, and one-row-per-date daily tables.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::normalize::MalformedTimestamp;

/// Date range used to filter every source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// Start date (inclusive)
    pub start: NaiveDate,
    /// End date (inclusive)
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new DateRange.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    /// Returns `true` when start is not after end.
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Returns `true` if `date` falls within the range, bounds included.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// One row as emitted by a source reader.
///
/// `time` holds the raw temporal key exactly as the source wrote it; every
/// other field is an optional numeric metric keyed by column name. A metric
/// the row does not carry is simply absent from `values`. Text fields
/// (activity names, measurement sources) go to `labels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub time: String,
    pub values: BTreeMap<String, f64>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl RawRecord {
    /// Creates a record with no metrics.
    pub fn new(time: impl Into<String>) -> Self {
        RawRecord {
            time: time.into(),
            values: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }

    /// Adds a metric value, consuming and returning the record.
    pub fn with(mut self, column: impl Into<String>, value: f64) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    /// Adds a text field, consuming and returning the record.
    pub fn with_label(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(field.into(), value.into());
        self
    }
}

/// Rows read from one source, with the name of their temporal column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Source identifier, used in logs and error messages
    pub source: String,
    /// Name of the column the temporal key was read from
    pub time_column: String,
    /// Metric columns the source declares, in source order
    pub columns: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(source: impl Into<String>, time_column: impl Into<String>) -> Self {
        RawTable {
            source: source.into(),
            time_column: time_column.into(),
            columns: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Declares the metric columns up front, even if no record carries them.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            self.declare(column.into());
        }
        self
    }

    /// Sets the records; any metric not yet declared is appended to the schema.
    pub fn with_records(mut self, records: Vec<RawRecord>) -> Self {
        let seen: BTreeSet<String> = records
            .iter()
            .flat_map(|record| record.values.keys().cloned())
            .collect();
        for column in seen {
            self.declare(column);
        }
        self.records = records;
        self
    }

    fn declare(&mut self, column: String) {
        if !self.columns.contains(&column) {
            self.columns.push(column);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A raw record whose temporal key has been parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    /// Canonical calendar date (timestamp truncated)
    pub date: NaiveDate,
    /// Full timestamp; midnight for day-granularity sources
    pub timestamp: NaiveDateTime,
    pub values: BTreeMap<String, f64>,
    pub labels: BTreeMap<String, String>,
}

impl NormalizedRecord {
    /// Whether the record has `field` as either a metric or a label.
    pub fn carries(&self, field: &str) -> bool {
        self.values.contains_key(field) || self.labels.contains_key(field)
    }
}

/// Output of date normalization: in-range rows plus the rows that were
/// dropped because their timestamp could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTable {
    pub source: String,
    pub columns: Vec<String>,
    pub records: Vec<NormalizedRecord>,
    pub dropped: Vec<MalformedTimestamp>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One row of a daily table. `None` marks a missing value, never zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub values: BTreeMap<String, Option<f64>>,
}

impl DailyRow {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }
}

/// One row per calendar date, sorted ascending, with a fixed column schema.
///
/// Used both for per-source daily aggregates and for joined tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTable {
    columns: Vec<String>,
    rows: Vec<DailyRow>,
}

impl DailyTable {
    /// Creates an empty table with the given schema.
    pub fn empty(columns: Vec<String>) -> Self {
        DailyTable {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from rows keyed by date.
    ///
    /// Every row is padded with `None` for schema columns it does not carry,
    /// and values for columns outside the schema are discarded.
    pub fn from_rows(
        columns: Vec<String>,
        rows: BTreeMap<NaiveDate, BTreeMap<String, Option<f64>>>,
    ) -> Self {
        let rows = rows
            .into_iter()
            .map(|(date, mut values)| {
                let values = columns
                    .iter()
                    .map(|column| (column.clone(), values.remove(column).flatten()))
                    .collect();
                DailyRow { date, values }
            })
            .collect();

        DailyTable { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[DailyRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|row| row.date).collect()
    }

    pub fn row(&self, date: NaiveDate) -> Option<&DailyRow> {
        self.rows
            .binary_search_by_key(&date, |row| row.date)
            .ok()
            .map(|idx| &self.rows[idx])
    }

    /// Value of `column` on `date`, `None` if the date, column or value is missing.
    pub fn get(&self, date: NaiveDate, column: &str) -> Option<f64> {
        self.row(date).and_then(|row| row.get(column))
    }

    /// All values of one column in date order, or `None` if the column is
    /// not part of the schema.
    pub fn column(&self, column: &str) -> Option<Vec<Option<f64>>> {
        if !self.has_column(column) {
            return None;
        }
        Some(self.rows.iter().map(|row| row.get(column)).collect())
    }
}
