//! Local delimited files: indoor sensor samples and outdoor weather extremes.
//!
//! # Formats
//!
//! - **Environment samples**: `Timestamp,Temperature_Fahrenheit,Relative_Humidity`
//! - **Weather extremes**: `date,temp_min,temp_max`
//!
//! Extra columns are ignored. Empty or non-numeric cells become missing
//! values; a missing required header fails the whole file.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::{DataSource, SourceError};
use crate::table::{RawRecord, RawTable};

/// A delimited file with one temporal column and a set of numeric columns.
#[derive(Debug, Clone)]
pub struct DelimitedFile {
    id: String,
    path: PathBuf,
    time_column: String,
    value_columns: Vec<String>,
    delimiter: u8,
}

impl DelimitedFile {
    pub fn new(
        id: impl Into<String>,
        path: impl AsRef<Path>,
        time_column: &str,
        value_columns: &[&str],
    ) -> Self {
        DelimitedFile {
            id: id.into(),
            path: path.as_ref().to_path_buf(),
            time_column: time_column.to_string(),
            value_columns: value_columns.iter().map(|c| c.to_string()).collect(),
            delimiter: b',',
        }
    }

    /// Indoor temperature/humidity samples.
    pub fn environment_samples(path: impl AsRef<Path>) -> Self {
        Self::new(
            "indoor",
            path,
            "Timestamp",
            &["Temperature_Fahrenheit", "Relative_Humidity"],
        )
    }

    /// Daily outdoor minimum/maximum temperatures.
    pub fn weather_extremes(path: impl AsRef<Path>) -> Self {
        Self::new("outdoor", path, "date", &["temp_min", "temp_max"])
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses delimited rows from `reader`.
    pub fn parse<R: Read>(&self, reader: R) -> Result<RawTable, SourceError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .delimiter(self.delimiter)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| SourceError::malformed(&self.id, e.to_string()))?
            .clone();
        let time_idx = self.column_index(&headers, &self.time_column)?;
        let value_idx = self
            .value_columns
            .iter()
            .map(|column| Ok((column.as_str(), self.column_index(&headers, column)?)))
            .collect::<Result<Vec<_>, SourceError>>()?;

        let mut records = Vec::new();
        let mut skipped_cells = 0u32;
        for result in rdr.records() {
            let row = result.map_err(|e| SourceError::malformed(&self.id, e.to_string()))?;
            let mut record = RawRecord::new(row.get(time_idx).unwrap_or(""));
            for (column, idx) in &value_idx {
                match row.get(*idx).map(str::parse::<f64>) {
                    Some(Ok(value)) => {
                        record.values.insert(column.to_string(), value);
                    }
                    Some(Err(_)) if !row[*idx].is_empty() => skipped_cells += 1,
                    _ => {}
                }
            }
            records.push(record);
        }

        if skipped_cells > 0 {
            log::warn!(
                "{}: {} non-numeric cell(s) treated as missing",
                self.id,
                skipped_cells
            );
        }
        log::info!("{}: loaded {} rows from {}", self.id, records.len(), self.path.display());

        Ok(RawTable::new(self.id.clone(), self.time_column.clone())
            .with_columns(self.value_columns.iter().cloned())
            .with_records(records))
    }

    fn column_index(&self, headers: &StringRecord, column: &str) -> Result<usize, SourceError> {
        headers
            .iter()
            .position(|header| header == column)
            .ok_or_else(|| SourceError::malformed(&self.id, format!("missing column '{}'", column)))
    }
}

impl DataSource for DelimitedFile {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn read(&self) -> Result<RawTable, SourceError> {
        let file = File::open(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::SourceNotFound {
                source: self.id.clone(),
                path: self.path.display().to_string(),
            },
            _ => SourceError::malformed(&self.id, e.to_string()),
        })?;
        self.parse(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_samples_parse() {
        let csv = "\
Timestamp,Temperature_Fahrenheit,Relative_Humidity,Battery
2024-06-01 08:00:00,70.0,40.0,98
2024-06-01 20:00:00, 74.0 ,44.0,97
";
        let table = DelimitedFile::environment_samples("unused.csv")
            .parse(csv.as_bytes())
            .unwrap();

        assert_eq!(table.source, "indoor");
        assert_eq!(table.time_column, "Timestamp");
        assert_eq!(table.columns, vec!["Temperature_Fahrenheit", "Relative_Humidity"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[1].time, "2024-06-01 20:00:00");
        assert_eq!(table.records[1].values["Temperature_Fahrenheit"], 74.0);
        assert!(!table.records[0].values.contains_key("Battery"));
    }

    #[test]
    fn test_blank_and_non_numeric_cells_are_missing() {
        let csv = "date,temp_min,temp_max\n2024-06-01,,81\n2024-06-02,T,83\n";
        let table = DelimitedFile::weather_extremes("unused.csv")
            .parse(csv.as_bytes())
            .unwrap();

        assert_eq!(table.len(), 2);
        assert!(!table.records[0].values.contains_key("temp_min"));
        assert!(!table.records[1].values.contains_key("temp_min"));
        assert_eq!(table.records[1].values["temp_max"], 83.0);
    }

    #[test]
    fn test_missing_required_header() {
        let csv = "date,tmin,temp_max\n2024-06-01,60,81\n";
        let result = DelimitedFile::weather_extremes("unused.csv").parse(csv.as_bytes());
        assert_eq!(
            result,
            Err(SourceError::MalformedSource {
                source: "outdoor".to_string(),
                reason: "missing column 'temp_min'".to_string(),
            })
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let tsv = "date\ttemp_min\ttemp_max\n2024-06-01\t60\t81\n";
        let table = DelimitedFile::weather_extremes("unused.tsv")
            .with_delimiter(b'\t')
            .parse(tsv.as_bytes())
            .unwrap();
        assert_eq!(table.records[0].values["temp_min"], 60.0);
    }

    #[test]
    fn test_missing_file_is_source_not_found() {
        let path = std::env::temp_dir().join("vitals-definitely-missing.csv");
        let result = DelimitedFile::environment_samples(&path).read();
        assert!(matches!(result, Err(SourceError::SourceNotFound { .. })));
    }

    #[test]
    fn test_read_from_disk() {
        let path = std::env::temp_dir().join(format!("vitals-delimited-{}.csv", std::process::id()));
        std::fs::write(&path, "date,temp_min,temp_max\n2024-06-01,60,81\n").unwrap();

        let table = DelimitedFile::weather_extremes(&path).read().unwrap();

        assert_eq!(table.len(), 1);
        std::fs::remove_file(path).ok();
    }
}
