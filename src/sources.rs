//! Source readers: the wearable collections API and local delimited files.

pub mod delimited;
pub mod oura;

use crate::table::RawTable;

/// Errors that can occur when reading a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// A credential the source needs was not configured
    ConfigurationMissing(String),
    /// Network failure, non-2xx response or malformed response body
    SourceUnavailable { source: String, reason: String },
    /// Local file does not exist
    SourceNotFound { source: String, path: String },
    /// Local file exists but cannot be parsed (bad encoding, missing header)
    MalformedSource { source: String, reason: String },
}

impl SourceError {
    pub(crate) fn unavailable(source: &str, reason: impl Into<String>) -> Self {
        SourceError::SourceUnavailable {
            source: source.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(source: &str, reason: impl Into<String>) -> Self {
        SourceError::MalformedSource {
            source: source.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::ConfigurationMissing(msg) => write!(f, "Configuration missing: {}", msg),
            SourceError::SourceUnavailable { source, reason } => {
                write!(f, "Source '{}' unavailable: {}", source, reason)
            }
            SourceError::SourceNotFound { source, path } => {
                write!(f, "Source '{}' not found at {}", source, path)
            }
            SourceError::MalformedSource { source, reason } => {
                write!(f, "Source '{}' is malformed: {}", source, reason)
            }
        }
    }
}

impl std::error::Error for SourceError {}

/// A locally readable source.
///
/// Local readers return every row they hold; the date-range filter is
/// applied during normalization, after timestamps are parsed.
pub trait DataSource: Send + Sync {
    /// Identifier used in logs, errors and panel messages.
    fn id(&self) -> String;

    /// Reads all rows.
    ///
    /// # Errors
    /// Returns `SourceNotFound` if the backing file is missing and
    /// `MalformedSource` if it cannot be parsed.
    fn read(&self) -> Result<RawTable, SourceError>;
}

/// Source backed by a table held in memory, for fixtures and tests.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    table: RawTable,
}

impl InMemorySource {
    pub fn new(table: RawTable) -> Self {
        InMemorySource { table }
    }
}

impl DataSource for InMemorySource {
    fn id(&self) -> String {
        self.table.source.clone()
    }

    fn read(&self) -> Result<RawTable, SourceError> {
        Ok(self.table.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RawRecord;

    #[test]
    fn test_in_memory_source_returns_its_table() {
        let table = RawTable::new("fixture", "day")
            .with_records(vec![RawRecord::new("2024-06-01").with("steps", 1200.0)]);
        let source = InMemorySource::new(table.clone());

        assert_eq!(source.id(), "fixture");
        assert_eq!(source.read().unwrap(), table);
    }

    #[test]
    fn test_source_error_display() {
        let error = SourceError::unavailable("oura:sleep", "HTTP 503: Service Unavailable");
        assert!(error.to_string().contains("oura:sleep"));
        assert!(error.to_string().contains("503"));

        let error = SourceError::SourceNotFound {
            source: "indoor".to_string(),
            path: "yw_govee.csv".to_string(),
        };
        assert_eq!(error.to_string(), "Source 'indoor' not found at yw_govee.csv");
    }
}
