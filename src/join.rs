//! Left join of daily tables on the calendar date.

use std::collections::BTreeMap;

use crate::table::DailyTable;

/// Errors that can occur while joining daily tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// Two operands both define this column
    ColumnConflict(String),
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinError::ColumnConflict(column) => {
                write!(f, "Column '{}' is defined by more than one joined table", column)
            }
        }
    }
}

impl std::error::Error for JoinError {}

/// Left-joins `secondaries` onto `primary` by date.
///
/// The result has exactly the primary's dates. Secondary values are copied
/// for matching dates; primary dates a secondary lacks get `None` for that
/// secondary's columns, and secondary-only dates are dropped. An empty
/// secondary contributes all-missing columns.
///
/// # Errors
/// Returns `JoinError::ColumnConflict` if a column name appears in more than
/// one operand.
pub fn left_join(primary: &DailyTable, secondaries: &[&DailyTable]) -> Result<DailyTable, JoinError> {
    let mut columns: Vec<String> = primary.columns().to_vec();
    for secondary in secondaries {
        for column in secondary.columns() {
            if columns.contains(column) {
                return Err(JoinError::ColumnConflict(column.clone()));
            }
            columns.push(column.clone());
        }
    }

    let rows = primary
        .rows()
        .iter()
        .map(|row| {
            let mut values = row.values.clone();
            for secondary in secondaries {
                let matched = secondary.row(row.date);
                for column in secondary.columns() {
                    let value = matched.and_then(|m| m.get(column));
                    values.insert(column.clone(), value);
                }
            }
            (row.date, values)
        })
        .collect::<BTreeMap<_, _>>();

    Ok(DailyTable::from_rows(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn table(column: &str, rows: &[(&str, f64)]) -> DailyTable {
        let rows = rows
            .iter()
            .map(|(day, value)| {
                (
                    date(day),
                    BTreeMap::from([(column.to_string(), Some(*value))]),
                )
            })
            .collect();
        DailyTable::from_rows(vec![column.to_string()], rows)
    }

    #[test]
    fn test_row_set_is_primary_dates() {
        let primary = table("average_hrv", &[("2024-06-01", 40.0), ("2024-06-02", 42.0)]);
        let secondary = table("steps", &[("2024-06-02", 8000.0), ("2024-06-03", 9000.0)]);

        let joined = left_join(&primary, &[&secondary]).unwrap();

        assert_eq!(joined.dates(), vec![date("2024-06-01"), date("2024-06-02")]);
        assert_eq!(joined.get(date("2024-06-01"), "average_hrv"), Some(40.0));
        assert_eq!(joined.get(date("2024-06-01"), "steps"), None);
        assert_eq!(joined.get(date("2024-06-02"), "steps"), Some(8000.0));
        assert!(joined.row(date("2024-06-03")).is_none());
        assert_eq!(joined.columns(), &["average_hrv".to_string(), "steps".to_string()]);
    }

    #[test]
    fn test_empty_secondary_gives_missing_columns() {
        let primary = table("average_hrv", &[("2024-06-01", 40.0), ("2024-06-02", 42.0)]);
        let empty = DailyTable::empty(vec!["temperature_deviation".to_string()]);

        let joined = left_join(&primary, &[&empty]).unwrap();

        assert_eq!(joined.len(), 2);
        assert_eq!(joined.column("temperature_deviation"), Some(vec![None, None]));
    }

    #[test]
    fn test_multiple_secondaries_join_in_order() {
        let primary = table("a", &[("2024-06-01", 1.0)]);
        let second = table("b", &[("2024-06-01", 2.0)]);
        let third = table("c", &[("2024-05-31", 3.0)]);

        let joined = left_join(&primary, &[&second, &third]).unwrap();

        assert_eq!(joined.columns(), &["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(joined.get(date("2024-06-01"), "b"), Some(2.0));
        assert_eq!(joined.get(date("2024-06-01"), "c"), None);
    }

    #[test]
    fn test_no_secondaries_returns_primary() {
        let primary = table("a", &[("2024-06-01", 1.0)]);
        assert_eq!(left_join(&primary, &[]).unwrap(), primary);
    }

    #[test]
    fn test_conflicting_columns_are_rejected() {
        let primary = table("score", &[("2024-06-01", 80.0)]);
        let secondary = table("score", &[("2024-06-01", 70.0)]);

        let result = left_join(&primary, &[&secondary]);

        assert_eq!(result, Err(JoinError::ColumnConflict("score".to_string())));
    }
}
