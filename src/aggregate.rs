//! Daily aggregation: groups normalized rows by calendar date and reduces
//! each requested column with its own reduction.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::table::{DailyTable, NormalizedTable};

/// How the values of one column are reduced within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    Mean,
    Sum,
    Min,
    Max,
    /// Number of rows carrying the input field, as a metric or a label
    Count,
}

impl Reduction {
    /// Reduces the finite values of `values`.
    ///
    /// Returns `None` when no finite value is present. Values are sorted
    /// before summing so the result does not depend on row order.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        finite.sort_by(f64::total_cmp);

        let result = match self {
            Reduction::Sum => finite.iter().sum(),
            Reduction::Mean => finite.iter().sum::<f64>() / finite.len() as f64,
            Reduction::Min => finite[0],
            Reduction::Max => finite[finite.len() - 1],
            Reduction::Count => finite.len() as f64,
        };
        Some(result)
    }
}

/// One column of a reduction plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnReduction {
    /// Column read from the normalized table
    pub input: String,
    /// Column written to the daily table
    pub output: String,
    pub reduction: Reduction,
    /// Label whose value splits the output into `<output>.<value>` columns
    pub split_by: Option<String>,
}

/// Ordered mapping from input column to reduction and output name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReductionPlan {
    columns: Vec<ColumnReduction>,
}

impl ReductionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reduces `column` into a daily column of the same name.
    pub fn with(self, column: &str, reduction: Reduction) -> Self {
        self.with_output(column, column, reduction)
    }

    /// Reduces `input` into a daily column named `output`.
    pub fn with_output(mut self, input: &str, output: &str, reduction: Reduction) -> Self {
        self.columns.push(ColumnReduction {
            input: input.to_string(),
            output: output.to_string(),
            reduction,
            split_by: None,
        });
        self
    }

    /// Reduces `input` separately for every value of the `label` field,
    /// into columns named `<output>.<label value>`.
    ///
    /// Rows without the label are skipped. The produced columns depend on
    /// the data, so they are not part of [`ReductionPlan::outputs`].
    pub fn with_split(mut self, input: &str, output: &str, reduction: Reduction, label: &str) -> Self {
        self.columns.push(ColumnReduction {
            input: input.to_string(),
            output: output.to_string(),
            reduction,
            split_by: Some(label.to_string()),
        });
        self
    }

    pub fn columns(&self) -> &[ColumnReduction] {
        &self.columns
    }

    /// Names of the fixed columns this plan produces.
    pub fn outputs(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.split_by.is_none())
            .map(|c| c.output.clone())
            .collect()
    }

    /// Whether `column` is a fixed output or belongs to a split family.
    pub fn produces(&self, column: &str) -> bool {
        self.columns.iter().any(|c| match c.split_by {
            None => c.output == column,
            Some(_) => column
                .strip_prefix(c.output.as_str())
                .is_some_and(|rest| rest.starts_with('.')),
        })
    }
}

/// Groups `table` by canonical date and applies `plan`.
///
/// Produces exactly one row per distinct date present in `table`, sorted
/// ascending. A column with no value on a given date is `None` for that
/// date; dates with no rows at all are absent. Split columns follow the
/// fixed ones, in name order.
pub fn aggregate_daily(table: &NormalizedTable, plan: &ReductionPlan) -> DailyTable {
    let mut reductions: BTreeMap<String, Reduction> = BTreeMap::new();
    let mut split_columns: BTreeSet<String> = BTreeSet::new();
    let mut groups: BTreeMap<NaiveDate, BTreeMap<String, Vec<f64>>> = BTreeMap::new();

    for column in &plan.columns {
        if column.split_by.is_none() {
            reductions.insert(column.output.clone(), column.reduction);
        }
    }

    for record in &table.records {
        let buckets = groups.entry(record.date).or_default();
        for column in &plan.columns {
            let output = match &column.split_by {
                None => column.output.clone(),
                Some(label) => match record.labels.get(label) {
                    Some(value) => {
                        let name = format!("{}.{}", column.output, value);
                        split_columns.insert(name.clone());
                        reductions.insert(name.clone(), column.reduction);
                        name
                    }
                    None => continue,
                },
            };

            let value = match column.reduction {
                Reduction::Count => record.carries(&column.input).then_some(1.0),
                _ => record.values.get(&column.input).copied(),
            };
            let bucket = buckets.entry(output).or_default();
            if let Some(value) = value {
                bucket.push(value);
            }
        }
    }

    let rows = groups
        .into_iter()
        .map(|(date, buckets)| {
            let values = buckets
                .into_iter()
                .map(|(output, bucket)| {
                    let reduced = reductions.get(&output).and_then(|r| r.apply(&bucket));
                    (output, reduced)
                })
                .collect();
            (date, values)
        })
        .collect();

    let mut columns = plan.outputs();
    columns.extend(split_columns);
    DailyTable::from_rows(columns, rows)
}
