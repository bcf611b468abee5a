//! Chart builders: pure functions from a prepared table to a [`ChartSpec`].
//!
//! Every builder has a static [`ChartDescriptor`] naming its required
//! columns, unit, labels and whether it needs a second y-axis. Builders
//! check the descriptor's columns before reading anything and report a
//! [`ChartError::SchemaMismatch`] instead of producing a partial chart.

mod biometric;
mod environment;
pub mod spec;

pub use spec::{Axis, BarMode, ChartSpec, RenderMode, Series, YAxis};

pub(crate) use biometric::{ACTIVITY_COUNT_PREFIX, HEART_RATE_SOURCE_PREFIX};

use chrono::NaiveTime;
use serde::Serialize;
use std::str::FromStr;

use crate::table::{DailyTable, NormalizedTable};

/// Unit of a chart's primary y-axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Hours,
    Bpm,
    BreathsPerMinute,
    Milliseconds,
    Celsius,
    Fahrenheit,
    Percent,
    Count,
    Score,
    /// Wall-clock time of day in hours, 0 to 24
    HourOfDay,
}

/// Static declaration of a chart builder.
#[derive(Debug, PartialEq, Serialize)]
pub struct ChartDescriptor {
    pub id: &'static str,
    pub title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub y2_label: Option<&'static str>,
    pub unit: Unit,
    pub required_columns: &'static [&'static str],
    pub dual_axis: bool,
}

/// Errors reported by chart builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartError {
    /// The input table lacks columns the chart requires
    SchemaMismatch {
        chart: &'static str,
        missing: Vec<String>,
    },
}

impl std::fmt::Display for ChartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartError::SchemaMismatch { chart, missing } => write!(
                f,
                "Chart '{}' is missing required column(s): {}",
                chart,
                missing.join(", ")
            ),
        }
    }
}

impl std::error::Error for ChartError {}

/// A table a chart can read: shared x values plus named numeric columns.
pub trait ChartTable {
    /// X-axis values, one per row.
    fn x_values(&self) -> Vec<String>;

    /// Whether `name` is part of the table's schema.
    fn has_column(&self, name: &str) -> bool;

    /// Every column of the schema, in schema order.
    fn column_names(&self) -> Vec<String>;

    /// Values of `name` aligned with [`ChartTable::x_values`], or `None`
    /// if the column is not part of the schema.
    fn column(&self, name: &str) -> Option<Vec<Option<f64>>>;
}

impl ChartTable for DailyTable {
    fn x_values(&self) -> Vec<String> {
        self.dates()
            .iter()
            .map(|date| date.format("%Y-%m-%d").to_string())
            .collect()
    }

    fn has_column(&self, name: &str) -> bool {
        DailyTable::has_column(self, name)
    }

    fn column_names(&self) -> Vec<String> {
        self.columns().to_vec()
    }

    fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        DailyTable::column(self, name)
    }
}

/// Day-granularity rows (every timestamp at midnight) are plotted by date.
impl ChartTable for NormalizedTable {
    fn x_values(&self) -> Vec<String> {
        let format = if self.records.iter().all(|r| r.timestamp.time() == NaiveTime::MIN) {
            "%Y-%m-%d"
        } else {
            "%Y-%m-%d %H:%M:%S"
        };
        self.records
            .iter()
            .map(|record| record.timestamp.format(format).to_string())
            .collect()
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        if !ChartTable::has_column(self, name) {
            return None;
        }
        Some(
            self.records
                .iter()
                .map(|record| record.values.get(name).copied())
                .collect(),
        )
    }
}

/// Every chart in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    SleepDuration,
    LowestHeartRate,
    RespiratoryRate,
    TemperatureDeviation,
    Hrv,
    Steps,
    HeartRate,
    Spo2,
    ReadinessScore,
    SleepScore,
    SleepBreakdown,
    IndoorDailyClimate,
    IndoorTemperature,
    IndoorHumidity,
    OutdoorTemperature,
    IndoorVsOutdoor,
    ActivityLog,
    DailyHeartRate,
    SleepStartEnd,
}

impl ChartKind {
    pub const ALL: [ChartKind; 19] = [
        ChartKind::SleepDuration,
        ChartKind::LowestHeartRate,
        ChartKind::RespiratoryRate,
        ChartKind::TemperatureDeviation,
        ChartKind::Hrv,
        ChartKind::Steps,
        ChartKind::HeartRate,
        ChartKind::Spo2,
        ChartKind::ReadinessScore,
        ChartKind::SleepScore,
        ChartKind::SleepBreakdown,
        ChartKind::IndoorDailyClimate,
        ChartKind::IndoorTemperature,
        ChartKind::IndoorHumidity,
        ChartKind::OutdoorTemperature,
        ChartKind::IndoorVsOutdoor,
        ChartKind::ActivityLog,
        ChartKind::DailyHeartRate,
        ChartKind::SleepStartEnd,
    ];

    pub fn descriptor(&self) -> &'static ChartDescriptor {
        match self {
            ChartKind::SleepDuration => &biometric::SLEEP_DURATION,
            ChartKind::LowestHeartRate => &biometric::LOWEST_HEART_RATE,
            ChartKind::RespiratoryRate => &biometric::RESPIRATORY_RATE,
            ChartKind::TemperatureDeviation => &biometric::TEMPERATURE_DEVIATION,
            ChartKind::Hrv => &biometric::HRV,
            ChartKind::Steps => &biometric::STEPS,
            ChartKind::HeartRate => &biometric::HEART_RATE,
            ChartKind::Spo2 => &biometric::SPO2,
            ChartKind::ReadinessScore => &biometric::READINESS_SCORE,
            ChartKind::SleepScore => &biometric::SLEEP_SCORE,
            ChartKind::SleepBreakdown => &biometric::SLEEP_BREAKDOWN,
            ChartKind::IndoorDailyClimate => &environment::INDOOR_DAILY_CLIMATE,
            ChartKind::IndoorTemperature => &environment::INDOOR_TEMPERATURE,
            ChartKind::IndoorHumidity => &environment::INDOOR_HUMIDITY,
            ChartKind::OutdoorTemperature => &environment::OUTDOOR_TEMPERATURE,
            ChartKind::IndoorVsOutdoor => &environment::INDOOR_VS_OUTDOOR,
            ChartKind::ActivityLog => &biometric::ACTIVITY_LOG,
            ChartKind::DailyHeartRate => &biometric::DAILY_HEART_RATE,
            ChartKind::SleepStartEnd => &biometric::SLEEP_START_END,
        }
    }

    pub fn id(&self) -> &'static str {
        self.descriptor().id
    }

    /// Builds this chart from `table`.
    pub fn build(&self, table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
        match self {
            ChartKind::SleepDuration => biometric::sleep_duration(table),
            ChartKind::LowestHeartRate => biometric::lowest_heart_rate(table),
            ChartKind::RespiratoryRate => biometric::respiratory_rate(table),
            ChartKind::TemperatureDeviation => biometric::temperature_deviation(table),
            ChartKind::Hrv => biometric::hrv(table),
            ChartKind::Steps => biometric::steps(table),
            ChartKind::HeartRate => biometric::heart_rate(table),
            ChartKind::Spo2 => biometric::spo2(table),
            ChartKind::ReadinessScore => biometric::readiness_score(table),
            ChartKind::SleepScore => biometric::sleep_score(table),
            ChartKind::SleepBreakdown => biometric::sleep_breakdown(table),
            ChartKind::IndoorDailyClimate => environment::indoor_daily_climate(table),
            ChartKind::IndoorTemperature => environment::indoor_temperature(table),
            ChartKind::IndoorHumidity => environment::indoor_humidity(table),
            ChartKind::OutdoorTemperature => environment::outdoor_temperature(table),
            ChartKind::IndoorVsOutdoor => environment::indoor_vs_outdoor(table),
            ChartKind::ActivityLog => biometric::activity_log(table),
            ChartKind::DailyHeartRate => biometric::daily_heart_rate(table),
            ChartKind::SleepStartEnd => biometric::sleep_start_end(table),
        }
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChartKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| format!("unknown chart: {}", s))
    }
}

/// One series of a chart, read from one column.
#[derive(Debug, Clone, Copy)]
struct Trace {
    column: &'static str,
    name: &'static str,
    mode: RenderMode,
    axis: YAxis,
    color: Option<&'static str>,
    divisor: f64,
}

impl Trace {
    const fn new(column: &'static str, name: &'static str, mode: RenderMode) -> Self {
        Trace {
            column,
            name,
            mode,
            axis: YAxis::Primary,
            color: None,
            divisor: 1.0,
        }
    }

    const fn secondary(mut self) -> Self {
        self.axis = YAxis::Secondary;
        self
    }

    const fn color(mut self, color: &'static str) -> Self {
        self.color = Some(color);
        self
    }

    /// Divides every value, e.g. seconds into hours.
    const fn divided_by(mut self, divisor: f64) -> Self {
        self.divisor = divisor;
        self
    }
}

/// Layout options beyond what the descriptor declares.
#[derive(Debug, Clone, Copy, Default)]
struct Layout {
    bar_mode: Option<BarMode>,
    legend_title: Option<&'static str>,
    y_range: Option<[f64; 2]>,
    y2_range: Option<[f64; 2]>,
}

impl Layout {
    const fn legend(title: &'static str) -> Self {
        Layout {
            bar_mode: None,
            legend_title: Some(title),
            y_range: None,
            y2_range: None,
        }
    }
}

fn check_schema(descriptor: &ChartDescriptor, table: &dyn ChartTable) -> Result<(), ChartError> {
    let missing: Vec<String> = descriptor
        .required_columns
        .iter()
        .filter(|column| !table.has_column(column))
        .map(|column| column.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ChartError::SchemaMismatch {
            chart: descriptor.id,
            missing,
        })
    }
}

/// Copies the traced columns out of `table` into a new spec.
fn assemble(
    descriptor: &ChartDescriptor,
    table: &dyn ChartTable,
    traces: &[Trace],
    layout: Layout,
) -> Result<ChartSpec, ChartError> {
    check_schema(descriptor, table)?;

    let x = table.x_values();
    let mut series = Vec::with_capacity(traces.len());
    for trace in traces {
        let values = table.column(trace.column).ok_or_else(|| ChartError::SchemaMismatch {
            chart: descriptor.id,
            missing: vec![trace.column.to_string()],
        })?;
        series.push(Series {
            name: trace.name.to_string(),
            x: x.clone(),
            y: values.into_iter().map(|v| v.map(|v| v / trace.divisor)).collect(),
            mode: trace.mode,
            axis: trace.axis,
            color: trace.color.map(str::to_string),
        });
    }

    Ok(finish(descriptor, series, layout))
}

/// One series per column of the `<prefix>.<key>` family, named by key.
///
/// The family's members depend on the data (one per activity or per
/// measurement source), so an empty family gives a chart with no series.
fn assemble_split(
    descriptor: &ChartDescriptor,
    table: &dyn ChartTable,
    prefix: &str,
    mode: RenderMode,
    layout: Layout,
) -> Result<ChartSpec, ChartError> {
    check_schema(descriptor, table)?;

    let x = table.x_values();
    let family = format!("{}.", prefix);
    let series = table
        .column_names()
        .into_iter()
        .filter_map(|column| {
            let key = column.strip_prefix(family.as_str())?.to_string();
            let y = table.column(&column)?;
            Some(Series {
                name: key,
                x: x.clone(),
                y,
                mode,
                axis: YAxis::Primary,
                color: None,
            })
        })
        .collect();

    Ok(finish(descriptor, series, layout))
}

fn finish(descriptor: &ChartDescriptor, series: Vec<Series>, layout: Layout) -> ChartSpec {
    let y2_axis = descriptor.y2_label.map(|title| Axis {
        title: title.to_string(),
        range: layout.y2_range,
    });

    ChartSpec {
        id: descriptor.id.to_string(),
        title: descriptor.title.to_string(),
        x_axis: Axis::titled(descriptor.x_label),
        y_axis: Axis {
            title: descriptor.y_label.to_string(),
            range: layout.y_range,
        },
        y2_axis,
        series,
        bar_mode: layout.bar_mode,
        legend_title: layout.legend_title.map(str::to_string),
    }
}
