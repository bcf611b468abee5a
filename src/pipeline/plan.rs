//! Views as data: which sources a view reads, how each is reduced, and
//! which charts are drawn from what.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::aggregate::{Reduction, ReductionPlan};
use crate::charts::{ChartKind, ACTIVITY_COUNT_PREFIX, HEART_RATE_SOURCE_PREFIX};
use crate::sources::oura::Collection;
use crate::sources::DataSource;

/// Selectable data category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// Wearable sleep, readiness and activity metrics
    Biometric,
    /// Indoor sensor samples and outdoor weather
    Environment,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Biometric => "biometric",
            View::Environment => "environment",
        }
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "biometric" | "oura" => Ok(View::Biometric),
            "environment" | "govee" => Ok(View::Environment),
            other => Err(format!("unknown view '{}', expected biometric or environment", other)),
        }
    }
}

/// Where a source's rows come from.
#[derive(Clone)]
pub enum SourceReader {
    /// A collection of the remote API, fetched for the requested range
    Remote(Collection),
    /// A local reader returning every row it holds
    Local(Arc<dyn DataSource>),
}

impl SourceReader {
    pub fn id(&self) -> String {
        match self {
            SourceReader::Remote(collection) => collection.source_id(),
            SourceReader::Local(source) => source.id(),
        }
    }
}

impl std::fmt::Debug for SourceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceReader::Remote(collection) => f.debug_tuple("Remote").field(collection).finish(),
            SourceReader::Local(source) => f.debug_tuple("Local").field(&source.id()).finish(),
        }
    }
}

/// One source of a view and its daily reduction.
#[derive(Debug, Clone)]
pub struct SourcePlan {
    pub name: &'static str,
    pub reader: SourceReader,
    pub reductions: ReductionPlan,
    /// Whether the daily table takes part in the view's join
    pub joined: bool,
    /// Columns the normalized rows always expose, even when no row in the
    /// range carries them
    pub sample_columns: Vec<&'static str>,
}

impl SourcePlan {
    pub fn new(name: &'static str, reader: SourceReader, reductions: ReductionPlan) -> Self {
        SourcePlan {
            name,
            reader,
            reductions,
            joined: true,
            sample_columns: Vec::new(),
        }
    }

    /// Keeps this source out of the join; its panels read it directly.
    pub fn standalone(mut self) -> Self {
        self.joined = false;
        self
    }

    pub fn with_sample_columns(mut self, columns: &[&'static str]) -> Self {
        self.sample_columns.extend_from_slice(columns);
        self
    }
}

/// Table a panel is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelInput {
    /// The primary source's daily table left-joined with every secondary
    Joined,
    /// One source's daily table
    Daily(&'static str),
    /// One source's normalized rows, unaggregated
    Samples(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelPlan {
    pub chart: ChartKind,
    pub input: PanelInput,
}

impl PanelPlan {
    pub const fn new(chart: ChartKind, input: PanelInput) -> Self {
        PanelPlan { chart, input }
    }
}

/// Ordered sources (the first is the join's primary) and the panels drawn
/// from them.
#[derive(Debug, Clone)]
pub struct ViewPlan {
    pub view: View,
    pub sources: Vec<SourcePlan>,
    pub panels: Vec<PanelPlan>,
}

impl ViewPlan {
    /// Sleep periods joined with readiness, activity, sleep score and SpO2,
    /// plus workouts and heart rate samples charted on their own dates.
    ///
    /// Conflicting field names are renamed on the way in: both score
    /// collections expose `score`, and SpO2 is nested.
    pub fn biometric() -> Self {
        let sleep = ReductionPlan::new()
            .with("total_sleep_duration", Reduction::Sum)
            .with("deep_sleep_duration", Reduction::Sum)
            .with("light_sleep_duration", Reduction::Sum)
            .with("rem_sleep_duration", Reduction::Sum)
            .with("awake_time", Reduction::Sum)
            .with("efficiency", Reduction::Mean)
            .with("average_hrv", Reduction::Mean)
            .with("average_heart_rate", Reduction::Mean)
            .with("lowest_heart_rate", Reduction::Min)
            .with("average_breath", Reduction::Mean);

        let readiness = ReductionPlan::new()
            .with("temperature_deviation", Reduction::Mean)
            .with_output("score", "readiness_score", Reduction::Mean);

        let activity = ReductionPlan::new().with("steps", Reduction::Sum);

        let sleep_score = ReductionPlan::new().with_output("score", "sleep_score", Reduction::Mean);

        let spo2 = ReductionPlan::new().with_output("spo2_percentage.average", "spo2", Reduction::Mean);

        let workout =
            ReductionPlan::new().with_split("activity", ACTIVITY_COUNT_PREFIX, Reduction::Count, "activity");

        let heartrate = ReductionPlan::new().with_split("bpm", HEART_RATE_SOURCE_PREFIX, Reduction::Mean, "source");

        let sources = vec![
            SourcePlan::new("sleep", SourceReader::Remote(Collection::Sleep), sleep)
                .with_sample_columns(&["bedtime_start.hour", "bedtime_end.hour"]),
            SourcePlan::new("readiness", SourceReader::Remote(Collection::DailyReadiness), readiness),
            SourcePlan::new("activity", SourceReader::Remote(Collection::DailyActivity), activity),
            SourcePlan::new("sleep_score", SourceReader::Remote(Collection::DailySleep), sleep_score),
            SourcePlan::new("spo2", SourceReader::Remote(Collection::DailySpo2), spo2),
            SourcePlan::new("workout", SourceReader::Remote(Collection::Workout), workout).standalone(),
            SourcePlan::new("heartrate", SourceReader::Remote(Collection::Heartrate), heartrate).standalone(),
        ];

        let mut panels: Vec<PanelPlan> = [
            ChartKind::SleepDuration,
            ChartKind::SleepBreakdown,
            ChartKind::SleepScore,
            ChartKind::ReadinessScore,
            ChartKind::HeartRate,
            ChartKind::LowestHeartRate,
            ChartKind::Hrv,
            ChartKind::RespiratoryRate,
            ChartKind::TemperatureDeviation,
            ChartKind::Spo2,
            ChartKind::Steps,
        ]
        .into_iter()
        .map(|chart| PanelPlan::new(chart, PanelInput::Joined))
        .collect();
        panels.extend([
            PanelPlan::new(ChartKind::SleepStartEnd, PanelInput::Samples("sleep")),
            PanelPlan::new(ChartKind::ActivityLog, PanelInput::Daily("workout")),
            PanelPlan::new(ChartKind::DailyHeartRate, PanelInput::Daily("heartrate")),
        ]);

        ViewPlan {
            view: View::Biometric,
            sources,
            panels,
        }
    }

    /// Indoor samples, optionally joined with outdoor extremes.
    ///
    /// Without a weather source the outdoor panels are left out.
    pub fn environment(samples: Arc<dyn DataSource>, weather: Option<Arc<dyn DataSource>>) -> Self {
        let indoor = ReductionPlan::new()
            .with("Temperature_Fahrenheit", Reduction::Mean)
            .with("Relative_Humidity", Reduction::Mean);

        let mut sources = vec![SourcePlan::new("indoor", SourceReader::Local(samples), indoor)];
        let mut panels = vec![
            PanelPlan::new(ChartKind::IndoorDailyClimate, PanelInput::Daily("indoor")),
            PanelPlan::new(ChartKind::IndoorTemperature, PanelInput::Samples("indoor")),
            PanelPlan::new(ChartKind::IndoorHumidity, PanelInput::Samples("indoor")),
        ];

        if let Some(weather) = weather {
            let outdoor = ReductionPlan::new()
                .with("temp_min", Reduction::Min)
                .with("temp_max", Reduction::Max);
            sources.push(SourcePlan::new("outdoor", SourceReader::Local(weather), outdoor));
            panels.push(PanelPlan::new(ChartKind::OutdoorTemperature, PanelInput::Daily("outdoor")));
            panels.push(PanelPlan::new(ChartKind::IndoorVsOutdoor, PanelInput::Joined));
        }

        ViewPlan {
            view: View::Environment,
            sources,
            panels,
        }
    }

    /// The join's primary source.
    pub fn primary(&self) -> Option<&SourcePlan> {
        self.sources.first()
    }

    pub fn source(&self, name: &str) -> Option<&SourcePlan> {
        self.sources.iter().find(|source| source.name == name)
    }

    pub fn charts(&self) -> Vec<ChartKind> {
        self.panels.iter().map(|panel| panel.chart).collect()
    }
}
