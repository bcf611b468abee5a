//! One parameterised dashboard pipeline: read → normalize → aggregate →
//! join → chart, driven by a [`ViewPlan`].
//!
//! Failures are isolated per panel. A panel fails only when a source it
//! reads from failed: a failed primary fails the joined panels and the
//! panels drawn from the primary itself, a failed secondary fails the joined
//! panels needing one of its columns, and a panel over a single source
//! fails only with that source. A schema mismatch fails only its own chart.

mod cache;
mod plan;

pub use cache::{CacheKey, SourceCache};
pub use plan::{PanelInput, PanelPlan, SourcePlan, SourceReader, View, ViewPlan};

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregate::aggregate_daily;
use crate::charts::{ChartKind, ChartSpec, ChartTable};
use crate::config::Settings;
use crate::join::left_join;
use crate::normalize::{normalize, TimestampPolicy};
use crate::sources::oura::{OuraClient, OuraConfig};
use crate::sources::SourceError;
use crate::table::{DailyTable, DateRange, NormalizedTable, RawTable};

/// Parameters of one dashboard render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRequest {
    /// Display only; not used to select data
    pub user: String,
    pub range: DateRange,
    pub view: View,
}

/// One chart slot: either a spec or the message shown in its place.
#[derive(Debug, PartialEq, Serialize)]
pub struct Panel {
    pub chart: ChartKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<ChartSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Panel {
    fn rendered(chart: ChartKind, spec: ChartSpec) -> Self {
        Panel {
            chart,
            title: chart.descriptor().title.to_string(),
            spec: Some(spec),
            error: None,
        }
    }

    fn failed(chart: ChartKind, message: impl Into<String>) -> Self {
        Panel {
            chart,
            title: chart.descriptor().title.to_string(),
            spec: None,
            error: Some(message.into()),
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.spec.is_some()
    }
}

/// Result of one render.
#[derive(Debug, PartialEq, Serialize)]
pub struct Dashboard {
    pub user: String,
    pub view: View,
    pub range: DateRange,
    pub panels: Vec<Panel>,
    /// Row-level problems that did not fail any panel
    pub notices: Vec<String>,
}

impl Dashboard {
    pub fn panel(&self, chart: ChartKind) -> Option<&Panel> {
        self.panels.iter().find(|panel| panel.chart == chart)
    }
}

/// A source after reading, or the reason it could not be read.
enum Loaded {
    Ready {
        normalized: NormalizedTable,
        daily: DailyTable,
    },
    Failed(SourceError),
}

/// Runs view plans against the configured sources.
#[derive(Debug)]
pub struct Pipeline {
    remote: Result<OuraClient, SourceError>,
    policy: TimestampPolicy,
    cache: SourceCache,
}

impl Pipeline {
    /// `remote` is the client for remote collections, or the error every
    /// remote read reports without attempting a fetch.
    pub fn new(remote: Result<OuraClient, SourceError>, policy: TimestampPolicy) -> Self {
        Pipeline {
            remote,
            policy,
            cache: SourceCache::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let config = OuraConfig {
            base_url: settings.api_base.clone(),
            timeout_seconds: settings.request_timeout_secs,
        };
        let remote = settings
            .credential
            .clone()
            .and_then(|credential| OuraClient::new(credential, config));

        if let Err(e) = &remote {
            warn!(error = %e, "remote source disabled");
        }

        Pipeline::new(remote, settings.timestamp_policy)
    }

    pub fn policy(&self) -> TimestampPolicy {
        self.policy
    }

    pub fn cache(&self) -> &SourceCache {
        &self.cache
    }

    /// Runs every stage for `request` and returns one panel per planned
    /// chart, in plan order.
    pub async fn render(&self, request: &DashboardRequest, plan: &ViewPlan) -> Dashboard {
        let mut notices = Vec::new();
        let mut loaded = Vec::with_capacity(plan.sources.len());

        for source in &plan.sources {
            let state = match self.read(&source.reader, &request.range).await {
                Ok(raw) => {
                    let mut normalized = normalize(&raw, self.policy, Some(&request.range));
                    for column in &source.sample_columns {
                        if !normalized.columns.iter().any(|c| c == column) {
                            normalized.columns.push(column.to_string());
                        }
                    }
                    if !normalized.dropped.is_empty() {
                        notices.push(format!(
                            "{}: dropped {} row(s) with malformed timestamps",
                            source.name,
                            normalized.dropped.len()
                        ));
                    }
                    let daily = aggregate_daily(&normalized, &source.reductions);
                    Loaded::Ready { normalized, daily }
                }
                Err(e) => {
                    warn!(source = %source.reader.id(), error = %e, "source read failed");
                    Loaded::Failed(e)
                }
            };
            loaded.push((source, state));
        }

        let joined = match loaded.first() {
            Some((_, Loaded::Failed(primary_error))) => Some(Err(primary_error.to_string())),
            Some((_, Loaded::Ready { daily: primary, .. })) => {
                let secondaries: Vec<&DailyTable> = loaded[1..]
                    .iter()
                    .filter(|(source, _)| source.joined)
                    .filter_map(|(_, state)| match state {
                        Loaded::Ready { daily, .. } => Some(daily),
                        Loaded::Failed(_) => None,
                    })
                    .collect();
                Some(left_join(primary, &secondaries).map_err(|e| e.to_string()))
            }
            None => None,
        };

        let panels: Vec<Panel> = match &joined {
            Some(joined) => plan
                .panels
                .iter()
                .map(|panel| build_panel(panel, &loaded, joined))
                .collect(),
            None => Vec::new(),
        };

        let rendered = panels.iter().filter(|p| p.is_rendered()).count();
        info!(
            user = %request.user,
            view = request.view.as_str(),
            start = %request.range.start,
            end = %request.range.end,
            rendered,
            failed = panels.len() - rendered,
            "dashboard rendered"
        );

        Dashboard {
            user: request.user.clone(),
            view: request.view,
            range: request.range,
            panels,
            notices,
        }
    }

    async fn read(&self, reader: &SourceReader, range: &DateRange) -> Result<Arc<RawTable>, SourceError> {
        match reader {
            SourceReader::Remote(collection) => {
                let client = self.remote.as_ref().map_err(Clone::clone)?;
                let key = CacheKey::new(collection.source_id(), *range, client.credential());
                self.cache
                    .get_or_fetch(key, || client.fetch(*collection, range))
                    .await
            }
            SourceReader::Local(source) => source.read().map(Arc::new),
        }
    }
}

/// `joined` is the joined table, or the message of whatever prevented it
/// (a failed primary or a column conflict).
fn build_panel(panel: &PanelPlan, loaded: &[(&SourcePlan, Loaded)], joined: &Result<DailyTable, String>) -> Panel {
    let find = |name: &str| loaded.iter().find(|(source, _)| source.name == name).map(|(_, state)| state);

    let table: &dyn ChartTable = match panel.input {
        PanelInput::Joined => {
            let joined = match joined {
                Ok(joined) => joined,
                Err(message) => return Panel::failed(panel.chart, message.as_str()),
            };
            // Columns absent from the join because their source failed
            // report that source's error rather than a schema mismatch.
            let failed_source = panel
                .chart
                .descriptor()
                .required_columns
                .iter()
                .filter(|column| !joined.has_column(column))
                .find_map(|column| {
                    loaded.iter().find_map(|(source, state)| match state {
                        Loaded::Failed(e) if source.joined && source.reductions.produces(column) => Some(e),
                        _ => None,
                    })
                });
            if let Some(e) = failed_source {
                return Panel::failed(panel.chart, e.to_string());
            }
            joined
        }
        PanelInput::Daily(name) => match find(name) {
            Some(Loaded::Ready { daily, .. }) => daily,
            Some(Loaded::Failed(e)) => return Panel::failed(panel.chart, e.to_string()),
            None => return not_in_view(panel.chart, name),
        },
        PanelInput::Samples(name) => match find(name) {
            Some(Loaded::Ready { normalized, .. }) => normalized,
            Some(Loaded::Failed(e)) => return Panel::failed(panel.chart, e.to_string()),
            None => return not_in_view(panel.chart, name),
        },
    };

    match panel.chart.build(table) {
        Ok(spec) => Panel::rendered(panel.chart, spec),
        Err(e) => {
            warn!(chart = panel.chart.id(), error = %e, "chart skipped");
            Panel::failed(panel.chart, e.to_string())
        }
    }
}

fn not_in_view(chart: ChartKind, source: &str) -> Panel {
    Panel::failed(chart, format!("source '{}' is not part of this view", source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Reduction, ReductionPlan};
    use crate::sources::{DataSource, InMemorySource};
    use crate::table::RawRecord;
    use chrono::NaiveDate;

    struct MissingFile(&'static str);

    impl DataSource for MissingFile {
        fn id(&self) -> String {
            self.0.to_string()
        }

        fn read(&self) -> Result<RawTable, SourceError> {
            Err(SourceError::SourceNotFound {
                source: self.0.to_string(),
                path: format!("{}.csv", self.0),
            })
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn request(view: View, start: u32, end: u32) -> DashboardRequest {
        DashboardRequest {
            user: "YW".to_string(),
            range: DateRange::new(date(start), date(end)),
            view,
        }
    }

    fn offline() -> Pipeline {
        Pipeline::new(
            Err(SourceError::ConfigurationMissing("OURA_API_TOKEN not set".to_string())),
            TimestampPolicy::WallClock,
        )
    }

    fn samples() -> Arc<dyn DataSource> {
        let table = RawTable::new("indoor", "Timestamp")
            .with_columns(["Temperature_Fahrenheit", "Relative_Humidity"])
            .with_records(vec![
                RawRecord::new("2024-06-01 08:00:00")
                    .with("Temperature_Fahrenheit", 70.0)
                    .with("Relative_Humidity", 40.0),
                RawRecord::new("2024-06-01 20:00:00")
                    .with("Temperature_Fahrenheit", 74.0)
                    .with("Relative_Humidity", 44.0),
                RawRecord::new("2024-06-02 09:00:00")
                    .with("Temperature_Fahrenheit", 71.0)
                    .with("Relative_Humidity", 45.0),
                RawRecord::new("yesterday-ish").with("Temperature_Fahrenheit", 99.0),
            ]);
        Arc::new(InMemorySource::new(table))
    }

    fn weather() -> Arc<dyn DataSource> {
        let table = RawTable::new("outdoor", "date")
            .with_columns(["temp_min", "temp_max"])
            .with_records(vec![
                RawRecord::new("2024-06-02").with("temp_min", 60.0).with("temp_max", 81.0),
                RawRecord::new("2024-06-03").with("temp_min", 62.0).with("temp_max", 85.0),
            ]);
        Arc::new(InMemorySource::new(table))
    }

    #[tokio::test]
    async fn test_environment_view_renders_every_panel() {
        let plan = ViewPlan::environment(samples(), Some(weather()));

        let dashboard = offline().render(&request(View::Environment, 1, 3), &plan).await;

        assert_eq!(dashboard.panels.len(), plan.panels.len());
        assert!(dashboard.panels.iter().all(Panel::is_rendered));

        let climate = dashboard.panel(ChartKind::IndoorDailyClimate).unwrap().spec.as_ref().unwrap();
        assert_eq!(climate.series_named("Temperature").unwrap().y, vec![Some(72.0), Some(71.0)]);
        assert_eq!(climate.series_named("Humidity").unwrap().y, vec![Some(42.0), Some(45.0)]);

        // Joined on the indoor dates only: 2024-06-03 never appears
        let versus = dashboard.panel(ChartKind::IndoorVsOutdoor).unwrap().spec.as_ref().unwrap();
        let low = versus.series_named("Outdoor Daily Low").unwrap();
        assert_eq!(low.x, vec!["2024-06-01", "2024-06-02"]);
        assert_eq!(low.y, vec![None, Some(60.0)]);

        let temperature = dashboard.panel(ChartKind::IndoorTemperature).unwrap().spec.as_ref().unwrap();
        assert_eq!(temperature.series[0].y.len(), 3);

        assert_eq!(dashboard.notices.len(), 1);
        assert!(dashboard.notices[0].contains("dropped 1 row"));
    }

    #[tokio::test]
    async fn test_range_filter_applies_to_local_sources() {
        let plan = ViewPlan::environment(samples(), None);

        let dashboard = offline().render(&request(View::Environment, 2, 2), &plan).await;

        let climate = dashboard.panel(ChartKind::IndoorDailyClimate).unwrap().spec.as_ref().unwrap();
        assert_eq!(climate.series[0].x, vec!["2024-06-02"]);
    }

    #[tokio::test]
    async fn test_failed_secondary_only_fails_its_panels() {
        let plan = ViewPlan::environment(samples(), Some(Arc::new(MissingFile("outdoor"))));

        let dashboard = offline().render(&request(View::Environment, 1, 3), &plan).await;

        for chart in [ChartKind::OutdoorTemperature, ChartKind::IndoorVsOutdoor] {
            let panel = dashboard.panel(chart).unwrap();
            assert!(!panel.is_rendered());
            assert!(panel.error.as_ref().unwrap().contains("not found"), "{:?}", panel.error);
        }
        for chart in [
            ChartKind::IndoorDailyClimate,
            ChartKind::IndoorTemperature,
            ChartKind::IndoorHumidity,
        ] {
            assert!(dashboard.panel(chart).unwrap().is_rendered());
        }
    }

    #[tokio::test]
    async fn test_failed_primary_keeps_independent_panels() {
        let plan = ViewPlan::environment(Arc::new(MissingFile("indoor")), Some(weather()));

        let dashboard = offline().render(&request(View::Environment, 1, 3), &plan).await;

        assert_eq!(dashboard.panels.len(), 5);
        for chart in [
            ChartKind::IndoorDailyClimate,
            ChartKind::IndoorTemperature,
            ChartKind::IndoorHumidity,
            ChartKind::IndoorVsOutdoor,
        ] {
            let panel = dashboard.panel(chart).unwrap();
            assert_eq!(panel.error.as_deref(), Some("Source 'indoor' not found at indoor.csv"));
        }

        // Drawn from the weather file alone
        let outdoor = dashboard.panel(ChartKind::OutdoorTemperature).unwrap();
        assert!(outdoor.is_rendered(), "{:?}", outdoor.error);
        let spec = outdoor.spec.as_ref().unwrap();
        assert_eq!(spec.series[0].x, vec!["2024-06-02", "2024-06-03"]);
    }

    #[tokio::test]
    async fn test_standalone_source_stays_out_of_the_join() {
        let joined = RawTable::new("primary", "day")
            .with_records(vec![RawRecord::new("2024-06-01").with("average_hrv", 40.0)]);
        let workouts = RawTable::new("workouts", "day").with_records(vec![
            RawRecord::new("2024-06-02").with_label("activity", "walking"),
            RawRecord::new("2024-06-02").with_label("activity", "walking"),
            RawRecord::new("2024-06-03").with_label("activity", "cycling"),
        ]);
        let plan = ViewPlan {
            view: View::Biometric,
            sources: vec![
                SourcePlan::new(
                    "primary",
                    SourceReader::Local(Arc::new(InMemorySource::new(joined))),
                    ReductionPlan::new().with("average_hrv", Reduction::Mean),
                ),
                SourcePlan::new(
                    "workout",
                    SourceReader::Local(Arc::new(InMemorySource::new(workouts))),
                    ReductionPlan::new().with_split(
                        "activity",
                        "activity_count",
                        Reduction::Count,
                        "activity",
                    ),
                )
                .standalone(),
            ],
            panels: vec![
                PanelPlan::new(ChartKind::Hrv, PanelInput::Joined),
                PanelPlan::new(ChartKind::ActivityLog, PanelInput::Daily("workout")),
            ],
        };

        let dashboard = offline().render(&request(View::Biometric, 1, 3), &plan).await;

        let hrv = dashboard.panel(ChartKind::Hrv).unwrap().spec.as_ref().unwrap();
        assert_eq!(hrv.series[0].x, vec!["2024-06-01"]);

        // Workout dates are not clipped to the primary's
        let log = dashboard.panel(ChartKind::ActivityLog).unwrap().spec.as_ref().unwrap();
        assert_eq!(log.series_named("walking").unwrap().x, vec!["2024-06-02", "2024-06-03"]);
        assert_eq!(log.series_named("walking").unwrap().y, vec![Some(2.0), None]);
        assert_eq!(log.series_named("cycling").unwrap().y, vec![None, Some(1.0)]);
    }

    #[tokio::test]
    async fn test_missing_credential_is_reported_on_every_biometric_panel() {
        let plan = ViewPlan::biometric();

        let pipeline = offline();
        let dashboard = pipeline.render(&request(View::Biometric, 1, 30), &plan).await;

        assert_eq!(dashboard.panels.len(), plan.panels.len());
        for panel in &dashboard.panels {
            assert!(panel.error.as_ref().unwrap().starts_with("Configuration missing"));
        }
        assert!(pipeline.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_schema_mismatch_fails_only_that_panel() {
        let samples = RawTable::new("indoor", "Timestamp")
            .with_columns(["Temperature_Fahrenheit"])
            .with_records(vec![RawRecord::new("2024-06-01 08:00:00").with("Temperature_Fahrenheit", 70.0)]);
        let plan = ViewPlan {
            view: View::Environment,
            sources: vec![SourcePlan::new(
                "indoor",
                SourceReader::Local(Arc::new(InMemorySource::new(samples))),
                ReductionPlan::new(),
            )],
            panels: vec![
                PanelPlan::new(ChartKind::IndoorHumidity, PanelInput::Samples("indoor")),
                PanelPlan::new(ChartKind::IndoorTemperature, PanelInput::Samples("indoor")),
            ],
        };

        let dashboard = offline().render(&request(View::Environment, 1, 1), &plan).await;

        let humidity = dashboard.panel(ChartKind::IndoorHumidity).unwrap();
        assert!(humidity.error.as_ref().unwrap().contains("Relative_Humidity"));
        assert!(dashboard.panel(ChartKind::IndoorTemperature).unwrap().is_rendered());
    }
}
