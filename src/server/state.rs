//! Shared application state for the dashboard server

use std::sync::Arc;

use crate::config::Settings;
use crate::pipeline::{Pipeline, View, ViewPlan};
use crate::sources::delimited::DelimitedFile;
use crate::sources::DataSource;

/// Shared application state, read-only once built.
#[derive(Debug)]
pub struct AppState {
    /// Selectable user identities
    pub users: Vec<String>,
    /// Pipeline with its remote client and read cache
    pub pipeline: Pipeline,
    pub biometric: ViewPlan,
    pub environment: ViewPlan,
}

impl AppState {
    pub fn new(users: Vec<String>, pipeline: Pipeline, biometric: ViewPlan, environment: ViewPlan) -> Self {
        AppState {
            users,
            pipeline,
            biometric,
            environment,
        }
    }

    /// Builds the pipeline and both view plans from resolved settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let samples: Arc<dyn DataSource> =
            Arc::new(DelimitedFile::environment_samples(&settings.environment_csv));
        let weather = settings
            .weather_csv
            .as_ref()
            .map(|path| Arc::new(DelimitedFile::weather_extremes(path)) as Arc<dyn DataSource>);

        AppState::new(
            settings.users.clone(),
            Pipeline::from_settings(settings),
            ViewPlan::biometric(),
            ViewPlan::environment(samples, weather),
        )
    }

    pub fn plan(&self, view: View) -> &ViewPlan {
        match view {
            View::Biometric => &self.biometric,
            View::Environment => &self.environment,
        }
    }
}
