pub mod table;
pub mod normalize;
pub mod aggregate;
pub mod join;
pub mod charts;
pub mod sources;
pub mod config;
pub mod pipeline;
pub mod server;

pub use table::{DailyRow, DailyTable, DateRange, NormalizedRecord, NormalizedTable, RawRecord, RawTable};
pub use normalize::{normalize, parse_timestamp, MalformedTimestamp, TimestampPolicy};
pub use aggregate::{aggregate_daily, ColumnReduction, Reduction, ReductionPlan};
pub use join::{left_join, JoinError};
pub use charts::{ChartDescriptor, ChartError, ChartKind, ChartSpec, ChartTable, Series, Unit};
pub use sources::{DataSource, InMemorySource, SourceError};
pub use sources::delimited::DelimitedFile;
pub use sources::oura::{Collection, OuraClient, OuraConfig};
pub use config::{ConfigError, Credential, Settings};
pub use pipeline::{Dashboard, DashboardRequest, Panel, Pipeline, View, ViewPlan};
pub use server::{run_server, ApiError, AppState};
