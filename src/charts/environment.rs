//! Charts over indoor sensor samples and outdoor weather extremes.

use super::{assemble, ChartDescriptor, ChartError, ChartSpec, ChartTable, Layout, RenderMode, Trace, Unit};

pub(super) const INDOOR_DAILY_CLIMATE: ChartDescriptor = ChartDescriptor {
    id: "indoor_daily_climate",
    title: "Daily Average Temperature and Humidity",
    x_label: "Date",
    y_label: "Temperature (°F)",
    y2_label: Some("Humidity (%)"),
    unit: Unit::Fahrenheit,
    required_columns: &["Temperature_Fahrenheit", "Relative_Humidity"],
    dual_axis: true,
};

pub(super) const INDOOR_TEMPERATURE: ChartDescriptor = ChartDescriptor {
    id: "indoor_temperature",
    title: "Temperature Over Time",
    x_label: "Timestamp",
    y_label: "Temperature (°F)",
    y2_label: None,
    unit: Unit::Fahrenheit,
    required_columns: &["Temperature_Fahrenheit"],
    dual_axis: false,
};

pub(super) const INDOOR_HUMIDITY: ChartDescriptor = ChartDescriptor {
    id: "indoor_humidity",
    title: "Relative Humidity Over Time",
    x_label: "Timestamp",
    y_label: "Humidity (%)",
    y2_label: None,
    unit: Unit::Percent,
    required_columns: &["Relative_Humidity"],
    dual_axis: false,
};

pub(super) const OUTDOOR_TEMPERATURE: ChartDescriptor = ChartDescriptor {
    id: "outdoor_temperature",
    title: "Outdoor Temperature Over Time",
    x_label: "Date",
    y_label: "Temperature (°F)",
    y2_label: None,
    unit: Unit::Fahrenheit,
    required_columns: &["temp_min", "temp_max"],
    dual_axis: false,
};

pub(super) const INDOOR_VS_OUTDOOR: ChartDescriptor = ChartDescriptor {
    id: "indoor_vs_outdoor",
    title: "Indoor vs Outdoor Temperature Over Time",
    x_label: "Date",
    y_label: "Temperature (°F)",
    y2_label: None,
    unit: Unit::Fahrenheit,
    required_columns: &["Temperature_Fahrenheit", "temp_min", "temp_max"],
    dual_axis: false,
};

/// Daily mean temperature (left axis) and humidity (right axis).
pub(super) fn indoor_daily_climate(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let traces = [
        Trace::new("Temperature_Fahrenheit", "Temperature", RenderMode::LineMarkers),
        Trace::new("Relative_Humidity", "Humidity", RenderMode::LineMarkers).secondary(),
    ];
    assemble(&INDOOR_DAILY_CLIMATE, table, &traces, Layout::default())
}

/// Every sample, plotted against its own timestamp.
pub(super) fn indoor_temperature(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let traces = [Trace::new("Temperature_Fahrenheit", "Temperature", RenderMode::Line)];
    assemble(&INDOOR_TEMPERATURE, table, &traces, Layout::default())
}

pub(super) fn indoor_humidity(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let traces = [Trace::new("Relative_Humidity", "Humidity", RenderMode::Line)];
    assemble(&INDOOR_HUMIDITY, table, &traces, Layout::default())
}

pub(super) fn outdoor_temperature(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let traces = [
        Trace::new("temp_min", "Daily Low", RenderMode::Line).color("lightgreen"),
        Trace::new("temp_max", "Daily High", RenderMode::Line).color("salmon"),
    ];
    assemble(&OUTDOOR_TEMPERATURE, table, &traces, Layout::default())
}

/// Indoor daily mean against outdoor extremes, read from a table that
/// joins indoor aggregates (primary) with weather records.
pub(super) fn indoor_vs_outdoor(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let traces = [
        Trace::new("Temperature_Fahrenheit", "Indoor Temperature", RenderMode::LineMarkers).color("blue"),
        Trace::new("temp_min", "Outdoor Daily Low", RenderMode::Line).color("lightgreen"),
        Trace::new("temp_max", "Outdoor Daily High", RenderMode::Line).color("salmon"),
    ];
    assemble(&INDOOR_VS_OUTDOOR, table, &traces, Layout::legend("Source"))
}
