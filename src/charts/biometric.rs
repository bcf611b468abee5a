//! Charts over the daily wearable-ring table.

use super::{
    assemble, assemble_split, BarMode, ChartDescriptor, ChartError, ChartSpec, ChartTable, Layout, RenderMode, Trace,
    Unit,
};

const SECONDS_PER_HOUR: f64 = 3600.0;

pub(super) const SLEEP_DURATION: ChartDescriptor = ChartDescriptor {
    id: "sleep_duration",
    title: "Daily Total Sleep Duration",
    x_label: "Day",
    y_label: "Sleep Duration (Unit: hours)",
    y2_label: None,
    unit: Unit::Hours,
    required_columns: &["total_sleep_duration"],
    dual_axis: false,
};

pub(super) const LOWEST_HEART_RATE: ChartDescriptor = ChartDescriptor {
    id: "lowest_heart_rate",
    title: "Daily Lowest Heart Rate During Sleep",
    x_label: "Day",
    y_label: "Beat Per Minute",
    y2_label: None,
    unit: Unit::Bpm,
    required_columns: &["lowest_heart_rate"],
    dual_axis: false,
};

pub(super) const RESPIRATORY_RATE: ChartDescriptor = ChartDescriptor {
    id: "respiratory_rate",
    title: "Average Respiratory Rate",
    x_label: "Day",
    y_label: "Count/minute",
    y2_label: None,
    unit: Unit::BreathsPerMinute,
    required_columns: &["average_breath"],
    dual_axis: false,
};

pub(super) const TEMPERATURE_DEVIATION: ChartDescriptor = ChartDescriptor {
    id: "temperature_deviation",
    title: "Average temperature deviation",
    x_label: "Day",
    y_label: "Degrees Celsius",
    y2_label: None,
    unit: Unit::Celsius,
    required_columns: &["temperature_deviation"],
    dual_axis: false,
};

pub(super) const HRV: ChartDescriptor = ChartDescriptor {
    id: "hrv",
    title: "Daily Average HRV",
    x_label: "Day",
    y_label: "HRV",
    y2_label: None,
    unit: Unit::Milliseconds,
    required_columns: &["average_hrv"],
    dual_axis: false,
};

pub(super) const STEPS: ChartDescriptor = ChartDescriptor {
    id: "steps",
    title: "Daily Total Steps",
    x_label: "Day",
    y_label: "Steps",
    y2_label: None,
    unit: Unit::Count,
    required_columns: &["steps"],
    dual_axis: false,
};

pub(super) const HEART_RATE: ChartDescriptor = ChartDescriptor {
    id: "heart_rate",
    title: "Heart Rate Data Analysis",
    x_label: "Day",
    y_label: "Heart Rate (BPM)",
    y2_label: None,
    unit: Unit::Bpm,
    required_columns: &["average_heart_rate", "lowest_heart_rate", "average_hrv"],
    dual_axis: false,
};

pub(super) const SPO2: ChartDescriptor = ChartDescriptor {
    id: "spo2",
    title: "Average Spo2 percentage",
    x_label: "Day",
    y_label: "Percentage",
    y2_label: None,
    unit: Unit::Percent,
    required_columns: &["spo2"],
    dual_axis: false,
};

pub(super) const READINESS_SCORE: ChartDescriptor = ChartDescriptor {
    id: "readiness_score",
    title: "Readiness Score Over Time",
    x_label: "Day",
    y_label: "Readiness Score",
    y2_label: None,
    unit: Unit::Score,
    required_columns: &["readiness_score"],
    dual_axis: false,
};

pub(super) const SLEEP_SCORE: ChartDescriptor = ChartDescriptor {
    id: "sleep_score",
    title: "Sleep Score Over Time",
    x_label: "Day",
    y_label: "Sleep Score",
    y2_label: None,
    unit: Unit::Score,
    required_columns: &["sleep_score"],
    dual_axis: false,
};

pub(super) const SLEEP_BREAKDOWN: ChartDescriptor = ChartDescriptor {
    id: "sleep_breakdown",
    title: "Sleep Duration and Efficiency Breakdown",
    x_label: "Day",
    y_label: "Hours",
    y2_label: Some("Sleep Efficiency"),
    unit: Unit::Hours,
    required_columns: &[
        "deep_sleep_duration",
        "light_sleep_duration",
        "rem_sleep_duration",
        "awake_time",
        "efficiency",
    ],
    dual_axis: true,
};

pub(super) const ACTIVITY_LOG: ChartDescriptor = ChartDescriptor {
    id: "activity_log",
    title: "Activity Log",
    x_label: "Day",
    y_label: "Count",
    y2_label: None,
    unit: Unit::Count,
    required_columns: &[],
    dual_axis: false,
};

pub(super) const DAILY_HEART_RATE: ChartDescriptor = ChartDescriptor {
    id: "daily_heart_rate",
    title: "Daily Average Heart Rate Chart",
    x_label: "Date",
    y_label: "Beat Per Minute",
    y2_label: None,
    unit: Unit::Bpm,
    required_columns: &[],
    dual_axis: false,
};

pub(super) const SLEEP_START_END: ChartDescriptor = ChartDescriptor {
    id: "sleep_start_end",
    title: "Bedtime Start and End Times",
    x_label: "Day",
    y_label: "Time of Day (hours)",
    y2_label: None,
    unit: Unit::HourOfDay,
    required_columns: &["bedtime_start.hour", "bedtime_end.hour"],
    dual_axis: false,
};

/// Column family of per-activity workout counts.
pub(crate) const ACTIVITY_COUNT_PREFIX: &str = "activity_count";

/// Column family of per-measurement-source mean heart rates.
pub(crate) const HEART_RATE_SOURCE_PREFIX: &str = "bpm";

/// Single line-and-marker series, the shape most daily charts share.
fn daily_line(
    descriptor: &ChartDescriptor,
    table: &dyn ChartTable,
    trace: Trace,
) -> Result<ChartSpec, ChartError> {
    assemble(descriptor, table, &[trace], Layout::legend("Metric"))
}

pub(super) fn sleep_duration(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let trace = Trace::new("total_sleep_duration", "Daily Total Sleep Duration", RenderMode::LineMarkers)
        .divided_by(SECONDS_PER_HOUR);
    daily_line(&SLEEP_DURATION, table, trace)
}

pub(super) fn lowest_heart_rate(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let trace = Trace::new("lowest_heart_rate", "Daily Lowest Heart Rate", RenderMode::LineMarkers);
    daily_line(&LOWEST_HEART_RATE, table, trace)
}

pub(super) fn respiratory_rate(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let trace = Trace::new("average_breath", "Respiratory Rate", RenderMode::LineMarkers);
    daily_line(&RESPIRATORY_RATE, table, trace)
}

pub(super) fn temperature_deviation(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let trace = Trace::new("temperature_deviation", "Temperature Deviation", RenderMode::LineMarkers);
    daily_line(&TEMPERATURE_DEVIATION, table, trace)
}

pub(super) fn hrv(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let trace = Trace::new("average_hrv", "Average HRV", RenderMode::LineMarkers);
    daily_line(&HRV, table, trace)
}

pub(super) fn steps(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let trace = Trace::new("steps", "Daily Total Steps Count", RenderMode::LineMarkers);
    daily_line(&STEPS, table, trace)
}

pub(super) fn spo2(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let trace = Trace::new("spo2", "Spo2", RenderMode::LineMarkers).color("lightblue");
    daily_line(&SPO2, table, trace)
}

pub(super) fn readiness_score(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let trace = Trace::new("readiness_score", "Readiness Score", RenderMode::LineMarkers);
    daily_line(&READINESS_SCORE, table, trace)
}

pub(super) fn sleep_score(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let trace = Trace::new("sleep_score", "Sleep Score", RenderMode::LineMarkers);
    daily_line(&SLEEP_SCORE, table, trace)
}

/// Grouped bars for average and lowest heart rate with HRV as a line.
pub(super) fn heart_rate(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let traces = [
        Trace::new("average_heart_rate", "Average Heart Rate", RenderMode::Bar).color("blue"),
        Trace::new("lowest_heart_rate", "Lowest Heart Rate", RenderMode::Bar).color("lightblue"),
        Trace::new("average_hrv", "Average HRV", RenderMode::LineMarkers).color("green"),
    ];
    let layout = Layout {
        bar_mode: Some(BarMode::Group),
        ..Layout::legend("Metric")
    };
    assemble(&HEART_RATE, table, &traces, layout)
}

/// Stacked sleep-stage hours with efficiency (percent, 0-100) on the
/// secondary axis.
pub(super) fn sleep_breakdown(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let traces = [
        Trace::new("deep_sleep_duration", "Deep Sleep", RenderMode::Bar)
            .color("indianred")
            .divided_by(SECONDS_PER_HOUR),
        Trace::new("light_sleep_duration", "Light Sleep", RenderMode::Bar)
            .color("lightblue")
            .divided_by(SECONDS_PER_HOUR),
        Trace::new("rem_sleep_duration", "REM Sleep", RenderMode::Bar)
            .color("orange")
            .divided_by(SECONDS_PER_HOUR),
        Trace::new("awake_time", "Awake Time", RenderMode::Bar)
            .color("lightgray")
            .divided_by(SECONDS_PER_HOUR),
        Trace::new("efficiency", "Sleep Efficiency", RenderMode::LineMarkers)
            .color("green")
            .secondary(),
    ];
    let layout = Layout {
        bar_mode: Some(BarMode::Stack),
        legend_title: Some("Sleep Types and Efficiency"),
        y_range: None,
        y2_range: Some([0.0, 100.0]),
    };
    assemble(&SLEEP_BREAKDOWN, table, &traces, layout)
}

/// Stacked per-day workout counts, one bar per activity.
pub(super) fn activity_log(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let layout = Layout {
        bar_mode: Some(BarMode::Stack),
        ..Layout::legend("Activity")
    };
    assemble_split(&ACTIVITY_LOG, table, ACTIVITY_COUNT_PREFIX, RenderMode::Bar, layout)
}

/// Daily mean heart rate, one line per measurement source.
pub(super) fn daily_heart_rate(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    assemble_split(
        &DAILY_HEART_RATE,
        table,
        HEART_RATE_SOURCE_PREFIX,
        RenderMode::LineMarkers,
        Layout::legend("Source"),
    )
}

/// Time of day each sleep period started and ended, one point per period.
pub(super) fn sleep_start_end(table: &dyn ChartTable) -> Result<ChartSpec, ChartError> {
    let traces = [
        Trace::new("bedtime_start.hour", "Start", RenderMode::Markers),
        Trace::new("bedtime_end.hour", "End", RenderMode::Markers),
    ];
    let layout = Layout {
        y_range: Some([0.0, 24.0]),
        ..Layout::legend("Type")
    };
    assemble(&SLEEP_START_END, table, &traces, layout)
}
