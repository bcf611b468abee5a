//! HTTP request handlers for API endpoints

use axum::{
    extract::{Query, State},
    response::Html,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::ApiError;
use super::state::AppState;
use crate::charts::{ChartDescriptor, ChartKind};
use crate::pipeline::{Dashboard, DashboardRequest, View};
use crate::table::DateRange;

/// Date range shown when the page first loads.
pub const DEFAULT_START: &str = "2024-06-11";
pub const DEFAULT_END: &str = "2024-07-09";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Health check endpoint
///
/// Returns a simple status response to verify the server is running
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok"
    }))
}

/// GET / - Dashboard page
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../assets/dashboard.html"))
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<String>,
    pub default_start: &'static str,
    pub default_end: &'static str,
}

/// GET /api/users - Selectable identities and the default date range
pub async fn list_users(State(state): State<Arc<AppState>>) -> Json<UsersResponse> {
    Json(UsersResponse {
        users: state.users.clone(),
        default_start: DEFAULT_START,
        default_end: DEFAULT_END,
    })
}

#[derive(Debug, Serialize)]
pub struct ChartsResponse {
    pub charts: Vec<&'static ChartDescriptor>,
}

/// GET /api/charts - Static descriptors of every chart
pub async fn list_charts() -> Json<ChartsResponse> {
    Json(ChartsResponse {
        charts: ChartKind::ALL.iter().map(ChartKind::descriptor).collect(),
    })
}

/// Query parameters for the dashboard endpoint. All are optional.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub user: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub view: Option<String>,
}

/// GET /api/dashboard - Runs the pipeline for one view and date range
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<Dashboard>, ApiError> {
    let request = parse_request(&state.users, params)?;
    let plan = state.plan(request.view);

    let dashboard = state.pipeline.render(&request, plan).await;

    Ok(Json(dashboard))
}

fn parse_request(users: &[String], params: DashboardParams) -> Result<DashboardRequest, ApiError> {
    let user = match params.user {
        Some(user) if users.contains(&user) => user,
        Some(user) => return Err(ApiError::InvalidParameter(format!("Unknown user: {}", user))),
        None => users
            .first()
            .cloned()
            .ok_or_else(|| ApiError::InvalidParameter("No users configured".to_string()))?,
    };

    let view = match params.view {
        Some(view) => view.parse::<View>().map_err(ApiError::InvalidParameter)?,
        None => View::Biometric,
    };

    let start = parse_date(params.start.as_deref().unwrap_or(DEFAULT_START), "start")?;
    let end = parse_date(params.end.as_deref().unwrap_or(DEFAULT_END), "end")?;

    let range = DateRange::new(start, end);
    if !range.is_valid() {
        return Err(ApiError::InvalidDateRange(
            "Start date must be before or equal to end date".to_string(),
        ));
    }

    Ok(DashboardRequest { user, range, view })
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| ApiError::InvalidDateRange(format!("Invalid {} date '{}': {}", field, value, e)))
}
