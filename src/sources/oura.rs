//! Reader for the wearable ring's per-user collections API.
//!
//! Each collection is a paged JSON list of records keyed by `day` (or by
//! `timestamp` for heart rate samples). Records are flattened into numeric
//! metrics plus text labels so the rest of the pipeline sees plain rows.

use chrono::{DateTime, Timelike};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::SourceError;
use crate::config::Credential;
use crate::table::{DateRange, RawRecord, RawTable};

/// Public endpoint of the wearable ring's per-user collections.
pub const DEFAULT_BASE_URL: &str = "https://api.ouraring.com/v2/usercollection";

/// Upper bound on `next_token` pages followed for one request.
const MAX_PAGES: usize = 50;

const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Suffix of the metric derived from an RFC 3339 text field.
pub const HOUR_OF_DAY_SUFFIX: &str = "hour";

/// A per-metric collection of the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Sleep,
    DailySleep,
    DailyReadiness,
    DailyActivity,
    DailySpo2,
    Workout,
    Heartrate,
}

impl Collection {
    /// Path segment appended to the base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Collection::Sleep => "sleep",
            Collection::DailySleep => "daily_sleep",
            Collection::DailyReadiness => "daily_readiness",
            Collection::DailyActivity => "daily_activity",
            Collection::DailySpo2 => "daily_spo2",
            Collection::Workout => "workout",
            Collection::Heartrate => "heartrate",
        }
    }

    /// Field of each record holding its temporal key.
    pub fn time_column(&self) -> &'static str {
        match self {
            Collection::Heartrate => "timestamp",
            _ => "day",
        }
    }

    /// Query parameters selecting the inclusive `range`.
    ///
    /// Day-keyed collections take dates; heart rate samples take datetimes
    /// covering the whole first and last day.
    pub fn range_params(&self, range: &DateRange) -> [(&'static str, String); 2] {
        let start = range.start.format(QUERY_DATE_FORMAT);
        let end = range.end.format(QUERY_DATE_FORMAT);
        match self {
            Collection::Heartrate => [
                ("start_datetime", format!("{}T00:00:00", start)),
                ("end_datetime", format!("{}T23:59:59", end)),
            ],
            _ => [("start_date", start.to_string()), ("end_date", end.to_string())],
        }
    }

    /// Identifier used for logging, errors and cache keys.
    pub fn source_id(&self) -> String {
        format!("oura:{}", self.path())
    }
}

/// Configuration for the remote client.
#[derive(Debug, Clone)]
pub struct OuraConfig {
    /// Base URL the collection path is appended to
    pub base_url: String,
    /// Request timeout in seconds (default: 20)
    pub timeout_seconds: u64,
}

impl Default for OuraConfig {
    fn default() -> Self {
        OuraConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 20,
        }
    }
}

/// Client for the wearable ring's collections API.
///
/// Every request carries the bearer token and the inclusive range; paginated
/// responses are followed through `next_token`.
#[derive(Debug)]
pub struct OuraClient {
    client: Client,
    config: OuraConfig,
    credential: Credential,
}

impl OuraClient {
    /// Creates a client with its own bounded request timeout.
    pub fn new(credential: Credential, config: OuraConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SourceError::unavailable("oura", format!("client creation failed: {}", e)))?;

        Ok(OuraClient {
            client,
            config,
            credential,
        })
    }

    pub fn endpoint(&self, collection: Collection) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), collection.path())
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn config(&self) -> &OuraConfig {
        &self.config
    }

    /// Fetches every record of `collection` within `range`.
    ///
    /// # Errors
    /// Returns `SourceUnavailable` on network errors, non-2xx responses and
    /// bodies that are not a JSON object with a `data` array.
    pub async fn fetch(&self, collection: Collection, range: &DateRange) -> Result<RawTable, SourceError> {
        let source = collection.source_id();
        let url = self.endpoint(collection);
        let params = collection.range_params(range);

        let mut records = Vec::new();
        let mut next_token: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut request = self
                .client
                .get(&url)
                .bearer_auth(self.credential.expose())
                .query(&params);
            if let Some(token) = &next_token {
                request = request.query(&[("next_token", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| SourceError::unavailable(&source, format!("network error: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::unavailable(
                    &source,
                    format!(
                        "HTTP {}: {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("Unknown error")
                    ),
                ));
            }

            let body = response
                .text()
                .await
                .map_err(|e| SourceError::unavailable(&source, format!("cannot read body: {}", e)))?;
            let parsed = parse_page(collection, &body)?;
            debug!(source = %source, page, records = parsed.records.len(), "fetched page");
            records.extend(parsed.records);

            match parsed.next_token {
                Some(token) => next_token = Some(token),
                None => {
                    return Ok(RawTable::new(source, collection.time_column()).with_records(records));
                }
            }
        }

        warn!(source = %source, pages = MAX_PAGES, "page limit reached, returning partial data");
        Ok(RawTable::new(source, collection.time_column()).with_records(records))
    }
}

/// One decoded response page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<RawRecord>,
    pub next_token: Option<String>,
}

/// Decodes one response body.
///
/// Numeric fields become metrics and text fields become labels; nested
/// objects contribute dotted keys (`spo2_percentage.average`). A text field
/// holding an RFC 3339 datetime also yields `<field>.hour`, its wall-clock
/// time of day in hours. Booleans, arrays and nulls are skipped. Every
/// record must carry the collection's temporal column.
pub fn parse_page(collection: Collection, body: &str) -> Result<Page, SourceError> {
    let source = collection.source_id();
    let violation = |reason: &str| SourceError::unavailable(&source, format!("protocol violation: {}", reason));

    let value: Value = serde_json::from_str(body).map_err(|e| violation(&e.to_string()))?;
    let object = value.as_object().ok_or_else(|| violation("body is not a JSON object"))?;
    let data = object
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| violation("missing 'data' array"))?;

    let time_column = collection.time_column();
    let records = data
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let fields = item
                .as_object()
                .ok_or_else(|| violation(&format!("record {} is not an object", idx)))?;
            let time = fields
                .get(time_column)
                .and_then(Value::as_str)
                .ok_or_else(|| violation(&format!("record {} has no '{}'", idx, time_column)))?;

            let mut record = RawRecord::new(time);
            flatten_fields("", fields, &mut record);
            Ok(record)
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    let next_token = object
        .get("next_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    Ok(Page { records, next_token })
}

/// Decodes a single-page body into a table.
pub fn parse_collection(collection: Collection, body: &str) -> Result<RawTable, SourceError> {
    let page = parse_page(collection, body)?;
    Ok(RawTable::new(collection.source_id(), collection.time_column()).with_records(page.records))
}

fn flatten_fields(prefix: &str, fields: &Map<String, Value>, out: &mut RawRecord) {
    for (key, value) in fields {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Number(number) => {
                if let Some(v) = number.as_f64() {
                    out.values.insert(name, v);
                }
            }
            Value::String(text) => {
                if let Some(hour) = hour_of_day(text) {
                    out.values.insert(format!("{}.{}", name, HOUR_OF_DAY_SUFFIX), hour);
                }
                out.labels.insert(name, text.clone());
            }
            Value::Object(inner) => flatten_fields(&name, inner, out),
            _ => {}
        }
    }
}

/// Time of day of an RFC 3339 datetime, in the offset it was written in.
fn hour_of_day(text: &str) -> Option<f64> {
    let time = DateTime::parse_from_rfc3339(text).ok()?.naive_local().time();
    Some(time.hour() as f64 + time.minute() as f64 / 60.0 + time.second() as f64 / 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::HeaderMap, http::StatusCode, routing::get, Json, Router};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::collections::HashMap;

    const SLEEP_BODY: &str = r#"{
        "data": [
            {
                "id": "a1",
                "day": "2024-06-12",
                "type": "long_sleep",
                "bedtime_start": "2024-06-11T22:30:00+02:00",
                "average_hrv": 41,
                "lowest_heart_rate": 52,
                "total_sleep_duration": 27000,
                "readiness": {"score": 80, "contributors": {"hrv_balance": 70}},
                "heart_rate": {"interval": 300.0, "items": [55, 54]},
                "low_battery_alert": false
            }
        ],
        "next_token": null
    }"#;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 6, 11).unwrap(),
            NaiveDate::from_ymd_opt(2024, 7, 9).unwrap(),
        )
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String) -> OuraClient {
        let config = OuraConfig {
            base_url,
            timeout_seconds: 5,
        };
        OuraClient::new(Credential::new("test-token").unwrap(), config).unwrap()
    }

    #[test]
    fn test_parse_flattens_numeric_fields() {
        let table = parse_collection(Collection::Sleep, SLEEP_BODY).unwrap();

        assert_eq!(table.source, "oura:sleep");
        assert_eq!(table.time_column, "day");
        assert_eq!(table.len(), 1);

        let record = &table.records[0];
        assert_eq!(record.time, "2024-06-12");
        assert_eq!(record.values["average_hrv"], 41.0);
        assert_eq!(record.values["total_sleep_duration"], 27000.0);
        assert_eq!(record.values["readiness.score"], 80.0);
        assert_eq!(record.values["readiness.contributors.hrv_balance"], 70.0);
        assert_eq!(record.values["heart_rate.interval"], 300.0);
        assert!(!record.values.contains_key("id"));
        assert!(!record.values.contains_key("low_battery_alert"));
        assert!(!record.values.contains_key("day"));
    }

    #[test]
    fn test_parse_keeps_text_fields_as_labels() {
        let table = parse_collection(Collection::Sleep, SLEEP_BODY).unwrap();
        let record = &table.records[0];

        assert_eq!(record.labels["type"], "long_sleep");
        assert_eq!(record.labels["id"], "a1");
        assert!(!record.labels.contains_key("low_battery_alert"));
        // Wall-clock time in the written offset
        assert_eq!(record.values["bedtime_start.hour"], 22.5);
        assert!(!record.values.contains_key("type.hour"));
    }

    #[test]
    fn test_heartrate_is_keyed_by_timestamp() {
        let body = r#"{"data": [
            {"bpm": 61, "source": "awake", "timestamp": "2024-06-12T08:15:00+00:00"},
            {"bpm": 52, "source": "rest"}
        ]}"#;
        let result = parse_page(Collection::Heartrate, body);
        assert!(matches!(result, Err(SourceError::SourceUnavailable { reason, .. }) if reason.contains("'timestamp'")));

        let body = r#"{"data": [{"bpm": 61, "source": "awake", "timestamp": "2024-06-12T08:15:00+00:00"}]}"#;
        let table = parse_collection(Collection::Heartrate, body).unwrap();
        assert_eq!(table.time_column, "timestamp");
        assert_eq!(table.records[0].time, "2024-06-12T08:15:00+00:00");
        assert_eq!(table.records[0].values["bpm"], 61.0);
        assert_eq!(table.records[0].labels["source"], "awake");
    }

    #[test]
    fn test_range_params_per_collection() {
        let [start, end] = Collection::DailySleep.range_params(&range());
        assert_eq!(start, ("start_date", "2024-06-11".to_string()));
        assert_eq!(end, ("end_date", "2024-07-09".to_string()));

        let [start, end] = Collection::Heartrate.range_params(&range());
        assert_eq!(start, ("start_datetime", "2024-06-11T00:00:00".to_string()));
        assert_eq!(end, ("end_datetime", "2024-07-09T23:59:59".to_string()));
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        for body in ["[]", "{\"items\": []}", "not json", "{\"data\": [1, 2]}"] {
            let result = parse_page(Collection::DailyActivity, body);
            assert!(
                matches!(result, Err(SourceError::SourceUnavailable { .. })),
                "body {} should be rejected",
                body
            );
        }
    }

    #[test]
    fn test_parse_requires_temporal_key() {
        let body = r#"{"data": [{"steps": 9000}]}"#;
        let result = parse_page(Collection::DailyActivity, body);
        assert!(matches!(result, Err(SourceError::SourceUnavailable { reason, .. }) if reason.contains("'day'")));
    }

    #[test]
    fn test_parse_empty_data() {
        let page = parse_page(Collection::DailySpo2, r#"{"data": [], "next_token": ""}"#).unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.next_token, None);
    }

    #[test]
    fn test_collection_ids() {
        assert_eq!(Collection::Workout.source_id(), "oura:workout");
        assert_eq!(Collection::DailySpo2.path(), "daily_spo2");
        assert_eq!(Collection::Sleep.time_column(), "day");
        assert_eq!(Collection::Heartrate.source_id(), "oura:heartrate");
    }

    #[test]
    fn test_endpoint_joins_base_and_collection() {
        let client = client("http://localhost:9/v2/usercollection/".to_string());
        assert_eq!(
            client.endpoint(Collection::DailyReadiness),
            "http://localhost:9/v2/usercollection/daily_readiness"
        );
    }

    #[tokio::test]
    async fn test_fetch_sends_range_and_bearer_and_follows_pages() {
        async fn handler(
            headers: HeaderMap,
            Query(params): Query<HashMap<String, String>>,
        ) -> (StatusCode, Json<Value>) {
            let authorized = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                == Some("Bearer test-token");
            let ranged = params.get("start_date").map(String::as_str) == Some("2024-06-11")
                && params.get("end_date").map(String::as_str) == Some("2024-07-09");
            if !authorized || !ranged {
                return (StatusCode::BAD_REQUEST, Json(json!({"detail": "bad request"})));
            }

            match params.get("next_token").map(String::as_str) {
                None => (
                    StatusCode::OK,
                    Json(json!({
                        "data": [{"day": "2024-06-11", "steps": 8000}],
                        "next_token": "page-2"
                    })),
                ),
                Some("page-2") => (
                    StatusCode::OK,
                    Json(json!({
                        "data": [{"day": "2024-06-12", "steps": 9500}],
                        "next_token": null
                    })),
                ),
                Some(_) => (StatusCode::BAD_REQUEST, Json(json!({}))),
            }
        }

        let base = serve(Router::new().route("/daily_activity", get(handler))).await;

        let table = client(base)
            .fetch(Collection::DailyActivity, &range())
            .await
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].values["steps"], 8000.0);
        assert_eq!(table.records[1].time, "2024-06-12");
    }

    #[tokio::test]
    async fn test_fetch_heartrate_sends_datetime_range() {
        async fn handler(Query(params): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
            let ranged = params.get("start_datetime").map(String::as_str) == Some("2024-06-11T00:00:00")
                && params.get("end_datetime").map(String::as_str) == Some("2024-07-09T23:59:59")
                && !params.contains_key("start_date");
            if !ranged {
                return (StatusCode::BAD_REQUEST, Json(json!({"detail": "bad range"})));
            }
            (
                StatusCode::OK,
                Json(json!({
                    "data": [{"bpm": 58, "source": "rest", "timestamp": "2024-06-11T06:00:00+00:00"}],
                    "next_token": null
                })),
            )
        }

        let base = serve(Router::new().route("/heartrate", get(handler))).await;

        let table = client(base).fetch(Collection::Heartrate, &range()).await.unwrap();

        assert_eq!(table.source, "oura:heartrate");
        assert_eq!(table.records[0].values["bpm"], 58.0);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_unavailable() {
        let app = Router::new().route(
            "/sleep",
            get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({"detail": "no"}))) }),
        );
        let base = serve(app).await;

        let result = client(base).fetch(Collection::Sleep, &range()).await;

        match result {
            Err(SourceError::SourceUnavailable { source, reason }) => {
                assert_eq!(source, "oura:sleep");
                assert!(reason.contains("401"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = client(format!("http://{}", addr))
            .fetch(Collection::Sleep, &range())
            .await;

        assert!(matches!(result, Err(SourceError::SourceUnavailable { .. })));
    }
}
