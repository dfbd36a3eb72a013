//! HTTP handler functions for the penalty report API.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use penalty_report_chart::{
    ChartError, ChartSpec, SeriesPoint, render_bar_chart, render_line_chart,
};
use penalty_report_database::{DbError, queries};
use penalty_report_database_models::{MonthRange, RecordQuery, top_by_total};
use penalty_report_offence_models::{MonthKey, MonthKeyError};
use penalty_report_server_models::{
    ApiCodeCount, ApiErrorBody, ApiHealth, CodeComparisonParams, DateRangeParams,
    DistributionResponse, KeywordSearchParams, MobileTrendResponse, PlotResponse,
    RecordsResponse,
};

use crate::AppState;

/// Month used when a date bound is omitted.
const DEFAULT_MONTH: &str = "2017-07-01";

/// Number of offence codes charted by the distribution report.
const TOP_CODES: usize = 20;

const DISTRIBUTION_CHART: ChartSpec = ChartSpec {
    title: "Distribution of the Top 20 Cases by Offense Code",
    x_desc: "Offense Codes",
    y_desc: "Number of Cases",
    y_margin: 500,
};

const MOBILE_TREND_CHART: ChartSpec = ChartSpec {
    title: "Trend of Mobile Cases",
    x_desc: "Months",
    y_desc: "Number of Cases",
    y_margin: 50,
};

const CODE_COMPARISON_CHART: ChartSpec = ChartSpec {
    title: "Distribution of Cases by Offense Code",
    x_desc: "Offense Codes",
    y_desc: "Number of Cases",
    y_margin: 50,
};

/// Errors returned by the report endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A request parameter is missing or malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The record store or chart renderer failed. The cause has already
    /// been logged.
    #[error("Failed to {0}")]
    Internal(&'static str),
}

impl From<MonthKeyError> for ApiError {
    fn from(e: MonthKeyError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrorBody {
            error: self.to_string(),
        })
    }
}

/// Logs a store failure and hides it behind a generic message.
fn store_error(action: &'static str) -> impl FnOnce(DbError) -> ApiError {
    move |e| {
        log::error!("Failed to {action}: {e}");
        ApiError::Internal(action)
    }
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /penalty_cases`
///
/// Lists every record in the month range. Both bounds default to
/// July 2017.
pub async fn penalty_cases(
    state: web::Data<AppState>,
    params: web::Query<DateRangeParams>,
) -> Result<HttpResponse, ApiError> {
    let range = MonthRange::new(
        month_or_default(params.date1.as_deref())?,
        month_or_default(params.date2.as_deref())?,
    );

    let data = queries::list_records(state.db.as_ref(), &RecordQuery::in_range(range))
        .await
        .map_err(store_error("query records"))?;

    Ok(HttpResponse::Ok().json(RecordsResponse { data }))
}

/// `GET /route_for_button2`
///
/// Sums notices per offence code over the range and charts the 20 largest.
/// The upper bound defaults to the current month.
pub async fn offence_code_distribution(
    state: web::Data<AppState>,
    params: web::Query<DateRangeParams>,
) -> Result<HttpResponse, ApiError> {
    let upper = match params.date2.as_deref() {
        Some(date) => MonthKey::parse(date)?,
        None => MonthKey::current(),
    };
    let range = MonthRange::new(month_or_default(params.date1.as_deref())?, upper);

    let totals = queries::offence_code_totals(state.db.as_ref(), &range, None)
        .await
        .map_err(store_error("total offence codes"))?;

    let series = top_by_total(&totals, TOP_CODES)
        .into_iter()
        .map(|t| SeriesPoint::new(t.offence_code.to_string(), t.total))
        .collect();
    let plot = render_plot(DISTRIBUTION_CHART, series, ChartKind::Bar).await?;

    Ok(HttpResponse::Ok().json(DistributionResponse {
        plot,
        table_data: totals.into_iter().map(ApiCodeCount::from).collect(),
    }))
}

/// `GET /route_for_button3`
///
/// Lists the records in the range whose description contains `key_word`,
/// ignoring case. All parameters are required.
pub async fn description_search(
    state: web::Data<AppState>,
    params: web::Query<KeywordSearchParams>,
) -> Result<HttpResponse, ApiError> {
    let from = MonthKey::parse(required(params.date1.as_deref(), "date1")?)?;
    let to = MonthKey::parse(required(params.date2.as_deref(), "date2")?)?;
    let keyword = required(params.key_word.as_deref(), "key_word")?;

    let query = RecordQuery::in_range(MonthRange::new(from, to)).with_description(keyword);
    let data = queries::list_records(state.db.as_ref(), &query)
        .await
        .map_err(store_error("search records"))?;

    Ok(HttpResponse::Ok().json(RecordsResponse { data }))
}

/// `GET /route_for_button4`
///
/// Charts mobile phone notices per month and summarizes the mobile phone
/// records of the range.
pub async fn mobile_trend(
    state: web::Data<AppState>,
    params: web::Query<DateRangeParams>,
) -> Result<HttpResponse, ApiError> {
    let range = MonthRange::new(
        month_or_default(params.date1.as_deref())?,
        month_or_default(params.date2.as_deref())?,
    );

    let months = queries::mobile_month_totals(state.db.as_ref(), &range)
        .await
        .map_err(store_error("total mobile phone months"))?;
    let summary = queries::mobile_summary(state.db.as_ref(), &range)
        .await
        .map_err(store_error("summarize mobile phone records"))?;

    let series = months
        .iter()
        .map(|m| SeriesPoint::new(m.month.to_store_format(), m.total))
        .collect();
    let plot = render_plot(MOBILE_TREND_CHART, series, ChartKind::Line).await?;

    Ok(HttpResponse::Ok().json(MobileTrendResponse::new(plot, &summary)))
}

/// `GET /plot_offense_codes`
///
/// Charts the notice totals of up to two offence codes over the range.
/// An empty or missing code matches nothing.
pub async fn offence_code_comparison(
    state: web::Data<AppState>,
    params: web::Query<CodeComparisonParams>,
) -> Result<HttpResponse, ApiError> {
    let range = MonthRange::new(
        month_or_default(params.date1.as_deref())?,
        month_or_default(params.date2.as_deref())?,
    );

    let mut codes = Vec::with_capacity(2);
    for (value, name) in [
        (params.offense_code_1.as_deref(), "offense_code_1"),
        (params.offense_code_2.as_deref(), "offense_code_2"),
    ] {
        if let Some(code) = offence_code(value, name)?
            && !codes.contains(&code)
        {
            codes.push(code);
        }
    }

    let totals = queries::offence_code_totals(state.db.as_ref(), &range, Some(&codes))
        .await
        .map_err(store_error("total offence codes"))?;

    let series = totals
        .into_iter()
        .map(|t| SeriesPoint::new(t.offence_code.to_string(), t.total))
        .collect();
    let plot = render_plot(CODE_COMPARISON_CHART, series, ChartKind::Bar).await?;

    Ok(HttpResponse::Ok().json(PlotResponse { plot }))
}

#[derive(Debug, Clone, Copy)]
enum ChartKind {
    Bar,
    Line,
}

/// Renders `series` off the async worker. An empty series yields no plot.
async fn render_plot(
    spec: ChartSpec,
    series: Vec<SeriesPoint>,
    kind: ChartKind,
) -> Result<Option<String>, ApiError> {
    if series.is_empty() {
        return Ok(None);
    }

    let rendered = web::block(move || match kind {
        ChartKind::Bar => render_bar_chart(&spec, &series),
        ChartKind::Line => render_line_chart(&spec, &series),
    })
    .await
    .map_err(|e| {
        log::error!("Chart rendering task failed: {e}");
        ApiError::Internal("render chart")
    })?;

    match rendered {
        Ok(plot) => Ok(Some(plot)),
        Err(ChartError::EmptySeries) => Ok(None),
        Err(e) => {
            log::error!("Failed to render '{}': {e}", spec.title);
            Err(ApiError::Internal("render chart"))
        }
    }
}

fn month_or_default(value: Option<&str>) -> Result<MonthKey, ApiError> {
    Ok(MonthKey::parse(value.unwrap_or(DEFAULT_MONTH))?)
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ApiError> {
    value.ok_or_else(|| ApiError::BadRequest(format!("Missing required parameter '{name}'")))
}

fn offence_code(value: Option<&str>, name: &str) -> Result<Option<i64>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(code) => code.parse().map(Some).map_err(|_| {
            ApiError::BadRequest(format!("Invalid offence code '{code}' for '{name}'"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, test};
    use base64::Engine as _;
    use penalty_report_database::open_db;
    use penalty_report_offence_models::OffenceRecord;
    use serde_json::Value;

    use crate::{AppState, configure};

    fn record(label: &str, code: i64, desc: &str, total_number: i64) -> OffenceRecord {
        OffenceRecord {
            offence_finyear: Some("2017-2018".to_string()),
            offence_month: penalty_report_offence_models::MonthKey::from_store_format(label)
                .unwrap(),
            offence_code: code,
            offence_desc: Some(desc.to_string()),
            legislation: Some("ROAD RULES 2014".to_string()),
            section_clause: None,
            face_value: Some(100.0),
            camera_ind: None,
            camera_type: None,
            location_code: None,
            location_details: None,
            school_zone_ind: None,
            speed_band: None,
            speed_ind: None,
            point_to_point_ind: None,
            red_light_camera_ind: None,
            speed_camera_ind: None,
            seatbelt_ind: None,
            mobile_phone_ind: None,
            parking_ind: None,
            cins_ind: None,
            food_ind: None,
            bicycle_toy_etc_ind: None,
            total_number,
            total_value: 100.0,
        }
    }

    fn mobile(label: &str, total_number: i64, total_value: f64, school: bool) -> OffenceRecord {
        let mut r = record(label, 74_703, "Use mobile phone while driving", total_number);
        r.mobile_phone_ind = Some("Y".to_string());
        r.school_zone_ind = Some(if school { "Y" } else { "N" }.to_string());
        r.total_value = total_value;
        r
    }

    fn dataset() -> Vec<OffenceRecord> {
        vec![
            record("01/06/2017", 83_871, "Exceed speed 10km/h", 40),
            record("01/07/2017", 83_871, "Exceed speed 10km/h", 10),
            record("01/07/2017", 74_500, "Not wear seatbelt", 7),
            mobile("01/07/2017", 12, 4044.0, true),
            record("01/08/2017", 83_871, "EXCEED SPEED 20km/h", 5),
            mobile("01/08/2017", 3, 1011.0, false),
            mobile("01/09/2017", 20, 6740.0, false),
            record("01/01/2018", 74_500, "Not wear seatbelt", 9),
        ]
    }

    async fn state_with(records: &[OffenceRecord]) -> (tempfile::TempDir, actix_web::web::Data<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir.path().join("store.db")).await.unwrap();
        penalty_report_database::queries::insert_records(db.as_ref(), records)
            .await
            .unwrap();
        let state = actix_web::web::Data::new(AppState {
            db: Arc::from(db),
        });
        (dir, state)
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state.clone()).configure(configure)).await
        };
    }

    async fn get_json(state: &actix_web::web::Data<AppState>, uri: &str) -> Value {
        let app = app!(state);
        let req = test::TestRequest::get().uri(uri).to_request();
        test::call_and_read_body_json(&app, req).await
    }

    async fn get_status(state: &actix_web::web::Data<AppState>, uri: &str) -> u16 {
        let app = app!(state);
        let req = test::TestRequest::get().uri(uri).to_request();
        test::call_service(&app, req).await.status().as_u16()
    }

    fn assert_png(plot: &Value) {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(plot.as_str().unwrap())
            .unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }

    fn months(rows: &Value) -> Vec<&str> {
        rows.as_array()
            .unwrap()
            .iter()
            .map(|r| r["OFFENCE_MONTH"].as_str().unwrap())
            .collect()
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let (_dir, state) = state_with(&[]).await;
        let body = get_json(&state, "/api/health").await;
        assert_eq!(body["healthy"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn penalty_cases_lists_inclusive_range() {
        let (_dir, state) = state_with(&dataset()).await;

        let body = get_json(&state, "/penalty_cases?date1=2017-07-15&date2=2017-08-31").await;

        assert_eq!(
            months(&body["data"]),
            vec!["01/07/2017", "01/07/2017", "01/07/2017", "01/08/2017", "01/08/2017"]
        );
        assert_eq!(body["data"][0]["OFFENCE_CODE"], 83_871);
        assert_eq!(body["data"][0]["TOTAL_NUMBER"], 10);
    }

    #[actix_web::test]
    async fn penalty_cases_defaults_to_july_2017() {
        let (_dir, state) = state_with(&dataset()).await;

        let body = get_json(&state, "/penalty_cases").await;

        assert_eq!(months(&body["data"]).len(), 3);
        assert!(months(&body["data"]).iter().all(|m| *m == "01/07/2017"));
    }

    #[actix_web::test]
    async fn penalty_cases_spans_year_boundary() {
        let (_dir, state) = state_with(&dataset()).await;

        let body = get_json(&state, "/penalty_cases?date1=2017-09-01&date2=2018-01-01").await;

        assert_eq!(months(&body["data"]), vec!["01/09/2017", "01/01/2018"]);
    }

    #[actix_web::test]
    async fn malformed_date_is_bad_request() {
        let (_dir, state) = state_with(&dataset()).await;

        assert_eq!(get_status(&state, "/penalty_cases?date1=2017/07/01").await, 400);
        assert_eq!(get_status(&state, "/penalty_cases?date1=2017-13-01").await, 400);

        let body = get_json(&state, "/route_for_button4?date2=July").await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn distribution_totals_match_range_sum() {
        let records = dataset();
        let (_dir, state) = state_with(&records).await;

        let body = get_json(&state, "/route_for_button2?date1=2017-07-01&date2=2017-09-01").await;

        let table = body["table_data"].as_array().unwrap();
        let table_sum: i64 = table.iter().map(|e| e["count"].as_i64().unwrap()).sum();
        let range_sum: i64 = records
            .iter()
            .filter(|r| {
                let iso = r.offence_month.to_iso();
                ("2017-07-01"..="2017-09-01").contains(&iso.as_str())
            })
            .map(|r| r.total_number)
            .sum();
        assert_eq!(table_sum, range_sum);

        assert_eq!(
            table[0],
            serde_json::json!({"OFFENCE_CODE": "74500", "count": 7})
        );
        assert_eq!(table[1]["OFFENCE_CODE"], "74703");
        assert_eq!(table[1]["count"], 35);
        assert_eq!(table[2]["OFFENCE_CODE"], "83871");
        assert_eq!(table[2]["count"], 15);
        assert_png(&body["plot"]);
    }

    #[actix_web::test]
    async fn distribution_upper_bound_defaults_to_now() {
        let (_dir, state) = state_with(&dataset()).await;

        let body = get_json(&state, "/route_for_button2?date1=2017-06-01").await;

        let table_sum: i64 = body["table_data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["count"].as_i64().unwrap())
            .sum();
        assert_eq!(table_sum, dataset().iter().map(|r| r.total_number).sum::<i64>());
    }

    #[actix_web::test]
    async fn distribution_of_empty_range_has_no_plot() {
        let (_dir, state) = state_with(&dataset()).await;

        let body = get_json(&state, "/route_for_button2?date1=2020-01-01&date2=2020-02-01").await;

        assert!(body["plot"].is_null());
        assert_eq!(body["table_data"], serde_json::json!([]));
    }

    #[actix_web::test]
    async fn description_search_ignores_case() {
        let (_dir, state) = state_with(&dataset()).await;

        let body = get_json(
            &state,
            "/route_for_button3?date1=2017-06-01&date2=2017-08-01&key_word=exceed%20SPEED",
        )
        .await;

        let descs: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["OFFENCE_DESC"].as_str().unwrap())
            .collect();
        assert_eq!(
            descs,
            vec![
                "Exceed speed 10km/h",
                "Exceed speed 10km/h",
                "EXCEED SPEED 20km/h"
            ]
        );
    }

    #[actix_web::test]
    async fn description_search_requires_every_parameter() {
        let (_dir, state) = state_with(&dataset()).await;

        assert_eq!(
            get_status(&state, "/route_for_button3?date1=2017-07-01&date2=2017-08-01").await,
            400
        );
        assert_eq!(
            get_status(&state, "/route_for_button3?date1=2017-07-01&key_word=speed").await,
            400
        );
        assert_eq!(get_status(&state, "/route_for_button3?key_word=speed").await, 400);
    }

    #[actix_web::test]
    async fn mobile_trend_summarizes_range() {
        let (_dir, state) = state_with(&dataset()).await;

        let body = get_json(&state, "/route_for_button4?date1=2017-07-01&date2=2017-09-01").await;

        assert_png(&body["plot"]);
        assert_eq!(body["mobile_cases"], 35);
        assert_eq!(body["mobile_cases_in_school_zone"], 1);
        assert_eq!(body["min_offence_month"], "01/08/2017");
        assert_eq!(body["max_offence_month"], "01/09/2017");
        assert_eq!(body["min_offence_month_total_value"], "01/08/2017");
        assert_eq!(body["max_offence_month_total_value"], "01/09/2017");
        assert_eq!(body["min_total_value"], 1011.0);
        assert_eq!(body["max_total_number"], 20);
    }

    #[actix_web::test]
    async fn mobile_trend_without_mobile_records_reports_zero() {
        let (_dir, state) = state_with(&dataset()).await;

        let body = get_json(&state, "/route_for_button4?date1=2017-06-01&date2=2017-06-01").await;

        assert!(body["plot"].is_null());
        assert_eq!(body["mobile_cases"], 0);
        assert_eq!(body["mobile_cases_in_school_zone"], 0);
        assert!(body["min_offence_month"].is_null());
        assert!(body["min_total_value"].is_null());
    }

    #[actix_web::test]
    async fn code_comparison_charts_matching_codes() {
        let (_dir, state) = state_with(&dataset()).await;

        let body = get_json(
            &state,
            "/plot_offense_codes?date1=2017-07-01&date2=2018-01-01&offense_code_1=74500&offense_code_2=83871",
        )
        .await;

        assert_png(&body["plot"]);
        assert_eq!(body.as_object().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn code_comparison_without_matches_has_null_plot() {
        let (_dir, state) = state_with(&dataset()).await;

        for uri in [
            "/plot_offense_codes?date1=2017-07-01&date2=2018-01-01",
            "/plot_offense_codes?date1=2017-07-01&date2=2018-01-01&offense_code_1=&offense_code_2=",
            "/plot_offense_codes?date1=2017-07-01&date2=2018-01-01&offense_code_1=11111",
            "/plot_offense_codes?date1=2019-07-01&date2=2019-08-01&offense_code_1=74500",
        ] {
            let body = get_json(&state, uri).await;
            assert_eq!(body, serde_json::json!({"plot": null}), "{uri}");
        }
    }

    #[actix_web::test]
    async fn code_comparison_rejects_non_numeric_codes() {
        let (_dir, state) = state_with(&dataset()).await;

        assert_eq!(
            get_status(&state, "/plot_offense_codes?offense_code_1=abc").await,
            400
        );
    }

    #[test]
    fn parses_optional_offence_codes() {
        assert_eq!(super::offence_code(None, "c").unwrap(), None);
        assert_eq!(super::offence_code(Some(" "), "c").unwrap(), None);
        assert_eq!(super::offence_code(Some("74703"), "c").unwrap(), Some(74_703));
        assert!(super::offence_code(Some("7a"), "c").is_err());
    }
}
