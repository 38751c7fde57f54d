use crate::cache::Dataset;
use crate::errors::AppError;
use crate::filter::Filters;
use crate::models::{DashboardQuery, DashboardResponse, DateRange, RecordRow, RecordsResponse};
use crate::state::AppState;
use crate::stats::build_dashboard;
use crate::ui::render_index;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::info;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.default_range))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>, AppError> {
    let range = resolve_range(&state, &query)?;
    let dataset = load(&state, range).await?;
    let filters = Filters::from(&query);

    Ok(Json(build_dashboard(range, &dataset, &filters)))
}

pub async fn get_records(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Response, AppError> {
    let range = resolve_range(&state, &query)?;
    let dataset = load(&state, range).await?;
    let rows = Filters::from(&query).apply(&dataset.records);

    let response = RecordsResponse {
        range,
        total_rows: dataset.records.len(),
        filtered_rows: rows.len(),
        rows: rows.into_iter().map(RecordRow::from).collect(),
    };
    Ok(Json(response).into_response())
}

pub async fn refresh(State(state): State<AppState>) -> StatusCode {
    state.cache.invalidate_all().await;
    info!("cache cleared on request");
    StatusCode::NO_CONTENT
}

fn resolve_range(state: &AppState, query: &DashboardQuery) -> Result<DateRange, AppError> {
    let from = query.from.unwrap_or(state.default_range.from);
    let to = query.to.unwrap_or(state.default_range.to);
    DateRange::new(from, to).ok_or_else(|| AppError::bad_request("'from' must not be after 'to'"))
}

async fn load(state: &AppState, range: DateRange) -> Result<Arc<Dataset>, AppError> {
    let (date_from, date_to) = range.bounds();
    Ok(state.cache.get_or_fetch(&date_from, &date_to).await?)
}
