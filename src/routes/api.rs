// Handlers for the JSON API

use axum::{
    extract::{Json as JsonExtract, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    export,
    models::{FilterOptions, SavedSearch, SearchResultSet, VehicleListing},
    query, AppState,
};

use super::run_search;

// --- Response Wrappers ---

#[derive(Serialize)]
struct SavedCarsResponse {
    ids: Vec<String>,
    listings: Vec<VehicleListing>,
}

// Saved state of one car, returned by the status and toggle endpoints
#[derive(Serialize)]
struct SavedCarStatus {
    id: String,
    saved: bool,
}

#[derive(Serialize)]
struct UserPostcodeResponse {
    postcode: Option<String>,
}

// --- Request Structs ---

#[derive(Deserialize, Debug)]
pub struct SaveSearchRequest {
    // Query string of the search results page, e.g. "postcode=M1+1AE&radius=10&make=Ford"
    query: String,
}

// --- API Handlers ---

pub async fn get_filter_options(
    State(app_state): State<AppState>,
) -> AppResult<Json<FilterOptions>> {
    tracing::info!("[HANDLER] /api/filter-options - Request received.");
    let options = app_state.backend.filter_options().await?;
    Ok(Json(options))
}

pub async fn search_listings(
    State(app_state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<Json<SearchResultSet>> {
    let search_query = query::decode_pairs(&pairs)?;
    tracing::info!("API call: search_listings with query: {:?}", search_query);
    let results = run_search(&app_state, &search_query).await?;
    Ok(Json(results))
}

pub async fn get_latest_search(
    State(app_state): State<AppState>,
) -> AppResult<Json<SearchResultSet>> {
    app_state
        .latest
        .latest()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No search has completed yet".to_string()))
}

pub async fn export_latest_search(
    State(app_state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let latest = app_state
        .latest
        .latest()
        .await
        .ok_or_else(|| AppError::NotFound("No search has completed yet".to_string()))?;

    let csv = export::results_to_csv(&latest)?;
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let disposition = format!("attachment; filename=\"search_results_{}.csv\"", timestamp);
    tracing::info!(rows = latest.count(), "Exporting latest search as CSV");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

pub async fn get_saved_cars(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let ids = app_state.saved.saved_ids().await?;
    let listings = app_state.saved.saved_listings().await?;
    Ok(Json(SavedCarsResponse { ids, listings }))
}

pub async fn get_saved_car_status(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let saved = app_state.saved.is_saved(&id).await?;
    Ok(Json(SavedCarStatus { id, saved }))
}

pub async fn toggle_saved_car(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    snapshot: Option<JsonExtract<VehicleListing>>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("API call: toggle_saved_car for id: {}", id);
    let saved = app_state
        .saved
        .toggle_saved(&id, snapshot.map(|JsonExtract(listing)| listing))
        .await?;
    Ok(Json(SavedCarStatus { id, saved }))
}

pub async fn get_saved_searches(
    State(app_state): State<AppState>,
) -> AppResult<Json<Vec<SavedSearch>>> {
    Ok(Json(app_state.saved.saved_searches().await?))
}

pub async fn save_new_search(
    State(app_state): State<AppState>,
    JsonExtract(request): JsonExtract<SaveSearchRequest>,
) -> AppResult<impl IntoResponse> {
    let search_query = query::decode(request.query.trim_start_matches('?'))?;
    let entry = app_state
        .saved
        .save_search(
            &search_query.criteria,
            search_query.postcode.as_deref(),
            search_query.criteria.radius,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn delete_saved_search(
    State(app_state): State<AppState>,
    Path(index): Path<usize>,
) -> AppResult<StatusCode> {
    if app_state.saved.delete_search(index).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("No saved search at index {}", index)))
    }
}

pub async fn clear_saved_searches(State(app_state): State<AppState>) -> AppResult<StatusCode> {
    tracing::info!("[HANDLER] DELETE /api/saved-searches - Request received.");
    app_state.saved.clear_searches().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_user_postcode(
    State(app_state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let postcode = app_state.saved.user_postcode().await?;
    Ok(Json(UserPostcodeResponse { postcode }))
}
