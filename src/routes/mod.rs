// Route definitions

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    error::AppResult,
    models::{SearchQuery, SearchResultSet},
    search::SearchPipeline,
    AppState,
};

mod api;
mod pages;

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/filter-options", get(api::get_filter_options))
        .route("/search", get(api::search_listings))
        .route("/search/latest", get(api::get_latest_search))
        .route("/search/latest.csv", get(api::export_latest_search))
        .route("/saved-cars", get(api::get_saved_cars))
        .route("/saved-cars/:id", get(api::get_saved_car_status))
        .route("/saved-cars/:id/toggle", post(api::toggle_saved_car))
        .route(
            "/saved-searches",
            get(api::get_saved_searches)
                .post(api::save_new_search)
                .delete(api::clear_saved_searches),
        )
        .route("/saved-searches/:index", delete(api::delete_saved_search))
        .route("/user-postcode", get(api::get_user_postcode));

    Router::new()
        .route("/", get(pages::search_page))
        .route("/search", get(pages::search_page))
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

// One search cycle shared by the page and the JSON API. The result is also
// offered to the latest-results slot, which ignores it if a newer search
// was dispatched in the meantime. Only an accepted result updates the
// remembered postcode.
async fn run_search(app_state: &AppState, query: &SearchQuery) -> AppResult<SearchResultSet> {
    let ticket = app_state.latest.begin();
    let results = SearchPipeline::new(app_state.backend.as_ref())
        .run(query)
        .await?;

    if !app_state.latest.commit(ticket, results.clone()).await {
        tracing::debug!("A newer search was dispatched; not replacing latest results.");
        return Ok(results);
    }

    if let Some(postcode) = &query.postcode {
        if let Err(e) = app_state.saved.set_user_postcode(postcode).await {
            tracing::warn!("Failed to remember last searched postcode: {}", e);
        }
    }
    Ok(results)
}
