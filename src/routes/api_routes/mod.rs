use crate::models::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;

mod products;
mod search;

pub fn init(state: AppState) -> Router {
    let body_limit = state.settings.body_limit();
    Router::new()
        .route(
            "/upload",
            post(products::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/delete", delete(products::delete_file))
        .route("/products", get(products::products))
        .route("/status", get(products::status))
        .route("/health", get(products::health))
        .route("/search", get(search::by_barcode))
        .route("/search-sap", get(search::by_article))
        .with_state(state)
}
