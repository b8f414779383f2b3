use crate::models::{AppState, ArticleSearchResponse};
use crate::AppError;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use serde::Deserialize;

#[derive(Deserialize)]
pub(super) struct BarcodeQuery {
    barcode: Option<String>,
}
#[derive(Deserialize)]
pub(super) struct ArticleQuery {
    sap: Option<String>,
}

/// Непустое значение параметра запроса
fn required(value: Option<String>, message: &str) -> crate::Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::validation(message))
}

pub(super) async fn by_barcode(
    State(state): State<AppState>,
    Query(query): Query<BarcodeQuery>,
) -> impl IntoResponse {
    let barcode = match required(query.barcode, "Штрихкод не указан") {
        Ok(b) => b,
        Err(e) => return e.into_response(),
    };
    match state.product_service.search_by_barcode(&barcode).await {
        Ok(r) => (StatusCode::OK, Json(r)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub(super) async fn by_article(
    State(state): State<AppState>,
    Query(query): Query<ArticleQuery>,
) -> impl IntoResponse {
    let sap = match required(query.sap, "SAP артикул не указан") {
        Ok(s) => s,
        Err(e) => return e.into_response(),
    };
    match state.product_service.search_by_article(&sap).await {
        Ok(related_products) => (
            StatusCode::OK,
            Json(ArticleSearchResponse { related_products }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
