use crate::models::{AppState, FileUploadResponse, HealthResponse, MessageResponse};
use crate::AppError;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;

const FILE_FIELD: &str = "file";

pub(super) async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> crate::Result<Json<FileUploadResponse>> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(ToString::to_string).unwrap_or_default();
        let data = field.bytes().await?;
        upload = Some((file_name, data));
    }
    let Some((file_name, data)) = upload else {
        return Err(AppError::validation("Файл не выбран"));
    };
    let products = state.product_service.import(&file_name, data).await?;
    Ok(Json(FileUploadResponse {
        success: true,
        message: format!("Успешно загружено {} товаров", products.len()),
        products,
    }))
}

pub(super) async fn delete_file(State(state): State<AppState>) -> impl IntoResponse {
    match state.product_service.delete().await {
        Ok(report) => {
            let message = if report.files.is_empty() {
                "Файлы не найдены"
            } else {
                "Операция удаления завершена"
            };
            (StatusCode::OK, Json(MessageResponse::ok(message))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub(super) async fn products(State(state): State<AppState>) -> impl IntoResponse {
    match state.product_service.list().await {
        Ok(products) => (StatusCode::OK, Json(products)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub(super) async fn status(State(state): State<AppState>) -> impl IntoResponse {
    match state.product_service.status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
