use std::{error::Error, fmt::Display};

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::Serialize;

use crate::models::MessageResponse;

#[derive(Debug, Serialize)]
pub enum AppError {
    /// Некорректный запрос: нет файла, не тот формат, пустой параметр
    Validation(String),
    /// Файл не удалось разобрать как таблицу товаров
    Parse(String),
    DbError(String),
    IoError(String),
    Internal(String),
}

pub type Result<T> = core::result::Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Parse(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(m) => write!(f, "{m}"),
            Self::Parse(m) => write!(f, "Ошибка чтения Excel файла: {m}"),
            Self::DbError(m) => write!(f, "database error: {m}"),
            Self::IoError(m) => write!(f, "io error: {m}"),
            Self::Internal(m) => write!(f, "internal error: {m}"),
        }
    }
}
impl Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!("{self:?}");
            String::from("Внутренняя ошибка сервера")
        } else {
            self.to_string()
        };
        (status, Json(MessageResponse::failure(message))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: sqlx::Error) -> Self {
        Self::DbError(value.to_string())
    }
}
impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        Self::DbError(value.to_string())
    }
}
impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value.to_string())
    }
}
impl From<calamine::Error> for AppError {
    fn from(value: calamine::Error) -> Self {
        Self::Parse(value.to_string())
    }
}
impl From<tokio::task::JoinError> for AppError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Internal(value.to_string())
    }
}
impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(value: axum::extract::multipart::MultipartError) -> Self {
        Self::Validation(value.body_text())
    }
}
impl From<AppError> for shuttle_runtime::Error {
    fn from(value: AppError) -> Self {
        match value {
            AppError::DbError(e) => shuttle_runtime::Error::Database(e),
            _ => shuttle_runtime::Error::Custom(value.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let err = AppError::validation("Файл не выбран");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Файл не выбран");
        assert_eq!(AppError::parse("x").status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn infrastructure_errors_are_server_errors() {
        let err: AppError = std::io::Error::other("disk full").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(err, AppError::IoError(_)));
    }
}
