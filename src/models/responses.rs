use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ImportSummary, Product};

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadResponse {
    pub success: bool,
    pub message: String,
    pub products: Vec<Product>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}
impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Ответ на поиск по штрихкоду: артикул SAP и все его фасовки
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub sap: String,
    pub related_products: Vec<Product>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSearchResponse {
    pub related_products: Vec<Product>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub has_file: bool,
    pub last_import: Option<ImportSummary>,
}

#[derive(Serialize, Debug, Clone)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}
impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "Healthy",
            timestamp: Utc::now(),
        }
    }
}
