use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Товар из загруженной таблицы
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub article: String,
    pub description: String,
    pub barcode: String,
    pub quantity: i32,
}

/// Строка таблицы, готовая к сохранению
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Builder)]
#[builder(setter(into))]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub article: String,
    #[builder(default)]
    pub description: String,
    pub barcode: String,
    #[builder(default)]
    pub quantity: i32,
}
impl ProductRecord {
    pub fn builder() -> ProductRecordBuilder {
        ProductRecordBuilder::default()
    }
    pub fn into_product(self, id: i64) -> Product {
        Product {
            id,
            article: self.article,
            description: self.description,
            barcode: self.barcode,
            quantity: self.quantity,
        }
    }
}

/// Сведения о последней загрузке
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub id: uuid::Uuid,
    pub file_name: String,
    pub product_count: i64,
    pub imported_at: DateTime<Utc>,
}
impl ImportSummary {
    pub fn new(file_name: impl Into<String>, product_count: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            file_name: file_name.into(),
            product_count: product_count as i64,
            imported_at: Utc::now(),
        }
    }
}
