mod memory;
mod postgres;
pub use memory::MemoryStorage;
pub use postgres::PgStorage;

use crate::models::{ImportSummary, Product, ProductRecord};
use crate::Result;

/// Хранилище товаров. Все выборки упорядочены по id,
/// то есть в порядке строк загруженного листа.
#[async_trait::async_trait]
pub trait ProductStorage: Send + Sync {
    /// Заменяет все товары одной операцией: либо новая таблица целиком, либо старая
    async fn replace_all(
        &self,
        items: Vec<ProductRecord>,
        import: ImportSummary,
    ) -> Result<Vec<Product>>;
    /// Удаляет все товары и сведения о загрузке, возвращает число удаленных строк
    async fn clear(&self) -> Result<u64>;
    async fn list(&self) -> Result<Vec<Product>>;
    /// Первый по id товар с таким нормализованным штрихкодом
    async fn first_by_barcode(&self, barcode: &str) -> Result<Option<Product>>;
    async fn by_article(&self, article: &str) -> Result<Vec<Product>>;
    async fn last_import(&self) -> Result<Option<ImportSummary>>;
}
