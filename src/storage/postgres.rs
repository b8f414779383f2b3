use sqlx::{PgPool, QueryBuilder};
use tracing::info;

use super::ProductStorage;
use crate::models::{ImportSummary, Product, ProductRecord};
use crate::Result;

// 4 параметра на строку, лимит Postgres 65535 параметров на запрос
const INSERT_CHUNK: usize = 1000;
const PRODUCT_COLUMNS: &str = "id, article, description, barcode, quantity";

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}
impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        info!("Миграции базы данных применены");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProductStorage for PgStorage {
    async fn replace_all(
        &self,
        items: Vec<ProductRecord>,
        import: ImportSummary,
    ) -> Result<Vec<Product>> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM products")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM imports").execute(&mut *tx).await?;
        let mut stored = Vec::with_capacity(items.len());
        for chunk in items.chunks(INSERT_CHUNK) {
            let mut query_builder = QueryBuilder::new(
                "INSERT INTO products(article, description, barcode, quantity) ",
            );
            query_builder.push_values(chunk, |mut b, item| {
                b.push_bind(item.article.clone())
                    .push_bind(item.description.clone())
                    .push_bind(item.barcode.clone())
                    .push_bind(item.quantity);
            });
            query_builder.push(format!(" RETURNING {PRODUCT_COLUMNS}"));
            let rows = query_builder
                .build_query_as::<Product>()
                .fetch_all(&mut *tx)
                .await?;
            stored.extend(rows);
        }
        sqlx::query(
            "INSERT INTO imports(id, file_name, product_count, imported_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(import.id)
        .bind(&import.file_name)
        .bind(import.product_count)
        .bind(import.imported_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        stored.sort_by_key(|p| p.id);
        info!("Удалила {deleted} товаров, добавила {}", stored.len());
        Ok(stored)
    }

    async fn clear(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM products")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM imports").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn list(&self) -> Result<Vec<Product>> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id");
        let result = sqlx::query_as::<_, Product>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(result)
    }

    async fn first_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        let query =
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = $1 ORDER BY id LIMIT 1");
        let result = sqlx::query_as::<_, Product>(&query)
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?;
        Ok(result)
    }

    async fn by_article(&self, article: &str) -> Result<Vec<Product>> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE article = $1 ORDER BY id");
        let result = sqlx::query_as::<_, Product>(&query)
            .bind(article)
            .fetch_all(&self.pool)
            .await?;
        Ok(result)
    }

    async fn last_import(&self) -> Result<Option<ImportSummary>> {
        let query = "SELECT id, file_name, product_count, imported_at FROM imports ORDER BY imported_at DESC LIMIT 1";
        let result = sqlx::query_as::<_, ImportSummary>(query)
            .fetch_optional(&self.pool)
            .await?;
        Ok(result)
    }
}
