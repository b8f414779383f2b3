use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::ProductStorage;
use crate::models::{ImportSummary, Product, ProductRecord};
use crate::Result;

/// Товары в памяти. Читатели берут готовый снимок без блокировок,
/// замена собирает новый снимок с индексами и подменяет его целиком.
pub struct MemoryStorage {
    snapshot: ArcSwap<Snapshot>,
    next_id: AtomicI64,
}

#[derive(Default)]
struct Snapshot {
    products: Vec<Product>,
    /// штрихкод -> позиция первого товара с ним
    by_barcode: HashMap<String, usize>,
    by_article: HashMap<String, Vec<usize>>,
    last_import: Option<ImportSummary>,
}
impl Snapshot {
    fn build(products: Vec<Product>, last_import: Option<ImportSummary>) -> Self {
        let mut by_barcode = HashMap::new();
        let mut by_article: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, product) in products.iter().enumerate() {
            by_barcode.entry(product.barcode.clone()).or_insert(idx);
            by_article
                .entry(product.article.clone())
                .or_default()
                .push(idx);
        }
        Self {
            products,
            by_barcode,
            by_article,
            last_import,
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}
impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait::async_trait]
impl ProductStorage for MemoryStorage {
    async fn replace_all(
        &self,
        items: Vec<ProductRecord>,
        import: ImportSummary,
    ) -> Result<Vec<Product>> {
        let first = self.next_id.fetch_add(items.len() as i64, Ordering::SeqCst);
        let products = items
            .into_iter()
            .zip(first..)
            .map(|(item, id)| item.into_product(id))
            .collect::<Vec<_>>();
        let snapshot = Snapshot::build(products.clone(), Some(import));
        self.snapshot.store(Arc::new(snapshot));
        Ok(products)
    }

    async fn clear(&self) -> Result<u64> {
        let previous = self.snapshot.swap(Arc::new(Snapshot::default()));
        Ok(previous.products.len() as u64)
    }

    async fn list(&self) -> Result<Vec<Product>> {
        Ok(self.snapshot.load().products.clone())
    }

    async fn first_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        let snapshot = self.snapshot.load();
        Ok(snapshot
            .by_barcode
            .get(barcode)
            .map(|&idx| snapshot.products[idx].clone()))
    }

    async fn by_article(&self, article: &str) -> Result<Vec<Product>> {
        let snapshot = self.snapshot.load();
        Ok(snapshot
            .by_article
            .get(article)
            .map(|ids| ids.iter().map(|&idx| snapshot.products[idx].clone()).collect())
            .unwrap_or_default())
    }

    async fn last_import(&self) -> Result<Option<ImportSummary>> {
        Ok(self.snapshot.load().last_import.clone())
    }
}
