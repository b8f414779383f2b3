use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::models::{ImportSummary, Product, SearchResponse, StatusResponse};
use crate::parser;
use crate::storage::ProductStorage;
use crate::uploads::{log_cleanup, validate_upload, CleanupReport, UploadStore};
use crate::Result;

/// Итог удаления загруженных данных
#[derive(Debug)]
pub struct DeleteReport {
    pub files: CleanupReport,
    pub products_removed: u64,
}

#[derive(Clone)]
pub struct ProductService {
    storage: Arc<dyn ProductStorage>,
    uploads: UploadStore,
    max_upload_bytes: u64,
    // загрузка и удаление меняют таблицу целиком, поэтому идут строго по одной
    replace_lock: Arc<Mutex<()>>,
}

impl ProductService {
    pub fn new(storage: Arc<dyn ProductStorage>, uploads: UploadStore, max_upload_bytes: u64) -> Self {
        Self {
            storage,
            uploads,
            max_upload_bytes,
            replace_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Заменяет все товары содержимым загруженной таблицы.
    /// Если файл не разобрался или база не приняла строки,
    /// прежние товары и прежний файл остаются на месте.
    #[instrument(name = "import", skip(self, data), fields(size = data.len()))]
    pub async fn import(&self, file_name: &str, data: Bytes) -> Result<Vec<Product>> {
        let ext = validate_upload(file_name, data.len(), self.max_upload_bytes)?;
        let payload = data.clone();
        let records = tokio::task::spawn_blocking(move || parser::parse_bytes(payload)).await??;

        let _guard = self.replace_lock.lock().await;
        self.uploads.ensure_dir().await?;
        // при ошибке или отмене временный файл удаляется вместе с `staged`
        let staged = self.uploads.stage(&ext, &data).await?;
        let import = ImportSummary::new(file_name, records.len());
        let products = self.storage.replace_all(records, import).await?;
        log_cleanup(&self.uploads.remove_stored().await);
        let target = self.uploads.commit(staged, &ext)?;
        info!(
            "Загружено {} товаров из '{file_name}', файл сохранен в {}",
            products.len(),
            target.display()
        );
        Ok(products)
    }

    /// Поднимает товары из сохраненного файла, если хранилище пустое
    /// (хранилище в памяти после перезапуска). Возвращает число загруженных товаров.
    #[instrument(name = "restore", skip(self))]
    pub async fn restore(&self) -> Result<usize> {
        let _guard = self.replace_lock.lock().await;
        if !self.storage.list().await?.is_empty() {
            return Ok(0);
        }
        let Some(path) = self.uploads.stored_files().await?.into_iter().next() else {
            return Ok(0);
        };
        let source = path.clone();
        let records = tokio::task::spawn_blocking(move || parser::parse_file(source)).await??;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let import = ImportSummary::new(file_name, records.len());
        let products = self.storage.replace_all(records, import).await?;
        info!("Восстановлено {} товаров из {}", products.len(), path.display());
        Ok(products.len())
    }

    /// Очищает таблицу товаров, затем удаляет сохраненные файлы.
    /// Если база не ответила, файл остается на месте.
    #[instrument(name = "delete upload", skip(self))]
    pub async fn delete(&self) -> Result<DeleteReport> {
        let _guard = self.replace_lock.lock().await;
        let products_removed = self.storage.clear().await?;
        info!("Удалила {products_removed} товаров");
        let files = self.uploads.remove_stored().await;
        log_cleanup(&files);
        Ok(DeleteReport {
            files,
            products_removed,
        })
    }

    pub async fn list(&self) -> Result<Vec<Product>> {
        self.storage.list().await
    }

    /// Штрихкод -> артикул SAP -> все товары с этим артикулом.
    /// Неизвестный штрихкод дает пустой ответ.
    pub async fn search_by_barcode(&self, raw: &str) -> Result<SearchResponse> {
        let barcode = parser::normalize_barcode(raw);
        if barcode.is_empty() {
            return Ok(SearchResponse::default());
        }
        let Some(found) = self.storage.first_by_barcode(&barcode).await? else {
            return Ok(SearchResponse::default());
        };
        let related_products = self.storage.by_article(&found.article).await?;
        Ok(SearchResponse {
            sap: found.article,
            related_products,
        })
    }

    pub async fn search_by_article(&self, article: &str) -> Result<Vec<Product>> {
        self.storage.by_article(article).await
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        Ok(StatusResponse {
            has_file: self.uploads.has_file().await?,
            last_import: self.storage.last_import().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::ProductRecord;
    use crate::storage::MemoryStorage;
    use crate::AppError;

    /// Хранилище, которое всегда падает на записи
    struct BrokenStorage(MemoryStorage);

    #[async_trait::async_trait]
    impl ProductStorage for BrokenStorage {
        async fn replace_all(
            &self,
            _items: Vec<ProductRecord>,
            _import: ImportSummary,
        ) -> Result<Vec<Product>> {
            Err(AppError::DbError("connection reset".into()))
        }
        async fn clear(&self) -> Result<u64> {
            Err(AppError::DbError("connection reset".into()))
        }
        async fn list(&self) -> Result<Vec<Product>> {
            self.0.list().await
        }
        async fn first_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
            self.0.first_by_barcode(barcode).await
        }
        async fn by_article(&self, article: &str) -> Result<Vec<Product>> {
            self.0.by_article(article).await
        }
        async fn last_import(&self) -> Result<Option<ImportSummary>> {
            self.0.last_import().await
        }
    }

    /// Хранилище, которое долго пишет
    struct SlowStorage {
        inner: MemoryStorage,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl ProductStorage for SlowStorage {
        async fn replace_all(
            &self,
            items: Vec<ProductRecord>,
            import: ImportSummary,
        ) -> Result<Vec<Product>> {
            tokio::time::sleep(self.delay).await;
            self.inner.replace_all(items, import).await
        }
        async fn clear(&self) -> Result<u64> {
            self.inner.clear().await
        }
        async fn list(&self) -> Result<Vec<Product>> {
            self.inner.list().await
        }
        async fn first_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
            self.inner.first_by_barcode(barcode).await
        }
        async fn by_article(&self, article: &str) -> Result<Vec<Product>> {
            self.inner.by_article(article).await
        }
        async fn last_import(&self) -> Result<Option<ImportSummary>> {
            self.inner.last_import().await
        }
    }

    fn slow(delay: Duration) -> Arc<dyn ProductStorage> {
        Arc::new(SlowStorage {
            inner: MemoryStorage::new(),
            delay,
        })
    }

    fn dir_names(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect()
    }

    async fn old_rows() -> MemoryStorage {
        let memory = MemoryStorage::new();
        memory
            .replace_all(
                vec![ProductRecord::builder()
                    .article("OLD")
                    .barcode("11111111")
                    .build()
                    .unwrap()],
                ImportSummary::new("old.xlsx", 1),
            )
            .await
            .unwrap();
        memory
    }

    fn workbook(rows: &[(&str, &str)]) -> Bytes {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Артикул SAP").unwrap();
        sheet.write_string(0, 3, "EAN").unwrap();
        for (i, (article, barcode)) in rows.iter().enumerate() {
            let row = i as u32 + 1;
            sheet.write_string(row, 0, *article).unwrap();
            sheet.write_string(row, 3, *barcode).unwrap();
            sheet.write_number(row, 4, 1).unwrap();
        }
        Bytes::from(workbook.save_to_buffer().unwrap())
    }

    fn service(storage: Arc<dyn ProductStorage>, dir: &std::path::Path) -> ProductService {
        ProductService::new(storage, UploadStore::new(dir, "products"), 1024 * 1024)
    }

    #[tokio::test]
    async fn barcode_search_returns_whole_article() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(Arc::new(MemoryStorage::new()), dir.path());
        let data = workbook(&[
            ("A1", "4006381333931"),
            ("B2", "5000000000001"),
            ("A1", " 4006-381333-931 "),
            ("A1", "4006381333948"),
        ]);
        assert_eq!(service.import("list.xlsx", data).await.unwrap().len(), 4);

        let found = service.search_by_barcode("4006 3813-33948").await.unwrap();
        assert_eq!(found.sap, "A1");
        assert_eq!(found.related_products.len(), 3);
        assert!(found.related_products.iter().all(|p| p.article == "A1"));

        let unknown = service.search_by_barcode("0000000000000").await.unwrap();
        assert_eq!(unknown, SearchResponse::default());
        assert_eq!(service.search_by_barcode(" - ").await.unwrap(), SearchResponse::default());
        assert_eq!(service.search_by_article("B2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_file_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("products.xlsx"), b"old").await.unwrap();
        let service = service(Arc::new(BrokenStorage(old_rows().await)), dir.path());

        let err = service
            .import("new.xlsx", workbook(&[("NEW", "22222222")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DbError(_)));
        assert_eq!(service.list().await.unwrap()[0].article, "OLD");
        let files = UploadStore::new(dir.path(), "products").stored_files().await.unwrap();
        assert_eq!(files, vec![dir.path().join("products.xlsx")]);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn restore_reads_stored_file_into_empty_storage() {
        let dir = tempfile::tempdir().unwrap();
        let data = workbook(&[("A1", "12345678"), ("A1", "87654321")]);
        tokio::fs::write(dir.path().join("products.xlsx"), &data).await.unwrap();

        let service = service(Arc::new(MemoryStorage::new()), dir.path());
        assert_eq!(service.restore().await.unwrap(), 2);
        assert_eq!(service.search_by_barcode("87654321").await.unwrap().sap, "A1");
        // повторный вызов ничего не трогает
        assert_eq!(service.restore().await.unwrap(), 0);
        assert_eq!(service.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn restore_without_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(Arc::new(MemoryStorage::new()), dir.path());
        assert_eq!(service.restore().await.unwrap(), 0);
        assert!(service.status().await.unwrap().last_import.is_none());
    }

    #[tokio::test]
    async fn delete_clears_rows_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(Arc::new(MemoryStorage::new()), dir.path());
        service
            .import("a.xlsx", workbook(&[("A1", "12345678")]))
            .await
            .unwrap();
        assert!(service.status().await.unwrap().has_file);

        let report = service.delete().await.unwrap();
        assert_eq!(report.products_removed, 1);
        assert_eq!(report.files.len(), 1);
        let status = service.status().await.unwrap();
        assert!(!status.has_file);
        assert!(status.last_import.is_none());
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_import_leaves_no_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(slow(Duration::from_secs(5)), dir.path());
        for _ in 0..3 {
            let data = workbook(&[("A1", "12345678")]);
            let attempt =
                tokio::time::timeout(Duration::from_millis(300), service.import("a.xlsx", data))
                    .await;
            assert!(attempt.is_err());
        }
        let names = dir_names(dir.path());
        assert!(names.is_empty(), "{names:?}");
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_imports_never_mix() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(slow(Duration::from_millis(200)), dir.path());
        let first = workbook(&[("A", "11111111"), ("A", "11111112")]);
        let second = workbook(&[("B", "22222221"), ("B", "22222222"), ("B", "22222223")]);

        let (a, b) = (service.clone(), service.clone());
        let (a_data, b_data) = (first.clone(), second.clone());
        let (a, b) = tokio::join!(
            tokio::spawn(async move { a.import("a.xlsx", a_data).await }),
            tokio::spawn(async move { b.import("b.xlsx", b_data).await }),
        );
        a.unwrap().unwrap();
        b.unwrap().unwrap();

        let products = service.list().await.unwrap();
        let (article, file_name, rows, data) = if products[0].article == "A" {
            ("A", "a.xlsx", 2, first)
        } else {
            ("B", "b.xlsx", 3, second)
        };
        assert_eq!(products.len(), rows);
        assert!(products.iter().all(|p| p.article == article));
        let last = service.status().await.unwrap().last_import.unwrap();
        assert_eq!(last.file_name, file_name);
        assert_eq!(last.product_count, rows as i64);

        let stored = dir.path().join("products.xlsx");
        assert_eq!(dir_names(dir.path()), vec!["products.xlsx"]);
        assert_eq!(tokio::fs::read(&stored).await.unwrap(), data.to_vec());
    }

    #[tokio::test]
    async fn failed_clear_keeps_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("products.xlsx"), b"old").await.unwrap();
        let service = service(Arc::new(BrokenStorage(old_rows().await)), dir.path());

        let err = service.delete().await.unwrap_err();
        assert!(matches!(err, AppError::DbError(_)));
        assert!(service.status().await.unwrap().has_file);
        assert_eq!(service.list().await.unwrap()[0].article, "OLD");
    }
}
