mod error;
use std::sync::Arc;

pub use error::{AppError, Result};
use sqlx::postgres::PgPoolOptions;
use storage::{MemoryStorage, PgStorage, ProductStorage};
pub mod models;
pub mod parser;
mod product_service;
mod routes;
pub mod settings;
pub mod storage;
pub mod uploads;

pub use product_service::{DeleteReport, ProductService};
pub use settings::Settings;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Собирает общие данные обработчиков поверх выбранного хранилища
pub async fn build_state(
    storage: Arc<dyn ProductStorage>,
    settings: Settings,
) -> Result<models::AppState> {
    let uploads = uploads::UploadStore::from_settings(&settings);
    uploads.ensure_dir().await?;
    let service = ProductService::new(storage, uploads, settings.max_upload_bytes);
    Ok(models::AppState::new(service, settings))
}

pub fn app(state: models::AppState) -> axum::Router {
    routes::init(state)
}

/// Запуск без Shuttle: настройки из переменных окружения,
/// без DATABASE_URL товары хранятся в памяти
pub struct LocalService {
    settings: Settings,
    bind_addr: String,
}
impl LocalService {
    pub fn from_env() -> Self {
        Self {
            settings: Settings::from_env(),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        }
    }
    pub async fn run(self) -> anyhow::Result<()> {
        let storage: Arc<dyn ProductStorage> = match &self.settings.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
                let storage = PgStorage::new(pool);
                storage.migrate().await?;
                tracing::info!("База данных готова к использованию");
                Arc::new(storage)
            }
            None => {
                tracing::warn!("DATABASE_URL не задан, товары хранятся в памяти");
                Arc::new(MemoryStorage::new())
            }
        };
        let state = build_state(storage, self.settings).await?;
        match state.product_service.restore().await {
            Ok(0) => {}
            Ok(count) => tracing::info!("Из сохраненного файла поднято {count} товаров"),
            Err(e) => tracing::error!("Не удалось прочитать сохраненный файл: {e:?}"),
        }
        let listener = tokio::net::TcpListener::bind(&self.bind_addr).await?;
        tracing::info!("Слушаю {}", self.bind_addr);
        axum::serve(listener, app(state)).await?;
        Ok(())
    }
}
