use std::sync::Arc;

use barcode_catalog::storage::PgStorage;
use barcode_catalog::Settings;
use tracing::info;

#[shuttle_runtime::main]
async fn main(
    #[shuttle_shared_db::Postgres] pool: sqlx::PgPool,
    #[shuttle_runtime::Secrets] secrets: shuttle_runtime::SecretStore,
) -> shuttle_axum::ShuttleAxum {
    let settings = Settings::from_secrets(&secrets);
    info!("Инициализирую базу данных");
    let storage = PgStorage::new(pool);
    storage.migrate().await?;
    info!("База данных готова к использованию");
    let state = barcode_catalog::build_state(Arc::new(storage), settings).await?;
    Ok(barcode_catalog::app(state).into())
}
