mod product;
mod responses;
pub use product::*;
pub use responses::*;

use crate::product_service::ProductService;
use crate::settings::Settings;

/// Общие данные для обработчиков
#[derive(Clone)]
pub struct AppState {
    pub product_service: ProductService,
    pub settings: Settings,
}
impl AppState {
    /// Создать новый экземпляр общих данных
    pub fn new(product_service: ProductService, settings: Settings) -> Self {
        Self {
            product_service,
            settings,
        }
    }
}
