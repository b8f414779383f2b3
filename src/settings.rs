use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_UPLOADS_DIR: &str = "wwwroot/uploads";
const DEFAULT_FILE_STEM: &str = "products";
const DEFAULT_MAX_UPLOAD_MB: u64 = 50;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Настройки сервиса
#[derive(Clone, Debug)]
pub struct Settings {
    /// Каталог, где лежит последний загруженный файл
    pub uploads_dir: PathBuf,
    /// Имя сохраненного файла без расширения
    pub file_stem: String,
    pub max_upload_bytes: u64,
    pub request_timeout: Duration,
    /// Строка подключения к Postgres для локального запуска,
    /// без нее товары хранятся в памяти. Shuttle выдает базу сам.
    pub database_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from(DEFAULT_UPLOADS_DIR),
            file_stem: DEFAULT_FILE_STEM.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            database_url: None,
        }
    }
}

impl Settings {
    pub fn from_secrets(secrets: &shuttle_runtime::SecretStore) -> Self {
        Self::from_lookup(|key| secrets.get(key))
    }
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
    pub fn with_uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.uploads_dir = dir.into();
        self
    }
    /// Лимит тела запроса на маршруте загрузки, вдвое больше допустимого файла
    pub fn body_limit(&self) -> usize {
        (self.max_upload_bytes as usize).saturating_mul(2)
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(dir) = get("UPLOADS_DIR").filter(|d| !d.trim().is_empty()) {
            settings.uploads_dir = PathBuf::from(dir);
        }
        if let Some(mb) = get("MAX_UPLOAD_MB").and_then(|v| v.trim().parse::<u64>().ok()) {
            settings.max_upload_bytes = mb.saturating_mul(1024 * 1024);
        }
        if let Some(secs) = get("REQUEST_TIMEOUT_SECS").and_then(|v| v.trim().parse::<u64>().ok())
        {
            settings.request_timeout = Duration::from_secs(secs);
        }
        settings.database_url = get("DATABASE_URL").filter(|u| !u.trim().is_empty());
        settings
    }
}
