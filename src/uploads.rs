use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{info, warn};

use crate::settings::Settings;
use crate::{AppError, Result};

/// Форматы, которые умеет открывать calamine
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const STAGING_PREFIX: &str = ".incoming-";

/// Расширение файла в нижнем регистре, если это таблица
pub fn spreadsheet_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Проверяет загружаемый файл до разбора, возвращает его расширение
pub fn validate_upload(file_name: &str, size: usize, max_bytes: u64) -> Result<String> {
    if size == 0 {
        return Err(AppError::validation("Файл не выбран"));
    }
    let ext = spreadsheet_extension(file_name).ok_or_else(|| {
        let list = SUPPORTED_EXTENSIONS
            .iter()
            .map(|e| format!(".{e}"))
            .collect::<Vec<_>>()
            .join(", ");
        AppError::validation(format!("Только файлы Excel ({list})"))
    })?;
    if size as u64 > max_bytes {
        let mb = max_bytes / (1024 * 1024);
        return Err(AppError::validation(format!(
            "Файл слишком большой (макс. {mb}MB)"
        )));
    }
    Ok(ext)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    Failed(String),
}

/// Результат удаления по каждому файлу
pub type CleanupReport = Vec<(PathBuf, CleanupOutcome)>;

pub fn log_cleanup(report: &CleanupReport) {
    for (path, outcome) in report {
        match outcome {
            CleanupOutcome::Removed => info!("Удалила файл {}", path.display()),
            CleanupOutcome::Failed(e) => {
                warn!("Не удалось удалить файл {}: {e}", path.display())
            }
        }
    }
}

/// Каталог с последним загруженным файлом `<stem>.<ext>`
#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: PathBuf,
    stem: String,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.uploads_dir, &settings.file_stem)
    }
    pub fn dir(&self) -> &Path {
        &self.dir
    }
    /// Создает каталог и подчищает временные файлы прерванных загрузок
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        log_cleanup(&remove_all(self.files_with_prefix(STAGING_PREFIX).await?).await);
        Ok(())
    }

    /// Все сохраненные файлы вида `<stem>.*`
    pub async fn stored_files(&self) -> Result<Vec<PathBuf>> {
        self.files_with_prefix(&format!("{}.", self.stem)).await
    }

    pub async fn has_file(&self) -> Result<bool> {
        Ok(!self.stored_files().await?.is_empty())
    }

    /// Пишет файл во временное имя рядом с постоянным.
    /// Пока файл не перенесен через `commit`, он удаляется вместе с `TempPath`.
    pub async fn stage(&self, ext: &str, data: &[u8]) -> Result<TempPath> {
        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(&format!(".{ext}"))
            .tempfile_in(&self.dir)?
            .into_temp_path();
        tokio::fs::write(&staged, data).await?;
        Ok(staged)
    }

    /// Переносит временный файл на постоянное место
    pub fn commit(&self, staged: TempPath, ext: &str) -> Result<PathBuf> {
        let target = self.dir.join(format!("{}.{ext}", self.stem));
        staged.persist(&target).map_err(|e| e.error)?;
        Ok(target)
    }

    /// Удаляет сохраненные файлы, ошибки не прерывают операцию
    pub async fn remove_stored(&self) -> CleanupReport {
        match self.stored_files().await {
            Ok(files) => remove_all(files).await,
            Err(e) => vec![(self.dir.clone(), CleanupOutcome::Failed(e.to_string()))],
        }
    }

    async fn files_with_prefix(&self, prefix: &str) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut result = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(prefix));
            if matches && entry.file_type().await?.is_file() {
                result.push(entry.path())
            }
        }
        result.sort();
        Ok(result)
    }
}

async fn remove_all(files: Vec<PathBuf>) -> CleanupReport {
    let mut report = Vec::with_capacity(files.len());
    for path in files {
        let outcome = match tokio::fs::remove_file(&path).await {
            Ok(()) => CleanupOutcome::Removed,
            Err(e) => CleanupOutcome::Failed(e.to_string()),
        };
        report.push((path, outcome));
    }
    report
}
