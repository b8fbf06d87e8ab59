use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Row, TabularSink, header_row};
use crate::error::AppError;

const SERVICE: &str = "sheets";

fn io_err(e: impl std::fmt::Display) -> AppError {
    AppError::external(SERVICE, e)
}

/// Characters that cannot appear in a file name are replaced with `_`.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}

fn encode(rows: &[Row]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row).map_err(io_err)?;
    }
    writer.into_inner().map_err(io_err)
}

fn decode(bytes: &[u8]) -> Result<Vec<Row>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    reader
        .records()
        .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()).map_err(io_err))
        .collect()
}

/// Workbook = directory under `root`, sheet = one CSV file inside it.
/// File operations are serialized so a rewrite never interleaves with an
/// append in this process.
pub struct CsvWorkbookSink {
    root: PathBuf,
    lock: Mutex<()>,
}

impl CsvWorkbookSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    fn workbook_dir(&self, workbook: &str) -> PathBuf {
        self.root.join(file_stem(workbook))
    }

    fn sheet_path(&self, workbook: &str, sheet: &str) -> PathBuf {
        self.workbook_dir(workbook).join(format!("{}.csv", file_stem(sheet)))
    }

    /// Writes to a hidden temp file next to `path`, then renames over it.
    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
        let dir = path.parent().ok_or_else(|| io_err("sheet path has no parent"))?;
        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{}.tmp", file_name));
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)
    }
}

#[async_trait]
impl TabularSink for CsvWorkbookSink {
    async fn replace_sheet(&self, workbook: &str, sheet: &str, rows: &[Row]) -> Result<(), AppError> {
        // Encode before touching the file so a bad row leaves the old sheet intact
        let bytes = encode(rows)?;
        let path = self.sheet_path(workbook, sheet);

        let _guard = self.lock.lock().await;
        Self::write_atomic(&path, &bytes).await?;
        debug!(workbook, sheet, rows = rows.len(), "Sheet replaced");
        Ok(())
    }

    async fn append_rows(&self, workbook: &str, sheet: &str, header: &[&str], rows: &[Row]) -> Result<(), AppError> {
        let path = self.sheet_path(workbook, sheet);

        let _guard = self.lock.lock().await;
        let exists = tokio::fs::try_exists(&path).await.map_err(io_err)?;
        if !exists {
            let mut all = Vec::with_capacity(rows.len() + 1);
            all.push(header_row(header));
            all.extend_from_slice(rows);
            Self::write_atomic(&path, &encode(&all)?).await?;
            info!(workbook, sheet, "Created sheet");
            return Ok(());
        }

        let bytes = encode(rows)?;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        file.write_all(&bytes).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        Ok(())
    }

    async fn read_sheet(&self, workbook: &str, sheet: &str) -> Result<Option<Vec<Row>>, AppError> {
        let path = self.sheet_path(workbook, sheet);

        let _guard = self.lock.lock().await;
        match tokio::fs::read(&path).await {
            Ok(bytes) => decode(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn list_sheets(&self, workbook: &str) -> Result<Vec<String>, AppError> {
        let dir = self.workbook_dir(workbook);

        let _guard = self.lock.lock().await;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut sheets = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if let Some(stem) = name.strip_suffix(".csv") {
                sheets.push(stem.to_string());
            }
        }
        sheets.sort();
        Ok(sheets)
    }

    async fn delete_sheet(&self, workbook: &str, sheet: &str) -> Result<(), AppError> {
        let path = self.sheet_path(workbook, sheet);

        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::not_found(format!("sheet '{}' not found in '{}'", sheet, workbook)))
            }
            Err(e) => Err(io_err(e)),
        }
    }
}
