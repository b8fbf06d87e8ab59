use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Row, TabularSink, header_row};
use crate::error::AppError;

/// Sink double keeping sheets in memory; can be switched offline to
/// simulate an unreachable spreadsheet service.
#[derive(Default)]
pub struct MemorySink {
    sheets: Mutex<BTreeMap<(String, String), Vec<Row>>>,
    pub offline: AtomicBool,
}

impl MemorySink {
    fn check(&self) -> Result<(), AppError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(AppError::external("sheets", "service unavailable"));
        }
        Ok(())
    }

    pub async fn sheet(&self, workbook: &str, sheet: &str) -> Option<Vec<Row>> {
        self.sheets
            .lock()
            .await
            .get(&(workbook.to_string(), sheet.to_string()))
            .cloned()
    }
}

#[async_trait]
impl TabularSink for MemorySink {
    async fn replace_sheet(&self, workbook: &str, sheet: &str, rows: &[Row]) -> Result<(), AppError> {
        self.check()?;
        self.sheets
            .lock()
            .await
            .insert((workbook.to_string(), sheet.to_string()), rows.to_vec());
        Ok(())
    }

    async fn append_rows(&self, workbook: &str, sheet: &str, header: &[&str], rows: &[Row]) -> Result<(), AppError> {
        self.check()?;
        self.sheets
            .lock()
            .await
            .entry((workbook.to_string(), sheet.to_string()))
            .or_insert_with(|| vec![header_row(header)])
            .extend_from_slice(rows);
        Ok(())
    }

    async fn read_sheet(&self, workbook: &str, sheet: &str) -> Result<Option<Vec<Row>>, AppError> {
        self.check()?;
        Ok(self.sheet(workbook, sheet).await)
    }

    async fn list_sheets(&self, workbook: &str) -> Result<Vec<String>, AppError> {
        self.check()?;
        Ok(self
            .sheets
            .lock()
            .await
            .keys()
            .filter(|(wb, _)| wb == workbook)
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn delete_sheet(&self, workbook: &str, sheet: &str) -> Result<(), AppError> {
        self.check()?;
        self.sheets
            .lock()
            .await
            .remove(&(workbook.to_string(), sheet.to_string()))
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(format!("sheet '{}' not found", sheet)))
    }
}
