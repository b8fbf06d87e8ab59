//! Tabular export target for report sheets.

use async_trait::async_trait;

use crate::error::AppError;

pub mod csv_workbook;
#[cfg(test)]
pub mod memory;

pub type Row = Vec<String>;

/// A spreadsheet-like store: named workbooks holding named sheets of rows.
/// Workbooks and sheets are created on first write.
#[async_trait]
pub trait TabularSink: Send + Sync {
    /// Swaps the sheet's content for `rows` in one step. Readers see either
    /// the old rows or the new ones, never an empty sheet in between.
    async fn replace_sheet(&self, workbook: &str, sheet: &str, rows: &[Row]) -> Result<(), AppError>;

    /// Appends `rows`; a sheet that does not exist yet starts with `header`.
    async fn append_rows(&self, workbook: &str, sheet: &str, header: &[&str], rows: &[Row]) -> Result<(), AppError>;

    /// `None` when the sheet does not exist.
    async fn read_sheet(&self, workbook: &str, sheet: &str) -> Result<Option<Vec<Row>>, AppError>;

    async fn list_sheets(&self, workbook: &str) -> Result<Vec<String>, AppError>;

    async fn delete_sheet(&self, workbook: &str, sheet: &str) -> Result<(), AppError>;
}

pub fn header_row(header: &[&str]) -> Row {
    header.iter().map(|h| h.to_string()).collect()
}
