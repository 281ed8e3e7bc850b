//! Best-effort mirroring of rows into an external spreadsheet.
//!
//! Every mirrored worksheet has a header row whose first column is `id`;
//! data rows are matched on that first cell. The relational store stays
//! authoritative: [`Mirror`] logs failures and never returns them.

pub mod google;
pub mod rows;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;

/// Errors that can occur while talking to the spreadsheet backend.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Worksheet not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Row-level access to named worksheets. Row numbers are 1-based, as in the
/// spreadsheet UI.
#[async_trait]
pub trait SheetBackend: Send + Sync {
    async fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SheetError>;

    async fn write_row(&self, sheet: &str, row: usize, values: &[String]) -> Result<(), SheetError>;

    async fn append_row(&self, sheet: &str, values: &[String]) -> Result<(), SheetError>;

    async fn delete_row(&self, sheet: &str, row: usize) -> Result<(), SheetError>;
}

/// An entity that can be written to a worksheet.
pub trait MirrorRow {
    const HEADER: &'static [&'static str];

    fn key(&self) -> i64;

    /// Cells in `HEADER` order; the first is always the key.
    fn cells(&self) -> Vec<String>;
}

fn find_row(rows: &[Vec<String>], key: &str) -> Option<usize> {
    rows.iter()
        .enumerate()
        .skip(1)
        .find(|(_, r)| r.first().map(|c| c.trim()) == Some(key))
        .map(|(i, _)| i + 1)
}

/// Ensures the header row, then overwrites the row keyed by `key_id` or
/// appends a new one.
pub async fn upsert(
    backend: &dyn SheetBackend,
    sheet: &str,
    header: &[&str],
    row: &[String],
    key_id: i64,
) -> Result<(), SheetError> {
    let mut rows = backend.read_rows(sheet).await?;

    let header_ok = rows
        .first()
        .map(|first| first.iter().map(String::as_str).eq(header.iter().copied()))
        .unwrap_or(false);
    if !header_ok {
        let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
        backend.write_row(sheet, 1, &header).await?;
        if rows.is_empty() {
            rows.push(header);
        } else {
            rows[0] = header;
        }
    }

    match find_row(&rows, &key_id.to_string()) {
        Some(n) => backend.write_row(sheet, n, row).await,
        None => backend.append_row(sheet, row).await,
    }
}

/// Removes the row keyed by `key_id`. Returns whether a row was removed.
pub async fn delete_by_id(
    backend: &dyn SheetBackend,
    sheet: &str,
    key_id: i64,
) -> Result<bool, SheetError> {
    let rows = backend.read_rows(sheet).await?;
    match find_row(&rows, &key_id.to_string()) {
        Some(n) => {
            backend.delete_row(sheet, n).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Advisory mirror shared by all handlers. Disabled when no credentials are
/// configured.
#[derive(Clone, Default)]
pub struct Mirror {
    backend: Option<Arc<dyn SheetBackend>>,
}

impl Mirror {
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn new(backend: Arc<dyn SheetBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let (Some(json), Some(sheet_id)) = (
            config.google_service_account_json.as_deref(),
            config.google_sheet_id.as_deref(),
        ) else {
            debug!("Spreadsheet mirror disabled: no credentials configured");
            return Self::disabled();
        };

        match google::GoogleSheets::from_service_account_json(json, sheet_id) {
            Ok(backend) => Self::new(Arc::new(backend)),
            Err(e) => {
                warn!(error = %e, "Spreadsheet mirror disabled: bad service account");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn upsert<T: MirrorRow>(&self, sheet: &str, row: &T) {
        let Some(backend) = &self.backend else {
            return;
        };
        if let Err(e) = upsert(backend.as_ref(), sheet, T::HEADER, &row.cells(), row.key()).await {
            warn!(error = %e, sheet, key = row.key(), "Spreadsheet upsert failed");
        }
    }

    pub async fn delete(&self, sheet: &str, key_id: i64) {
        let Some(backend) = &self.backend else {
            return;
        };
        if let Err(e) = delete_by_id(backend.as_ref(), sheet, key_id).await {
            warn!(error = %e, sheet, key = key_id, "Spreadsheet delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemorySheets;
    use super::*;

    const HEADER: &[&str] = &["id", "name"];

    fn row(id: i64, name: &str) -> Vec<String> {
        vec![id.to_string(), name.to_string()]
    }

    #[actix_web::test]
    async fn upsert_twice_leaves_one_row() {
        let sheets = MemorySheets::default();
        upsert(&sheets, "tasks", HEADER, &row(5, "a"), 5).await.unwrap();
        upsert(&sheets, "tasks", HEADER, &row(5, "b"), 5).await.unwrap();

        assert_eq!(
            sheets.rows("tasks"),
            vec![vec!["id".to_string(), "name".to_string()], row(5, "b")]
        );
    }

    #[actix_web::test]
    async fn upsert_then_delete_leaves_none() {
        let sheets = MemorySheets::default();
        upsert(&sheets, "tasks", HEADER, &row(1, "a"), 1).await.unwrap();
        upsert(&sheets, "tasks", HEADER, &row(2, "b"), 2).await.unwrap();
        assert!(delete_by_id(&sheets, "tasks", 1).await.unwrap());
        assert!(!delete_by_id(&sheets, "tasks", 1).await.unwrap());

        assert_eq!(sheets.rows("tasks")[1..], [row(2, "b")]);
    }

    #[actix_web::test]
    async fn wrong_header_is_replaced() {
        let sheets = MemorySheets::default();
        sheets.seed(
            "tasks",
            vec![vec!["ID".into(), "old".into(), "extra".into()], row(3, "c")],
        );
        upsert(&sheets, "tasks", HEADER, &row(3, "d"), 3).await.unwrap();

        let rows = sheets.rows("tasks");
        assert_eq!(rows[0], vec!["id".to_string(), "name".to_string()]);
        assert_eq!(rows[1], row(3, "d"));
        assert_eq!(rows.len(), 2);
    }

    #[actix_web::test]
    async fn key_match_is_on_first_cell_only() {
        let sheets = MemorySheets::default();
        sheets.seed(
            "tasks",
            vec![
                vec!["id".into(), "name".into()],
                vec!["12".into(), "1".into()],
            ],
        );
        upsert(&sheets, "tasks", HEADER, &row(1, "x"), 1).await.unwrap();
        assert_eq!(sheets.rows("tasks").len(), 3);
    }

    struct Named(i64);

    impl MirrorRow for Named {
        const HEADER: &'static [&'static str] = HEADER;

        fn key(&self) -> i64 {
            self.0
        }

        fn cells(&self) -> Vec<String> {
            row(self.0, "named")
        }
    }

    #[actix_web::test]
    async fn mirror_swallows_backend_failures() {
        let sheets = Arc::new(MemorySheets::default());
        sheets.set_failing(true);
        let mirror = Mirror::new(sheets.clone());

        mirror.upsert("tasks", &Named(1)).await;
        mirror.delete("tasks", 1).await;
        assert!(sheets.rows("tasks").is_empty());

        sheets.set_failing(false);
        mirror.upsert("tasks", &Named(1)).await;
        assert_eq!(sheets.rows("tasks").len(), 2);
    }

    #[actix_web::test]
    async fn disabled_mirror_is_a_no_op() {
        let mirror = Mirror::disabled();
        assert!(!mirror.is_enabled());
        mirror.upsert("tasks", &Named(1)).await;
        mirror.delete("tasks", 1).await;
    }
}
