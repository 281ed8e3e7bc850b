//! In-memory spreadsheet backend for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{SheetBackend, SheetError};

#[derive(Default)]
pub struct MemorySheets {
    sheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
    failing: AtomicBool,
}

impl MemorySheets {
    pub fn seed(&self, sheet: &str, rows: Vec<Vec<String>>) {
        self.sheets.lock().unwrap().insert(sheet.to_string(), rows);
    }

    pub fn rows(&self, sheet: &str) -> Vec<Vec<String>> {
        self.sheets
            .lock()
            .unwrap()
            .get(sheet)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SheetError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(SheetError::Config("Mock backend failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SheetBackend for MemorySheets {
    async fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SheetError> {
        self.check()?;
        Ok(self.rows(sheet))
    }

    async fn write_row(&self, sheet: &str, row: usize, values: &[String]) -> Result<(), SheetError> {
        self.check()?;
        let mut sheets = self.sheets.lock().unwrap();
        let rows = sheets.entry(sheet.to_string()).or_default();
        if rows.len() < row {
            rows.resize(row, Vec::new());
        }
        rows[row - 1] = values.to_vec();
        Ok(())
    }

    async fn append_row(&self, sheet: &str, values: &[String]) -> Result<(), SheetError> {
        self.check()?;
        self.sheets
            .lock()
            .unwrap()
            .entry(sheet.to_string())
            .or_default()
            .push(values.to_vec());
        Ok(())
    }

    async fn delete_row(&self, sheet: &str, row: usize) -> Result<(), SheetError> {
        self.check()?;
        let mut sheets = self.sheets.lock().unwrap();
        let rows = sheets
            .get_mut(sheet)
            .ok_or_else(|| SheetError::NotFound(sheet.to_string()))?;
        if row == 0 || row > rows.len() {
            return Err(SheetError::NotFound(format!("{sheet} row {row}")));
        }
        rows.remove(row - 1);
        Ok(())
    }
}
