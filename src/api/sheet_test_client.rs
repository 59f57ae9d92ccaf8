//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets.

use crate::api::Sheet;
use crate::Result;
use anyhow::Context;
use chrono::{Days, Local};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

/// The worksheet created for a spreadsheet that has not been seen before.
const SEED_WORKSHEET: &str = "Sheet1";

/// The in-memory content of one spreadsheet.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub(crate) struct TestSheetState {
    /// Worksheet name -> rows (header first).
    pub(crate) sheets: HashMap<String, Vec<Vec<String>>>,
    /// How many times `put` has been called.
    pub(crate) writes: usize,
}

/// Process-wide state keyed by spreadsheet id, so that separate `TestSheet` objects for the same
/// spreadsheet observe each other's writes.
fn states() -> MutexGuard<'static, HashMap<String, TestSheetState>> {
    static STATES: OnceLock<Mutex<HashMap<String, TestSheetState>>> = OnceLock::new();
    STATES
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// An implementation of the `Sheet` trait that does not use Google sheets. A spreadsheet id that
/// has no state yet is seeded with a small sample worksheet.
pub(crate) struct TestSheet {
    spreadsheet_id: String,
}

impl TestSheet {
    pub(crate) fn new(spreadsheet_id: impl Into<String>) -> Self {
        let spreadsheet_id = spreadsheet_id.into();
        states()
            .entry(spreadsheet_id.clone())
            .or_insert_with(seed_state);
        Self { spreadsheet_id }
    }

    pub(crate) fn get_state(&self) -> TestSheetState {
        states()
            .get(&self.spreadsheet_id)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn set_state(&self, state: TestSheetState) {
        states().insert(self.spreadsheet_id.clone(), state);
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn get(&mut self, sheet_name: &str) -> Result<Vec<Vec<String>>> {
        states()
            .get(&self.spreadsheet_id)
            .and_then(|state| state.sheets.get(sheet_name))
            .cloned()
            .with_context(|| format!("Sheet '{sheet_name}' not found"))
    }

    async fn put(&mut self, sheet_name: &str, values: &[Vec<String>]) -> Result<()> {
        let mut states = states();
        let state = states.entry(self.spreadsheet_id.clone()).or_default();
        state.sheets.insert(sheet_name.to_string(), values.to_vec());
        state.writes += 1;
        Ok(())
    }
}

/// Two records dated two days before today, so a sync in test mode has a short window to cover.
fn seed_state() -> TestSheetState {
    let day = (Local::now().date_naive() - Days::new(2))
        .format("%Y-%m-%d")
        .to_string();
    let rows: Vec<Vec<String>> = [
        vec![
            "created_at",
            "remarks",
            "score",
            "time_to_completion",
            "complexity",
            "related_parties",
            "division",
            "word_count",
        ]
        .into_iter()
        .map(String::from)
        .collect::<Vec<String>>(),
        vec![
            format!("{day} 08:15:00"),
            "handled the quarterly filing".to_string(),
            "4".to_string(),
            "3".to_string(),
            "2".to_string(),
            "1".to_string(),
            "Finance".to_string(),
            "4".to_string(),
        ],
        vec![
            format!("{day} 10:40:00"),
            "reviewed two vendor contracts".to_string(),
            "5".to_string(),
            "2".to_string(),
            "3".to_string(),
            "2".to_string(),
            "Legal".to_string(),
            "4".to_string(),
        ],
    ]
    .into();
    TestSheetState {
        sheets: HashMap::from([(SEED_WORKSHEET.to_string(), rows)]),
        writes: 0,
    }
}
