//! The two external collaborators of a sync: the Google sheet and the PROMS API. Each sits behind
//! a small trait with a production and an in-memory implementation, chosen by `Mode`.

mod files;
mod oauth;
mod proms;
mod proms_test_client;
mod sheet;
mod sheet_test_client;

use crate::model::Division;
use crate::{Config, Result};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use oauth::TokenProvider;
pub(crate) use proms_test_client::TestProms;
pub(crate) use sheet_test_client::{TestSheet, TestSheetState};

/// OAuth scopes required for reading and writing the sheet values.
const OAUTH_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// When this environment variable is set and non-empty, the in-memory clients are used.
const TEST_MODE_ENV: &str = "PROMS_SYNC_IN_TEST_MODE";

/// Reads and writes whole worksheets as row-major strings.
#[async_trait::async_trait]
pub(crate) trait Sheet {
    /// Gets every row of `sheet_name`, header included.
    async fn get(&mut self, sheet_name: &str) -> Result<Vec<Vec<String>>>;

    /// Replaces the content of `sheet_name` with `values` (header first).
    async fn put(&mut self, sheet_name: &str, values: &[Vec<String>]) -> Result<()>;
}

/// Issues one PROMS request for a date and division and returns the decoded JSON body.
#[async_trait::async_trait]
pub(crate) trait Proms {
    async fn fetch(&mut self, date: NaiveDate, division: &Division) -> Result<Value>;
}

/// Selects the real Google/PROMS clients or the in-memory stand-ins.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Google,
    Test,
}

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

/// Creates the `Sheet` implementation for `mode`. In `Mode::Google` this loads the credential
/// files and refreshes the access token if needed.
pub(crate) async fn sheet(config: &Config, mode: Mode) -> Result<Box<dyn Sheet + Send>> {
    debug!("Creating a sheet client in {mode:?} mode");
    match mode {
        Mode::Google => {
            let token_provider =
                TokenProvider::load(config.client_secret_path(), config.token_path()).await?;
            let sheet = sheet::GoogleSheet::new(config.clone(), token_provider).await?;
            Ok(Box::new(sheet))
        }
        Mode::Test => Ok(Box::new(TestSheet::new(config.spreadsheet_id()))),
    }
}

/// Creates the `Proms` implementation for `mode`.
pub(crate) fn proms(config: &Config, mode: Mode) -> Result<Box<dyn Proms + Send>> {
    debug!("Creating a PROMS client in {mode:?} mode");
    match mode {
        Mode::Google => Ok(Box::new(proms::HttpProms::new(config.proms().clone())?)),
        Mode::Test => Ok(Box::new(TestProms::synthetic())),
    }
}
