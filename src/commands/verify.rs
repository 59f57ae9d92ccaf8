use crate::api::{self, Mode};
use crate::commands::Out;
use crate::model::Divisions;
use crate::pipeline;
use crate::{Config, Result};
use chrono::NaiveDate;
use serde::Serialize;

/// What `verify` found in the worksheet.
#[derive(Debug, Clone, Serialize)]
pub struct SheetSummary {
    pub worksheet: String,
    pub columns: Vec<String>,
    pub rows: usize,
    pub watermark: Option<NaiveDate>,
    pub divisions: usize,
}

/// Checks that the configuration can be used: the division list parses, the credentials work and
/// the worksheet can be read. The watermark that the next sync would start from is reported.
pub async fn verify(config: Config, mode: Mode) -> Result<Out<SheetSummary>> {
    let divisions = Divisions::load(&config.divisions_path()).await?;
    let mut sheet = api::sheet(&config, mode).await?;
    let table = pipeline::read_sheet(sheet.as_mut(), config.worksheet()).await?;
    let watermark = pipeline::watermark(&table)?;

    let summary = SheetSummary {
        worksheet: config.worksheet().to_string(),
        columns: table.columns().to_vec(),
        rows: table.len(),
        watermark,
        divisions: divisions.len(),
    };
    let message = match watermark {
        Some(date) => format!(
            "Worksheet '{}' has {} rows, last update date {date}",
            summary.worksheet, summary.rows
        ),
        None => format!(
            "Worksheet '{}' has no rows, the first sync needs --from",
            summary.worksheet
        ),
    };
    Ok(Out::new(message, summary))
}
