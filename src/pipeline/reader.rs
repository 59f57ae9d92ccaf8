use crate::api::Sheet;
use crate::model::{cell_text, parse_date, Table};
use crate::pipeline::CREATED_AT;
use crate::Result;
use anyhow::Context;
use chrono::NaiveDate;
use tracing::debug;

/// Reads every row of `worksheet` into a `Table`.
pub(crate) async fn read_sheet(sheet: &mut (dyn Sheet + Send), worksheet: &str) -> Result<Table> {
    let values = sheet.get(worksheet).await?;
    let table = Table::from_sheet_values(values)
        .with_context(|| format!("Unable to read the rows of worksheet '{worksheet}'"))?;
    debug!("Read {} rows from {worksheet}", table.len());
    Ok(table)
}

/// The latest `created_at` date in `table`, or `None` when the table has no rows. Every row must
/// carry a parseable `created_at`.
pub(crate) fn watermark(table: &Table) -> Result<Option<NaiveDate>> {
    if table.is_empty() {
        return Ok(None);
    }
    table.require_column(CREATED_AT)?;
    let mut latest: Option<NaiveDate> = None;
    for (ix, row) in table.rows().iter().enumerate() {
        let text = cell_text(row.get(CREATED_AT));
        let date = parse_date(&text)
            .with_context(|| format!("Invalid {CREATED_AT} in data row {}", ix + 1))?;
        latest = latest.max(Some(date));
    }
    Ok(latest)
}
