use crate::model::{cell_text, is_null, is_zero, Row, Table};
use crate::pipeline::{
    COMPLEXITY, RELATED_PARTIES, REMARKS, SCORE, TIME_TO_COMPLETION, WORD_COUNT,
};
use crate::Result;
use serde_json::Value;
use tracing::debug;

/// PROMS abbreviations and the column names used in the sheet.
pub(crate) const RENAMES: [(&str, &str); 3] = [
    ("ttc", TIME_TO_COMPLETION),
    ("cxy", COMPLEXITY),
    ("rps", RELATED_PARTIES),
];

/// Mostly empty in PROMS data, so it is not kept.
pub(crate) const TIME_INPUT: &str = "time_input";

/// Columns whose zero value marks a record as noise.
const NON_ZERO: [&str; 4] = [TIME_TO_COMPLETION, COMPLEXITY, RELATED_PARTIES, SCORE];

/// Columns that must not be null.
const NON_NULL: [&str; 2] = [REMARKS, SCORE];

/// Renames the abbreviated columns, drops `time_input`, removes noise rows and adds
/// `word_count`. A table without rows passes through unchanged.
pub(crate) fn transform(mut table: Table) -> Result<Table> {
    if table.is_empty() {
        return Ok(table);
    }
    for (from, to) in RENAMES {
        table.rename_column(from, to)?;
    }
    table.drop_column(TIME_INPUT)?;
    filter_noise(&mut table)?;
    table.set_column(WORD_COUNT, |row| Value::from(word_count(row.get(REMARKS))));
    debug!("{} rows left after transformation", table.len());
    Ok(table)
}

/// Keeps only rows that have non-zero time to completion, complexity, related parties and score
/// as well as non-null remarks and score.
pub(crate) fn filter_noise(table: &mut Table) -> Result<()> {
    for column in NON_ZERO.iter().chain(NON_NULL.iter()) {
        table.require_column(column)?;
    }
    table.retain(is_signal);
    Ok(())
}

fn is_signal(row: &Row) -> bool {
    NON_ZERO.iter().all(|column| !is_zero(row.get(*column)))
        && NON_NULL.iter().all(|column| !is_null(row.get(*column)))
}

/// Number of whitespace-separated tokens in `remarks`.
pub(crate) fn word_count(remarks: Option<&Value>) -> usize {
    cell_text(remarks).split_whitespace().count()
}
