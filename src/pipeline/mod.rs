//! The incremental sync: read the sheet, find the watermark, poll PROMS for every day since, clean
//! up the records and append the ones the sheet does not have yet.

mod differ;
mod poller;
mod reader;
mod transform;

use crate::api::{Proms, Sheet};
use crate::model::{DateRange, Divisions};
use crate::Result;
use anyhow::bail;
use chrono::NaiveDate;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use differ::Diff;
pub use poller::DayReport;
pub(crate) use reader::{read_sheet, watermark};

pub(crate) const CREATED_AT: &str = "created_at";
pub(crate) const DIVISION: &str = "division";
pub(crate) const TIME_TO_COMPLETION: &str = "time_to_completion";
pub(crate) const COMPLEXITY: &str = "complexity";
pub(crate) const RELATED_PARTIES: &str = "related_parties";
pub(crate) const REMARKS: &str = "remarks";
pub(crate) const SCORE: &str = "score";
pub(crate) const WORD_COUNT: &str = "word_count";

/// The inputs of one sync run other than the two clients.
#[derive(Debug, Clone)]
pub(crate) struct SyncOptions<'a> {
    pub(crate) worksheet: &'a str,
    pub(crate) divisions: &'a Divisions,
    pub(crate) delay: Duration,
    pub(crate) today: NaiveDate,
    /// Overrides the watermark as the first day to request.
    pub(crate) from: Option<NaiveDate>,
    pub(crate) dry_run: bool,
}

/// What a sync run did.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// The latest `created_at` date found in the sheet.
    pub watermark: Option<NaiveDate>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<DayReport>,
    /// Records returned by PROMS before noise filtering.
    pub fetched: usize,
    /// Records left after noise filtering.
    pub transformed: usize,
    /// Records that are not in the sheet yet.
    pub available_updates: usize,
    pub rows_before: usize,
    /// The row count read back after writing, `None` when nothing was written.
    pub rows_after: Option<usize>,
    pub written: bool,
    pub dry_run: bool,
}

impl SyncReport {
    /// How many rows the write added according to the read back.
    pub fn rows_added(&self) -> usize {
        self.rows_after
            .map(|after| after.saturating_sub(self.rows_before))
            .unwrap_or_default()
    }
}

/// Runs one incremental sync against `sheet` and `proms`.
pub(crate) async fn run(
    sheet: &mut (dyn Sheet + Send),
    proms: &mut (dyn Proms + Send),
    options: &SyncOptions<'_>,
) -> Result<SyncReport> {
    let existing = reader::read_sheet(sheet, options.worksheet).await?;
    let watermark = reader::watermark(&existing)?;
    let start = match (options.from, watermark) {
        (Some(from), _) => from,
        (None, Some(watermark)) => watermark,
        (None, None) => bail!(
            "Worksheet '{}' has no rows to take the last update date from, pass --from to choose \
            the first day to request",
            options.worksheet
        ),
    };
    match watermark {
        Some(watermark) => info!("Last update date: {watermark}"),
        None => info!("The sheet has no rows yet"),
    }
    let range = DateRange::new(start, options.today);
    info!("Requesting data from {} to {}", range.start(), range.end());
    if range.is_empty() {
        debug!("{start} is after {}, there is nothing to request", options.today);
    }

    let polled = poller::poll(proms, range, options.divisions, options.delay).await?;
    for (date, division, reason) in polled.rejections() {
        warn!("PROMS returned no data for {} on {date}: {reason}", division.name());
    }
    let combined = polled.combine();
    let fetched = combined.len();
    let transformed = transform::transform(combined)?;

    // Read again so that rows added while polling are not duplicated.
    let current = reader::read_sheet(sheet, options.worksheet).await?;
    let diff = Diff::compute(current, transformed.clone())?;
    let available_updates = diff.additions().len();
    info!("Available updates: {available_updates}");

    let mut report = SyncReport {
        watermark,
        start: range.start(),
        end: range.end(),
        days: polled.days,
        fetched,
        transformed: transformed.len(),
        available_updates,
        rows_before: diff.current().len(),
        rows_after: None,
        written: false,
        dry_run: options.dry_run,
    };

    if diff.additions().is_empty() {
        info!("Google sheet is up to date!");
        return Ok(report);
    }

    info!("Number of rows before update: {}", report.rows_before);
    if options.dry_run {
        info!("Dry run, the sheet was not written");
        return Ok(report);
    }

    let combined = diff.combined();
    sheet
        .put(options.worksheet, &combined.to_sheet_values())
        .await?;
    report.written = true;

    let after = reader::read_sheet(sheet, options.worksheet).await?;
    report.rows_after = Some(after.len());
    info!("Number of rows after update: {}", after.len());
    info!("Updated {} rows", report.rows_added());
    Ok(report)
}
