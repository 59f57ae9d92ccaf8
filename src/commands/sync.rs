use crate::api::{self, Mode};
use crate::args::SyncArgs;
use crate::commands::Out;
use crate::model::Divisions;
use crate::pipeline::{self, SyncOptions, SyncReport};
use crate::{Config, Result};
use chrono::{Local, NaiveDate};
use tracing::debug;

/// Appends the PROMS records created since the sheet's last update date to the worksheet.
///
/// Every day from the last update date (or `--from`) through today is requested for every
/// division, with the configured delay between requests. Rows whose `created_at` is already in the
/// sheet are skipped and the worksheet is rewritten once with the old rows followed by the new ones.
pub async fn sync(config: Config, mode: Mode, args: &SyncArgs) -> Result<Out<SyncReport>> {
    sync_until(config, mode, args, Local::now().date_naive()).await
}

/// `sync` with an explicit last day to request.
pub(crate) async fn sync_until(
    config: Config,
    mode: Mode,
    args: &SyncArgs,
    today: NaiveDate,
) -> Result<Out<SyncReport>> {
    let divisions = Divisions::load(&config.divisions_path()).await?;
    debug!("Loaded {} divisions", divisions.len());

    let mut sheet = api::sheet(&config, mode).await?;
    let mut proms = api::proms(&config, mode)?;

    let options = SyncOptions {
        worksheet: config.worksheet(),
        divisions: &divisions,
        delay: config.request_delay(),
        today,
        from: args.from(),
        dry_run: args.dry_run(),
    };
    let report = pipeline::run(sheet.as_mut(), proms.as_mut(), &options).await?;

    let message = if report.written {
        format!("Added {} rows to the sheet", report.rows_added())
    } else if report.available_updates == 0 {
        "The sheet is up to date".to_string()
    } else {
        format!(
            "Dry run, {} rows would be added to the sheet",
            report.available_updates
        )
    };
    Ok(Out::new(message, report))
}
