//! These structs provide the CLI interface for the proms-sync CLI.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// proms-sync: Incrementally copies PROMS records into a Google sheet.
///
/// The sheet itself is the watermark: the most recent `created_at` date already in the worksheet
/// is the first day that is requested again. Every calendar day from there up to today is polled
/// once per division, the records are cleaned up, and rows whose `created_at` is not yet in the
/// sheet are appended.
///
/// Google OAuth credentials (a client secret and a token with a refresh token) must be
/// provisioned beforehand and handed to the init subcommand.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and write the configuration file.
    ///
    /// The credential files are moved into $PROMS_SYNC_HOME/.secrets and the division list is
    /// copied into $PROMS_SYNC_HOME. Edit $PROMS_SYNC_HOME/config.json afterwards to add request
    /// headers or change the parameter names sent to PROMS.
    Init(InitArgs),
    /// Check that the credentials work and that the worksheet can be read.
    Verify,
    /// Fetch PROMS records since the sheet's latest date and append the new ones.
    Sync(SyncArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where configuration and credentials are held. Defaults to ~/proms-sync
    #[arg(long, env = "PROMS_SYNC_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// Args for the `proms-sync init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL of the destination Google sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet_url: String,

    /// The PROMS endpoint that is POSTed to once per date and division.
    #[arg(long)]
    api_url: String,

    /// The downloaded OAuth client credentials ("installed" application JSON).
    #[arg(long)]
    client_secret: PathBuf,

    /// The pre-provisioned OAuth token JSON holding a refresh token.
    #[arg(long)]
    token: PathBuf,

    /// CSV file listing the divisions with the columns `id` and `nama_divisi`.
    #[arg(long)]
    divisions: PathBuf,

    /// The worksheet (tab) holding the records. Defaults to Sheet1.
    #[arg(long)]
    worksheet: Option<String>,
}

impl InitArgs {
    pub fn new(
        sheet_url: impl Into<String>,
        api_url: impl Into<String>,
        client_secret: impl Into<PathBuf>,
        token: impl Into<PathBuf>,
        divisions: impl Into<PathBuf>,
        worksheet: Option<String>,
    ) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            api_url: api_url.into(),
            client_secret: client_secret.into(),
            token: token.into(),
            divisions: divisions.into(),
            worksheet,
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn client_secret(&self) -> &Path {
        &self.client_secret
    }

    pub fn token(&self) -> &Path {
        &self.token
    }

    pub fn divisions(&self) -> &Path {
        &self.divisions
    }

    pub fn worksheet(&self) -> Option<&str> {
        self.worksheet.as_deref()
    }
}

/// Args for the `proms-sync sync` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct SyncArgs {
    /// Do everything except writing to the sheet.
    #[arg(long)]
    dry_run: bool,

    /// Start from this date (YYYY-MM-DD) instead of the sheet's latest created_at. Required when
    /// the worksheet has no rows yet.
    #[arg(long)]
    from: Option<NaiveDate>,
}

impl SyncArgs {
    pub fn new(dry_run: bool, from: Option<NaiveDate>) -> Self {
        Self { dry_run, from }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn from(&self) -> Option<NaiveDate> {
        self.from
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("proms-sync"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or PROMS_SYNC_HOME instead of relying on the default \
                home directory.",
            );
            PathBuf::from("proms-sync")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
