//! Configuration file handling for proms-sync.
//!
//! The configuration file is stored at `$PROMS_SYNC_HOME/config.json` and contains the Google
//! Sheet URL, the worksheet name, the PROMS endpoint description, the request delay and the paths
//! of the credential and division files.

use crate::args::InitArgs;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "proms-sync";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";
const DIVISIONS_CSV: &str = "divisions.csv";
const DEFAULT_WORKSHEET: &str = "Sheet1";
const DEFAULT_REQUEST_DELAY_SECS: u64 = 10;
const DEFAULT_DATE_PARAM: &str = "date";
const DEFAULT_DIVISION_PARAM: &str = "division_id";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$PROMS_SYNC_HOME` and from there it loads `$PROMS_SYNC_HOME/config.json`. It
/// provides paths to other items that are either configurable or are expected in a certain
/// location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
}

impl Config {
    /// Creates the data directory, its `.secrets` subdirectory and:
    /// - Moves the pre-provisioned client secret and token files into `.secrets`
    /// - Copies the division list into the data directory
    /// - Writes an initial `config.json` using the URLs from `args` and default settings
    ///
    /// # Errors
    /// - Returns an error if any file operation fails or if one of the URLs is unusable.
    pub async fn create(dir: impl Into<PathBuf>, args: &InitArgs) -> Result<Self> {
        // Validate the inputs before touching the file system
        let spreadsheet_id = extract_spreadsheet_id(args.sheet_url())
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();
        let api_url = Url::parse(args.api_url())
            .with_context(|| format!("Invalid PROMS API URL '{}'", args.api_url()))?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the proms-sync home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        utils::rename(args.client_secret(), secrets.join(CLIENT_SECRET_JSON)).await?;
        let token_destination = secrets.join(TOKEN_JSON);
        utils::rename(args.token(), &token_destination).await?;
        utils::restrict_permissions(&token_destination)?;
        utils::copy(args.divisions(), root.join(DIVISIONS_CSV)).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile::new(
            args.sheet_url(),
            args.worksheet().unwrap_or(DEFAULT_WORKSHEET),
            PromsConfig::new(api_url),
        );
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            spreadsheet_id,
        })
    }

    /// This will
    /// - validate that the home directory exists and that the config file exists
    /// - load the config file
    /// - validate that the secrets directory exists
    /// - return the loaded configuration object
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The proms-sync home directory is missing")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        let config = Self {
            root: root.clone(),
            secrets: root.join(SECRETS),
            config_path,
            config_file,
            spreadsheet_id,
        };
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sheet_url(&self) -> &str {
        &self.config_file.sheet_url
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// The name of the worksheet (tab) that holds the synchronized records.
    pub fn worksheet(&self) -> &str {
        &self.config_file.worksheet
    }

    pub fn proms(&self) -> &PromsConfig {
        &self.config_file.proms
    }

    /// The fixed pause between two consecutive PROMS requests.
    pub fn request_delay(&self) -> Duration {
        Duration::from_secs(self.config_file.request_delay_secs)
    }

    pub fn divisions_path(&self) -> PathBuf {
        self.resolve_path(self.config_file.divisions_path())
    }

    /// Returns the stored `client_secret_path` if it is absolute, otherwise resolves the relative path.
    pub fn client_secret_path(&self) -> PathBuf {
        self.resolve_path(self.config_file.client_secret_path())
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the relative path.
    pub fn token_path(&self) -> PathBuf {
        self.resolve_path(self.config_file.token_path())
    }

    /// Checks if `p` is relative, and if so, resolves it. Returns it unchanged if it is absolute.
    fn resolve_path(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }

    #[cfg(test)]
    pub(crate) fn set_request_delay_secs(&mut self, secs: u64) {
        self.config_file.request_delay_secs = secs;
    }
}

/// How the PROMS request parameters are encoded in the POST body.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestEncoding {
    /// `application/x-www-form-urlencoded`
    #[default]
    Form,
    /// `application/json`
    Json,
}

serde_plain::derive_display_from_serialize!(RequestEncoding);
serde_plain::derive_fromstr_from_deserialize!(RequestEncoding);

/// Describes how to call the PROMS endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct PromsConfig {
    /// The endpoint that receives one POST per date and division.
    url: Url,

    /// Extra headers sent with every request, e.g. an API key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,

    /// Name of the parameter carrying the date as `YYYY-MM-DD`.
    #[serde(default = "default_date_param")]
    date_param: String,

    /// Name of the parameter carrying the division id.
    #[serde(default = "default_division_param")]
    division_param: String,

    #[serde(default)]
    encoding: RequestEncoding,
}

impl PromsConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: BTreeMap::new(),
            date_param: default_date_param(),
            division_param: default_division_param(),
            encoding: RequestEncoding::default(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn date_param(&self) -> &str {
        &self.date_param
    }

    pub fn division_param(&self) -> &str {
        &self.division_param
    }

    pub fn encoding(&self) -> RequestEncoding {
        self.encoding
    }
}

fn default_date_param() -> String {
    DEFAULT_DATE_PARAM.to_string()
}

fn default_division_param() -> String {
    DEFAULT_DIVISION_PARAM.to_string()
}

fn default_worksheet() -> String {
    DEFAULT_WORKSHEET.to_string()
}

fn default_request_delay_secs() -> u64 {
    DEFAULT_REQUEST_DELAY_SECS
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "proms-sync",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "worksheet": "Sheet1",
///   "proms": {
///     "url": "https://proms.example.com/api/report",
///     "headers": { "x-api-key": "secret" },
///     "date_param": "date",
///     "division_param": "division_id",
///     "encoding": "form"
///   },
///   "request_delay_secs": 10,
///   "divisions_path": "divisions.csv",
///   "client_secret_path": ".secrets/client_secret.json",
///   "token_path": ".secrets/token.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "proms-sync"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL to the destination Google Sheet
    sheet_url: String,

    /// Name of the worksheet that holds the records
    #[serde(default = "default_worksheet")]
    worksheet: String,

    /// How to reach the PROMS API
    proms: PromsConfig,

    /// Seconds to wait between two PROMS requests
    #[serde(default = "default_request_delay_secs")]
    request_delay_secs: u64,

    /// Path to the division CSV (optional, relative to the home directory or absolute)
    /// Defaults to $PROMS_SYNC_HOME/divisions.csv if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    divisions_path: Option<PathBuf>,

    /// Path to the OAuth 2.0 client credentials file (optional, relative or absolute)
    /// Defaults to $PROMS_SYNC_HOME/.secrets/client_secret.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Path to the OAuth token file (optional, relative or absolute)
    /// Defaults to $PROMS_SYNC_HOME/.secrets/token.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

impl ConfigFile {
    fn new(sheet_url: impl Into<String>, worksheet: impl Into<String>, proms: PromsConfig) -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: sheet_url.into(),
            worksheet: worksheet.into(),
            proms,
            request_delay_secs: DEFAULT_REQUEST_DELAY_SECS,
            divisions_path: None,
            client_secret_path: None,
            token_path: None,
        }
    }

    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .with_context(|| format!("Failed to load config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    fn divisions_path(&self) -> PathBuf {
        self.divisions_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DIVISIONS_CSV))
    }

    fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL
///
/// # Arguments
/// * `url` - The Google Sheets URL (e.g., "https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...")
///
/// # Returns
/// The spreadsheet ID or an error if the URL format is invalid.
fn extract_spreadsheet_id(url: &str) -> Result<&str> {
    // URL format: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...
    // or: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID?foo=bar
    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split(['?', '#'])
                .next()
                .unwrap_or(id_part);
            if id.is_empty() {
                break;
            }
            return Ok(id);
        }
    }
    Err(anyhow::anyhow!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn init_args(dir: &Path, sheet_url: &str) -> InitArgs {
        let secret = dir.join("secret.json");
        let token = dir.join("token.json");
        let divisions = dir.join("div.csv");
        utils::write(&secret, "{}").await.unwrap();
        utils::write(&token, "{}").await.unwrap();
        utils::write(&divisions, "id,nama_divisi\n1,Finance\n")
            .await
            .unwrap();
        InitArgs::new(
            sheet_url,
            "https://proms.example.com/api/report",
            secret,
            token,
            divisions,
            None,
        )
    }

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("proms_home");
        let sheet_url = "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";
        let args = init_args(dir.path(), sheet_url).await;

        let config = Config::create(&home_dir, &args).await.unwrap();

        assert_eq!(sheet_url, config.sheet_url());
        assert_eq!(
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
            config.spreadsheet_id()
        );
        assert_eq!("Sheet1", config.worksheet());
        assert_eq!(Duration::from_secs(10), config.request_delay());
        assert_eq!("{}", utils::read(&config.client_secret_path()).await.unwrap());
        assert!(config.token_path().is_file());
        assert!(config.divisions_path().is_file());
        // The division file is copied, not moved.
        assert!(args.divisions().is_file());
        assert!(config.secrets().is_dir());
    }

    #[tokio::test]
    async fn test_config_create_then_load() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("home");
        let args = init_args(dir.path(), "https://example.com/spreadsheets/d/MySheetIDX").await;
        let created = Config::create(&home_dir, &args).await.unwrap();
        let loaded = Config::load(&home_dir).await.unwrap();
        assert_eq!(created.config_file, loaded.config_file);
        assert_eq!("MySheetIDX", loaded.spreadsheet_id());
        assert_eq!(
            "https://proms.example.com/api/report",
            loaded.proms().url().as_str()
        );
        assert_eq!("date", loaded.proms().date_param());
        assert_eq!("division_id", loaded.proms().division_param());
        assert_eq!(RequestEncoding::Form, loaded.proms().encoding());
    }

    #[tokio::test]
    async fn test_config_create_rejects_bad_sheet_url() {
        let dir = TempDir::new().unwrap();
        let args = init_args(dir.path(), "https://example.com/invalid").await;
        let result = Config::create(dir.path().join("home"), &args).await;
        assert!(result.is_err());
        // Nothing was moved.
        assert!(args.client_secret().is_file());
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(dir.path().join("nope")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json = r#"{
            "app_name": "proms-sync",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/minimal",
            "proms": { "url": "https://proms.example.com/x" }
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();

        assert_eq!(config.worksheet, "Sheet1");
        assert_eq!(config.request_delay_secs, 10);
        assert!(config.proms.headers().is_empty());
        assert_eq!(config.proms.date_param(), "date");
        assert_eq!(config.divisions_path(), PathBuf::from(DIVISIONS_CSV));
        assert_eq!(
            config.client_secret_path(),
            PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON)
        );
        assert_eq!(config.token_path(), PathBuf::from(SECRETS).join(TOKEN_JSON));
    }

    #[tokio::test]
    async fn test_config_file_load_with_json_encoding_and_headers() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json = r#"{
            "app_name": "proms-sync",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/abc",
            "worksheet": "Records",
            "request_delay_secs": 0,
            "proms": {
                "url": "https://proms.example.com/x",
                "headers": { "x-api-key": "k" },
                "encoding": "json"
            }
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(config.worksheet, "Records");
        assert_eq!(config.request_delay_secs, 0);
        assert_eq!(config.proms.encoding(), RequestEncoding::Json);
        assert_eq!(config.proms.headers().get("x-api-key").unwrap(), "k");
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json = r#"{
            "app_name": "wrong_app",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/test",
            "proms": { "url": "https://proms.example.com/x" }
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let result = ConfigFile::load(&config_path).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_proms_url() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json = r#"{
            "app_name": "proms-sync",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/test",
            "proms": { "url": "not a url" }
        }"#;
        utils::write(&config_path, json).await.unwrap();

        assert!(ConfigFile::load(&config_path).await.is_err());
    }

    fn config_file(sheet_url: &str) -> ConfigFile {
        let url = Url::parse("https://proms.example.com/api").unwrap();
        ConfigFile::new(sheet_url, "Sheet1", PromsConfig::new(url))
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let config = config_file("https://docs.google.com/spreadsheets/d/test");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("client_secret_path"));
        assert!(!json.contains("token_path"));
        assert!(!json.contains("divisions_path"));
        assert!(!json.contains("headers"));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let mut original = config_file("https://docs.google.com/spreadsheets/d/test");
        original.token_path = Some(PathBuf::from("/abs/token.json"));

        let t = TempDir::new().unwrap();
        let path = t.path().join("file.json");
        original.save(&path).await.unwrap();

        let read = ConfigFile::load(&path).await.unwrap();
        assert_eq!(original, read);
    }

    #[test]
    fn test_request_encoding_display_and_parse() {
        assert_eq!("form", RequestEncoding::Form.to_string());
        assert_eq!(RequestEncoding::Json, "json".parse().unwrap());
        assert!("xml".parse::<RequestEncoding>().is_err());
    }

    #[test]
    fn test_extract_spreadsheet_id() {
        let url = "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";
        let id = extract_spreadsheet_id(url).unwrap();
        assert_eq!(id, "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL");

        let url = "https://docs.google.com/spreadsheets/d/ABC123?foo=bar";
        assert_eq!(extract_spreadsheet_id(url).unwrap(), "ABC123");

        let url = "https://docs.google.com/spreadsheets/d/ABC123#gid=0";
        assert_eq!(extract_spreadsheet_id(url).unwrap(), "ABC123");

        assert!(extract_spreadsheet_id("https://example.com/invalid").is_err());
        assert!(extract_spreadsheet_id("").is_err());
        assert!(extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/").is_err());
    }
}
