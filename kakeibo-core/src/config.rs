//! Configuration management
//!
//! Settings come from the process environment, optionally seeded from a
//! `.env` file:
//! ```text
//! ZAIM_EMAIL=me@example.com
//! ZAIM_PASS=secret
//! SPREADSHEET_KEY=1AbC...        # store identifier (alias STORE_ID)
//! JSON_KEYFILE=service_account.json
//! STORE_BACKEND=sheets           # sheets | duckdb | csv
//! SYNC_MONTHS=3
//! ```
//!
//! The environment is read exactly once into an immutable [`Config`] that is
//! handed to every component needing it. Validation happens before any
//! browser or store side effect and reports every problem at once.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::domain::result::{Error, Result};

const DEFAULT_LOGIN_URL: &str = "https://auth.zaim.net/";
const DEFAULT_HISTORY_URL: &str = "https://zaim.net/money";
const DEFAULT_DELEGATED_HOST: &str = "auth0.com";
const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DEFAULT_KEYFILE: &str = "service_account.json";

/// Raw environment, every field optional so validation can list all gaps
#[derive(Debug, Default, Deserialize)]
struct RawEnv {
    zaim_email: Option<String>,
    zaim_pass: Option<String>,
    #[serde(alias = "store_id")]
    spreadsheet_key: Option<String>,
    json_keyfile: Option<String>,
    store_backend: Option<String>,
    sheet_name: Option<String>,
    insight_sheet_name: Option<String>,
    sheets_api_base: Option<String>,
    sync_months: Option<String>,
    window_delay_secs: Option<String>,
    wait_timeout_secs: Option<String>,
    login_wait_secs: Option<String>,
    login_url: Option<String>,
    history_url: Option<String>,
    delegated_login_host: Option<String>,
    kakeibo_dir: Option<String>,
}

/// Ledger login credentials
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Which table store implementation holds the persisted table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sheets,
    DuckDb,
    Csv,
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sheets" | "gsheets" | "google-sheets" => Ok(StoreBackend::Sheets),
            "duckdb" => Ok(StoreBackend::DuckDb),
            "csv" => Ok(StoreBackend::Csv),
            other => Err(Error::config(format!(
                "unknown STORE_BACKEND '{}' (expected sheets, duckdb or csv)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Spreadsheet key for Sheets, file path for DuckDB and CSV
    pub store_id: String,
    /// Credential file; only read by the Sheets backend
    pub credential_file: PathBuf,
    pub sheet_name: String,
    pub insight_sheet_name: String,
    pub sheets_api_base: String,
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Number of monthly windows to re-fetch, newest first
    pub months: u32,
    /// Fixed pause between window fetches
    pub window_delay: Duration,
    /// Bound on each wait for page content
    pub wait_timeout: Duration,
    /// Bound on the wait for a post-login success indicator
    pub login_wait: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            months: 3,
            window_delay: Duration::from_secs(3),
            wait_timeout: Duration::from_secs(15),
            login_wait: Duration::from_secs(5),
        }
    }
}

/// CSS selectors driving the login forms
#[derive(Debug, Clone)]
pub struct LoginSelectors {
    pub email: String,
    pub password: String,
    pub submit: String,
    pub delegated_email: String,
    pub delegated_password: String,
    pub delegated_submit: String,
    /// Present only once the session is authenticated
    pub success: String,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            email: "#email".to_string(),
            password: "#password".to_string(),
            submit: "[name=\"action\"]".to_string(),
            delegated_email: "input[type=\"email\"], #username".to_string(),
            delegated_password: "input[type=\"password\"]".to_string(),
            delegated_submit: "button[type=\"submit\"], [name=\"action\"]".to_string(),
            success: "a[href*=\"logout\"]".to_string(),
        }
    }
}

/// CSS selectors locating a history row and its labeled fields
#[derive(Debug, Clone)]
pub struct RowSelectors {
    pub row: String,
    pub date: String,
    pub category: String,
    pub amount: String,
    pub source_account: String,
    pub dest_account: String,
    pub place: String,
    pub item: String,
    /// Elements whose navigation attributes may carry the record id
    pub link: String,
    /// Regex with one capture group yielding the numeric id
    pub id_pattern: String,
}

impl Default for RowSelectors {
    fn default() -> Self {
        Self {
            row: "[class*=\"SearchResult-module__list\"]".to_string(),
            date: "[class*=\"__date\"]".to_string(),
            category: "[class*=\"__category\"]".to_string(),
            amount: "[class*=\"__price\"]".to_string(),
            source_account: "[class*=\"__fromAccount\"]".to_string(),
            dest_account: "[class*=\"__toAccount\"]".to_string(),
            place: "[class*=\"__place\"]".to_string(),
            item: "[class*=\"__name\"]".to_string(),
            link: "[data-url], a[href], [onclick]".to_string(),
            id_pattern: r"/money/(\d+)".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub login_url: String,
    pub history_url: String,
    /// Host suffix identifying the delegated identity provider
    pub delegated_login_host: String,
    pub login: LoginSelectors,
    pub rows: RowSelectors,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            login_url: DEFAULT_LOGIN_URL.to_string(),
            history_url: DEFAULT_HISTORY_URL.to_string(),
            delegated_login_host: DEFAULT_DELEGATED_HOST.to_string(),
            login: LoginSelectors::default(),
            rows: RowSelectors::default(),
        }
    }
}

/// Seed the process environment from `.env`, if one exists.
///
/// Variables already set in the environment win over the file.
pub fn load_env_file() {
    // A missing .env file is fine; the environment may be set directly.
    let _ = dotenv::dotenv();
}

/// Immutable run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub store: StoreSettings,
    pub sync: SyncSettings,
    pub site: SiteSettings,
    /// Data directory override (event log lives here)
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load from `.env` (if present) and the process environment
    pub fn from_env() -> Result<Self> {
        load_env_file();
        let raw: RawEnv = envy::from_env()
            .map_err(|e| Error::config(format!("failed to read environment: {}", e)))?;
        Self::from_raw(raw)
    }

    /// Load from explicit key/value pairs (environment variable names)
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawEnv = envy::from_iter(vars)
            .map_err(|e| Error::config(format!("failed to read settings: {}", e)))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawEnv) -> Result<Self> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        let mut required = |value: Option<String>, name: &str| -> String {
            match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                Some(v) => v,
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        };

        let email = required(raw.zaim_email, "ZAIM_EMAIL");
        let password = required(raw.zaim_pass, "ZAIM_PASS");
        let store_id = required(raw.spreadsheet_key, "SPREADSHEET_KEY");
        let credential_file = required(
            Some(raw.json_keyfile.unwrap_or_else(|| DEFAULT_KEYFILE.to_string())),
            "JSON_KEYFILE",
        );

        let backend = match raw.store_backend.as_deref() {
            None | Some("") => StoreBackend::DuckDb,
            Some(s) => s.parse().unwrap_or_else(|e: Error| {
                invalid.push(e.to_string());
                StoreBackend::DuckDb
            }),
        };

        let defaults = SyncSettings::default();
        let mut number = |value: Option<String>, name: &str, default: u64| -> u64 {
            match value.as_deref().map(str::trim) {
                None | Some("") => default,
                Some(s) => s.parse::<u64>().unwrap_or_else(|_| {
                    invalid.push(format!("{} must be a non-negative integer, got '{}'", name, s));
                    default
                }),
            }
        };

        let months = number(raw.sync_months, "SYNC_MONTHS", defaults.months as u64);
        let window_delay = number(
            raw.window_delay_secs,
            "WINDOW_DELAY_SECS",
            defaults.window_delay.as_secs(),
        );
        let wait_timeout = number(
            raw.wait_timeout_secs,
            "WAIT_TIMEOUT_SECS",
            defaults.wait_timeout.as_secs(),
        );
        let login_wait = number(raw.login_wait_secs, "LOGIN_WAIT_SECS", defaults.login_wait.as_secs());

        if months == 0 || months > 120 {
            invalid.push(format!("SYNC_MONTHS must be between 1 and 120, got {}", months));
        }

        let login_url = raw.login_url.unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string());
        let history_url = raw.history_url.unwrap_or_else(|| DEFAULT_HISTORY_URL.to_string());
        let sheets_api_base = raw
            .sheets_api_base
            .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE.to_string());
        for (name, value) in [
            ("LOGIN_URL", &login_url),
            ("HISTORY_URL", &history_url),
            ("SHEETS_API_BASE", &sheets_api_base),
        ] {
            if Url::parse(value).is_err() {
                invalid.push(format!("{} is not a valid URL: '{}'", name, value));
            }
        }

        let credential_file = PathBuf::from(credential_file);
        if backend == StoreBackend::Sheets
            && !credential_file.as_os_str().is_empty()
            && !credential_file.exists()
        {
            invalid.push(format!(
                "JSON_KEYFILE '{}' does not exist",
                credential_file.display()
            ));
        }

        if !missing.is_empty() || !invalid.is_empty() {
            let mut problems = Vec::new();
            if !missing.is_empty() {
                problems.push(format!("missing required settings: {}", missing.join(", ")));
            }
            problems.extend(invalid);
            return Err(Error::config(problems.join("; ")));
        }

        Ok(Self {
            credentials: Credentials { email, password },
            store: StoreSettings {
                backend,
                store_id,
                credential_file,
                sheet_name: raw.sheet_name.unwrap_or_else(|| "Sheet1".to_string()),
                insight_sheet_name: raw
                    .insight_sheet_name
                    .unwrap_or_else(|| "Insight".to_string()),
                sheets_api_base,
            },
            sync: SyncSettings {
                months: months as u32,
                window_delay: Duration::from_secs(window_delay),
                wait_timeout: Duration::from_secs(wait_timeout),
                login_wait: Duration::from_secs(login_wait),
            },
            site: SiteSettings {
                login_url,
                history_url,
                delegated_login_host: raw
                    .delegated_login_host
                    .unwrap_or_else(|| DEFAULT_DELEGATED_HOST.to_string()),
                login: LoginSelectors::default(),
                rows: RowSelectors::default(),
            },
            data_dir: raw.kakeibo_dir.filter(|d| !d.trim().is_empty()).map(PathBuf::from),
        })
    }
}
