//! Google Sheets table store (Sheets API v4, values endpoints)
//!
//! The whole sheet is the table: `values.get` reads it, `values.clear`
//! empties it and `values.update` with `valueInputOption=RAW` writes the
//! header and rows starting at A1.

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use url::Url;

use crate::domain::result::{Error, Result};
use crate::domain::TableSnapshot;
use crate::ports::TableStore;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    range: &'a str,
    major_dimension: &'a str,
    values: Vec<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct TokenFile {
    access_token: Option<String>,
    private_key: Option<String>,
}

/// Read a bearer token from the credential file.
///
/// Accepts `{"access_token": "..."}` JSON or the bare token text. A service
/// account key file is rejected with a hint, since signing one needs an
/// OAuth exchange this client does not perform.
pub fn load_access_token(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::config(format!("cannot read credential file {}: {}", path.display(), e)))?;
    let text = text.trim();

    if text.starts_with('{') {
        let parsed: TokenFile = serde_json::from_str(text)?;
        return match (parsed.access_token, parsed.private_key) {
            (Some(token), _) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            (_, Some(_)) => Err(Error::config(format!(
                "{} is a service account key; provide an OAuth access token instead \
                 (e.g. the output of `gcloud auth print-access-token`)",
                path.display()
            ))),
            _ => Err(Error::config(format!("{} has no access_token", path.display()))),
        };
    }

    if text.is_empty() {
        return Err(Error::config(format!("credential file {} is empty", path.display())));
    }
    Ok(text.to_string())
}

/// Render a cell the way a spreadsheet shows it
fn cell_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

pub struct SheetsTableStore {
    client: Client,
    api_base: Url,
    spreadsheet_id: String,
    sheet: String,
    token: String,
}

impl SheetsTableStore {
    pub fn new(api_base: &str, spreadsheet_id: &str, sheet: &str, token: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        let api_base = Url::parse(api_base)
            .map_err(|e| Error::config(format!("invalid Sheets API base '{}': {}", api_base, e)))?;
        if api_base.cannot_be_a_base() {
            return Err(Error::config(format!("invalid Sheets API base '{}'", api_base)));
        }

        Ok(Self {
            client,
            api_base,
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet: sheet.to_string(),
            token,
        })
    }

    /// `<base>/<id>/values/<sheet><suffix>`, each segment percent-encoded
    fn values_url(&self, suffix: &str) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&self.spreadsheet_id)
                .push("values")
                .push(&format!("{}{}", self.sheet, suffix));
        }
        url
    }

    fn check(response: Response, what: &str, to_error: fn(String) -> Error) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let hint = match status.as_u16() {
            401 => " (access token invalid or expired)",
            403 => " (no access to the spreadsheet)",
            404 => " (spreadsheet or sheet not found)",
            429 => " (rate limited)",
            _ => "",
        };
        Err(to_error(format!(
            "{} failed: HTTP {}{}: {}",
            what,
            status.as_u16(),
            hint,
            body.chars().take(200).collect::<String>()
        )))
    }
}

impl TableStore for SheetsTableStore {
    fn name(&self) -> String {
        format!("sheets:{}/{}", self.spreadsheet_id, self.sheet)
    }

    fn read_all(&self) -> Result<Option<TableSnapshot>> {
        let url = self.values_url("");
        debug!("GET {}", url);
        let response = self.client.get(url).bearer_auth(&self.token).send()?;
        let range: ValueRange = Self::check(response, "reading sheet", Error::Store)?
            .json()
            .map_err(|e| Error::store(format!("unexpected Sheets response: {}", e)))?;

        let mut rows = range.values.into_iter().map(|r| r.iter().map(cell_text).collect::<Vec<_>>());
        let Some(header) = rows.next() else {
            return Ok(None);
        };
        Ok(Some(TableSnapshot::new(header, rows.collect())))
    }

    fn clear(&self) -> Result<()> {
        let url = self.values_url(":clear");
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({}))
            .send()
            .map_err(|e| Error::upload(e.to_string()))?;
        Self::check(response, "clearing sheet", Error::Upload)?;
        Ok(())
    }

    fn write_all(&self, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        let mut url = self.values_url("");
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let body = UpdateRequest {
            range: &self.sheet,
            major_dimension: "ROWS",
            values: std::iter::once(header)
                .chain(rows.iter().map(Vec::as_slice))
                .collect(),
        };
        debug!("PUT {} ({} rows)", url, rows.len());
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|e| Error::upload(e.to_string()))?;
        Self::check(response, "writing sheet", Error::Upload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(sheet: &str) -> SheetsTableStore {
        SheetsTableStore::new(
            "https://sheets.googleapis.com/v4/spreadsheets",
            "key123",
            sheet,
            "tok".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_values_url_encodes_sheet_name() {
        let url = store("家計 簿").values_url(":clear");
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/key123/values/%E5%AE%B6%E8%A8%88%20%E7%B0%BF:clear"
        );
    }

    #[test]
    fn test_token_formats() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("token.json");
        fs::write(&json, r#"{"access_token": "ya29.abc"}"#).unwrap();
        assert_eq!(load_access_token(&json).unwrap(), "ya29.abc");

        let raw = dir.path().join("token.txt");
        fs::write(&raw, "ya29.raw\n").unwrap();
        assert_eq!(load_access_token(&raw).unwrap(), "ya29.raw");

        let key = dir.path().join("service_account.json");
        fs::write(&key, r#"{"type": "service_account", "private_key": "-----BEGIN"}"#).unwrap();
        assert!(matches!(load_access_token(&key), Err(Error::Config(_))));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&serde_json::json!("a")), "a");
        assert_eq!(cell_text(&serde_json::json!(12345)), "12345");
        assert_eq!(cell_text(&serde_json::json!(null)), "");
    }
}
