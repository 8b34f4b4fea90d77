//! Google Sheets HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required).
//! Reads whole worksheets as unformatted values and writes cell batches
//! through `values:batchUpdate`. Folder listings go through Drive v3.

use serde::Deserialize;
use url::Url;

use iter8_sheet::a1;
use iter8_sheet::{CellUpdate, CellValue, SheetError, SpreadsheetBackend, Table, ValueInputOption, Worksheet};

use crate::auth::AuthCredentials;

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// Google Sheets API client (blocking).
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::blocking::Client,
    sheets_api_base: String,
    drive_api_base: String,
    token: String,
}

/// Error type for Sheets / Drive operations.
#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    #[error("Not authenticated: set ITER8_GOOGLE_TOKEN or save credentials to google_auth.json")]
    NotAuthenticated,
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {0}: {1}")]
    Http(u16, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("I/O error: {0}")]
    Io(String),
    /// 404 from the API (unknown spreadsheet or folder)
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Worksheet not found: {0}")]
    WorksheetNotFound(String),
}

impl From<SheetsError> for SheetError {
    fn from(e: SheetsError) -> Self {
        match e {
            SheetsError::WorksheetNotFound(title) => SheetError::WorksheetNotFound(title),
            e @ (SheetsError::NotAuthenticated | SheetsError::Http(401 | 403, _)) => {
                SheetError::NotAuthenticated(e.to_string())
            }
            other => SheetError::Backend(other.to_string()),
        }
    }
}

/// A spreadsheet file found in a Drive folder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub modified_time: Option<String>,
}

/// Tab metadata from `spreadsheets.get`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetInfo {
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub index: i64,
}

/// An opened spreadsheet and its tabs.
#[derive(Clone)]
pub struct Spreadsheet {
    client: SheetsClient,
    id: String,
    title: String,
    worksheets: Vec<WorksheetInfo>,
}

/// One tab of a spreadsheet. Implements [`Worksheet`].
#[derive(Clone)]
pub struct RemoteWorksheet {
    client: SheetsClient,
    spreadsheet_id: String,
    info: WorksheetInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<SpreadsheetFile>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(rename = "spreadsheetId")]
    id: String,
    #[serde(default)]
    properties: SpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize, Default)]
struct SpreadsheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: WorksheetInfo,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl SheetsClient {
    /// Create a new client with explicit credentials.
    pub fn new(creds: AuthCredentials) -> Result<Self, SheetsError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("iter8/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SheetsError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            sheets_api_base: creds.sheets_api_base.trim_end_matches('/').to_string(),
            drive_api_base: creds.drive_api_base.trim_end_matches('/').to_string(),
            token: creds.token,
        })
    }

    /// Spreadsheets directly inside a Drive folder, following pagination.
    pub fn list_spreadsheet_files(&self, folder_id: &str) -> Result<Vec<SpreadsheetFile>, SheetsError> {
        let query = format!(
            "'{}' in parents and mimeType='{}' and trashed=false",
            folder_id.replace('\'', "\\'"),
            SPREADSHEET_MIME
        );

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = endpoint(&self.drive_api_base, &["drive", "v3", "files"])?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs
                    .append_pair("q", &query)
                    .append_pair("fields", "nextPageToken,files(id,name,modifiedTime)")
                    .append_pair("pageSize", "1000")
                    .append_pair("supportsAllDrives", "true")
                    .append_pair("includeItemsFromAllDrives", "true");
                if let Some(token) = &page_token {
                    pairs.append_pair("pageToken", token);
                }
            }

            let page: FileList = self
                .get(url)?
                .json()
                .map_err(|e| SheetsError::Parse(e.to_string()))?;
            files.extend(page.files);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        log::debug!("Folder {} holds {} spreadsheets", folder_id, files.len());
        Ok(files)
    }

    /// Fetch spreadsheet metadata (title and tabs).
    pub fn open_by_key(&self, spreadsheet_id: &str) -> Result<Spreadsheet, SheetsError> {
        let mut url = endpoint(&self.sheets_api_base, &["v4", "spreadsheets", spreadsheet_id])?;
        url.query_pairs_mut()
            .append_pair("fields", "spreadsheetId,properties.title,sheets.properties");

        let meta: SpreadsheetMeta = self
            .get(url)?
            .json()
            .map_err(|e| SheetsError::Parse(e.to_string()))?;

        Ok(Spreadsheet {
            client: self.clone(),
            id: meta.id,
            title: meta.properties.title,
            worksheets: meta.sheets.into_iter().map(|s| s.properties).collect(),
        })
    }

    fn get_values(&self, spreadsheet_id: &str, title: &str) -> Result<Vec<Vec<serde_json::Value>>, SheetsError> {
        let range = a1::quote_title(title);
        let mut url = endpoint(
            &self.sheets_api_base,
            &["v4", "spreadsheets", spreadsheet_id, "values", &range],
        )?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
            .append_pair("majorDimension", "ROWS");

        let body: ValueRange = self
            .get(url)?
            .json()
            .map_err(|e| SheetsError::Parse(e.to_string()))?;
        Ok(body.values)
    }

    fn batch_update_values(
        &self,
        spreadsheet_id: &str,
        title: &str,
        updates: &[CellUpdate],
        mode: ValueInputOption,
    ) -> Result<(), SheetsError> {
        let url = endpoint(
            &self.sheets_api_base,
            &["v4", "spreadsheets", spreadsheet_id, "values:batchUpdate"],
        )?;

        let data: Vec<serde_json::Value> = updates
            .iter()
            .map(|u| {
                serde_json::json!({
                    "range": a1::qualified_range(title, &u.range),
                    "values": u.values,
                })
            })
            .collect();
        let body = serde_json::json!({
            "valueInputOption": mode.as_str(),
            "data": data,
        });

        self.post_json(url, &body)?;
        Ok(())
    }

    fn get(&self, url: Url) -> Result<reqwest::blocking::Response, SheetsError> {
        let response = self.http.get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| SheetsError::Network(e.to_string()))?;
        check_status(response)
    }

    fn post_json(&self, url: Url, body: &serde_json::Value) -> Result<reqwest::blocking::Response, SheetsError> {
        let response = self.http.post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(|e| SheetsError::Network(e.to_string()))?;
        check_status(response)
    }
}

impl Spreadsheet {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Tabs in sheet order.
    pub fn worksheets(&self) -> &[WorksheetInfo] {
        &self.worksheets
    }

    /// Tab by exact title.
    pub fn worksheet(&self, title: &str) -> Result<RemoteWorksheet, SheetsError> {
        let info = self
            .worksheets
            .iter()
            .find(|w| w.title == title)
            .cloned()
            .ok_or_else(|| SheetsError::WorksheetNotFound(title.to_string()))?;
        Ok(RemoteWorksheet {
            client: self.client.clone(),
            spreadsheet_id: self.id.clone(),
            info,
        })
    }
}

impl RemoteWorksheet {
    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn info(&self) -> &WorksheetInfo {
        &self.info
    }
}

impl std::fmt::Debug for Spreadsheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spreadsheet")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("worksheets", &self.worksheets)
            .finish()
    }
}

impl std::fmt::Debug for RemoteWorksheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteWorksheet")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("title", &self.info.title)
            .finish()
    }
}

impl Worksheet for RemoteWorksheet {
    fn title(&self) -> &str {
        &self.info.title
    }

    fn get_all_records(&self) -> Result<Table, SheetError> {
        let values = self.client.get_values(&self.spreadsheet_id, &self.info.title)?;
        let grid = values
            .iter()
            .map(|row| row.iter().map(CellValue::from_json).collect())
            .collect();
        Table::from_values(grid)
    }

    fn batch_update(&self, updates: &[CellUpdate], mode: ValueInputOption) -> Result<(), SheetError> {
        if updates.is_empty() {
            return Ok(());
        }
        self.client
            .batch_update_values(&self.spreadsheet_id, &self.info.title, updates, mode)
            .map_err(SheetError::from)
    }
}

impl SpreadsheetBackend for SheetsClient {
    type Worksheet = RemoteWorksheet;

    fn open_worksheet(&self, spreadsheet_id: &str, title: &str) -> Result<RemoteWorksheet, SheetError> {
        Ok(self.open_by_key(spreadsheet_id)?.worksheet(title)?)
    }
}

/// `base` + percent-encoded path segments.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, SheetsError> {
    let mut url = Url::parse(base).map_err(|e| SheetsError::Parse(format!("bad API base {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| SheetsError::Parse(format!("bad API base {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, SheetsError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let message = api_error_message(&body).unwrap_or(body);
    match status {
        401 => Err(SheetsError::NotAuthenticated),
        404 => Err(SheetsError::NotFound(message)),
        _ => Err(SheetsError::Http(status, message)),
    }
}

/// Pull `error.message` out of a Google API error body.
fn api_error_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = endpoint("https://sheets.test", &["v4", "spreadsheets", "abc", "values", "'My Tab'"]).unwrap();
        assert_eq!(url.as_str(), "https://sheets.test/v4/spreadsheets/abc/values/'My%20Tab'");

        let url = endpoint("https://sheets.test/", &["v4", "spreadsheets", "abc", "values:batchUpdate"]).unwrap();
        assert_eq!(url.path(), "/v4/spreadsheets/abc/values:batchUpdate");
    }

    #[test]
    fn test_endpoint_rejects_garbage_base() {
        assert!(matches!(endpoint("not a url", &["x"]), Err(SheetsError::Parse(_))));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        assert_eq!(api_error_message(body).as_deref(), Some("Requested entity was not found."));
        assert_eq!(api_error_message("<html>"), None);
    }

    #[test]
    fn test_worksheet_not_found_maps_through() {
        let err: SheetError = SheetsError::WorksheetNotFound("step-09".into()).into();
        assert!(matches!(err, SheetError::WorksheetNotFound(ref t) if t == "step-09"));

        let err: SheetError = SheetsError::Http(500, "boom".into()).into();
        assert!(matches!(err, SheetError::Backend(ref m) if m == "HTTP 500: boom"));

        let err: SheetError = SheetsError::Http(403, "caller does not have permission".into()).into();
        assert!(matches!(err, SheetError::NotAuthenticated(ref m) if m == "HTTP 403: caller does not have permission"));

        let err: SheetError = SheetsError::NotAuthenticated.into();
        assert!(matches!(err, SheetError::NotAuthenticated(_)));
    }
}
