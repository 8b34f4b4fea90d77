//! Google API credentials.
//!
//! Reads/writes ~/.config/iter8/google_auth.json (0600 on Unix).
//! `ITER8_GOOGLE_TOKEN` overrides the stored token, which is handy for CI
//! where a short-lived access token is minted by the runner.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::client::SheetsError;

/// Environment variable holding a bearer token.
pub const TOKEN_ENV: &str = "ITER8_GOOGLE_TOKEN";

pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com";

fn default_sheets_api_base() -> String {
    DEFAULT_SHEETS_API_BASE.to_string()
}

fn default_drive_api_base() -> String {
    DEFAULT_DRIVE_API_BASE.to_string()
}

/// Authentication credentials stored locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCredentials {
    /// OAuth bearer token with spreadsheets + drive.readonly scopes
    pub token: String,
    /// Sheets API base URL
    #[serde(default = "default_sheets_api_base")]
    pub sheets_api_base: String,
    /// Drive API base URL (folder listings)
    #[serde(default = "default_drive_api_base")]
    pub drive_api_base: String,
}

impl AuthCredentials {
    pub fn new(token: String) -> Self {
        Self {
            token,
            sheets_api_base: default_sheets_api_base(),
            drive_api_base: default_drive_api_base(),
        }
    }

    /// Point both APIs at one base URL (mock servers, proxies).
    pub fn with_api_base(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        self.sheets_api_base = base.clone();
        self.drive_api_base = base;
        self
    }
}

/// Returns the path to the auth credentials file.
pub fn auth_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("iter8/google_auth.json"))
}

/// Resolve credentials: explicit file, then `ITER8_GOOGLE_TOKEN`, then the
/// default auth file. The environment token keeps the API bases from the
/// file when one exists.
pub fn load_auth(path: Option<&Path>) -> Result<AuthCredentials, SheetsError> {
    if let Some(path) = path {
        return load_auth_from(path);
    }

    let from_file = auth_file_path()
        .filter(|p| p.exists())
        .map(|p| load_auth_from(&p))
        .transpose()?;

    match (std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()), from_file) {
        (Some(token), Some(mut creds)) => {
            creds.token = token;
            Ok(creds)
        }
        (Some(token), None) => Ok(AuthCredentials::new(token)),
        (None, Some(creds)) => Ok(creds),
        (None, None) => Err(SheetsError::NotAuthenticated),
    }
}

/// Read credentials from a specific JSON file.
pub fn load_auth_from(path: &Path) -> Result<AuthCredentials, SheetsError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| SheetsError::Io(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&contents)
        .map_err(|e| SheetsError::Parse(format!("{}: {}", path.display(), e)))
}

/// Save auth credentials to disk.
/// Creates the parent directory if it doesn't exist.
/// Sets 0600 permissions on Unix.
pub fn save_auth(creds: &AuthCredentials, path: &Path) -> Result<(), SheetsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SheetsError::Io(format!("Failed to create config directory: {}", e)))?;
    }

    let contents = serde_json::to_string_pretty(creds)
        .map_err(|e| SheetsError::Parse(format!("Failed to serialize credentials: {}", e)))?;

    std::fs::write(path, &contents)
        .map_err(|e| SheetsError::Io(format!("Failed to write auth file: {}", e)))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| SheetsError::Io(format!("Failed to set file permissions: {}", e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_bases_default() {
        let json = r#"{"token":"ya29.tok"}"#;
        let parsed: AuthCredentials = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.token, "ya29.tok");
        assert_eq!(parsed.sheets_api_base, DEFAULT_SHEETS_API_BASE);
        assert_eq!(parsed.drive_api_base, DEFAULT_DRIVE_API_BASE);
    }

    #[test]
    fn test_with_api_base_trims_slash() {
        let creds = AuthCredentials::new("t".into()).with_api_base("http://127.0.0.1:9000/");
        assert_eq!(creds.sheets_api_base, "http://127.0.0.1:9000");
        assert_eq!(creds.drive_api_base, "http://127.0.0.1:9000");
    }

    #[test]
    fn test_auth_file_path_exists() {
        let path = auth_file_path().unwrap();
        assert!(path.to_string_lossy().contains("iter8"));
        assert!(path.to_string_lossy().ends_with("google_auth.json"));
    }

    #[test]
    fn test_save_and_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/google_auth.json");

        let creds = AuthCredentials::new("tok123".into()).with_api_base("https://sheets.test");
        save_auth(&creds, &path).unwrap();

        let loaded = load_auth(Some(&path)).unwrap();
        assert_eq!(loaded.token, "tok123");
        assert_eq!(loaded.sheets_api_base, "https://sheets.test");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_load_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_auth_from(&path), Err(SheetsError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(load_auth(Some(&path)), Err(SheetsError::Io(_))));
    }
}
