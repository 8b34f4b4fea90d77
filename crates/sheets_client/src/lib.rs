//! Google Sheets backend for iter8 snapshots.
//!
//! Implements the `Worksheet` / `SpreadsheetBackend` traits from
//! `iter8-sheet` over the Sheets v4 REST API, plus Drive v3 folder
//! listings. Blocking only.

mod auth;
mod client;

pub use auth::{
    auth_file_path, load_auth, load_auth_from, save_auth, AuthCredentials,
    DEFAULT_DRIVE_API_BASE, DEFAULT_SHEETS_API_BASE, TOKEN_ENV,
};
pub use client::{RemoteWorksheet, SheetsClient, SheetsError, Spreadsheet, SpreadsheetFile, WorksheetInfo};
