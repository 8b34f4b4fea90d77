//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract. Scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | Usage error (bad args, missing or invalid job file)  |
//! | 3    | Credentials or API key missing / rejected            |
//! | 4    | Reading from the spreadsheet failed                  |
//! | 5    | Writing to the spreadsheet failed                    |
//!
//! Row-level LLM failures during `enrich` are reported, not exit codes.

use iter8_sheet::SheetError;
use iter8_sheets_client::SheetsError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options, bad job file.
pub const EXIT_USAGE: u8 = 2;

/// No Google credentials / OpenAI key, or the API rejected them.
pub const EXIT_AUTH: u8 = 3;

/// Listing, opening or reading a spreadsheet failed.
pub const EXIT_READ: u8 = 4;

/// A batch write failed. The sheet may hold part of the batch.
pub const EXIT_WRITE: u8 = 5;

/// Exit code for a failed Sheets / Drive read.
pub fn sheets_exit_code(err: &SheetsError) -> u8 {
    match err {
        SheetsError::NotAuthenticated => EXIT_AUTH,
        SheetsError::Http(401 | 403, _) => EXIT_AUTH,
        SheetsError::Io(_) => EXIT_AUTH,
        _ => EXIT_READ,
    }
}

/// Exit code for a failed snapshot load.
pub fn sheet_read_exit_code(err: &SheetError) -> u8 {
    match err {
        SheetError::NotAuthenticated(_) => EXIT_AUTH,
        _ => EXIT_READ,
    }
}
