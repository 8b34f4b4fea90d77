use thiserror::Error;

/// Errors raised while reading or shaping sheet data.
#[derive(Debug, Error)]
pub enum SheetError {
    /// The backend rejected or lacks credentials
    #[error("not authorized: {0}")]
    NotAuthenticated(String),
    /// The backend could not be reached or rejected the request
    #[error("sheet backend error: {0}")]
    Backend(String),
    /// No worksheet with that title in the spreadsheet
    #[error("worksheet not found: {0}")]
    WorksheetNotFound(String),
    /// Header row names the same column twice
    #[error("header row contains duplicate column: {0}")]
    DuplicateHeader(String),
    /// Row index past the end of the table
    #[error("row {row} out of range (table has {len} rows)")]
    RowOutOfRange { row: usize, len: usize },
}

/// A batch write that failed at the remote end.
///
/// The snapshot was not folded forward. The sheet may hold any subset of the
/// attempted cells, so local and remote state can disagree afterwards.
#[derive(Debug, Error)]
#[error("batch write of {attempted} updates failed: {source}")]
pub struct WriteError {
    pub attempted: usize,
    #[source]
    pub source: SheetError,
}

/// Failure leaving an update scope. `E` is the caller's own error type for
/// the scope body.
#[derive(Debug, Error)]
pub enum UpdateError<E> {
    /// The scope body failed; nothing was written and the snapshot is untouched.
    #[error("update scope aborted: {0}")]
    Scope(E),
    #[error(transparent)]
    Write(WriteError),
}

impl<E> UpdateError<E> {
    /// True when the remote sheet may have partially applied the batch and
    /// no longer matches the local snapshot.
    pub fn remote_state_unknown(&self) -> bool {
        matches!(self, UpdateError::Write(_))
    }

    /// The scope's own error, if that is what ended the update.
    pub fn into_scope(self) -> Option<E> {
        match self {
            UpdateError::Scope(e) => Some(e),
            UpdateError::Write(_) => None,
        }
    }
}
