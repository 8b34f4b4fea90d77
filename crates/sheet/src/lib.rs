//! Sheet snapshots and write-back.
//!
//! A [`DataSheet`] is an in-memory copy of one worksheet. Changes are made
//! to a working copy inside an [`UpdateContext`]; committing diffs the copy
//! against the snapshot, writes only the changed cells (and new headers) to
//! the worksheet in one batch, and folds the copy back on success.
//!
//! No HTTP here. The remote side is the [`Worksheet`] trait.

pub mod a1;
mod backend;
mod data_sheet;
pub mod diff;
mod error;
pub mod memory;
mod table;
mod update;
mod value;

pub use backend::{CellUpdate, SpreadsheetBackend, ValueInputOption, Worksheet};
pub use data_sheet::DataSheet;
pub use error::{SheetError, UpdateError, WriteError};
pub use memory::MemoryWorksheet;
pub use table::{Record, Table};
pub use update::{UpdateContext, UpdateOutcome};
pub use value::CellValue;
