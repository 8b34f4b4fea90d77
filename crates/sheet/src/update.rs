//! Scoped updates with write-back.
//!
//! An `UpdateContext` owns a working copy of a snapshot. `commit` diffs the
//! copy against the snapshot, writes the difference to the worksheet in a
//! single `USER_ENTERED` batch and, only if that write succeeds, replaces
//! the snapshot with the copy. `discard` (or dropping the context) throws
//! the copy away without any I/O.

use std::ops::{Deref, DerefMut};

use crate::backend::{CellUpdate, ValueInputOption, Worksheet};
use crate::data_sheet::DataSheet;
use crate::diff;
use crate::error::WriteError;
use crate::table::Table;

/// Result of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Copy matched the snapshot; no remote call was made
    NoChanges,
    /// Batch written and folded into the snapshot
    Applied { headers: usize, cells: usize },
}

impl UpdateOutcome {
    /// Total descriptors written.
    pub fn written(&self) -> usize {
        match self {
            UpdateOutcome::NoChanges => 0,
            UpdateOutcome::Applied { headers, cells } => headers + cells,
        }
    }
}

pub struct UpdateContext<'a, W: Worksheet> {
    sheet: &'a mut DataSheet<W>,
    copy: Table,
}

impl<'a, W: Worksheet> UpdateContext<'a, W> {
    pub(crate) fn new(sheet: &'a mut DataSheet<W>) -> Self {
        let copy = sheet.table.clone();
        Self { sheet, copy }
    }

    /// The snapshot as it was when the scope opened.
    pub fn original(&self) -> &Table {
        &self.sheet.table
    }

    pub fn table(&self) -> &Table {
        &self.copy
    }

    pub fn table_mut(&mut self) -> &mut Table {
        &mut self.copy
    }

    /// Descriptors `commit` would send right now.
    pub fn calculate_updates(&self) -> Vec<CellUpdate> {
        diff::calculate_updates(&self.sheet.table, &self.copy)
    }

    /// Write the difference and fold the copy into the snapshot.
    ///
    /// On a write failure the snapshot keeps its old contents and the error
    /// reports how many descriptors were in flight.
    pub fn commit(self) -> Result<UpdateOutcome, WriteError> {
        let updates = self.calculate_updates();
        if updates.is_empty() {
            log::info!("No changes detected");
            return Ok(UpdateOutcome::NoChanges);
        }

        let (headers, cells) = diff::split_counts(&updates);
        log::debug!("Writing {} updates: {:?}", updates.len(), updates);

        let worksheet = self.sheet.worksheet();
        if let Err(source) = worksheet.batch_update(&updates, ValueInputOption::UserEntered) {
            log::error!(
                "Error during sheet update of '{}': {} ({} updates, sheet state unknown)",
                worksheet.title(),
                source,
                updates.len()
            );
            return Err(WriteError {
                attempted: updates.len(),
                source,
            });
        }

        log::info!(
            "Updated {} cells in '{}' ({} new columns)",
            updates.len(),
            worksheet.title(),
            headers
        );

        let UpdateContext { sheet, copy } = self;
        sheet.table = copy;
        Ok(UpdateOutcome::Applied { headers, cells })
    }

    /// Drop the working copy. No I/O.
    pub fn discard(self) {}
}

impl<W: Worksheet> Deref for UpdateContext<'_, W> {
    type Target = Table;

    fn deref(&self) -> &Table {
        &self.copy
    }
}

impl<W: Worksheet> DerefMut for UpdateContext<'_, W> {
    fn deref_mut(&mut self) -> &mut Table {
        &mut self.copy
    }
}
