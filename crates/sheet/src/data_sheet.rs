//! Sheet snapshot: a table plus the worksheet it was read from.

use crate::backend::{SpreadsheetBackend, Worksheet};
use crate::error::{SheetError, UpdateError};
use crate::table::Table;
use crate::update::{UpdateContext, UpdateOutcome};

/// In-memory snapshot of one worksheet.
///
/// The worksheet handle is provenance only. It is never part of the rows or
/// columns and never shows up in a diff.
#[derive(Debug)]
pub struct DataSheet<W> {
    pub(crate) table: Table,
    worksheet: W,
}

impl<W: Worksheet> DataSheet<W> {
    /// Open `title` in `spreadsheet_id` and load it.
    pub fn from_sheet<B>(backend: &B, spreadsheet_id: &str, title: &str) -> Result<Self, SheetError>
    where
        B: SpreadsheetBackend<Worksheet = W>,
    {
        let worksheet = backend.open_worksheet(spreadsheet_id, title)?;
        Self::from_worksheet(worksheet)
    }

    /// Load all records from an open worksheet, turning `TRUE`/`FALSE`
    /// text into booleans.
    pub fn from_worksheet(worksheet: W) -> Result<Self, SheetError> {
        let mut table = worksheet.get_all_records()?;
        table.normalize_booleans();
        log::debug!(
            "Loaded {} rows x {} columns from '{}'",
            table.len(),
            table.width(),
            worksheet.title()
        );
        Ok(Self { table, worksheet })
    }

    /// Snapshot over data already in hand (no read).
    pub fn with_table(table: Table, worksheet: W) -> Self {
        Self { table, worksheet }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn worksheet(&self) -> &W {
        &self.worksheet
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn into_parts(self) -> (Table, W) {
        (self.table, self.worksheet)
    }

    /// Open a scoped update over a working copy of the snapshot.
    ///
    /// ```ignore
    /// let mut change = sheet.start_update();
    /// change.set(1, "verse", "something funny")?;
    /// change.commit()?;
    /// ```
    ///
    /// Dropping the context without `commit` discards the working copy.
    pub fn start_update(&mut self) -> UpdateContext<'_, W> {
        UpdateContext::new(self)
    }

    /// Run `f` over a working copy and commit the result.
    ///
    /// If `f` fails, nothing is written, the snapshot is untouched and the
    /// error comes back as [`UpdateError::Scope`].
    pub fn update<F, E>(&mut self, f: F) -> Result<UpdateOutcome, UpdateError<E>>
    where
        F: FnOnce(&mut Table) -> Result<(), E>,
    {
        let mut ctx = self.start_update();
        if let Err(e) = f(ctx.table_mut()) {
            log::info!("Update scope failed; no updates applied");
            ctx.discard();
            return Err(UpdateError::Scope(e));
        }
        ctx.commit().map_err(UpdateError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryWorksheet;
    use crate::value::CellValue;

    struct Backend;

    impl SpreadsheetBackend for Backend {
        type Worksheet = MemoryWorksheet;

        fn open_worksheet(&self, spreadsheet_id: &str, title: &str) -> Result<MemoryWorksheet, SheetError> {
            if spreadsheet_id != "sheet-key" || title != "step-00" {
                return Err(SheetError::WorksheetNotFound(title.to_string()));
            }
            Ok(MemoryWorksheet::new(
                title,
                vec![
                    vec!["id".into(), "en".into(), "works".into(), "ch?".into()],
                    vec![1.into(), "nest".into(), "FALSE".into(), "TRUE".into()],
                    vec![2.into(), "nest".into(), "TRUE".into(), "FALSE".into()],
                ],
            ))
        }
    }

    #[test]
    fn test_from_sheet_normalizes_booleans() {
        let sheet = DataSheet::from_sheet(&Backend, "sheet-key", "step-00").unwrap();
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.table().get(0, "works"), &CellValue::Bool(false));
        assert_eq!(sheet.table().get(1, "ch?"), &CellValue::Bool(false));
        assert_eq!(sheet.table().get(0, "en"), &CellValue::from("nest"));
        assert_eq!(sheet.worksheet().title(), "step-00");
    }

    #[test]
    fn test_provenance_is_not_a_column() {
        let sheet = DataSheet::from_sheet(&Backend, "sheet-key", "step-00").unwrap();
        assert_eq!(sheet.table().columns(), &["id", "en", "works", "ch?"]);
    }

    #[test]
    fn test_from_sheet_propagates_errors() {
        let err = DataSheet::from_sheet(&Backend, "sheet-key", "missing").unwrap_err();
        assert!(matches!(err, SheetError::WorksheetNotFound(_)));
    }
}
