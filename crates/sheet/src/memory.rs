//! In-memory worksheet.
//!
//! Holds a value grid (row 0 = header) and applies batch updates to it.
//! Used for offline runs (`--dry-run`) and as the test double for the
//! update context. Every batch is recorded, including failed ones.

use std::sync::Mutex;

use crate::a1;
use crate::backend::{CellUpdate, ValueInputOption, Worksheet};
use crate::error::SheetError;
use crate::table::Table;
use crate::value::CellValue;

#[derive(Debug, Default)]
struct State {
    grid: Vec<Vec<CellValue>>,
    batches: Vec<Vec<CellUpdate>>,
    /// Fail the next write after applying this many descriptors
    fail_after: Option<(usize, String)>,
}

#[derive(Debug)]
pub struct MemoryWorksheet {
    title: String,
    state: Mutex<State>,
}

impl MemoryWorksheet {
    pub fn new(title: impl Into<String>, grid: Vec<Vec<CellValue>>) -> Self {
        Self {
            title: title.into(),
            state: Mutex::new(State { grid, ..State::default() }),
        }
    }

    /// Worksheet whose contents mirror `table` (header + rows).
    pub fn from_table(title: impl Into<String>, table: &Table) -> Self {
        let mut grid = vec![table
            .columns()
            .iter()
            .map(|c| CellValue::Text(c.clone()))
            .collect::<Vec<_>>()];
        for row in 0..table.len() {
            if let Some(cells) = table.row(row) {
                grid.push(cells.to_vec());
            }
        }
        Self::new(title, grid)
    }

    /// Make the next `batch_update` apply `applied` descriptors and then fail.
    pub fn fail_next_write(&self, applied: usize, message: impl Into<String>) {
        self.lock().fail_after = Some((applied, message.into()));
    }

    /// Every batch passed to `batch_update`, in call order.
    pub fn batches(&self) -> Vec<Vec<CellUpdate>> {
        self.lock().batches.clone()
    }

    pub fn write_calls(&self) -> usize {
        self.lock().batches.len()
    }

    /// Cell at an A1 address such as "C3". Cells outside the grid are null.
    pub fn cell(&self, address: &str) -> CellValue {
        let Some((row, col)) = parse_address(address) else {
            return CellValue::Null;
        };
        let state = self.lock();
        state
            .grid
            .get(row)
            .and_then(|cells| cells.get(col))
            .cloned()
            .unwrap_or(CellValue::Null)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock only happens in a failing test.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Worksheet for MemoryWorksheet {
    fn title(&self) -> &str {
        &self.title
    }

    fn get_all_records(&self) -> Result<Table, SheetError> {
        Table::from_values(self.lock().grid.clone())
    }

    fn batch_update(&self, updates: &[CellUpdate], _mode: ValueInputOption) -> Result<(), SheetError> {
        let mut state = self.lock();
        state.batches.push(updates.to_vec());

        let fail = state.fail_after.take();
        let limit = fail.as_ref().map(|(n, _)| *n).unwrap_or(updates.len());

        for update in updates.iter().take(limit) {
            let (row, col) = parse_address(&update.range)
                .ok_or_else(|| SheetError::Backend(format!("bad range: {}", update.range)))?;
            if state.grid.len() <= row {
                state.grid.resize(row + 1, Vec::new());
            }
            let cells = &mut state.grid[row];
            if cells.len() <= col {
                cells.resize(col + 1, CellValue::Null);
            }
            cells[col] = CellValue::from_json(update.value());
        }

        match fail {
            Some((_, message)) => Err(SheetError::Backend(message)),
            None => Ok(()),
        }
    }
}

/// "C3" -> (grid row 2, col 2)
fn parse_address(address: &str) -> Option<(usize, usize)> {
    let split = address.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = address.split_at(split);
    let col = a1::letter_to_col(letters)?;
    let row: usize = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<Vec<CellValue>> {
        vec![
            vec!["id".into(), "name".into()],
            vec![1.into(), "a".into()],
        ]
    }

    #[test]
    fn test_reads_records() {
        let ws = MemoryWorksheet::new("step-00", grid());
        let table = ws.get_all_records().unwrap();
        assert_eq!(table.columns(), &["id", "name"]);
        assert_eq!(table.get(0, "name"), &CellValue::from("a"));
    }

    #[test]
    fn test_applies_updates_and_grows_grid() {
        let ws = MemoryWorksheet::new("s", grid());
        ws.batch_update(
            &[
                CellUpdate::new("C1", serde_json::json!("extra")),
                CellUpdate::new("C3", serde_json::json!(7)),
            ],
            ValueInputOption::UserEntered,
        )
        .unwrap();

        assert_eq!(ws.cell("C1"), CellValue::from("extra"));
        assert_eq!(ws.cell("C3"), CellValue::Int(7));
        assert_eq!(ws.write_calls(), 1);

        let table = ws.get_all_records().unwrap();
        assert_eq!(table.columns(), &["id", "name", "extra"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_partial_failure_applies_prefix() {
        let ws = MemoryWorksheet::new("s", grid());
        ws.fail_next_write(1, "quota exceeded");
        let err = ws
            .batch_update(
                &[
                    CellUpdate::new("B2", serde_json::json!("x")),
                    CellUpdate::new("A2", serde_json::json!(9)),
                ],
                ValueInputOption::UserEntered,
            )
            .unwrap_err();

        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(ws.cell("B2"), CellValue::from("x"));
        assert_eq!(ws.cell("A2"), CellValue::Int(1));
        assert_eq!(ws.write_calls(), 1);
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("A1"), Some((0, 0)));
        assert_eq!(parse_address("AA10"), Some((9, 26)));
        assert_eq!(parse_address("A0"), None);
        assert_eq!(parse_address("12"), None);
    }
}
