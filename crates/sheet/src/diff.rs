// Snapshot diffing for write-back.
// Pure functions: original + working copy in, cell descriptors out.
// No IO.

use crate::a1;
use crate::backend::CellUpdate;
use crate::table::Table;

/// Descriptors that turn `original` into `copy` on the sheet.
///
/// Column letters come from the copy's column order. Columns missing from
/// the original get a header descriptor at row 1, in the order they were
/// added. Then every row of the copy is compared cell by cell:
/// null -> null and equal values are skipped, anything else is written
/// (null as ""). Rows the original does not have compare against null.
///
/// Output is header descriptors first, then cells row-major.
pub fn calculate_updates(original: &Table, copy: &Table) -> Vec<CellUpdate> {
    let mut updates = Vec::new();

    for (col, name) in copy.columns().iter().enumerate() {
        if !original.has_column(name) {
            updates.push(CellUpdate::new(
                a1::header_address(col),
                serde_json::Value::String(name.clone()),
            ));
        }
    }

    for row in 0..copy.len() {
        let Some(cells) = copy.row(row) else { continue };
        for (col, (name, new_value)) in copy.columns().iter().zip(cells).enumerate() {
            let old_value = original.get(row, name);
            if old_value.is_null() && new_value.is_null() {
                continue;
            }
            if old_value == new_value {
                continue;
            }
            updates.push(CellUpdate::new(
                a1::cell_address(row, col),
                new_value.to_sheet_json(),
            ));
        }
    }

    updates
}

/// Count of (header, cell) descriptors in an update list.
pub fn split_counts(updates: &[CellUpdate]) -> (usize, usize) {
    let headers = updates
        .iter()
        .filter(|u| is_header_range(&u.range))
        .count();
    (headers, updates.len() - headers)
}

fn is_header_range(range: &str) -> bool {
    let digits = range.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    digits.parse::<usize>().ok() == Some(a1::HEADER_ROW)
}
