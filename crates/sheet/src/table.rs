// Ordered rows of cells keyed by ordered, unique column names.
//
// Columns can be appended but never removed or reordered, so column
// position always maps onto gap-free A1 letters. Every row holds exactly
// one cell per column.

use std::collections::HashMap;

use crate::error::SheetError;
use crate::value::CellValue;

static NULL: CellValue = CellValue::Null;

/// One row rendered as an ordered column -> JSON mapping.
pub type Record = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Empty table with the given header. Duplicate names are rejected.
    pub fn new<I, S>(columns: I) -> Result<Self, SheetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Table::default();
        for name in columns {
            let name = name.into();
            if table.index.contains_key(&name) {
                return Err(SheetError::DuplicateHeader(name));
            }
            table.add_column(name);
        }
        Ok(table)
    }

    /// Build a table from a raw value grid whose first row is the header,
    /// the way a sheet's "all records" read works:
    /// - trailing cells the API omitted are filled with `""`
    /// - cells beyond the header width are dropped
    /// - an empty grid gives an empty table
    pub fn from_values(grid: Vec<Vec<CellValue>>) -> Result<Self, SheetError> {
        let mut lines = grid.into_iter();
        let Some(header) = lines.next() else {
            return Ok(Table::default());
        };

        let mut table = Table::new(header.iter().map(|v| v.to_string()))?;
        let width = table.width();
        for mut cells in lines {
            cells.truncate(width);
            cells.resize(width, CellValue::Text(String::new()));
            table.rows.push(cells);
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, column name). Missing rows and columns read as null.
    pub fn get(&self, row: usize, column: &str) -> &CellValue {
        match (self.rows.get(row), self.column_index(column)) {
            (Some(cells), Some(col)) => &cells[col],
            _ => &NULL,
        }
    }

    /// Cells of one row in column order.
    pub fn row(&self, row: usize) -> Option<&[CellValue]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    /// Append a column (null in every row) and return its index. Adding an
    /// existing column is a no-op returning its current index.
    pub fn add_column(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        if let Some(idx) = self.index.get(&name) {
            return *idx;
        }
        let idx = self.columns.len();
        self.index.insert(name.clone(), idx);
        self.columns.push(name);
        for cells in &mut self.rows {
            cells.push(CellValue::Null);
        }
        idx
    }

    /// Set one cell, appending the column when it does not exist yet.
    pub fn set(
        &mut self,
        row: usize,
        column: &str,
        value: impl Into<CellValue>,
    ) -> Result<(), SheetError> {
        let len = self.rows.len();
        if row >= len {
            return Err(SheetError::RowOutOfRange { row, len });
        }
        let col = self.add_column(column);
        self.rows[row][col] = value.into();
        Ok(())
    }

    /// Set several fields of one row at once (new columns appended in the
    /// order given).
    pub fn set_fields<I, K, V>(&mut self, row: usize, fields: I) -> Result<(), SheetError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CellValue>,
    {
        let len = self.rows.len();
        if row >= len {
            return Err(SheetError::RowOutOfRange { row, len });
        }
        for (k, v) in fields {
            self.set(row, k.as_ref(), v)?;
        }
        Ok(())
    }

    /// Append a row. Unnamed columns are null; unknown names add columns.
    /// Returns the new row index.
    pub fn push_row<I, K, V>(&mut self, fields: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CellValue>,
    {
        let row = self.rows.len();
        self.rows.push(vec![CellValue::Null; self.width()]);
        for (k, v) in fields {
            let col = self.add_column(k.as_ref());
            self.rows[row][col] = v.into();
        }
        row
    }

    /// The row as an ordered JSON mapping (nulls included).
    pub fn record(&self, row: usize) -> Option<Record> {
        let cells = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .zip(cells)
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }

    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        (0..self.rows.len()).filter_map(|i| self.record(i))
    }

    /// Convert `TRUE` / `FALSE` text (any case) to booleans in every column
    /// that contains at least one such token. Other values are left alone.
    pub fn normalize_booleans(&mut self) {
        for col in 0..self.width() {
            let has_token = self.rows.iter().any(|cells| cells[col].bool_token().is_some());
            if !has_token {
                continue;
            }
            for cells in &mut self.rows {
                if let Some(b) = cells[col].bool_token() {
                    cells[col] = CellValue::Bool(b);
                }
            }
        }
    }
}
