// Seams to the remote spreadsheet service.
//
// The snapshot and update context only ever talk to a `Worksheet`. The HTTP
// implementation lives in `iter8-sheets-client`; tests use in-memory fakes.

use serde::{Deserialize, Serialize};

use crate::error::SheetError;
use crate::table::Table;

/// How the sheet interprets written values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueInputOption {
    /// Parse values as if typed into the UI (formulas evaluate, "TRUE" is a bool)
    #[default]
    UserEntered,
    /// Store values verbatim
    Raw,
}

impl ValueInputOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueInputOption::UserEntered => "USER_ENTERED",
            ValueInputOption::Raw => "RAW",
        }
    }
}

/// One write instruction: a single cell addressed in A1 notation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellUpdate {
    /// A1 address without sheet title, e.g. "C3"
    pub range: String,
    /// Single-cell 2D array
    pub values: Vec<Vec<serde_json::Value>>,
}

impl CellUpdate {
    pub fn new(range: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            range: range.into(),
            values: vec![vec![value]],
        }
    }

    /// The single value carried by this descriptor.
    pub fn value(&self) -> &serde_json::Value {
        static EMPTY: serde_json::Value = serde_json::Value::Null;
        self.values
            .first()
            .and_then(|row| row.first())
            .unwrap_or(&EMPTY)
    }
}

/// A worksheet that can be read whole and written cell by cell.
pub trait Worksheet {
    /// Worksheet title (used to qualify ranges).
    fn title(&self) -> &str;

    /// All data rows keyed by the header row.
    fn get_all_records(&self) -> Result<Table, SheetError>;

    /// Apply all updates in one call.
    fn batch_update(&self, updates: &[CellUpdate], mode: ValueInputOption) -> Result<(), SheetError>;
}

impl<W: Worksheet + ?Sized> Worksheet for &W {
    fn title(&self) -> &str {
        (**self).title()
    }

    fn get_all_records(&self) -> Result<Table, SheetError> {
        (**self).get_all_records()
    }

    fn batch_update(&self, updates: &[CellUpdate], mode: ValueInputOption) -> Result<(), SheetError> {
        (**self).batch_update(updates, mode)
    }
}

impl<W: Worksheet + ?Sized> Worksheet for Box<W> {
    fn title(&self) -> &str {
        (**self).title()
    }

    fn get_all_records(&self) -> Result<Table, SheetError> {
        (**self).get_all_records()
    }

    fn batch_update(&self, updates: &[CellUpdate], mode: ValueInputOption) -> Result<(), SheetError> {
        (**self).batch_update(updates, mode)
    }
}

/// Something that can open worksheets by spreadsheet id and title.
pub trait SpreadsheetBackend {
    type Worksheet: Worksheet;

    fn open_worksheet(&self, spreadsheet_id: &str, title: &str) -> Result<Self::Worksheet, SheetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_update_wire_shape() {
        let update = CellUpdate::new("B3", serde_json::json!("Updated B3"));
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"range": "B3", "values": [["Updated B3"]]})
        );
        assert_eq!(update.value(), &serde_json::json!("Updated B3"));
    }

    #[test]
    fn test_value_input_option_serializes_upper() {
        let json = serde_json::to_value(ValueInputOption::UserEntered).unwrap();
        assert_eq!(json, serde_json::json!("USER_ENTERED"));
        assert_eq!(ValueInputOption::Raw.as_str(), "RAW");
    }
}
