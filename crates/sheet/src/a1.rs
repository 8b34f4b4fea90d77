// ============================================================================
// A1 Notation Helpers
// ============================================================================
//
// Snapshot row `i` lives on sheet row `i + 2`: sheet rows are 1-based and
// row 1 holds the header.

/// Sheet row of the header.
pub const HEADER_ROW: usize = 1;

/// Convert 0-based column index to letter (0 -> A, 25 -> Z, 26 -> AA)
pub fn col_to_letter(col: usize) -> String {
    let mut result = String::new();
    let mut c = col;
    loop {
        result.insert(0, (b'A' + (c % 26) as u8) as char);
        if c < 26 {
            break;
        }
        c = c / 26 - 1;
    }
    result
}

/// Convert column letters back to a 0-based index ("A" -> 0, "AA" -> 26).
/// Returns None for empty or non-alphabetic input.
pub fn letter_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let v = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n = n.checked_mul(26)?.checked_add(v)?;
    }
    Some(n - 1)
}

/// Sheet row (1-based) backing a 0-based snapshot row.
pub fn sheet_row(row_index: usize) -> usize {
    row_index + 2
}

/// A1 address of a data cell (snapshot row, 0-based column).
pub fn cell_address(row_index: usize, col: usize) -> String {
    format!("{}{}", col_to_letter(col), sheet_row(row_index))
}

/// A1 address of a header cell.
pub fn header_address(col: usize) -> String {
    format!("{}{}", col_to_letter(col), HEADER_ROW)
}

/// Quote a worksheet title for use in a range (`'My Sheet'!A1`).
pub fn qualified_range(title: &str, range: &str) -> String {
    format!("{}!{}", quote_title(title), range)
}

/// Worksheet title as a range on its own: `'Sheet 1'`, quotes doubled.
pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}
