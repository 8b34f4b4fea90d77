// Cell values typed on the command line.

use iter8_sheet::CellValue;

/// Parse a `--value` argument.
///
/// `TRUE`/`FALSE` (any case) become booleans, integers and finite decimals
/// become numbers, `null` clears the cell, anything else (formulas
/// included) is text.
pub fn parse_cell_value(raw: &str) -> CellValue {
    if raw == "null" {
        return CellValue::Null;
    }
    if raw.eq_ignore_ascii_case("true") {
        return CellValue::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return CellValue::Bool(false);
    }
    if looks_numeric(raw) {
        if let Ok(i) = raw.parse::<i64>() {
            return CellValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return CellValue::from(f);
        }
    }
    CellValue::Text(raw.to_string())
}

// Keeps "inf", "NaN", "1e5x" and zero-padded ids like "007" as text.
fn looks_numeric(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let first_ok = digits.chars().next().is_some_and(|c| c.is_ascii_digit());
    let padded = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    first_ok && !padded && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booleans() {
        assert_eq!(parse_cell_value("TRUE"), CellValue::Bool(true));
        assert_eq!(parse_cell_value("false"), CellValue::Bool(false));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_cell_value("42"), CellValue::Int(42));
        assert_eq!(parse_cell_value("-3"), CellValue::Int(-3));
        assert_eq!(parse_cell_value("15.5"), CellValue::Float(15.5));
        assert_eq!(parse_cell_value("0.25"), CellValue::Float(0.25));
        assert_eq!(parse_cell_value("0"), CellValue::Int(0));
    }

    #[test]
    fn test_text_that_looks_almost_numeric() {
        assert_eq!(parse_cell_value("007"), CellValue::from("007"));
        assert_eq!(parse_cell_value("NaN"), CellValue::from("NaN"));
        assert_eq!(parse_cell_value("1.2.3"), CellValue::from("1.2.3"));
        assert_eq!(parse_cell_value(""), CellValue::from(""));
    }

    #[test]
    fn test_null_and_formula() {
        assert_eq!(parse_cell_value("null"), CellValue::Null);
        assert_eq!(
            parse_cell_value("=IMAGE(\"http://x/y.jpg\")"),
            CellValue::from("=IMAGE(\"http://x/y.jpg\")")
        );
    }
}
