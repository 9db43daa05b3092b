//! Numeric Coercion
//!
//! Table cells arrive as text. Each essential cell is parsed into a tagged
//! `NumericCell` instead of silently becoming NaN, so the row-drop decision
//! is an explicit predicate over tagged values.

/// Tokens treated as missing regardless of column
const MISSING_TOKENS: [&str; 10] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "-",
];

/// A table cell after coercion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericCell {
    Value(f64),
    Missing,
}

impl NumericCell {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Missing => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// Parse one cell
///
/// Null cells, missing-value tokens, unparseable text and NaN all become
/// `Missing`. Infinite values parse as values and are left for the
/// downstream validity filter.
pub fn parse_numeric(raw: Option<&str>) -> NumericCell {
    let Some(text) = raw else {
        return NumericCell::Missing;
    };

    let trimmed = text.trim();
    if MISSING_TOKENS.contains(&trimmed) {
        return NumericCell::Missing;
    }

    match trimmed.parse::<f64>() {
        Ok(v) if v.is_nan() => NumericCell::Missing,
        Ok(v) => NumericCell::Value(v),
        Err(_) => NumericCell::Missing,
    }
}
