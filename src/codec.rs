//! Text datablock codec.
//!
//! A datablock is one string of rows joined by the block separator. Each row
//! is a list of fields joined by the token separator, and field 0 is always
//! the sampling timestamp of the row.

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::error::{Result, SosError};
use crate::model::{Encoding, EncodingSpec, Timestamp};

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses `yyyy-MM-dd HH:mm:ss` (ISO `T` separator accepted, optional fraction).
pub fn parse_timestamp(text: &str) -> Result<Timestamp> {
    let normalized = text.trim().replace('T', " ");
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
        .ok_or_else(|| SosError::MalformedRow(text.trim().to_string()))
}

/// Splits a block into raw rows. Blank rows, including the one after a
/// trailing separator, are not rows.
pub fn tokenize_rows<'a>(block: &'a str, spec: &EncodingSpec) -> Vec<&'a str> {
    if spec.block_separator.is_empty() {
        return if block.trim().is_empty() {
            Vec::new()
        } else {
            vec![block]
        };
    }

    block
        .split(spec.block_separator.as_str())
        .filter(|row| !row.trim().is_empty())
        .collect()
}

/// Reads the timestamp in field 0 of a raw row.
pub fn extract_timestamp(row: &str, spec: &EncodingSpec) -> Result<Timestamp> {
    let field = if spec.token_separator.is_empty() {
        row
    } else {
        row.split(spec.token_separator.as_str())
            .next()
            .unwrap_or(row)
    };
    parse_timestamp(field)
}

/// Borrows the separators of a `TextBlock` encoding.
pub fn text_block(encoding: &Encoding) -> Result<&EncodingSpec> {
    match encoding {
        Encoding::TextBlock(spec) => Ok(spec),
        Encoding::Other(name) => Err(SosError::UnsupportedEncoding(name.clone())),
    }
}

/// Re-serializes the rows whose timestamp satisfies `predicate`, each one
/// followed by the block separator.
///
/// Rows with an unparseable timestamp are dropped. Encodings other than
/// `TextBlock` cannot be sliced, so the block comes back untouched.
pub fn filter_rows<F>(block: &str, encoding: &Encoding, predicate: F) -> String
where
    F: Fn(Timestamp) -> bool,
{
    let spec = match text_block(encoding) {
        Ok(spec) => spec,
        Err(e) => {
            warn!("{}; returning the datablock unfiltered", e);
            return block.to_string();
        }
    };

    let mut filtered = String::with_capacity(block.len());
    let mut kept = 0usize;
    let mut skipped = 0usize;

    for row in tokenize_rows(block, spec) {
        match extract_timestamp(row, spec) {
            Ok(t) => {
                if predicate(t) {
                    filtered.push_str(row);
                    filtered.push_str(&spec.block_separator);
                    kept += 1;
                }
            }
            Err(e) => {
                warn!("Skipping row: {}", e);
                skipped += 1;
            }
        }
    }

    debug!("Kept {} rows, skipped {} malformed rows", kept, skipped);
    filtered
}

/// A decoded row. `fields[0]` is the raw timestamp text.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub timestamp: Timestamp,
    pub fields: Vec<String>,
}

impl ResultRow {
    pub fn parse(row: &str, spec: &EncodingSpec) -> Result<Self> {
        let timestamp = extract_timestamp(row, spec)?;
        let fields = if spec.token_separator.is_empty() {
            vec![row.trim().to_string()]
        } else {
            row.split(spec.token_separator.as_str())
                .map(|field| field.trim().to_string())
                .collect()
        };
        Ok(Self { timestamp, fields })
    }

    /// Field `index` as a number, honoring the block's decimal separator.
    pub fn number(&self, index: usize, spec: &EncodingSpec) -> Option<f64> {
        let field = self.fields.get(index)?;
        let normalized = if spec.decimal_separator.is_empty() || spec.decimal_separator == "." {
            field.clone()
        } else {
            field.replace(spec.decimal_separator.as_str(), ".")
        };
        normalized.parse().ok()
    }
}

/// Decodes every well-formed row of a block.
pub fn decode_rows(block: &str, spec: &EncodingSpec) -> Vec<ResultRow> {
    tokenize_rows(block, spec)
        .into_iter()
        .filter_map(|row| match ResultRow::parse(row, spec) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Skipping row: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn semicolon_spec() -> EncodingSpec {
        EncodingSpec::new(";", ",", ".")
    }

    fn day(d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(parse_timestamp("2020-01-02 00:00:00").unwrap(), day(2));
        assert_eq!(parse_timestamp("2020-01-02T00:00:00").unwrap(), day(2));
        assert_eq!(parse_timestamp("  2020-01-02T00:00:00\n").unwrap(), day(2));
        assert_eq!(
            parse_timestamp("2020-01-02T00:00:00.250").unwrap(),
            day(2) + chrono::Duration::milliseconds(250)
        );
        assert!(matches!(
            parse_timestamp("02/01/2020"),
            Err(SosError::MalformedRow(_))
        ));
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_tokenize_empty_block() {
        assert!(tokenize_rows("", &semicolon_spec()).is_empty());
        assert!(tokenize_rows(";", &semicolon_spec()).is_empty());
    }

    #[test]
    fn test_tokenize_with_and_without_trailing_separator() {
        let spec = semicolon_spec();
        assert_eq!(tokenize_rows("a,1;b,2;", &spec), vec!["a,1", "b,2"]);
        assert_eq!(tokenize_rows("a,1;b,2", &spec), vec!["a,1", "b,2"]);
    }

    #[test]
    fn test_multi_character_block_separator() {
        let spec = EncodingSpec::default();
        let block = "2020-01-01T00:00:00,1.0@@2020-01-02T00:00:00,2.0@@";
        let rows = tokenize_rows(block, &spec);
        assert_eq!(rows.len(), 2);
        assert_eq!(extract_timestamp(rows[1], &spec).unwrap(), day(2));
    }

    #[test]
    fn test_filter_rows_equals() {
        let encoding = Encoding::TextBlock(semicolon_spec());
        let block = "2020-01-01T00:00:00,1.0;2020-01-02T00:00:00,2.0;2020-01-03T00:00:00,3.0;";
        let filtered = filter_rows(block, &encoding, |t| t == day(2));
        assert_eq!(filtered, "2020-01-02T00:00:00,2.0;");
    }

    #[test]
    fn test_filter_rows_skips_malformed() {
        let encoding = Encoding::TextBlock(semicolon_spec());
        let block = "garbage,0.0;2020-01-01T00:00:00,1.0;2020-01-02T00:00:00,2.0";
        let filtered = filter_rows(block, &encoding, |_| true);
        assert_eq!(
            filtered,
            "2020-01-01T00:00:00,1.0;2020-01-02T00:00:00,2.0;"
        );
    }

    #[test]
    fn test_filter_rows_other_encoding_passes_through() {
        let encoding = Encoding::Other("BinaryBlock".to_string());
        let block = "AAECAw==";
        assert_eq!(filter_rows(block, &encoding, |_| false), block);
    }

    #[test]
    fn test_decode_rows_with_comma_decimal() {
        let spec = EncodingSpec::new("@@", ";", ",");
        let rows = decode_rows("2020-01-01 00:00:00;12,5@@2020-01-02 00:00:00;13,0", &spec);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields.len(), 2);
        assert_eq!(rows[0].number(1, &spec), Some(12.5));
        assert_eq!(rows[1].timestamp, day(2));
    }
}
