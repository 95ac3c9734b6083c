//! Delimited text row tokenizer.
//!
//! Incoming channel data often arrives as delimiter-separated rows: the index
//! values first, then one token per channel. The tokenizer takes a fast path
//! (plain `split`) when the row contains no quotes, and falls back to a
//! quote-aware reader otherwise. Embedded newlines are normalized to spaces
//! before tokenizing.
//!
//! A row must carry exactly the expected number of tokens; one extra blank
//! trailing token (a trailing delimiter) is tolerated. Anything else is
//! handled according to the configured [`InvalidRowPolicy`].

use log::warn;

use crate::{
    error::{ChannelDataError, ChannelDataResult},
    settings::{ChannelDataSettings, InvalidRowPolicy},
};

/// Splits raw rows into tokens and enforces the row shape.
#[derive(Debug, Clone)]
pub struct DelimitedRowParser {
    delimiter: String,
    expected_tokens: usize,
    policy: InvalidRowPolicy,
    warnings: Vec<String>,
}

impl DelimitedRowParser {
    /// Parser for rows of `expected_tokens` tokens.
    pub fn new(
        delimiter: impl Into<String>,
        expected_tokens: usize,
        policy: InvalidRowPolicy,
    ) -> Self {
        Self {
            delimiter: delimiter.into(),
            expected_tokens,
            policy,
            warnings: Vec::new(),
        }
    }

    /// Parser using the default delimiter and row policy from `settings`.
    pub fn from_settings(settings: &ChannelDataSettings, expected_tokens: usize) -> Self {
        Self::new(
            settings.default_delimiter.clone(),
            expected_tokens,
            settings.invalid_row_policy,
        )
    }

    /// Override the delimiter, e.g. when a payload names its own.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Delimiter in use.
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Number of tokens each row must carry.
    pub fn expected_tokens(&self) -> usize {
        self.expected_tokens
    }

    /// Validation warnings collected under the `Warn` policy.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Drain collected warnings.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Tokenize and validate one row.
    ///
    /// Returns an empty vector when the row has the wrong shape and the
    /// policy is `Ignore` or `Warn`.
    pub fn parse_row(&mut self, row: &str) -> ChannelDataResult<Vec<String>> {
        let mut tokens = self.tokenize(row);

        if tokens.len() == self.expected_tokens + 1
            && tokens.last().is_some_and(|t| t.trim().is_empty())
        {
            tokens.pop();
        }

        if tokens.len() == self.expected_tokens {
            return Ok(tokens);
        }

        match self.policy {
            InvalidRowPolicy::Ignore => Ok(Vec::new()),
            InvalidRowPolicy::Warn => {
                let message = format!(
                    "Invalid row data count: expected {} tokens, found {} in row {row:?}",
                    self.expected_tokens,
                    tokens.len()
                );
                warn!("{message}");
                self.warnings.push(message);
                Ok(Vec::new())
            }
            InvalidRowPolicy::Error => Err(ChannelDataError::InvalidRowDataCount {
                expected: self.expected_tokens,
                found: tokens.len(),
                row: row.to_string(),
            }),
        }
    }

    /// Split a row into raw tokens without validating its shape.
    pub fn tokenize(&self, row: &str) -> Vec<String> {
        let row = normalize_newlines(row);

        if !row.contains('"') {
            return row.split(self.delimiter.as_str()).map(str::to_string).collect();
        }

        match self.delimiter.as_bytes() {
            [byte] => split_quoted_csv(&row, *byte),
            _ => split_quoted(&row, &self.delimiter),
        }
    }
}

fn normalize_newlines(row: &str) -> String {
    row.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// Quote-aware split for single-byte delimiters.
fn split_quoted_csv(row: &str, delimiter: u8) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(row.as_bytes());

    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(str::to_string).collect(),
        // Unbalanced quotes and the like: fall back to the quote-aware split.
        _ => split_quoted(row, &String::from_utf8_lossy(&[delimiter])),
    }
}

/// Quote-aware split for multi-character delimiters.
///
/// Double quotes group text; a doubled quote inside a quoted field is a
/// literal quote.
fn split_quoted(row: &str, delimiter: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut rest = row;

    while let Some(c) = rest.chars().next() {
        if c == '"' {
            if in_quotes && rest[1..].starts_with('"') {
                current.push('"');
                rest = &rest[2..];
                continue;
            }
            in_quotes = !in_quotes;
            rest = &rest[1..];
        } else if !in_quotes && rest.starts_with(delimiter) {
            tokens.push(std::mem::take(&mut current));
            rest = &rest[delimiter.len()..];
        } else {
            current.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }

    tokens.push(current);
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn fast_split_without_quotes() {
        let mut p = DelimitedRowParser::new(",", 3, InvalidRowPolicy::Error);
        assert_eq!(p.parse_row("1,2,3").unwrap(), vec!["1", "2", "3"]);
    }

    #[test]
    fn trailing_blank_token_is_tolerated() {
        let mut p = DelimitedRowParser::new(",", 3, InvalidRowPolicy::Error);
        assert_eq!(p.parse_row("1,2,3,").unwrap(), vec!["1", "2", "3"]);
    }

    #[test]
    fn quoted_fields_keep_delimiters() {
        let mut p = DelimitedRowParser::new(",", 3, InvalidRowPolicy::Error);
        assert_eq!(
            p.parse_row("1,\"a,b\",3").unwrap(),
            vec!["1", "a,b", "3"]
        );
    }

    #[test]
    fn embedded_newlines_become_spaces() {
        let p = DelimitedRowParser::new(",", 2, InvalidRowPolicy::Error);
        assert_eq!(p.tokenize("1,\"x\ny\""), vec!["1", "x y"]);
    }

    #[test]
    fn multi_char_delimiter_with_quotes() {
        let p = DelimitedRowParser::new("||", 3, InvalidRowPolicy::Error);
        assert_eq!(
            p.tokenize("1||\"a||\"\"b\"\"\"||3"),
            vec!["1", "a||\"b\"", "3"]
        );
        assert_eq!(p.tokenize("1||2||3"), vec!["1", "2", "3"]);
    }

    #[test]
    fn ignore_policy_returns_empty_row() {
        let mut p = DelimitedRowParser::new(",", 3, InvalidRowPolicy::Ignore);
        assert!(p.parse_row("1,2").unwrap().is_empty());
        assert!(p.warnings().is_empty());
    }

    #[test]
    fn warn_policy_records_warning() {
        let mut p = DelimitedRowParser::new(",", 3, InvalidRowPolicy::Warn);
        assert!(p.parse_row("1,2,3,4,5").unwrap().is_empty());
        assert_eq!(p.warnings().len(), 1);
        assert_eq!(p.take_warnings().len(), 1);
        assert!(p.warnings().is_empty());
    }

    #[test]
    fn error_policy_fails_with_row_text() {
        let mut p = DelimitedRowParser::new(";", 3, InvalidRowPolicy::Error);
        let err = p.parse_row("1;2").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRowDataCount);
        assert!(err.to_string().contains("1;2"));
    }
}
