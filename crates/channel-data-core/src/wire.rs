//! Persisted / wire row format.
//!
//! A chunk is a JSON array of rows, each row the two-element array
//! `[[index, ...], [value, ...]]`. Raw delimited tokens are typed with
//! [`parse_token`] before they enter a row:
//!
//! - empty tokens and the literal `null` become JSON null;
//! - plain numerics whose JSON text reproduces the token become JSON numbers;
//! - anything else, including `007`, `-999.250` or `1e3`, stays a string so
//!   the original text survives a round trip and null sentinels keep
//!   comparing by text.

use serde_json::{Number, Value};
use snafu::prelude::*;

use crate::{
    error::{ChannelDataResult, InvalidWireFormatSnafu},
    row::ChannelRow,
};

/// Parse a chunk's JSON into rows.
pub fn parse_rows(json: &str) -> ChannelDataResult<Vec<ChannelRow>> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).context(InvalidWireFormatSnafu)
}

/// Serialize rows to the chunk JSON format.
pub fn format_rows(rows: &[ChannelRow]) -> ChannelDataResult<String> {
    serde_json::to_string(rows).context(InvalidWireFormatSnafu)
}

/// Type a raw delimited token as a JSON value.
pub fn parse_token(token: &str) -> Value {
    let token = token.trim();
    if token.is_empty() || token == "null" {
        return Value::Null;
    }
    if is_plain_numeric(token) {
        let number = match token.parse::<i64>() {
            Ok(i) => Some(Number::from(i)),
            Err(_) => token.parse::<f64>().ok().and_then(Number::from_f64),
        };
        if let Some(n) = number
            && n.to_string() == token
        {
            return Value::Number(n);
        }
    }
    Value::String(token.to_string())
}

/// Numeric text that is safe to emit unquoted.
///
/// Rejects leading zeros (`007`, `-01.5`) and non-decimal forms such as
/// `NaN`, `inf` or `1e`, which `f64::from_str` would otherwise accept.
fn is_plain_numeric(token: &str) -> bool {
    let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
    let mut chars = digits.chars();
    match (chars.next(), chars.next()) {
        (Some('0'), Some(c)) if c.is_ascii_digit() => return false,
        (Some(c), _) if c.is_ascii_digit() || c == '.' => {}
        _ => return false,
    }
    digits
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
        && digits.parse::<f64>().is_ok()
}
