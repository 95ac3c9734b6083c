//! Per-index-column metadata and index value conversion.
//!
//! Column 0 of every row is the primary index. Its direction and time flag
//! govern sort order, chunk arithmetic and how raw cells are turned into
//! comparable `f64` values:
//!
//! - depth-like indexes are read as plain numbers;
//! - time indexes are RFC 3339 timestamps, converted to microseconds since
//!   the Unix epoch so they compare monotonically.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::range::Range;

/// Metadata for one index column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelIndexInfo {
    /// Index mnemonic (case-insensitive).
    pub mnemonic: String,
    /// Unit of measure.
    pub unit: String,
    /// Data type tag as supplied by the caller.
    pub data_type: String,
    /// Null sentinel for this index column.
    #[serde(default)]
    pub null_value: Option<String>,
    /// Whether index values grow along the record.
    pub increasing: bool,
    /// Whether index values are timestamps.
    pub is_time_index: bool,
    /// Cached first index value, in scan order.
    #[serde(default)]
    pub start: Option<f64>,
    /// Cached last index value, in scan order.
    #[serde(default)]
    pub end: Option<f64>,
}

impl ChannelIndexInfo {
    /// New index column with no cached range.
    pub fn new(
        mnemonic: impl Into<String>,
        unit: impl Into<String>,
        data_type: impl Into<String>,
        increasing: bool,
        is_time_index: bool,
    ) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            unit: unit.into(),
            data_type: data_type.into(),
            null_value: None,
            increasing,
            is_time_index,
            start: None,
            end: None,
        }
    }

    /// Set the null sentinel.
    pub fn with_null_value(mut self, null_value: Option<String>) -> Self {
        self.null_value = null_value;
        self
    }

    /// Cached `[start, end]` of this index.
    pub fn range(&self) -> Range<f64> {
        Range::new(self.start, self.end)
    }

    /// Comparable value of a raw index cell for this column.
    pub fn value_of(&self, cell: &Value) -> Option<f64> {
        index_value(cell, self.is_time_index)
    }
}

/// Comparable `f64` for an index cell.
///
/// Time cells yield epoch microseconds; numeric cells (or numeric strings)
/// yield their value. Anything else is `None`.
pub fn index_value(cell: &Value, is_time: bool) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if is_time => parse_time_micros(s.trim()).map(|(micros, _)| micros),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parse an RFC 3339 timestamp into `(epoch micros, offset micros)`.
pub(crate) fn parse_time_micros(token: &str) -> Option<(f64, f64)> {
    let parsed = DateTime::parse_from_rfc3339(token).ok()?;
    let offset_secs = parsed.offset().local_minus_utc();
    Some((
        parsed.timestamp_micros() as f64,
        f64::from(offset_secs) * 1_000_000.0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_cells_and_strings() {
        assert_eq!(index_value(&json!(12.5), false), Some(12.5));
        assert_eq!(index_value(&json!(" 7 "), false), Some(7.0));
        assert_eq!(index_value(&json!("x"), false), None);
        assert_eq!(index_value(&Value::Null, false), None);
    }

    #[test]
    fn time_cells_are_epoch_micros() {
        let info = ChannelIndexInfo::new("TIME", "s", "date time", true, true);
        assert_eq!(
            info.value_of(&json!("1970-01-01T00:00:02Z")),
            Some(2_000_000.0)
        );
        assert_eq!(info.value_of(&json!("yesterday")), None);
    }

    #[test]
    fn range_reflects_cached_bounds() {
        let mut info = ChannelIndexInfo::new("MD", "m", "double", true, false);
        assert!(info.range().is_empty());
        info.start = Some(1.0);
        info.end = Some(4.0);
        assert!(info.range().contains(2.0, info.increasing));
    }
}
