//! Value access for `ChannelDataReader`.
//!
//! Typed reads parse the stored cell on demand. They never fail on
//! malformed data: numeric reads return `NaN` (floats) or `0` (integers),
//! boolean reads return `false`. Only addressing a field beyond
//! `field_count` is an error.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use crate::{
    error::ChannelDataResult,
    index_info::index_value,
    reader::ChannelDataReader,
    row::{ChannelRow, is_null_value},
};

impl ChannelDataReader {
    /// Raw value at `ordinal` for the current row; JSON null when the cell is
    /// absent or sliced away.
    pub fn get_value(&self, ordinal: usize) -> ChannelDataResult<Value> {
        self.check_ordinal(ordinal)?;
        Ok(self
            .current_record()
            .and_then(|record| self.cell(record, ordinal))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Whether the value at `ordinal` is null or equals the column's null
    /// sentinel.
    pub fn is_null(&self, ordinal: usize) -> ChannelDataResult<bool> {
        self.check_ordinal(ordinal)?;
        Ok(match self.current_record() {
            Some(record) => self
                .cell(record, ordinal)
                .is_none_or(|v| is_null_value(v, self.null_value_of(record, ordinal))),
            None => true,
        })
    }

    /// Value at `ordinal` as `f64`; `NaN` if it is not numeric.
    pub fn get_double(&self, ordinal: usize) -> ChannelDataResult<f64> {
        Ok(match self.get_value(ordinal)? {
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        })
    }

    /// Value at `ordinal` as `i64`; `0` if it is not numeric. Fractions are
    /// truncated.
    pub fn get_int64(&self, ordinal: usize) -> ChannelDataResult<i64> {
        let value = self.get_value(ordinal)?;
        if let Some(i) = value.as_i64() {
            return Ok(i);
        }
        let f = self.get_double(ordinal)?;
        Ok(if f.is_finite() { f as i64 } else { 0 })
    }

    /// Value at `ordinal` as `i32`; `0` if it is not numeric or overflows.
    pub fn get_int(&self, ordinal: usize) -> ChannelDataResult<i32> {
        Ok(i32::try_from(self.get_int64(ordinal)?).unwrap_or_default())
    }

    /// Value at `ordinal` as `bool`; `false` unless it reads as true.
    pub fn get_bool(&self, ordinal: usize) -> ChannelDataResult<bool> {
        Ok(match self.get_value(ordinal)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1"),
            _ => false,
        })
    }

    /// Value at `ordinal` as text; `None` for null cells.
    pub fn get_string(&self, ordinal: usize) -> ChannelDataResult<Option<String>> {
        Ok(match self.get_value(ordinal)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    /// Value at `ordinal` as a timestamp.
    ///
    /// Strings are parsed as RFC 3339; numbers are epoch microseconds.
    pub fn get_date_time(&self, ordinal: usize) -> ChannelDataResult<Option<DateTime<FixedOffset>>> {
        Ok(match self.get_value(ordinal)? {
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim()).ok(),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .and_then(|f| DateTime::from_timestamp_micros(f as i64))
                .map(|dt| dt.fixed_offset()),
            _ => None,
        })
    }

    /// Comparable value of index column `index` on the current row
    /// (epoch microseconds for time indexes).
    pub fn get_index_value(&self, index: usize) -> Option<f64> {
        let info = self.indices.get(index)?;
        let record = self.current_record()?;
        index_value(record.row.indexes.get(index)?, info.is_time_index)
    }

    /// Overwrite the value at `ordinal` on the current row.
    ///
    /// Does nothing when the cursor is not on a row. A channel the row's own
    /// layout lacks is added by first projecting the row into the working
    /// column order.
    pub fn set_value(&mut self, ordinal: usize, value: Value) -> ChannelDataResult<()> {
        self.check_ordinal(ordinal)?;
        let Some(position) = self.position() else {
            return Ok(());
        };

        let depth = self.depth();
        let working = Arc::clone(&self.working);
        let record = &mut self.records[position];

        if ordinal < depth {
            let indexes = &mut record.row.indexes;
            if indexes.len() <= ordinal {
                indexes.resize(ordinal + 1, Value::Null);
            }
            indexes[ordinal] = value;
        } else {
            let mnemonic = &working.mnemonics()[ordinal - depth];
            let slot = match record.layout.position(mnemonic) {
                Some(slot) => slot,
                None => {
                    record.project_into(&working);
                    ordinal - depth
                }
            };
            record.row.set_value(slot, value);
        }

        self.invalidate_ranges();
        Ok(())
    }

    /// Current row projected into the working column order.
    pub fn current_row(&self) -> Option<ChannelRow> {
        self.current_record().map(|record| self.project_record(record))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::{error::ErrorCode, reader::test_util::depth_reader};

    #[test]
    fn typed_reads_coerce_or_fall_back() {
        let mut reader = depth_reader(
            &["NUM", "TXT", "BAD", "FLAG", "TS"],
            vec![(
                1.0,
                vec![
                    json!(2.5),
                    json!(" 7 "),
                    json!("n/a"),
                    json!("TRUE"),
                    json!("2020-01-01T00:00:00+02:00"),
                ],
            )],
        );
        assert!(reader.read());

        assert_eq!(reader.get_double(1).unwrap(), 2.5);
        assert_eq!(reader.get_int(1).unwrap(), 2);
        assert_eq!(reader.get_double(2).unwrap(), 7.0);
        assert_eq!(reader.get_int64(2).unwrap(), 7);
        assert!(reader.get_double(3).unwrap().is_nan());
        assert_eq!(reader.get_int(3).unwrap(), 0);
        assert!(!reader.get_bool(3).unwrap());
        assert!(reader.get_bool(4).unwrap());
        assert_eq!(reader.get_string(3).unwrap().as_deref(), Some("n/a"));

        let ts = reader.get_date_time(5).unwrap().unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 7200);
        assert_eq!(reader.get_index_value(0), Some(1.0));
    }

    #[test]
    fn reading_beyond_field_count_is_misuse() {
        let mut reader = depth_reader(&["A"], vec![(1.0, vec![json!(1)])]);
        assert!(reader.read());
        let err = reader.get_value(2).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrdinalOutOfRange);
    }

    #[test]
    fn null_checks_use_sentinel_and_sparse_tail() {
        let mut reader = depth_reader(&["A", "B"], vec![(1.0, vec![json!(-999.25)])]);
        assert!(reader.read());
        assert!(reader.is_null(1).unwrap());
        assert!(reader.is_null(2).unwrap());
        assert_eq!(reader.get_value(2).unwrap(), Value::Null);
    }

    #[test]
    fn set_value_updates_row_and_ranges() {
        let mut reader = depth_reader(
            &["A"],
            vec![(1.0, vec![Value::Null]), (2.0, vec![json!(5)])],
        );
        assert_eq!(reader.get_channel_index_range(1).start, Some(2.0));
        assert!(reader.read());
        reader.set_value(1, json!(9)).unwrap();
        assert_eq!(reader.get_double(1).unwrap(), 9.0);
        assert_eq!(reader.get_channel_index_range(1).start, Some(1.0));
    }
}
