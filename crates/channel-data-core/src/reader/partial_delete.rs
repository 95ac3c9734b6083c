//! Partial deletion of channels and index ranges.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use serde_json::Value;

use crate::{
    index_info::index_value,
    range::Range,
    reader::ChannelDataReader,
    row::{ChannelLayout, is_null_value, mnemonic_key},
};

/// Channels to drop entirely and per-channel index ranges to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialDeleteRequest {
    deleted: HashSet<String>,
    ranges: HashMap<String, Range<f64>>,
}

impl PartialDeleteRequest {
    /// Empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop `mnemonic` from every row and from the channel lists.
    pub fn delete_channel(mut self, mnemonic: &str) -> Self {
        self.deleted.insert(mnemonic_key(mnemonic));
        self
    }

    /// Clear `mnemonic`'s values at primary index values inside `range`.
    ///
    /// A range with both bounds may be given in either numeric order; it is
    /// oriented to the reader's index direction when applied. A range with
    /// an open bound is read in index direction.
    pub fn delete_range(mut self, mnemonic: &str, range: Range<f64>) -> Self {
        self.ranges.insert(mnemonic_key(mnemonic), range);
        self
    }

    /// True if `mnemonic` is deleted entirely.
    pub fn is_deleted(&self, mnemonic: &str) -> bool {
        self.deleted.contains(&mnemonic_key(mnemonic))
    }

    /// Delete range for `mnemonic`, if any.
    pub fn range_for(&self, mnemonic: &str) -> Option<&Range<f64>> {
        self.ranges.get(&mnemonic_key(mnemonic))
    }

    /// True if the request deletes nothing.
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.ranges.is_empty()
    }
}

/// Row layouts already stripped of a given set of deleted channels.
#[derive(Debug, Clone)]
pub(crate) struct DeleteCache {
    deleted: HashSet<String>,
    layouts: Vec<(Arc<ChannelLayout>, Arc<ChannelLayout>)>,
}

impl DeleteCache {
    fn stripped(&mut self, layout: &Arc<ChannelLayout>) -> Arc<ChannelLayout> {
        if let Some((_, stripped)) = self.layouts.iter().find(|(from, _)| Arc::ptr_eq(from, layout)) {
            return Arc::clone(stripped);
        }
        let stripped = Arc::new(layout.without(&self.deleted));
        self.layouts.push((Arc::clone(layout), Arc::clone(&stripped)));
        stripped
    }
}

impl ChannelDataReader {
    /// Apply `request` to the current row.
    ///
    /// Deleted channels leave the row and the reader's channel lists. A
    /// remaining non-null value inside its channel's delete range becomes
    /// null; every other non-null value widens that channel's entry in
    /// `remaining`.
    pub fn partial_delete_record(
        &mut self,
        request: &PartialDeleteRequest,
        remaining: &mut BTreeMap<String, Range<f64>>,
    ) {
        let Some(position) = self.position() else {
            return;
        };

        self.drop_deleted_channels(request);

        let increasing = self.is_increasing();
        let is_time = self.is_time_index();
        let target = match self.delete_cache.as_mut() {
            Some(cache) => cache.stripped(&self.records[position].layout),
            None => Arc::clone(&self.records[position].layout),
        };

        let record = &mut self.records[position];
        let index = record
            .row
            .indexes
            .first()
            .and_then(|cell| index_value(cell, is_time));

        let values = target
            .mnemonics()
            .iter()
            .enumerate()
            .map(|(k, mnemonic)| {
                let value = record.value_of(mnemonic).cloned().unwrap_or(Value::Null);
                if is_null_value(&value, target.null_value(k)) {
                    return value;
                }
                let Some(index) = index else {
                    return value;
                };
                if request
                    .range_for(mnemonic)
                    .is_some_and(|range| range.oriented(increasing).contains(index, increasing))
                {
                    return Value::Null;
                }
                remaining
                    .entry(mnemonic.clone())
                    .or_insert_with(Range::empty)
                    .include(index, increasing);
                value
            })
            .collect();

        record.row.values = values;
        record.layout = target;
        self.invalidate_ranges();
    }

    /// Apply `request` to every row and return, per channel, the primary
    /// index range still holding values.
    pub fn partial_delete(&mut self, request: &PartialDeleteRequest) -> BTreeMap<String, Range<f64>> {
        let mut remaining = BTreeMap::new();
        self.reset();
        while self.read() {
            self.partial_delete_record(request, &mut remaining);
        }
        self.reset();
        remaining
    }

    /// Remove the request's deleted channels from the channel lists and
    /// prime the stripped-layout cache, once per distinct request.
    fn drop_deleted_channels(&mut self, request: &PartialDeleteRequest) {
        if request.deleted.is_empty() {
            self.delete_cache = None;
            return;
        }
        if self
            .delete_cache
            .as_ref()
            .is_some_and(|cache| cache.deleted == request.deleted)
        {
            return;
        }

        self.original = Arc::new(self.original.without(&request.deleted));
        self.working = Arc::new(self.working.without(&request.deleted));
        self.slice_ordinals = None;
        self.active_ordinals = None;
        self.delete_cache = Some(DeleteCache {
            deleted: request.deleted.clone(),
            layouts: Vec::new(),
        });
        self.invalidate_ranges();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        reader::test_util::{depth_index, depth_reader, layout},
        row::ChannelRow,
    };

    fn reader() -> ChannelDataReader {
        depth_reader(
            &["A", "C", "D"],
            (1..=30)
                .map(|i| (f64::from(i), vec![json!(i), json!(i * 100), json!(-i)]))
                .collect(),
        )
    }

    #[test]
    fn range_delete_nulls_only_that_channel_inside_the_range() {
        let mut reader = reader();
        let request = PartialDeleteRequest::new().delete_range("c", Range::new(Some(10.0), Some(20.0)));
        let remaining = reader.partial_delete(&request);

        for row in reader.rows() {
            let index = row.indexes[0].as_f64().unwrap();
            let c = &row.values[1];
            if (10.0..=20.0).contains(&index) {
                assert_eq!(c, &Value::Null);
            } else {
                assert_eq!(c, &json!(index as i64 * 100));
            }
            assert_eq!(row.values[0], json!(index as i64));
        }

        let c = remaining["C"];
        assert_eq!((c.start, c.end), (Some(1.0), Some(30.0)));
        assert!(remaining.contains_key("A"));
    }

    #[test]
    fn range_delete_on_decreasing_index_accepts_either_bound_order() {
        for range in [
            Range::new(Some(10.0), Some(20.0)),
            Range::new(Some(20.0), Some(10.0)),
        ] {
            let mut reader = ChannelDataReader::new(
                (1..=30)
                    .map(|i| ChannelRow::new(vec![json!(i)], vec![json!(i)]))
                    .collect(),
                layout(&["A"]),
                "eml://log/up",
            )
            .with_indices(vec![depth_index(false)], true, true);

            let remaining = reader.partial_delete(&PartialDeleteRequest::new().delete_range("A", range));

            let rows = reader.rows();
            assert_eq!(rows[0].indexes[0], json!(30));
            for row in rows {
                let index = row.indexes[0].as_i64().unwrap();
                if (10..=20).contains(&index) {
                    assert!(row.values[0].is_null());
                } else {
                    assert_eq!(row.values[0], json!(index));
                }
            }
            let a = remaining["A"];
            assert_eq!((a.start, a.end), (Some(30.0), Some(1.0)));
        }
    }

    #[test]
    fn deleted_channels_leave_rows_and_lists() {
        let mut reader = reader();
        let request = PartialDeleteRequest::new().delete_channel("D");
        let remaining = reader.partial_delete(&request);

        assert_eq!(reader.mnemonics(), &["A", "C"]);
        assert_eq!(reader.original_layout().mnemonics(), &["A", "C"]);
        assert!(!remaining.contains_key("D"));
        assert!(reader.rows().iter().all(|r| r.values.len() == 2));
        assert_eq!(reader.get_ordinal("D"), None);
    }

    #[test]
    fn fully_cleared_channel_has_no_remaining_range() {
        let mut reader = reader();
        let request = PartialDeleteRequest::new().delete_range("A", Range::new(Some(0.0), Some(100.0)));
        let remaining = reader.partial_delete(&request);
        assert!(!remaining.contains_key("A"));
        assert!(reader.get_channel_index_range(1).is_empty());
    }

    #[test]
    fn record_delete_without_cursor_is_a_no_op() {
        let mut reader = reader();
        let mut remaining = BTreeMap::new();
        reader.partial_delete_record(&PartialDeleteRequest::new().delete_channel("A"), &mut remaining);
        assert!(remaining.is_empty());
        assert_eq!(reader.mnemonics().len(), 3);
    }
}
