//! The channel data engine.
//!
//! A [`ChannelDataReader`] owns the rows of one chunk (or of one merge of two
//! chunks) and is a stateful cursor over them. On top of the cursor it
//! provides:
//!
//! - column addressing over an absolute ordinal space: `[0, depth)` are the
//!   index columns, `[depth, field_count)` the working channels;
//! - a stable sort by primary index (`sort`);
//! - memoized per-column ranges (`get_channel_index_range`);
//! - channel slicing (`slice`);
//! - the three-way merge state machine (`merge_record`, `merge_sequence`);
//! - bounded, paginated extraction (`get_data`);
//! - partial deletion (`partial_delete_record`, `partial_delete`).
//!
//! The reader keeps two channel lists. The *original* list is the immutable
//! baseline the rows were loaded with; the *working* list is what callers
//! see and is narrowed by slicing or widened by merge reconciliation. Every
//! row additionally points at the layout its own values follow, so rows
//! loaded from different chunks may use different column orders.
//!
//! Any structural mutation (append, slice, merge, sort, delete) clears the
//! memoized ranges before they are read again. A reader is not meant to be
//! shared: one reader serves one merge or one extraction at a time.

mod cursor;
mod extract;
mod merge;
mod partial_delete;
mod slice;
mod sort;
mod values;

pub use extract::ChannelDataPage;
pub use merge::merge_sequence;
pub use partial_delete::PartialDeleteRequest;

use std::{collections::HashMap, sync::Arc};

use log::warn;
use roaring::RoaringBitmap;
use serde_json::Value;

use partial_delete::DeleteCache;

use crate::{
    error::{ChannelDataResult, OrdinalOutOfRangeSnafu},
    index_info::{ChannelIndexInfo, index_value},
    range::Range,
    row::{ChannelLayout, ChannelRow, Record, is_null_value, mnemonic_key},
    wire,
};

/// Stateful cursor and engine over the rows of one chunk.
#[derive(Debug, Clone)]
pub struct ChannelDataReader {
    uri: String,
    records: Vec<Record>,
    /// Row served by value reads once the cursor is past the end or the
    /// reader has been closed.
    last_record: Option<Record>,
    indices: Vec<ChannelIndexInfo>,
    original: Arc<ChannelLayout>,
    working: Arc<ChannelLayout>,
    current: Option<usize>,
    closed: bool,
    /// Storage ordinals that may be read; `None` means all of them.
    active_ordinals: Option<RoaringBitmap>,
    /// Full-row position -> storage ordinal in the original layout.
    slice_ordinals: Option<Vec<usize>>,
    range_cache: HashMap<usize, Range<f64>>,
    chunk_range: Option<Range<f64>>,
    settings_merged: bool,
    delete_cache: Option<DeleteCache>,
}

impl ChannelDataReader {
    /// Reader over `rows` laid out according to `layout`, without index
    /// metadata. Attach indexes with [`with_indices`](Self::with_indices).
    pub fn new(rows: Vec<ChannelRow>, layout: ChannelLayout, uri: impl Into<String>) -> Self {
        let layout = Arc::new(layout);
        let records = rows
            .into_iter()
            .map(|row| Record::new(row, Arc::clone(&layout)))
            .collect();
        Self::from_records(records, layout, uri.into())
    }

    /// Reader over a persisted chunk's JSON.
    pub fn from_json(
        json: &str,
        layout: ChannelLayout,
        indices: Vec<ChannelIndexInfo>,
        uri: impl Into<String>,
    ) -> ChannelDataResult<Self> {
        let rows = wire::parse_rows(json)?;
        Ok(Self::new(rows, layout, uri).with_indices(indices, true, false))
    }

    pub(crate) fn from_records(
        records: Vec<Record>,
        layout: Arc<ChannelLayout>,
        uri: String,
    ) -> Self {
        Self {
            uri,
            records,
            last_record: None,
            indices: Vec::new(),
            working: Arc::clone(&layout),
            original: layout,
            current: None,
            closed: false,
            active_ordinals: None,
            slice_ordinals: None,
            range_cache: HashMap::new(),
            chunk_range: None,
            settings_merged: false,
            delete_cache: None,
        }
    }

    /// Attach index metadata, optionally sorting the rows and caching each
    /// index column's `[start, end]`.
    ///
    /// Without any index column the rows cannot be ordered or ranged; this
    /// is logged and the reader is left with no rows.
    pub fn with_indices(
        mut self,
        indices: Vec<ChannelIndexInfo>,
        calculate_ranges: bool,
        sort: bool,
    ) -> Self {
        if indices.is_empty() {
            warn!(
                "Channel data for {} has no index columns; ignoring {} rows",
                self.uri,
                self.records.len()
            );
            self.records.clear();
        }

        self.indices = indices;
        self.invalidate_ranges();

        if sort {
            self.sort(false);
        }
        if calculate_ranges {
            self.calculate_index_ranges();
        }
        self
    }

    /// URI of the entity the rows belong to.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Index column metadata.
    pub fn indices(&self) -> &[ChannelIndexInfo] {
        &self.indices
    }

    /// Number of index columns.
    pub fn depth(&self) -> usize {
        self.indices.len()
    }

    /// Number of addressable fields: index columns plus working channels.
    pub fn field_count(&self) -> usize {
        self.depth() + self.working.len()
    }

    /// Working channel mnemonics (after any slice or merge reconciliation).
    pub fn mnemonics(&self) -> &[String] {
        self.working.mnemonics()
    }

    /// Working channel units.
    pub fn units(&self) -> &[String] {
        self.working.units()
    }

    /// Working channel data types.
    pub fn data_types(&self) -> &[String] {
        self.working.data_types()
    }

    /// Working channel null sentinels.
    pub fn null_values(&self) -> &[String] {
        self.working.null_values()
    }

    /// Index mnemonics followed by working channel mnemonics.
    pub fn all_mnemonics(&self) -> Vec<String> {
        self.indices
            .iter()
            .map(|i| i.mnemonic.clone())
            .chain(self.working.mnemonics().iter().cloned())
            .collect()
    }

    /// The working layout.
    pub fn layout(&self) -> Arc<ChannelLayout> {
        Arc::clone(&self.working)
    }

    /// The baseline layout the rows were loaded with.
    pub fn original_layout(&self) -> Arc<ChannelLayout> {
        Arc::clone(&self.original)
    }

    /// Whether the primary index increases along the rows.
    pub fn is_increasing(&self) -> bool {
        self.indices.first().is_none_or(|i| i.increasing)
    }

    /// Whether the primary index holds timestamps.
    pub fn is_time_index(&self) -> bool {
        self.indices.first().is_some_and(|i| i.is_time_index)
    }

    /// Ordinal of `name` among index and working channel mnemonics.
    pub fn get_ordinal(&self, name: &str) -> Option<usize> {
        let key = mnemonic_key(name);
        self.indices
            .iter()
            .position(|i| mnemonic_key(&i.mnemonic) == key)
            .or_else(|| self.working.position(name).map(|p| self.depth() + p))
    }

    /// Mnemonic at `ordinal`.
    pub fn get_name(&self, ordinal: usize) -> ChannelDataResult<&str> {
        self.check_ordinal(ordinal)?;
        let depth = self.depth();
        Ok(if ordinal < depth {
            &self.indices[ordinal].mnemonic
        } else {
            &self.working.mnemonics()[ordinal - depth]
        })
    }

    /// Null sentinel of the column at `ordinal`.
    pub fn null_value_at(&self, ordinal: usize) -> &str {
        let depth = self.depth();
        if ordinal < depth {
            self.indices[ordinal].null_value.as_deref().unwrap_or("")
        } else {
            self.working.null_value(ordinal - depth)
        }
    }

    /// Whether channel settings have been reconciled for the current chunk.
    pub fn settings_merged(&self) -> bool {
        self.settings_merged
    }

    /// The chunk window established by the last merge, if any.
    pub fn chunk_range(&self) -> Option<Range<f64>> {
        self.chunk_range
    }

    /// `[start, end]` of primary index values for rows where the column at
    /// `ordinal` is non-null. Memoized until the next structural change.
    ///
    /// The forward and backward scans run as two converging pointers, so a
    /// channel populated near both ends resolves without a full pass.
    pub fn get_channel_index_range(&mut self, ordinal: usize) -> Range<f64> {
        if let Some(range) = self.range_cache.get(&ordinal) {
            return *range;
        }
        let range = self.scan_range(ordinal, 0);
        self.range_cache.insert(ordinal, range);
        range
    }

    /// `[start, end]` of index column `index`'s own values, in row order.
    pub fn get_index_range(&mut self, index: usize) -> Range<f64> {
        if index == 0 {
            return self.get_channel_index_range(0);
        }
        self.scan_range(index, index)
    }

    /// Rows projected into the working column order.
    pub fn rows(&self) -> Vec<ChannelRow> {
        self.records
            .iter()
            .map(|record| self.project_record(record))
            .collect()
    }

    /// Rows serialized in the chunk wire format.
    pub fn to_json(&self) -> ChannelDataResult<String> {
        wire::format_rows(&self.rows())
    }

    fn scan_range(&self, ordinal: usize, value_column: usize) -> Range<f64> {
        if ordinal >= self.field_count() || self.records.is_empty() {
            return Range::empty();
        }

        let is_time = self.indices.get(value_column).is_some_and(|i| i.is_time_index);
        let value_at = |record: &Record| -> Option<f64> {
            self.cell(record, ordinal)
                .filter(|v| !is_null_value(v, self.null_value_of(record, ordinal)))?;
            record
                .row
                .indexes
                .get(value_column)
                .and_then(|cell| index_value(cell, is_time))
        };

        let mut start = None;
        let mut end = None;
        let mut front = 0;
        let mut back = self.records.len();

        while front < back && (start.is_none() || end.is_none()) {
            if start.is_none() {
                start = value_at(&self.records[front]);
                front += 1;
            }
            if end.is_none() && front <= back {
                back -= 1;
                end = value_at(&self.records[back]);
            }
        }

        // A single populated row between the pointers yields both bounds.
        match (start, end) {
            (Some(s), None) => Range::new(Some(s), Some(s)),
            (None, Some(e)) => Range::new(Some(e), Some(e)),
            _ => Range::new(start, end),
        }
    }

    fn calculate_index_ranges(&mut self) {
        for i in 0..self.indices.len() {
            let range = self.get_index_range(i);
            self.indices[i].start = range.start;
            self.indices[i].end = range.end;
        }
    }

    pub(crate) fn invalidate_ranges(&mut self) {
        self.range_cache.clear();
    }

    fn check_ordinal(&self, ordinal: usize) -> ChannelDataResult<()> {
        let field_count = self.field_count();
        snafu::ensure!(
            ordinal < field_count,
            OrdinalOutOfRangeSnafu {
                ordinal,
                field_count
            }
        );
        Ok(())
    }

    /// Cell of `record` at working `ordinal`, honoring slice gating.
    pub(crate) fn cell<'a>(&self, record: &'a Record, ordinal: usize) -> Option<&'a Value> {
        let depth = self.depth();
        if ordinal < depth {
            return record.row.indexes.get(ordinal);
        }

        let storage = self
            .slice_ordinals
            .as_ref()
            .and_then(|s| s.get(ordinal).copied())
            .unwrap_or(ordinal);
        let gated = self
            .active_ordinals
            .as_ref()
            .is_some_and(|active| !u32::try_from(storage).is_ok_and(|s| active.contains(s)));
        if gated {
            return None;
        }

        if Arc::ptr_eq(&record.layout, &self.working) {
            return record.row.value(ordinal - depth);
        }
        if self.slice_ordinals.is_some() && Arc::ptr_eq(&record.layout, &self.original) {
            return record.row.value(storage - depth);
        }
        let mnemonic = self.working.mnemonics().get(ordinal - depth)?;
        record.value_of(mnemonic)
    }

    /// Null sentinel for working `ordinal` as stored in `record`.
    pub(crate) fn null_value_of<'a>(&'a self, record: &'a Record, ordinal: usize) -> &'a str {
        let depth = self.depth();
        if ordinal < depth {
            return self.null_value_at(ordinal);
        }
        self.working
            .mnemonics()
            .get(ordinal - depth)
            .and_then(|m| record.layout.position(m))
            .map_or_else(|| self.null_value_at(ordinal), |p| record.layout.null_value(p))
    }

    fn project_record(&self, record: &Record) -> ChannelRow {
        let values = if Arc::ptr_eq(&record.layout, &self.working) {
            record.row.values.clone()
        } else {
            self.working.project(&record.row.values, &record.layout)
        };
        ChannelRow::new(record.row.indexes.clone(), values)
    }
}


#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::test_util::*;
    use super::*;

    #[test]
    fn ordinal_space_covers_indexes_then_channels() {
        let reader = depth_reader(&["GR", "ROP"], vec![(1.0, vec![json!(1), json!(2)])]);
        assert_eq!(reader.depth(), 1);
        assert_eq!(reader.field_count(), 3);
        assert_eq!(reader.get_ordinal("md"), Some(0));
        assert_eq!(reader.get_ordinal("rop"), Some(2));
        assert_eq!(reader.get_ordinal("dt"), None);
        assert_eq!(reader.get_name(1).unwrap(), "GR");
        assert!(reader.get_name(3).is_err());
        assert_eq!(reader.all_mnemonics(), vec!["MD", "GR", "ROP"]);
    }

    #[test]
    fn sparse_channel_range_covers_populated_rows() {
        let rows = (1..=10)
            .map(|i| {
                let c = if (3..=7).contains(&i) { json!(i) } else { Value::Null };
                (i as f64, vec![json!(i), c, Value::Null])
            })
            .collect();
        let mut reader = depth_reader(&["A", "C", "EMPTY"], rows);

        let c = reader.get_channel_index_range(2);
        assert_eq!((c.start, c.end), (Some(3.0), Some(7.0)));
        assert!(reader.get_channel_index_range(3).is_empty());

        let a = reader.get_channel_index_range(1);
        assert_eq!((a.start, a.end), (Some(1.0), Some(10.0)));
    }

    #[test]
    fn single_populated_row_gives_point_range() {
        let rows = (1..=5)
            .map(|i| {
                let c = if i == 3 { json!(1) } else { json!(-999.25) };
                (i as f64, vec![c])
            })
            .collect();
        let mut reader = depth_reader(&["C"], rows);
        let r = reader.get_channel_index_range(1);
        assert_eq!((r.start, r.end), (Some(3.0), Some(3.0)));
    }

    #[test]
    fn index_ranges_are_cached_on_attach() {
        let reader = depth_reader(
            &["GR"],
            vec![(3.0, vec![json!(1)]), (1.0, vec![json!(2)])],
        );
        assert_eq!(reader.indices()[0].start, Some(1.0));
        assert_eq!(reader.indices()[0].end, Some(3.0));
    }

    #[test]
    fn from_json_loads_persisted_chunk() {
        let reader = ChannelDataReader::from_json(
            r#"[[[1.0],[10,20]],[[2.0],[11,null]]]"#,
            layout(&["A", "B"]),
            vec![depth_index(true)],
            "eml://log/json",
        )
        .unwrap();
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.to_json().unwrap(), r#"[[[1.0],[10,20]],[[2.0],[11,null]]]"#);
    }

    #[test]
    fn missing_index_configuration_means_no_data() {
        let reader = ChannelDataReader::from_json(
            r#"[[[1.0],[10]]]"#,
            layout(&["A"]),
            vec![],
            "eml://log/none",
        )
        .unwrap();
        assert!(reader.is_closed());
        assert_eq!(reader.len(), 0);
    }
}
