//! The contract merge, slice and delete collaborators program against.
//!
//! [`ChannelDataRecord`] is object safe so a merge can pair a resident reader
//! with any update source behind `&mut dyn ChannelDataRecord`.

use std::{collections::BTreeMap, sync::Arc};

use serde_json::Value;

use crate::{
    error::ChannelDataResult,
    index_info::ChannelIndexInfo,
    range::Range,
    reader::{ChannelDataReader, PartialDeleteRequest},
    row::ChannelLayout,
};

/// Where an update row falls relative to the resident row under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexOrder {
    /// The update precedes the resident row; the update's ranges may cover
    /// it and clear its values.
    Before,
    /// Both rows share a primary index value.
    Same,
    /// The update follows the resident rows; its own row is compacted into
    /// the reconciled channel order.
    After,
}

/// Row-set operations shared by every channel data source.
pub trait ChannelDataRecord {
    /// URI of the entity the rows belong to.
    fn uri(&self) -> &str;
    /// Number of index columns.
    fn depth(&self) -> usize;
    /// Index columns plus working channels.
    fn field_count(&self) -> usize;
    /// Index column metadata.
    fn indices(&self) -> &[ChannelIndexInfo];
    /// Working channel mnemonics.
    fn mnemonics(&self) -> &[String];
    /// Working channel units.
    fn units(&self) -> &[String];
    /// Working channel data types.
    fn data_types(&self) -> &[String];
    /// Working channel null sentinels.
    fn null_values(&self) -> &[String];
    /// Working channel layout.
    fn layout(&self) -> Arc<ChannelLayout>;
    /// Direction of the primary index.
    fn is_increasing(&self) -> bool;
    /// Whether the primary index holds timestamps.
    fn is_time_index(&self) -> bool;
    /// Ordinal of a mnemonic among index and working channel columns.
    fn get_ordinal(&self, name: &str) -> Option<usize>;
    /// Comparable value of index column `index` on the current row.
    fn get_index_value(&self, index: usize) -> Option<f64>;
    /// `[start, end]` of index column `index`.
    fn get_index_range(&mut self, index: usize) -> Range<f64>;
    /// `[start, end]` of primary index values where `ordinal` is non-null.
    fn get_channel_index_range(&mut self, ordinal: usize) -> Range<f64>;
    /// Value at `ordinal` on the current row.
    fn get_value(&self, ordinal: usize) -> ChannelDataResult<Value>;
    /// Overwrite the value at `ordinal` on the current row.
    fn set_value(&mut self, ordinal: usize, value: Value) -> ChannelDataResult<()>;
    /// Fold `other`'s current row into this one according to `order`.
    fn merge_record(
        &mut self,
        other: &mut dyn ChannelDataRecord,
        chunk_size: f64,
        order: IndexOrder,
    ) -> ChannelDataResult<()>;
    /// Rewrite the current row into the working channel order.
    fn update_values(&mut self);
    /// Union `other`'s channel list into the working list.
    fn copy_channel_settings(&mut self, other: &dyn ChannelDataRecord, prepend: bool);
    /// Restore the baseline channel list and clear the merge guard.
    fn reset_merge_settings(&mut self);
    /// Apply a partial delete to the current row.
    fn partial_delete_record(
        &mut self,
        request: &PartialDeleteRequest,
        remaining: &mut BTreeMap<String, Range<f64>>,
    );
}

impl ChannelDataRecord for ChannelDataReader {
    fn uri(&self) -> &str {
        ChannelDataReader::uri(self)
    }

    fn depth(&self) -> usize {
        ChannelDataReader::depth(self)
    }

    fn field_count(&self) -> usize {
        ChannelDataReader::field_count(self)
    }

    fn indices(&self) -> &[ChannelIndexInfo] {
        ChannelDataReader::indices(self)
    }

    fn mnemonics(&self) -> &[String] {
        ChannelDataReader::mnemonics(self)
    }

    fn units(&self) -> &[String] {
        ChannelDataReader::units(self)
    }

    fn data_types(&self) -> &[String] {
        ChannelDataReader::data_types(self)
    }

    fn null_values(&self) -> &[String] {
        ChannelDataReader::null_values(self)
    }

    fn layout(&self) -> Arc<ChannelLayout> {
        ChannelDataReader::layout(self)
    }

    fn is_increasing(&self) -> bool {
        ChannelDataReader::is_increasing(self)
    }

    fn is_time_index(&self) -> bool {
        ChannelDataReader::is_time_index(self)
    }

    fn get_ordinal(&self, name: &str) -> Option<usize> {
        ChannelDataReader::get_ordinal(self, name)
    }

    fn get_index_value(&self, index: usize) -> Option<f64> {
        ChannelDataReader::get_index_value(self, index)
    }

    fn get_index_range(&mut self, index: usize) -> Range<f64> {
        ChannelDataReader::get_index_range(self, index)
    }

    fn get_channel_index_range(&mut self, ordinal: usize) -> Range<f64> {
        ChannelDataReader::get_channel_index_range(self, ordinal)
    }

    fn get_value(&self, ordinal: usize) -> ChannelDataResult<Value> {
        ChannelDataReader::get_value(self, ordinal)
    }

    fn set_value(&mut self, ordinal: usize, value: Value) -> ChannelDataResult<()> {
        ChannelDataReader::set_value(self, ordinal, value)
    }

    fn merge_record(
        &mut self,
        other: &mut dyn ChannelDataRecord,
        chunk_size: f64,
        order: IndexOrder,
    ) -> ChannelDataResult<()> {
        ChannelDataReader::merge_record(self, other, chunk_size, order)
    }

    fn update_values(&mut self) {
        ChannelDataReader::update_values(self)
    }

    fn copy_channel_settings(&mut self, other: &dyn ChannelDataRecord, prepend: bool) {
        ChannelDataReader::copy_channel_settings(self, other, prepend)
    }

    fn reset_merge_settings(&mut self) {
        ChannelDataReader::reset_merge_settings(self)
    }

    fn partial_delete_record(
        &mut self,
        request: &PartialDeleteRequest,
        remaining: &mut BTreeMap<String, Range<f64>>,
    ) {
        ChannelDataReader::partial_delete_record(self, request, remaining)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::reader::test_util::depth_reader;

    fn describe(record: &mut dyn ChannelDataRecord) -> (usize, Vec<String>, Option<f64>) {
        let start = record.get_index_range(0).start;
        (record.field_count(), record.mnemonics().to_vec(), start)
    }

    #[test]
    fn reader_is_usable_as_trait_object() {
        let mut reader = depth_reader(&["A", "B"], vec![(4.0, vec![json!(1), json!(2)])]);
        let (fields, mnemonics, start) = describe(&mut reader);
        assert_eq!(fields, 3);
        assert_eq!(mnemonics, vec!["A", "B"]);
        assert_eq!(start, Some(4.0));
    }

    #[test]
    fn value_access_through_the_contract() {
        let mut reader = depth_reader(&["A"], vec![(1.0, vec![json!(1)])]);
        assert!(reader.read());
        let record: &mut dyn ChannelDataRecord = &mut reader;
        record.set_value(1, json!(5)).unwrap();
        assert_eq!(record.get_value(1).unwrap(), json!(5));
        assert_eq!(record.get_index_value(0), Some(1.0));
    }
}
