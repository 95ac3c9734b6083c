//! Channel slicing.
//!
//! A slice narrows the working channel list to the requested channels that
//! actually hold data, without touching the rows. Extraction then reads
//! through a flat ordinal map from full-row position to storage position, and
//! the active-ordinal bitmap gates every other column to null.

use std::{collections::HashSet, sync::Arc};

use roaring::RoaringBitmap;

use crate::{query_context::ChannelSelection, reader::ChannelDataReader, row::mnemonic_key};

impl ChannelDataReader {
    /// Narrow the working channels to those in `selection` that have data.
    ///
    /// Index mnemonics in the selection are ignored here; index columns are
    /// always part of the ordinal space. Afterwards entries of `selection`
    /// whose mnemonic this reader does not expose are removed, except the
    /// primary index at ordinal 0.
    pub fn slice(&mut self, selection: &mut ChannelSelection) {
        self.restore_original();

        let index_keys: HashSet<String> = self
            .indices
            .iter()
            .map(|i| mnemonic_key(&i.mnemonic))
            .collect();
        let requested: HashSet<String> = selection
            .mnemonics
            .values()
            .map(|m| mnemonic_key(m))
            .filter(|k| !index_keys.contains(k))
            .collect();

        let depth = self.depth();
        let original = Arc::clone(&self.original);
        let mut kept = Vec::new();
        for (position, mnemonic) in original.mnemonics().iter().enumerate() {
            if requested.contains(&mnemonic_key(mnemonic))
                && !self.get_channel_index_range(depth + position).is_empty()
            {
                kept.push(position);
            }
        }

        let kept_keys: HashSet<String> = kept
            .iter()
            .map(|p| mnemonic_key(&original.mnemonics()[*p]))
            .collect();
        self.working = Arc::new(original.retain(|m| kept_keys.contains(&mnemonic_key(m))));

        let ordinals: Vec<usize> = (0..depth).chain(kept.iter().map(|p| depth + p)).collect();
        self.active_ordinals = Some(
            ordinals
                .iter()
                .filter_map(|o| u32::try_from(*o).ok())
                .collect::<RoaringBitmap>(),
        );
        self.slice_ordinals = Some(ordinals);
        self.invalidate_ranges();

        let exposed: HashSet<String> = self
            .all_mnemonics()
            .iter()
            .map(|m| mnemonic_key(m))
            .collect();
        let missing: Vec<usize> = selection
            .mnemonics
            .iter()
            .filter(|(ordinal, m)| **ordinal != 0 && !exposed.contains(&mnemonic_key(m)))
            .map(|(ordinal, _)| *ordinal)
            .collect();
        for ordinal in missing {
            selection.remove(ordinal);
        }
    }

    /// Whether a slice is in effect.
    pub fn is_sliced(&self) -> bool {
        self.slice_ordinals.is_some()
    }

    /// Drop any slice or merge reconciliation and expose the baseline
    /// channel list again.
    pub(crate) fn restore_original(&mut self) {
        self.working = Arc::clone(&self.original);
        self.slice_ordinals = None;
        self.active_ordinals = None;
        self.invalidate_ranges();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::{query_context::ChannelSelection, reader::test_util::depth_reader};

    fn reader() -> crate::reader::ChannelDataReader {
        depth_reader(
            &["A", "EMPTY", "C"],
            vec![
                (1.0, vec![json!(1), Value::Null, json!(10)]),
                (2.0, vec![json!(2), Value::Null, json!(20)]),
            ],
        )
    }

    #[test]
    fn slice_keeps_requested_channels_with_data() {
        let mut reader = reader();
        let mut selection = ChannelSelection::new(["MD", "C", "EMPTY", "NOPE"]);
        reader.slice(&mut selection);

        assert!(reader.is_sliced());
        assert_eq!(reader.mnemonics(), &["C"]);
        assert_eq!(reader.field_count(), 2);
        assert_eq!(
            selection.mnemonics.values().cloned().collect::<Vec<_>>(),
            vec!["MD", "C"]
        );
        assert_eq!(selection.null_values.len(), 2);
    }

    #[test]
    fn sliced_reads_map_to_storage() {
        let mut reader = reader();
        reader.slice(&mut ChannelSelection::new(["MD", "C"]));
        assert!(reader.read());
        assert_eq!(reader.get_double(1).unwrap(), 10.0);
        assert_eq!(reader.get_ordinal("A"), None);
        assert_eq!(reader.rows()[1].values, vec![json!(20)]);

        let range = reader.get_channel_index_range(1);
        assert_eq!((range.start, range.end), (Some(1.0), Some(2.0)));
    }

    #[test]
    fn reslicing_starts_from_the_baseline() {
        let mut reader = reader();
        reader.slice(&mut ChannelSelection::new(["MD", "C"]));
        reader.slice(&mut ChannelSelection::new(["MD", "A", "C"]));
        assert_eq!(reader.mnemonics(), &["A", "C"]);
        assert!(reader.read());
        assert_eq!(reader.get_double(2).unwrap(), 10.0);
    }

    #[test]
    fn primary_index_entry_is_never_removed() {
        let mut reader = reader();
        let mut selection = ChannelSelection::new(["DEPTH", "A"]);
        reader.slice(&mut selection);
        assert_eq!(selection.mnemonics.get(&0).map(String::as_str), Some("DEPTH"));
        assert_eq!(reader.mnemonics(), &["A"]);
    }
}
