//! Three-way merge of a resident row set with an update.
//!
//! Each step pairs the row under this reader's cursor with the row under the
//! other record's cursor and is classified as [`IndexOrder::Before`],
//! [`IndexOrder::Same`] or [`IndexOrder::After`]. Before any row is touched,
//! the chunk window the row falls into is established and, once per window,
//! the working channel list is reconciled with the other record's channels.
//! Repeating that reconciliation per row would duplicate or misalign columns,
//! so it is guarded by `settings_merged`, which is only cleared when the
//! chunk window changes.

use std::{cmp::Ordering, sync::Arc};

use log::{debug, warn};
use serde_json::Value;
use snafu::ensure;

use crate::{
    error::{ChannelDataResult, IncompatibleIndexSnafu, UnsupportedIndexConfigurationSnafu},
    range::Range,
    reader::{ChannelDataReader, sort::cmp_primary},
    record::{ChannelDataRecord, IndexOrder},
    row::is_null_value,
};

impl ChannelDataReader {
    /// Fold `other`'s current row into this reader's current row.
    ///
    /// Does nothing when this reader's cursor is not on a row with a
    /// readable primary index.
    pub fn merge_record(
        &mut self,
        other: &mut dyn ChannelDataRecord,
        chunk_size: f64,
        order: IndexOrder,
    ) -> ChannelDataResult<()> {
        ensure_compatible(&*self, &*other)?;
        ensure!(
            chunk_size.is_finite() && chunk_size > 0.0,
            UnsupportedIndexConfigurationSnafu {
                msg: format!("chunk size must be positive, got {chunk_size}"),
            }
        );

        let Some(index) = self.position().and_then(|_| self.get_index_value(0)) else {
            return Ok(());
        };

        self.merge_settings(other, index, chunk_size, order);

        match order {
            IndexOrder::Before => self.merge_before(other, index),
            IndexOrder::Same => self.merge_same(other, index),
            IndexOrder::After => {
                self.update_values();
                Ok(())
            }
        }
    }

    /// Rewrite the current row into the working channel order.
    pub fn update_values(&mut self) {
        let Some(position) = self.position() else {
            return;
        };
        let working = Arc::clone(&self.working);
        self.records[position].project_into(&working);
        self.invalidate_ranges();
    }

    /// Union `other`'s channels into the working list. With `prepend` the
    /// other record's channels lead.
    pub fn copy_channel_settings(&mut self, other: &dyn ChannelDataRecord, prepend: bool) {
        self.working = Arc::new(self.working.union(&other.layout(), prepend));
        self.slice_ordinals = None;
        self.active_ordinals = None;
        self.invalidate_ranges();
    }

    /// Restore the baseline channel list and allow the next merge step to
    /// reconcile again.
    pub fn reset_merge_settings(&mut self) {
        self.restore_original();
        self.settings_merged = false;
    }

    fn merge_settings(
        &mut self,
        other: &mut dyn ChannelDataRecord,
        index: f64,
        chunk_size: f64,
        order: IndexOrder,
    ) {
        let increasing = self.is_increasing();
        let in_window = self
            .chunk_range
            .is_some_and(|chunk| chunk.contains_half_open(index, increasing));

        if order == IndexOrder::After && !in_window {
            self.reset_merge_settings();
            let chunk = Range::compute_range(index, chunk_size, increasing);
            debug!(
                "Recomputed chunk window for {}: {:?}..{:?}",
                self.uri, chunk.start, chunk.end
            );
            self.chunk_range = Some(chunk);
        } else if self.chunk_range.is_none() {
            self.chunk_range = Some(Range::compute_range(index, chunk_size, increasing));
        }

        if self.settings_merged {
            return;
        }

        let prepend = order == IndexOrder::After && {
            let other_range = other.get_index_range(0);
            self.chunk_range.is_some_and(|chunk| {
                [other_range.start, other_range.end]
                    .into_iter()
                    .flatten()
                    .any(|v| chunk.contains_half_open(v, increasing))
            })
        };
        self.copy_channel_settings(other, prepend);
        self.settings_merged = true;
        debug!(
            "Reconciled channels for {} with {} ({} working channels, prepend={prepend})",
            self.uri,
            other.uri(),
            self.working.len()
        );
    }

    /// The update covers this row's index with nothing for its channels.
    fn merge_before(&mut self, other: &mut dyn ChannelDataRecord, index: f64) -> ChannelDataResult<()> {
        let depth = self.depth();
        let increasing = self.is_increasing();
        let original = Arc::clone(&self.original);
        let working = Arc::clone(&self.working);
        let other_depth = other.depth();

        for (position, mnemonic) in working.mnemonics().iter().enumerate() {
            if !original.contains(mnemonic) {
                continue;
            }
            let Some(other_ordinal) = other.get_ordinal(mnemonic).filter(|o| *o >= other_depth)
            else {
                continue;
            };
            if other
                .get_channel_index_range(other_ordinal)
                .contains(index, increasing)
            {
                self.set_value(depth + position, Value::Null)?;
            }
        }
        Ok(())
    }

    /// Overlay the update's values on a row with the same primary index.
    fn merge_same(&mut self, other: &mut dyn ChannelDataRecord, index: f64) -> ChannelDataResult<()> {
        self.update_values();

        let depth = self.depth();
        let increasing = self.is_increasing();
        let other_depth = other.depth();
        let other_layout = other.layout();

        for (k, mnemonic) in other_layout.mnemonics().iter().enumerate() {
            let Some(ordinal) = self.get_ordinal(mnemonic).filter(|o| *o >= depth) else {
                continue;
            };
            let other_ordinal = other_depth + k;
            let value = other.get_value(other_ordinal)?;
            let is_null = is_null_value(&value, other_layout.null_value(k));
            let covered = other
                .get_channel_index_range(other_ordinal)
                .contains(index, increasing);

            if covered || !is_null {
                self.set_value(ordinal, if is_null { Value::Null } else { value })?;
            }
        }
        Ok(())
    }
}

/// Merge `update` into `existing`, walking both in index order.
///
/// Rows only the existing reader has are kept, minus values the update's
/// channel ranges cover. Rows sharing a primary index are overlaid. Rows only
/// the update has are taken from the update. When neither current row has a
/// readable primary index, both are kept unmerged, existing first. The result
/// spans the union of both channel lists; each row keeps the column order it
/// was produced in.
pub fn merge_sequence(
    existing: &mut ChannelDataReader,
    update: &mut ChannelDataReader,
    chunk_size: f64,
) -> ChannelDataResult<ChannelDataReader> {
    ensure_compatible(&*existing, &*update)?;
    let ascending = existing.is_increasing();

    existing.reset();
    update.reset();
    let mut has_existing = existing.read();
    let mut has_update = update.read();
    let mut records = Vec::with_capacity(existing.len() + update.len());

    while has_existing || has_update {
        let order = match (has_existing, has_update) {
            (true, true) => {
                let (resident_index, update_index) =
                    (existing.get_index_value(0), update.get_index_value(0));
                if resident_index.is_none() && update_index.is_none() {
                    warn!(
                        "Keeping unmerged rows without a readable primary index for {}",
                        existing.uri
                    );
                    records.extend(existing.current_record().cloned());
                    records.extend(update.current_record().cloned());
                    has_existing = existing.read();
                    has_update = update.read();
                    continue;
                }
                cmp_primary(resident_index, update_index, ascending)
            }
            (true, false) => Ordering::Less,
            _ => Ordering::Greater,
        };

        match order {
            Ordering::Less => {
                if has_update {
                    existing.merge_record(&mut *update, chunk_size, IndexOrder::Before)?;
                }
                records.extend(existing.current_record().cloned());
                has_existing = existing.read();
            }
            Ordering::Equal => {
                existing.merge_record(&mut *update, chunk_size, IndexOrder::Same)?;
                records.extend(existing.current_record().cloned());
                has_existing = existing.read();
                has_update = update.read();
            }
            Ordering::Greater => {
                update.merge_record(&mut *existing, chunk_size, IndexOrder::After)?;
                records.extend(update.current_record().cloned());
                has_update = update.read();
            }
        }
    }

    let layout = existing.original.union(&update.original, false);
    let indices = if existing.indices.is_empty() {
        update.indices.clone()
    } else {
        existing.indices.clone()
    };

    Ok(
        ChannelDataReader::from_records(records, Arc::new(layout), existing.uri.clone())
            .with_indices(indices, true, false),
    )
}

fn ensure_compatible(
    resident: &dyn ChannelDataRecord,
    update: &dyn ChannelDataRecord,
) -> ChannelDataResult<()> {
    let (Some(r), Some(u)) = (resident.indices().first(), update.indices().first()) else {
        return Ok(());
    };
    ensure!(
        r.increasing == u.increasing,
        IncompatibleIndexSnafu {
            uri: resident.uri(),
            resident_increasing: r.increasing,
            update_increasing: u.increasing,
        }
    );
    Ok(())
}
