//! Bounded extraction of requested channels.
//!
//! `get_data` walks the rows, rebuilds each one in the requested column order
//! and stops at the caller's row and cell limits. Values are looked up by
//! mnemonic through each row's own layout, since rows taken from different
//! chunks need not share a column order.
//!
//! With a latest-values request the walk runs tail-first, keeps at most `n`
//! non-null values per channel, and the result is reversed back into index
//! order. If some requested channels turn out to have no data while others
//! do, the collected rows are re-sliced and extracted once more so the empty
//! channels drop out of the result. That second pass never retries again and
//! never applies a latest-values request, so it always terminates.

use std::collections::HashSet;

use log::{debug, warn};
use serde_json::Value;

use crate::{
    index_info::index_value,
    query_context::{ChannelSelection, QueryContext},
    range::Range,
    reader::ChannelDataReader,
    row::{ChannelLayout, ChannelRow, is_null_value, mnemonic_key},
};

/// Rows and per-channel ranges produced by one extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelDataPage {
    /// Rows as `(indexes, values)`, values in requested channel order.
    pub rows: Vec<ChannelRow>,
    /// `[start, end]` of primary index values each requested channel was
    /// found at, in requested order. Empty when a channel had no data.
    pub ranges: Vec<(String, Range<f64>)>,
}

impl ChannelDataPage {
    /// Requested channel mnemonics, in value order.
    pub fn mnemonics(&self) -> Vec<&str> {
        self.ranges.iter().map(|(m, _)| m.as_str()).collect()
    }

    /// Range of `mnemonic` (case-insensitive).
    pub fn range_of(&self, mnemonic: &str) -> Option<Range<f64>> {
        let key = mnemonic_key(mnemonic);
        self.ranges
            .iter()
            .find(|(m, _)| mnemonic_key(m) == key)
            .map(|(_, r)| *r)
    }
}

/// A requested channel column.
struct Requested {
    ordinal: usize,
    mnemonic: String,
    null_value: String,
}

impl ChannelDataReader {
    /// Extract the channels in `selection` within the limits of `context`.
    ///
    /// Sets `context.data_truncated` when a limit stopped the walk, and
    /// `context.has_all_requested_values` when a latest-values request was
    /// satisfied for every channel. If a re-slice pass runs, `selection` is
    /// narrowed to the channels that were found.
    pub fn get_data(
        &self,
        context: &mut QueryContext,
        selection: &mut ChannelSelection,
    ) -> ChannelDataPage {
        self.extract(context, selection, true)
    }

    fn extract(
        &self,
        context: &mut QueryContext,
        selection: &mut ChannelSelection,
        allow_retry: bool,
    ) -> ChannelDataPage {
        let requested = self.requested_channels(selection);
        let mut ranges = vec![Range::empty(); requested.len()];
        if requested.is_empty() {
            return page(Vec::new(), &requested, ranges);
        }

        let increasing = self.is_increasing();
        let is_time = self.is_time_index();
        let latest = context.request_latest_values.filter(|n| *n > 0);
        let mut counts = vec![0usize; requested.len()];
        let mut rows = Vec::new();
        let mut points = 0usize;

        let positions: Vec<usize> = if latest.is_some() {
            (0..self.records.len()).rev().collect()
        } else {
            (0..self.records.len()).collect()
        };

        for position in positions {
            let record = &self.records[position];
            let primary = record
                .row
                .indexes
                .first()
                .and_then(|cell| index_value(cell, is_time));

            let mut values = Vec::with_capacity(requested.len());
            let mut any = false;
            for (k, column) in requested.iter().enumerate() {
                let mut value = self
                    .working
                    .position(&column.mnemonic)
                    .map(|p| self.depth() + p)
                    .and_then(|ordinal| {
                        let cell = self.cell(record, ordinal)?;
                        let is_null = is_null_value(cell, self.null_value_of(record, ordinal))
                            || is_null_value(cell, &column.null_value);
                        (!is_null).then(|| cell.clone())
                    })
                    .unwrap_or(Value::Null);

                if let Some(n) = latest
                    && counts[k] >= n
                {
                    value = Value::Null;
                }
                any |= !value.is_null();
                values.push(value);
            }

            if any {
                let cells = record.row.indexes.len() + values.len();
                if rows.len() + 1 > context.max_data_nodes
                    || points + cells > context.max_data_points
                {
                    context.data_truncated = true;
                    warn!(
                        "Truncated channel data for {} at {} rows / {} points (limits {} / {})",
                        self.uri,
                        rows.len(),
                        points,
                        context.max_data_nodes,
                        context.max_data_points
                    );
                    break;
                }
                points += cells;
                for (k, value) in values.iter().enumerate() {
                    if value.is_null() {
                        continue;
                    }
                    counts[k] += 1;
                    if let Some(primary) = primary {
                        ranges[k].include(primary, increasing);
                    }
                }
                rows.push(ChannelRow::new(record.row.indexes.clone(), values));
            }

            if let Some(n) = latest
                && counts.iter().all(|c| *c >= n)
            {
                context.has_all_requested_values = true;
                break;
            }
        }

        if latest.is_some() {
            rows.reverse();
        }

        let some_empty = ranges.iter().any(Range::is_empty);
        let some_found = ranges.iter().any(|r| !r.is_empty());
        if allow_retry && some_empty && some_found {
            debug!(
                "Re-slicing {} extracted rows for {}: {} of {} channels have no data",
                rows.len(),
                self.uri,
                ranges.iter().filter(|r| r.is_empty()).count(),
                ranges.len()
            );
            return self.reslice(rows, &requested, context, selection);
        }

        page(rows, &requested, ranges)
    }

    fn reslice(
        &self,
        rows: Vec<ChannelRow>,
        requested: &[Requested],
        context: &mut QueryContext,
        selection: &mut ChannelSelection,
    ) -> ChannelDataPage {
        let text = |map: &std::collections::BTreeMap<usize, String>, ordinal: usize| {
            map.get(&ordinal).cloned().unwrap_or_default()
        };
        let layout = ChannelLayout::new(
            requested.iter().map(|c| c.mnemonic.clone()).collect(),
            requested
                .iter()
                .map(|c| text(&selection.units, c.ordinal))
                .collect(),
            requested
                .iter()
                .map(|c| text(&selection.data_types, c.ordinal))
                .collect(),
            requested.iter().map(|c| c.null_value.clone()).collect(),
        );

        let mut retry = ChannelDataReader::new(rows, layout, self.uri.clone()).with_indices(
            self.indices.clone(),
            true,
            false,
        );
        retry.slice(selection);

        let mut retry_context = context.clone();
        retry_context.request_latest_values = None;
        let result = retry.extract(&mut retry_context, selection, false);

        context.data_truncated |= retry_context.data_truncated;
        context.has_all_requested_values |= retry_context.has_all_requested_values;
        result
    }

    /// Non-index channels of `selection`, in ordinal order, deduplicated.
    fn requested_channels(&self, selection: &ChannelSelection) -> Vec<Requested> {
        let mut seen: HashSet<String> = self
            .indices
            .iter()
            .map(|i| mnemonic_key(&i.mnemonic))
            .collect();

        selection
            .mnemonics
            .iter()
            .filter(|(ordinal, m)| **ordinal != 0 && seen.insert(mnemonic_key(m)))
            .map(|(ordinal, m)| Requested {
                ordinal: *ordinal,
                mnemonic: m.clone(),
                null_value: selection.null_values.get(ordinal).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

fn page(rows: Vec<ChannelRow>, requested: &[Requested], ranges: Vec<Range<f64>>) -> ChannelDataPage {
    ChannelDataPage {
        rows,
        ranges: requested
            .iter()
            .map(|c| c.mnemonic.clone())
            .zip(ranges)
            .collect(),
    }
}
