//! Mutable record builder used while parsing incoming channel data.
//!
//! A [`ChannelDataBlock`] collects index and channel metadata plus rows for a
//! single target entity. Rows are keyed by their primary index value so that
//! a later append for the same primary index updates the existing row (last
//! write wins) instead of creating a duplicate. Once parsing is done,
//! [`ChannelDataBlock::get_reader`] snapshots the rows into a sorted
//! [`ChannelDataReader`].

use std::collections::HashMap;

use log::warn;
use serde_json::Value;

use crate::{
    delimited::DelimitedRowParser,
    error::{ChannelDataError, ChannelDataResult},
    index_info::{ChannelIndexInfo, index_value},
    reader::ChannelDataReader,
    row::{ChannelLayout, ChannelRow, mnemonic_key},
    settings::ChannelDataSettings,
    wire::parse_token,
};

/// Hashable identity of a primary index value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PrimaryKey {
    Number(u64),
    Text(String),
}

impl PrimaryKey {
    fn of(cell: &Value, is_time: bool) -> Self {
        match index_value(cell, is_time) {
            // -0.0 and 0.0 are the same depth.
            Some(v) if v == 0.0 => PrimaryKey::Number(0f64.to_bits()),
            Some(v) => PrimaryKey::Number(v.to_bits()),
            None => PrimaryKey::Text(match cell {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            }),
        }
    }
}

/// Accumulates rows and metadata for one entity before producing a reader.
#[derive(Debug, Clone, Default)]
pub struct ChannelDataBlock {
    uri: String,
    indices: Vec<ChannelIndexInfo>,
    channel_ids: Vec<i64>,
    mnemonics: Vec<String>,
    units: Vec<String>,
    data_types: Vec<String>,
    null_values: Vec<String>,
    records: Vec<ChannelRow>,
    lookup: HashMap<PrimaryKey, usize>,
}

impl ChannelDataBlock {
    /// Empty block for the entity at `uri`.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// URI of the target entity.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Registered index columns.
    pub fn indices(&self) -> &[ChannelIndexInfo] {
        &self.indices
    }

    /// Registered channel mnemonics, in ordinal order.
    pub fn mnemonics(&self) -> &[String] {
        &self.mnemonics
    }

    /// Registered channel ids, parallel to [`mnemonics`](Self::mnemonics).
    pub fn channel_ids(&self) -> &[i64] {
        &self.channel_ids
    }

    /// Number of distinct primary index rows.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// True if no rows have been appended.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True once the block holds at least `settings.batch_size` rows.
    pub fn is_full(&self, settings: &ChannelDataSettings) -> bool {
        self.records.len() >= settings.batch_size
    }

    /// Register an index column. No-op if the mnemonic is already known.
    pub fn add_index(
        &mut self,
        mnemonic: &str,
        unit: &str,
        data_type: &str,
        increasing: bool,
        is_time_index: bool,
        null_value: Option<&str>,
    ) {
        let key = mnemonic_key(mnemonic);
        if self.indices.iter().any(|i| mnemonic_key(&i.mnemonic) == key) {
            return;
        }
        self.indices.push(
            ChannelIndexInfo::new(mnemonic, unit, data_type, increasing, is_time_index)
                .with_null_value(null_value.map(str::to_string)),
        );
    }

    /// Register a channel. No-op if the mnemonic is already known; the
    /// registration order fixes the channel's ordinal.
    pub fn add_channel(
        &mut self,
        id: i64,
        mnemonic: &str,
        unit: &str,
        data_type: &str,
        null_value: Option<&str>,
    ) {
        let key = mnemonic_key(mnemonic);
        if self.mnemonics.iter().any(|m| mnemonic_key(m) == key) {
            return;
        }
        self.channel_ids.push(id);
        self.mnemonics.push(mnemonic.to_string());
        self.units.push(unit.to_string());
        self.data_types.push(data_type.to_string());
        self.null_values.push(null_value.unwrap_or_default().to_string());
    }

    /// Set `channel_id`'s value on the row identified by `index_values[0]`.
    ///
    /// The row is created on first sight of its primary index. Secondary
    /// index values are recorded the first time they are supplied for a row.
    pub fn append(
        &mut self,
        channel_id: i64,
        index_values: &[Value],
        value: Value,
    ) -> ChannelDataResult<()> {
        let Some(primary) = index_values.first() else {
            return Err(ChannelDataError::UnsupportedIndexConfiguration {
                msg: format!("append to {} without a primary index value", self.uri),
            });
        };

        let ordinal = self
            .channel_ids
            .iter()
            .position(|id| *id == channel_id)
            .ok_or(ChannelDataError::UnknownChannel { channel_id })?;

        let is_time = self.indices.first().is_some_and(|i| i.is_time_index);
        let key = PrimaryKey::of(primary, is_time);
        let position = match self.lookup.get(&key) {
            Some(position) => *position,
            None => {
                self.records
                    .push(ChannelRow::new(vec![primary.clone()], Vec::new()));
                let position = self.records.len() - 1;
                self.lookup.insert(key, position);
                position
            }
        };

        let row = &mut self.records[position];
        if row.indexes.len() == 1 && index_values.len() > 1 {
            row.indexes.extend_from_slice(&index_values[1..]);
        }
        row.set_value(ordinal, value);
        Ok(())
    }

    /// Append one already-tokenized row: index tokens first, then one token
    /// per registered channel in ordinal order. An empty token list is a
    /// dropped row and appends nothing.
    pub fn append_tokens<S: AsRef<str>>(&mut self, tokens: &[S]) -> ChannelDataResult<()> {
        if tokens.is_empty() {
            return Ok(());
        }

        let depth = self.indices.len();
        if depth == 0 || tokens.len() < depth {
            return Err(ChannelDataError::UnsupportedIndexConfiguration {
                msg: format!(
                    "row for {} has {} tokens but {depth} index columns are configured",
                    self.uri,
                    tokens.len()
                ),
            });
        }

        let index_values: Vec<Value> = tokens[..depth]
            .iter()
            .map(|t| parse_token(t.as_ref()))
            .collect();

        let channel_ids = self.channel_ids.clone();
        for (id, token) in channel_ids.iter().zip(&tokens[depth..]) {
            self.append(*id, &index_values, parse_token(token.as_ref()))?;
        }
        Ok(())
    }

    /// Parse and append one raw delimited row.
    ///
    /// Returns `false` if the parser's invalid-row policy dropped the row.
    pub fn append_delimited(
        &mut self,
        parser: &mut DelimitedRowParser,
        row: &str,
    ) -> ChannelDataResult<bool> {
        let tokens = parser.parse_row(row)?;
        if tokens.is_empty() {
            return Ok(false);
        }
        self.append_tokens(&tokens)?;
        Ok(true)
    }

    /// Parser sized for this block's rows (indexes plus channels).
    pub fn row_parser(&self, settings: &ChannelDataSettings) -> DelimitedRowParser {
        DelimitedRowParser::from_settings(settings, self.indices.len() + self.mnemonics.len())
    }

    /// Snapshot the rows into a sorted reader with computed index ranges.
    ///
    /// A block without index columns cannot be ordered; it is logged and
    /// yields a reader with no rows.
    pub fn get_reader(&self) -> ChannelDataReader {
        let layout = ChannelLayout::new(
            self.mnemonics.clone(),
            self.units.clone(),
            self.data_types.clone(),
            self.null_values.clone(),
        );

        if self.indices.is_empty() {
            warn!(
                "Channel data block for {} has no index columns; treating {} rows as no data",
                self.uri,
                self.records.len()
            );
            return ChannelDataReader::new(Vec::new(), layout, self.uri.clone());
        }

        ChannelDataReader::new(self.records.clone(), layout, self.uri.clone()).with_indices(
            self.indices.clone(),
            true,
            true,
        )
    }

    /// Drop all rows, keeping the registered metadata.
    pub fn clear(&mut self) {
        self.records.clear();
        self.lookup.clear();
    }
}
