//! Extraction limits, outcome flags and the requested column set.

use std::collections::BTreeMap;

use crate::{row::mnemonic_key, settings::ChannelDataSettings};

/// Caller-supplied limits for one extraction, plus the flags it reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    /// Only return the latest `n` values of each requested channel.
    pub request_latest_values: Option<usize>,
    /// Maximum number of rows returned.
    pub max_data_nodes: usize,
    /// Maximum number of cells (index plus channel values) returned.
    pub max_data_points: usize,
    /// Set when a limit stopped the extraction early.
    pub data_truncated: bool,
    /// Set when a latest-values request was fully satisfied.
    pub has_all_requested_values: bool,
}

impl QueryContext {
    /// Context with explicit limits.
    pub fn new(max_data_nodes: usize, max_data_points: usize) -> Self {
        Self {
            request_latest_values: None,
            max_data_nodes,
            max_data_points,
            data_truncated: false,
            has_all_requested_values: false,
        }
    }

    /// Context seeded from the configured limits.
    pub fn from_settings(settings: &ChannelDataSettings) -> Self {
        Self::new(settings.max_data_nodes, settings.max_data_points)
    }

    /// Request only the latest `count` values per channel.
    pub fn with_latest_values(mut self, count: usize) -> Self {
        self.request_latest_values = Some(count);
        self
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::from_settings(&ChannelDataSettings::default())
    }
}

/// Requested columns keyed by absolute ordinal.
///
/// Ordinal 0 is the primary index. Slicing a reader removes entries whose
/// mnemonic the reader does not know, so after a slice the maps describe
/// what was actually found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSelection {
    /// Requested mnemonics.
    pub mnemonics: BTreeMap<usize, String>,
    /// Requested units.
    pub units: BTreeMap<usize, String>,
    /// Requested data types.
    pub data_types: BTreeMap<usize, String>,
    /// Requested null sentinels.
    pub null_values: BTreeMap<usize, String>,
}

impl ChannelSelection {
    /// Selection of `mnemonics` at ordinals `0..`, with empty metadata.
    pub fn new<I, S>(mnemonics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selection = Self::default();
        for (ordinal, mnemonic) in mnemonics.into_iter().enumerate() {
            selection.insert(ordinal, mnemonic, "", "", "");
        }
        selection
    }

    /// Add or replace the column at `ordinal`.
    pub fn insert(
        &mut self,
        ordinal: usize,
        mnemonic: impl Into<String>,
        unit: impl Into<String>,
        data_type: impl Into<String>,
        null_value: impl Into<String>,
    ) {
        self.mnemonics.insert(ordinal, mnemonic.into());
        self.units.insert(ordinal, unit.into());
        self.data_types.insert(ordinal, data_type.into());
        self.null_values.insert(ordinal, null_value.into());
    }

    /// Remove the column at `ordinal` from every map.
    pub fn remove(&mut self, ordinal: usize) {
        self.mnemonics.remove(&ordinal);
        self.units.remove(&ordinal);
        self.data_types.remove(&ordinal);
        self.null_values.remove(&ordinal);
    }

    /// True if `mnemonic` is requested (case-insensitive).
    pub fn contains(&self, mnemonic: &str) -> bool {
        let key = mnemonic_key(mnemonic);
        self.mnemonics.values().any(|m| mnemonic_key(m) == key)
    }

    /// Number of requested columns.
    pub fn len(&self) -> usize {
        self.mnemonics.len()
    }

    /// True if nothing is requested.
    pub fn is_empty(&self) -> bool {
        self.mnemonics.is_empty()
    }
}
