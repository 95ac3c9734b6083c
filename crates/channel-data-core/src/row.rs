//! Row model and per-record column layouts.
//!
//! A [`ChannelRow`] is `(index values, channel values)`. The channel value
//! sequence is sparse: missing trailing cells are implicitly null.
//!
//! Rows do not carry their own channel names. Instead every record held by a
//! reader points at a shared [`ChannelLayout`] describing the channel order
//! of *that* row. Rows that came from different chunks, or that were
//! rewritten by a merge, may point at different layouts, so two rows never
//! have to agree on column order. Lookups go through the layout's
//! case-insensitive mnemonic map.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row: index tuple plus channel value tuple.
///
/// Serializes as the two-element array `[[index, ...], [value, ...]]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(Vec<Value>, Vec<Value>)", into = "(Vec<Value>, Vec<Value>)")]
pub struct ChannelRow {
    /// Index values; position 0 is the primary index.
    pub indexes: Vec<Value>,
    /// Channel values in the order of the row's layout.
    pub values: Vec<Value>,
}

impl ChannelRow {
    /// Build a row from its two parts.
    pub fn new(indexes: Vec<Value>, values: Vec<Value>) -> Self {
        Self { indexes, values }
    }

    /// Channel value at `position`; `None` past the end of the sparse tuple.
    pub fn value(&self, position: usize) -> Option<&Value> {
        self.values.get(position)
    }

    /// Set the channel value at `position`, growing with nulls as needed.
    pub fn set_value(&mut self, position: usize, value: Value) {
        if self.values.len() <= position {
            self.values.resize(position + 1, Value::Null);
        }
        self.values[position] = value;
    }
}

impl From<(Vec<Value>, Vec<Value>)> for ChannelRow {
    fn from((indexes, values): (Vec<Value>, Vec<Value>)) -> Self {
        Self { indexes, values }
    }
}

impl From<ChannelRow> for (Vec<Value>, Vec<Value>) {
    fn from(row: ChannelRow) -> Self {
        (row.indexes, row.values)
    }
}

/// Channel order, units, types and null sentinels for a set of rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelLayout {
    mnemonics: Vec<String>,
    units: Vec<String>,
    data_types: Vec<String>,
    null_values: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ChannelLayout {
    /// Build a layout. Shorter unit/type/null lists are padded with empty
    /// strings; duplicate mnemonics keep their first position.
    pub fn new(
        mnemonics: Vec<String>,
        mut units: Vec<String>,
        mut data_types: Vec<String>,
        mut null_values: Vec<String>,
    ) -> Self {
        let len = mnemonics.len();
        units.resize(len, String::new());
        data_types.resize(len, String::new());
        null_values.resize(len, String::new());

        let mut positions = HashMap::with_capacity(len);
        for (i, m) in mnemonics.iter().enumerate() {
            positions.entry(mnemonic_key(m)).or_insert(i);
        }

        Self {
            mnemonics,
            units,
            data_types,
            null_values,
            positions,
        }
    }

    /// Channel mnemonics in column order.
    pub fn mnemonics(&self) -> &[String] {
        &self.mnemonics
    }

    /// Units, parallel to [`mnemonics`](Self::mnemonics).
    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Data types, parallel to [`mnemonics`](Self::mnemonics).
    pub fn data_types(&self) -> &[String] {
        &self.data_types
    }

    /// Null sentinels, parallel to [`mnemonics`](Self::mnemonics).
    pub fn null_values(&self) -> &[String] {
        &self.null_values
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.mnemonics.len()
    }

    /// True if the layout has no channels.
    pub fn is_empty(&self) -> bool {
        self.mnemonics.is_empty()
    }

    /// Position of `mnemonic` (case-insensitive).
    pub fn position(&self, mnemonic: &str) -> Option<usize> {
        self.positions.get(&mnemonic_key(mnemonic)).copied()
    }

    /// True if `mnemonic` is part of this layout.
    pub fn contains(&self, mnemonic: &str) -> bool {
        self.position(mnemonic).is_some()
    }

    /// Null sentinel at `position`, empty if unset.
    pub fn null_value(&self, position: usize) -> &str {
        self.null_values.get(position).map_or("", String::as_str)
    }

    /// Union of this layout with `other`.
    ///
    /// With `prepend == false` this layout's channels come first and
    /// channels only `other` knows are appended. With `prepend == true`
    /// `other`'s channels come first and this layout's extras follow.
    pub fn union(&self, other: &ChannelLayout, prepend: bool) -> ChannelLayout {
        let (first, second) = if prepend {
            (other, self)
        } else {
            (self, other)
        };

        let mut mnemonics = first.mnemonics.clone();
        let mut units = first.units.clone();
        let mut data_types = first.data_types.clone();
        let mut null_values = first.null_values.clone();

        for (i, m) in second.mnemonics.iter().enumerate() {
            if first.contains(m) {
                continue;
            }
            mnemonics.push(m.clone());
            units.push(second.units[i].clone());
            data_types.push(second.data_types[i].clone());
            null_values.push(second.null_values[i].clone());
        }

        ChannelLayout::new(mnemonics, units, data_types, null_values)
    }

    /// Copy of this layout without the channels in `removed` (lower-cased
    /// mnemonics).
    pub fn without(&self, removed: &HashSet<String>) -> ChannelLayout {
        self.retain(|m| !removed.contains(&mnemonic_key(m)))
    }

    /// Copy of this layout keeping only channels accepted by `keep`, in
    /// their existing order.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> ChannelLayout {
        let mut mnemonics = Vec::new();
        let mut units = Vec::new();
        let mut data_types = Vec::new();
        let mut null_values = Vec::new();

        for (i, m) in self.mnemonics.iter().enumerate() {
            if keep(m) {
                mnemonics.push(m.clone());
                units.push(self.units[i].clone());
                data_types.push(self.data_types[i].clone());
                null_values.push(self.null_values[i].clone());
            }
        }

        ChannelLayout::new(mnemonics, units, data_types, null_values)
    }

    /// Re-order `values`, laid out according to `from`, into this layout.
    /// Channels `from` does not carry become null.
    pub fn project(&self, values: &[Value], from: &ChannelLayout) -> Vec<Value> {
        self.mnemonics
            .iter()
            .map(|m| {
                from.position(m)
                    .and_then(|p| values.get(p))
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect()
    }
}

/// A row plus the layout its channel values follow.
#[derive(Debug, Clone)]
pub(crate) struct Record {
    pub(crate) row: ChannelRow,
    pub(crate) layout: Arc<ChannelLayout>,
}

impl Record {
    pub(crate) fn new(row: ChannelRow, layout: Arc<ChannelLayout>) -> Self {
        Self { row, layout }
    }

    /// Value of `mnemonic` in this record, if the layout carries it.
    pub(crate) fn value_of(&self, mnemonic: &str) -> Option<&Value> {
        self.layout
            .position(mnemonic)
            .and_then(|p| self.row.value(p))
    }

    /// Rewrite the channel values into `target` order.
    pub(crate) fn project_into(&mut self, target: &Arc<ChannelLayout>) {
        if Arc::ptr_eq(&self.layout, target) {
            return;
        }
        self.row.values = target.project(&self.row.values, &self.layout);
        self.layout = Arc::clone(target);
    }
}

/// Case-insensitive lookup key for a mnemonic.
pub(crate) fn mnemonic_key(mnemonic: &str) -> String {
    mnemonic.to_lowercase()
}

/// Whether `value` counts as null for a channel with the given sentinel.
///
/// JSON null and blank strings are always null. Otherwise the trimmed text
/// of the value is compared with the trimmed sentinel; numbers are compared
/// through their JSON text, so `-999.25` and `-999.250` differ.
pub fn is_null_value(value: &Value, null_value: &str) -> bool {
    let sentinel = null_value.trim();
    match value {
        Value::Null => true,
        Value::String(s) => {
            let s = s.trim();
            s.is_empty() || (!sentinel.is_empty() && s == sentinel)
        }
        Value::Number(n) => !sentinel.is_empty() && n.to_string() == sentinel,
        _ => false,
    }
}
