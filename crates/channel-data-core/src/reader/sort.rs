//! Row ordering by primary index.
//!
//! Sorting is stable: rows sharing a primary index keep their relative order.
//! Rows whose primary index cannot be read sort after every readable row.

use std::cmp::Ordering;

use crate::{index_info::index_value, reader::ChannelDataReader, row::Record};

impl ChannelDataReader {
    /// Order rows by primary index in index direction, or against it when
    /// `reverse` is set. Resets the cursor.
    pub fn sort(&mut self, reverse: bool) {
        let Some(primary) = self.indices.first() else {
            return;
        };
        let ascending = primary.increasing != reverse;
        let is_time = primary.is_time_index;

        let mut keyed: Vec<(Option<f64>, Record)> = std::mem::take(&mut self.records)
            .into_iter()
            .map(|record| (primary_key(&record, is_time), record))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| cmp_primary(*a, *b, ascending));

        self.records = keyed.into_iter().map(|(_, record)| record).collect();
        self.current = None;
        self.invalidate_ranges();
    }
}

fn primary_key(record: &Record, is_time: bool) -> Option<f64> {
    record
        .row
        .indexes
        .first()
        .and_then(|cell| index_value(cell, is_time))
}

/// Compare two primary index values; unreadable values go last in either
/// direction.
pub(crate) fn cmp_primary(a: Option<f64>, b: Option<f64>, ascending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if ascending => a.total_cmp(&b),
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        reader::test_util::{depth_index, layout},
        row::ChannelRow,
    };

    fn reader(increasing: bool, rows: &[(Value, i64)]) -> ChannelDataReader {
        let rows = rows
            .iter()
            .map(|(index, tag)| ChannelRow::new(vec![index.clone()], vec![json!(tag)]))
            .collect();
        ChannelDataReader::new(rows, layout(&["TAG"]), "eml://log/sort").with_indices(
            vec![depth_index(increasing)],
            false,
            false,
        )
    }

    fn tags(reader: &ChannelDataReader) -> Vec<i64> {
        reader
            .rows()
            .iter()
            .map(|r| r.values[0].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn increasing_index_sorts_ascending_and_reverse_descending() {
        let mut r = reader(true, &[(json!(3), 3), (json!(1), 1), (json!(2), 2)]);
        r.sort(false);
        assert_eq!(tags(&r), vec![1, 2, 3]);
        r.sort(true);
        assert_eq!(tags(&r), vec![3, 2, 1]);
    }

    #[test]
    fn decreasing_index_sorts_descending() {
        let mut r = reader(false, &[(json!(1), 1), (json!(3), 3), (json!(2), 2)]);
        r.sort(false);
        assert_eq!(tags(&r), vec![3, 2, 1]);
    }

    #[test]
    fn equal_primary_indexes_keep_insertion_order() {
        let mut r = reader(
            true,
            &[(json!(2), 20), (json!(1), 10), (json!(2), 21), (json!(1), 11)],
        );
        r.sort(false);
        assert_eq!(tags(&r), vec![10, 11, 20, 21]);
        r.sort(true);
        assert_eq!(tags(&r), vec![20, 21, 10, 11]);
    }

    #[test]
    fn unreadable_primary_sorts_last() {
        let mut r = reader(true, &[(json!("x"), 0), (json!(5), 5), (json!(4), 4)]);
        r.sort(false);
        assert_eq!(tags(&r), vec![4, 5, 0]);
    }

    #[test]
    fn cmp_primary_orders_missing_after_present() {
        assert_eq!(cmp_primary(Some(1.0), None, false), Ordering::Less);
        assert_eq!(cmp_primary(Some(1.0), Some(2.0), false), Ordering::Greater);
    }
}
