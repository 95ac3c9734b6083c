//! Cursor movement and lifecycle for `ChannelDataReader`.
//!
//! Value reads after the cursor has run past the end, or after the reader
//! has been closed, are served from the last row. Callers that peek at the
//! final value of a chunk after a scan depend on this.

use crate::{reader::ChannelDataReader, row::Record};

impl ChannelDataReader {
    /// Advance to the next row. Returns `false` once past the last row.
    pub fn read(&mut self) -> bool {
        if self.closed {
            return false;
        }
        let next = self.current.map_or(0, |c| c + 1);
        self.current = Some(next.min(self.records.len()));
        next < self.records.len()
    }

    /// Jump to `row`. Returns `false` (leaving the cursor past the end) if
    /// `row` does not exist.
    pub fn move_to(&mut self, row: usize) -> bool {
        if self.closed {
            return false;
        }
        self.current = Some(row.min(self.records.len()));
        row < self.records.len()
    }

    /// Rewind to before the first row.
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Current row position, if the cursor is on a row.
    pub fn position(&self) -> Option<usize> {
        self.current.filter(|c| *c < self.records.len())
    }

    /// Number of rows held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no rows are held.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when no rows are loaded or the cursor has moved past the end.
    pub fn is_closed(&self) -> bool {
        self.closed
            || self.records.is_empty()
            || self.current.is_some_and(|c| c >= self.records.len())
    }

    /// Release the row storage. Later value reads see the last row.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.last_record = self.records.last().cloned();
        self.records = Vec::new();
        self.closed = true;
        self.current = None;
        self.invalidate_ranges();
    }

    /// Record the cursor points at, falling back to the last row once the
    /// cursor is past the end or the reader is closed.
    pub(crate) fn current_record(&self) -> Option<&Record> {
        if let Some(position) = self.position() {
            return self.records.get(position);
        }
        if self.closed {
            return self.last_record.as_ref();
        }
        match self.current {
            Some(_) => self.records.last(),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::reader::test_util::depth_reader;

    #[test]
    fn read_walks_rows_then_reports_end() {
        let mut reader = depth_reader(
            &["A"],
            vec![(1.0, vec![json!(1)]), (2.0, vec![json!(2)])],
        );
        assert!(!reader.is_closed());
        assert!(reader.read());
        assert_eq!(reader.position(), Some(0));
        assert!(reader.read());
        assert!(!reader.read());
        assert!(reader.is_closed());
        assert!(!reader.read());

        reader.reset();
        assert!(reader.read());
        assert_eq!(reader.position(), Some(0));
    }

    #[test]
    fn move_to_jumps_directly() {
        let mut reader = depth_reader(
            &["A"],
            vec![(1.0, vec![json!(1)]), (2.0, vec![json!(2)])],
        );
        assert!(reader.move_to(1));
        assert_eq!(reader.get_double(1).unwrap(), 2.0);
        assert!(!reader.move_to(5));
        assert!(reader.is_closed());
    }

    #[test]
    fn reads_after_end_or_close_see_last_row() {
        let mut reader = depth_reader(
            &["A"],
            vec![(1.0, vec![json!(10)]), (2.0, vec![json!(20)])],
        );
        while reader.read() {}
        assert_eq!(reader.get_double(1).unwrap(), 20.0);

        reader.reset();
        assert!(reader.read());
        reader.close();
        assert!(reader.is_closed());
        assert_eq!(reader.len(), 0);
        assert_eq!(reader.get_double(1).unwrap(), 20.0);
        assert_eq!(reader.get_index_value(0), Some(2.0));
    }
}
