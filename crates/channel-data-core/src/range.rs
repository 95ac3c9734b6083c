//! Direction-aware closed intervals over index values.
//!
//! A [`Range`] has an optional start and end. "Before" and "after" are
//! relative to the index direction: on a decreasing index a larger value comes
//! *before* a smaller one, so every ordering predicate takes an explicit
//! `increasing` flag instead of comparing numerically.
//!
//! Missing bounds are open: a range with only a start extends forever in the
//! index direction. A range with neither bound is *empty* and contains
//! nothing, which is how "this channel has no data" is represented.
//!
//! Chunk windows computed by [`Range::compute_range`] are half-open
//! `[start, end)`; use [`Range::contains_half_open`] when testing chunk
//! membership so a boundary value belongs to exactly one chunk.

use serde::{Deserialize, Serialize};

use crate::index_info::parse_time_micros;

/// A closed interval `[start, end]` with an optional offset.
///
/// For time indexes the values are microseconds since the Unix epoch and
/// `offset` carries the timezone offset (also in microseconds) of the token
/// the range was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Range<T> {
    /// Inclusive start bound, in index direction.
    pub start: Option<T>,
    /// Inclusive end bound, in index direction.
    pub end: Option<T>,
    /// Timezone or scale correction for time indexes.
    pub offset: Option<T>,
}

impl<T> Range<T> {
    /// Range with the given bounds and no offset.
    pub fn new(start: Option<T>, end: Option<T>) -> Self {
        Self {
            start,
            end,
            offset: None,
        }
    }

    /// Range with neither bound.
    pub fn empty() -> Self {
        Self {
            start: None,
            end: None,
            offset: None,
        }
    }

    /// Attach an offset.
    pub fn with_offset(mut self, offset: Option<T>) -> Self {
        self.offset = offset;
        self
    }

    /// True when neither bound is set.
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

impl<T: Copy + PartialOrd> Range<T> {
    /// True if `start` comes before `value` in index direction.
    pub fn starts_before(&self, value: T, increasing: bool, inclusive: bool) -> bool {
        self.start
            .is_some_and(|start| precedes(start, value, increasing, inclusive))
    }

    /// True if `start` comes after `value` in index direction.
    pub fn starts_after(&self, value: T, increasing: bool, inclusive: bool) -> bool {
        self.start
            .is_some_and(|start| precedes(value, start, increasing, inclusive))
    }

    /// True if `end` comes before `value` in index direction.
    pub fn ends_before(&self, value: T, increasing: bool, inclusive: bool) -> bool {
        self.end
            .is_some_and(|end| precedes(end, value, increasing, inclusive))
    }

    /// True if `end` comes after `value` in index direction.
    pub fn ends_after(&self, value: T, increasing: bool, inclusive: bool) -> bool {
        self.end
            .is_some_and(|end| precedes(value, end, increasing, inclusive))
    }

    /// Closed-interval containment. An empty range contains nothing.
    pub fn contains(&self, value: T, increasing: bool) -> bool {
        !self.is_empty()
            && !self.starts_after(value, increasing, false)
            && !self.ends_before(value, increasing, false)
    }

    /// Half-open containment `[start, end)`, used for chunk windows.
    pub fn contains_half_open(&self, value: T, increasing: bool) -> bool {
        !self.is_empty()
            && !self.starts_after(value, increasing, false)
            && !self.ends_before(value, increasing, true)
    }

    /// Normalize so that `start <= end` numerically, regardless of direction.
    pub fn sort(self) -> Self {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start > end => Self {
                start: Some(end),
                end: Some(start),
                offset: self.offset,
            },
            _ => self,
        }
    }

    /// Order a two-sided range so `start` comes first in index direction.
    /// Ranges with an open bound are returned unchanged.
    pub fn oriented(self, increasing: bool) -> Self {
        let sorted = self.sort();
        if increasing {
            return sorted;
        }
        match (sorted.start, sorted.end) {
            (Some(start), Some(end)) => Self {
                start: Some(end),
                end: Some(start),
                offset: sorted.offset,
            },
            _ => sorted,
        }
    }

    /// Widen the range so it covers `value`, respecting index direction.
    pub fn include(&mut self, value: T, increasing: bool) {
        match self.start {
            Some(start) if !precedes(value, start, increasing, false) => {}
            _ => self.start = Some(value),
        }
        match self.end {
            Some(end) if !precedes(end, value, increasing, false) => {}
            _ => self.end = Some(value),
        }
    }
}

impl Range<f64> {
    /// Aligned chunk window containing `anchor`.
    ///
    /// For an increasing index the window is
    /// `[floor(anchor / size) * size, start + size)`; for a decreasing index
    /// it is `[ceil(anchor / size) * size, start - size)`.
    pub fn compute_range(anchor: f64, chunk_size: f64, increasing: bool) -> Self {
        debug_assert!(chunk_size > 0.0, "chunk size must be positive");
        let start = if increasing {
            (anchor / chunk_size).floor() * chunk_size
        } else {
            (anchor / chunk_size).ceil() * chunk_size
        };
        let end = if increasing {
            start + chunk_size
        } else {
            start - chunk_size
        };
        Self::new(Some(start), Some(end))
    }

    /// Build a range from raw tokens.
    ///
    /// Time tokens are RFC 3339 timestamps converted to epoch microseconds,
    /// and the offset of the first parsed token is kept in `offset`.
    /// Unparseable tokens are treated as absent; if both are absent the
    /// range is empty.
    pub fn parse(start: Option<&str>, end: Option<&str>, is_time: bool) -> Self {
        let parse_one = |token: Option<&str>| -> Option<(f64, Option<f64>)> {
            let token = token?.trim();
            if token.is_empty() {
                return None;
            }
            if is_time {
                parse_time_micros(token).map(|(micros, offset)| (micros, Some(offset)))
            } else {
                token.parse::<f64>().ok().map(|v| (v, None))
            }
        };

        let start = parse_one(start);
        let end = parse_one(end);
        let offset = start.and_then(|(_, o)| o).or(end.and_then(|(_, o)| o));

        Self::new(start.map(|(v, _)| v), end.map(|(v, _)| v)).with_offset(offset)
    }
}

/// `a` comes before `b` in index direction (or equals it when `inclusive`).
fn precedes<T: PartialOrd>(a: T, b: T, increasing: bool, inclusive: bool) -> bool {
    match (increasing, inclusive) {
        (true, false) => a < b,
        (true, true) => a <= b,
        (false, false) => a > b,
        (false, true) => a >= b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_direction_aware() {
        let inc = Range::new(Some(10.0), Some(20.0));
        assert!(inc.contains(10.0, true));
        assert!(inc.contains(20.0, true));
        assert!(!inc.contains(21.0, true));

        let dec = Range::new(Some(20.0), Some(10.0));
        assert!(dec.contains(15.0, false));
        assert!(dec.contains(10.0, false));
        assert!(!dec.contains(9.0, false));
        // Read as increasing, a reversed range contains nothing.
        assert!(!dec.contains(15.0, true));
    }

    #[test]
    fn empty_range_contains_nothing() {
        let r: Range<f64> = Range::empty();
        assert!(r.is_empty());
        assert!(!r.contains(0.0, true));
        assert!(!r.contains_half_open(0.0, true));
    }

    #[test]
    fn open_end_extends_forever() {
        let r = Range::new(Some(5.0), None);
        assert!(r.contains(1e9, true));
        assert!(!r.contains(4.0, true));
    }

    #[test]
    fn starts_and_ends_predicates() {
        let r = Range::new(Some(10.0), Some(20.0));
        assert!(r.starts_before(11.0, true, false));
        assert!(!r.starts_before(10.0, true, false));
        assert!(r.starts_before(10.0, true, true));
        assert!(r.starts_after(9.0, true, false));
        assert!(r.ends_before(21.0, true, false));
        assert!(r.ends_after(19.0, true, false));
        assert!(r.ends_after(20.0, true, true));

        // Decreasing: 11 comes before 10.
        assert!(r.starts_after(11.0, false, false));
    }

    #[test]
    fn sort_normalizes_numerically() {
        let r = Range::new(Some(20.0), Some(10.0)).sort();
        assert_eq!(r.start, Some(10.0));
        assert_eq!(r.end, Some(20.0));

        let already = Range::new(Some(1.0), Some(2.0)).sort();
        assert_eq!(already.start, Some(1.0));
    }

    #[test]
    fn oriented_follows_index_direction() {
        let numeric = Range::new(Some(10.0), Some(20.0));
        assert_eq!(numeric.oriented(true), numeric);
        assert_eq!(numeric.oriented(false), Range::new(Some(20.0), Some(10.0)));
        assert_eq!(
            Range::new(Some(20.0), Some(10.0)).oriented(true),
            numeric
        );
        let open = Range::new(Some(10.0), None);
        assert_eq!(open.oriented(false), open);
        assert!(numeric.oriented(false).contains(15.0, false));
    }

    #[test]
    fn compute_range_aligns_to_chunk() {
        let r = Range::compute_range(1234.5, 1000.0, true);
        assert_eq!(r.start, Some(1000.0));
        assert_eq!(r.end, Some(2000.0));
        assert!(r.contains_half_open(1000.0, true));
        assert!(!r.contains_half_open(2000.0, true));

        let d = Range::compute_range(1234.5, 1000.0, false);
        assert_eq!(d.start, Some(2000.0));
        assert_eq!(d.end, Some(1000.0));
        assert!(d.contains_half_open(1500.0, false));
        assert!(!d.contains_half_open(1000.0, false));
    }

    #[test]
    fn include_widens_in_direction() {
        let mut r = Range::empty();
        r.include(5.0, true);
        r.include(3.0, true);
        r.include(8.0, true);
        assert_eq!((r.start, r.end), (Some(3.0), Some(8.0)));

        let mut d = Range::empty();
        d.include(5.0, false);
        d.include(3.0, false);
        d.include(8.0, false);
        assert_eq!((d.start, d.end), (Some(8.0), Some(3.0)));
    }

    #[test]
    fn parse_depth_and_time_tokens() {
        let r = Range::parse(Some("1.5"), Some(" 9 "), false);
        assert_eq!((r.start, r.end), (Some(1.5), Some(9.0)));

        let none = Range::parse(None, Some("abc"), false);
        assert!(none.is_empty());

        let t = Range::parse(Some("1970-01-01T00:00:01+01:00"), None, true);
        assert_eq!(t.start, Some(-3_599_000_000.0));
        assert_eq!(t.offset, Some(3_600_000_000.0));
        assert_eq!(t.end, None);
    }
}
