//! Row indices, row ranges and the multi-range index set
//!
//! An [`IndexSet`] composes one or more [`RowRange`]s into a single logical
//! enumeration of rows. Every call to [`IndexSet::iter`] starts a fresh pass over
//! all ranges in declaration order, so the same set can drive one pass per
//! gathered input and one per scattered output while producing the identical
//! sequence each time.

use std::fmt;
use std::ops::{Range, RangeInclusive};

use crate::error::{Error, Result};

/// Opaque identifier of a row inside a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowIndex(u64);

impl RowIndex {
    /// Create a row index from a raw key
    pub const fn new(key: u64) -> Self {
        Self(key)
    }

    /// Get the raw key
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for RowIndex {
    fn from(key: u64) -> Self {
        Self(key)
    }
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A read-only range of rows owned by the dataset layer
///
/// `iter` must be restartable: each call walks the range from its start and
/// yields exactly `size()` indices in the same order.
pub trait RowRange {
    /// Number of rows in this range
    fn size(&self) -> usize;

    /// Enumerate the rows of this range in native order
    fn iter(&self) -> Box<dyn Iterator<Item = RowIndex> + '_>;
}

/// An ordered set of row keys stored as inclusive key ranges
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowSet {
    /// Key ranges in enumeration order, never empty
    ranges: Vec<RangeInclusive<u64>>,

    /// Total number of keys, computed at construction
    size: usize,
}

impl RowSet {
    /// Create an empty row set
    pub const fn empty() -> Self {
        Self {
            ranges: Vec::new(),
            size: 0,
        }
    }

    /// Create a row set with keys `0..n`
    pub fn flat(n: usize) -> Self {
        match (n as u64).checked_sub(1) {
            Some(last) => Self {
                ranges: vec![0..=last],
                size: n,
            },
            None => Self::empty(),
        }
    }

    /// Create a row set from a single half-open key range
    pub fn from_range(range: Range<u64>) -> Result<Self> {
        Self::from_ranges(vec![range])
    }

    /// Create a row set from half-open key ranges, kept in the given order
    ///
    /// Empty ranges are skipped. Fails if the total key count does not fit in
    /// `usize`.
    pub fn from_ranges(ranges: Vec<Range<u64>>) -> Result<Self> {
        Self::from_inclusive(
            ranges
                .into_iter()
                .filter(|r| r.start < r.end)
                .map(|r| r.start..=r.end - 1)
                .collect(),
        )
    }

    /// Create a row set from individual keys, kept in the given order
    ///
    /// Runs of consecutive keys are stored as a single range. Every `u64`,
    /// including `u64::MAX`, is a valid key.
    pub fn from_keys<I: IntoIterator<Item = u64>>(keys: I) -> Result<Self> {
        let mut ranges: Vec<RangeInclusive<u64>> = Vec::new();
        for key in keys {
            match ranges.last_mut() {
                Some(last) if last.end().checked_add(1) == Some(key) => {
                    *last = *last.start()..=key;
                }
                _ => ranges.push(key..=key),
            }
        }
        Self::from_inclusive(ranges)
    }

    fn from_inclusive(ranges: Vec<RangeInclusive<u64>>) -> Result<Self> {
        let size = ranges
            .iter()
            .try_fold(0usize, |total, r| total.checked_add(range_len(r)?))
            .ok_or_else(|| {
                Error::InvalidArgument("Row set holds more keys than fit in usize".into())
            })?;
        Ok(Self { ranges, size })
    }

    /// Get the inclusive key ranges of this set
    pub fn ranges(&self) -> &[RangeInclusive<u64>] {
        &self.ranges
    }

    /// Number of keys in this set
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if this set has no keys
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Largest key in this set
    pub fn max_key(&self) -> Option<u64> {
        self.ranges.iter().map(|r| *r.end()).max()
    }
}

fn range_len(range: &RangeInclusive<u64>) -> Option<usize> {
    usize::try_from(range.end() - range.start()).ok()?.checked_add(1)
}

impl RowRange for RowSet {
    fn size(&self) -> usize {
        self.size
    }

    fn iter(&self) -> Box<dyn Iterator<Item = RowIndex> + '_> {
        Box::new(self.ranges.iter().flat_map(|r| r.clone().map(RowIndex)))
    }
}

static_assertions::assert_impl_all!(RowSet: Send, Sync);

/// Composition of one or more row ranges enumerated as one sequence
pub struct IndexSet<'a> {
    /// Underlying ranges in declaration order
    ranges: Vec<&'a dyn RowRange>,

    /// Sum of range sizes
    count: usize,
}

impl<'a> IndexSet<'a> {
    /// Create an index set over the given ranges
    ///
    /// The range list must not be empty; individual ranges may be. Fails if
    /// the combined row count does not fit in `usize`.
    pub fn new(ranges: Vec<&'a dyn RowRange>) -> Result<Self> {
        if ranges.is_empty() {
            return Err(Error::InvalidArgument(
                "An index set requires at least one row range".into(),
            ));
        }

        let count = ranges
            .iter()
            .try_fold(0usize, |total, r| total.checked_add(r.size()))
            .ok_or_else(|| {
                Error::InvalidArgument("Index set holds more rows than fit in usize".into())
            })?;
        Ok(Self { ranges, count })
    }

    /// Create an index set over a single range
    pub fn single(range: &'a dyn RowRange) -> Self {
        Self {
            count: range.size(),
            ranges: vec![range],
        }
    }

    /// Total number of rows across all ranges
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the set enumerates no rows
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of underlying ranges
    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    /// Start a fresh pass over every range in declaration order
    pub fn iter(&self) -> Rows<'_> {
        Rows {
            ranges: self.ranges.iter(),
            current: None,
            remaining: self.count,
        }
    }
}

impl<'s> IntoIterator for &'s IndexSet<'_> {
    type Item = RowIndex;
    type IntoIter = Rows<'s>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for IndexSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSet")
            .field("ranges", &self.ranges.len())
            .field("count", &self.count)
            .finish()
    }
}

/// One pass over an [`IndexSet`]
pub struct Rows<'s> {
    /// Ranges not yet started
    ranges: std::slice::Iter<'s, &'s dyn RowRange>,

    /// Range currently being walked
    current: Option<Box<dyn Iterator<Item = RowIndex> + 's>>,

    /// Rows left in this pass
    remaining: usize,
}

impl Iterator for Rows<'_> {
    type Item = RowIndex;

    fn next(&mut self) -> Option<RowIndex> {
        loop {
            if let Some(current) = self.current.as_mut() {
                if let Some(row) = current.next() {
                    self.remaining = self.remaining.saturating_sub(1);
                    return Some(row);
                }
            }
            let range = *self.ranges.next()?;
            self.current = Some(range.iter());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Rows<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn keys(index: &IndexSet<'_>) -> Vec<u64> {
        index.iter().map(RowIndex::get).collect()
    }

    #[test]
    fn from_keys_coalesces_runs_in_order() {
        let set = RowSet::from_keys([5, 6, 7, 1, 2, 9]).unwrap();
        assert_eq!(set.ranges(), &[5..=7, 1..=2, 9..=9]);
        assert_eq!(set.len(), 6);
        assert_eq!(set.max_key(), Some(9));
        let walked: Vec<u64> = set.iter().map(RowIndex::get).collect();
        assert_eq!(walked, vec![5, 6, 7, 1, 2, 9]);
    }

    #[test]
    fn keys_at_the_top_of_the_key_space_are_kept() {
        let set = RowSet::from_keys([u64::MAX - 1, u64::MAX]).unwrap();
        assert_eq!(set.ranges(), &[u64::MAX - 1..=u64::MAX]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.max_key(), Some(u64::MAX));
        let walked: Vec<u64> = set.iter().map(RowIndex::get).collect();
        assert_eq!(walked, vec![u64::MAX - 1, u64::MAX]);

        let wrapped = RowSet::from_keys([u64::MAX, 0]).unwrap();
        assert_eq!(wrapped.ranges(), &[u64::MAX..=u64::MAX, 0..=0]);
        assert_eq!(wrapped.len(), 2);
    }

    #[test]
    fn flat_sets_cover_leading_keys() {
        assert!(RowSet::flat(0).is_empty());
        assert_eq!(RowSet::flat(3).ranges(), &[0..=2]);
        assert_eq!(RowSet::from_range(4..4).unwrap(), RowSet::empty());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_counts_are_rejected() {
        assert!(matches!(
            RowSet::from_ranges(vec![0..u64::MAX, 0..2]),
            Err(Error::InvalidArgument(_))
        ));

        let huge = RowSet::from_range(0..u64::MAX).unwrap();
        let small = RowSet::flat(2);
        assert!(matches!(
            IndexSet::new(vec![&huge as &dyn RowRange, &small]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn empty_range_list_is_rejected() {
        assert!(matches!(IndexSet::new(Vec::new()), Err(Error::InvalidArgument(_))));
    }

    #[test_case(vec![], vec![] ; "single empty range")]
    #[test_case(vec![0..3], vec![0, 1, 2] ; "single range")]
    #[test_case(vec![0..2, 10..12, 4..5], vec![0, 1, 10, 11, 4] ; "several ranges")]
    #[test_case(vec![3..5, 7..7, 1..2], vec![3, 4, 1] ; "empty range among others")]
    fn concatenates_in_declaration_order(ranges: Vec<Range<u64>>, expected: Vec<u64>) {
        let sets: Vec<RowSet> = if ranges.is_empty() {
            vec![RowSet::empty()]
        } else {
            ranges.into_iter().map(|r| RowSet::from_range(r).unwrap()).collect()
        };
        let handles: Vec<&dyn RowRange> = sets.iter().map(|s| s as &dyn RowRange).collect();
        let index = IndexSet::new(handles).unwrap();

        assert_eq!(index.len(), expected.len());
        assert_eq!(index.iter().len(), expected.len());
        assert_eq!(keys(&index), expected);
    }

    #[test]
    fn pass_length_tracks_consumption() {
        let set = RowSet::flat(4);
        let index = IndexSet::single(&set);
        let mut rows = index.iter();
        assert_eq!(rows.len(), 4);
        rows.next();
        rows.next();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.collect::<Vec<_>>(), vec![RowIndex::new(2), RowIndex::new(3)]);
    }

    proptest! {
        #[test]
        fn passes_are_restartable_and_counted(
            spans in prop::collection::vec((0u64..1_000, 0u64..20), 1..8)
        ) {
            let sets: Vec<RowSet> = spans
                .iter()
                .map(|&(start, len)| RowSet::from_range(start..start + len).unwrap())
                .collect();
            let handles: Vec<&dyn RowRange> = sets.iter().map(|s| s as &dyn RowRange).collect();
            let index = IndexSet::new(handles).unwrap();

            let first = keys(&index);
            let second = keys(&index);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.len(), index.len());
            let expected: usize = spans.iter().map(|&(_, len)| len as usize).sum();
            prop_assert_eq!(index.len(), expected);
        }
    }
}
