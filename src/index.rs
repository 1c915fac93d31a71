//! Length-bucketed candidate index.
//!
//! Records are kept sorted by content length; each distinct length maps to
//! its contiguous range in the sorted array, so a length-scope query is a
//! ladder scan plus one slice, never a full pass over the records.

use crate::types::{Record, SHORT_CONTENT_FLOOR};

/// Records sorted by content length with a distinct-length ladder
#[derive(Debug)]
pub struct LengthBucketedIndex {
    records: Vec<Record>,
    /// Distinct lengths, ascending
    lengths: Vec<usize>,
    /// `[start, end]` (inclusive) range per distinct length
    ranges: Vec<(usize, usize)>,
}

impl LengthBucketedIndex {
    /// Build the index from a record set. Ordering among equal lengths is
    /// the input order.
    pub fn build(mut records: Vec<Record>) -> Self {
        records.sort_by_key(|r| r.length);

        let mut lengths: Vec<usize> = Vec::new();
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        for (index, record) in records.iter().enumerate() {
            match lengths.last() {
                Some(&last) if last == record.length => {
                    ranges.last_mut().unwrap().1 = index;
                }
                _ => {
                    lengths.push(record.length);
                    ranges.push((index, index));
                }
            }
        }

        Self {
            records,
            lengths,
            ranges,
        }
    }

    /// All records whose length lies within `scope` of `length`.
    ///
    /// Short probe lengths (below the short-content floor) return only the
    /// exact-length bucket: short strings are matched by length class, not
    /// by scope. Scope queries never descend below the floor.
    pub fn query(&self, length: usize, scope: usize) -> &[Record] {
        if length >= SHORT_CONTENT_FLOOR {
            let lower = length.saturating_sub(scope).max(SHORT_CONTENT_FLOOR);
            let upper = length + scope;

            let first = self.lengths.partition_point(|&len| len < lower);
            let last = self.lengths.partition_point(|&len| len <= upper);
            if first >= last {
                return &[];
            }
            let start = self.ranges[first].0;
            let end = self.ranges[last - 1].1;
            &self.records[start..=end]
        } else {
            match self.lengths.binary_search(&length) {
                Ok(position) => {
                    let (start, end) = self.ranges[position];
                    &self.records[start..=end]
                }
                Err(_) => &[],
            }
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
