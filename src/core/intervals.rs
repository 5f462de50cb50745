use coitrees::{BasicCOITree, Interval, IntervalTree};

use crate::core::matches::Match;

/// A long-read match placed on the query by its 1-based inclusive span.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalEntry {
    pub start: u32,
    pub end: u32,
    pub matched: Match,
}

impl IntervalEntry {
    #[must_use]
    pub fn length(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Number of query positions shared with `other`
    #[must_use]
    pub fn overlap(&self, other: &IntervalEntry) -> u32 {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if end >= start {
            end - start + 1
        } else {
            0
        }
    }
}

/// Per-query collection of long-read matches keyed by query span.
///
/// Insertion is unbounded; filtering happens in post-processing, which asks
/// for an [`OverlapIndex`] over the current contents.
#[derive(Debug, Clone, Default)]
pub struct IntervalPool {
    entries: Vec<IntervalEntry>,
}

impl IntervalPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a match; the span is normalized so that `start <= end`
    pub fn insert(&mut self, start: u32, end: u32, matched: Match) {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        self.entries.push(IntervalEntry {
            start: start.max(1),
            end: end.max(1),
            matched,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn entries(&self) -> &[IntervalEntry] {
        &self.entries
    }

    /// Remove and return all entries, leaving the pool empty for the next query
    pub fn take_entries(&mut self) -> Vec<IntervalEntry> {
        std::mem::take(&mut self.entries)
    }
}

/// Overlap index over a slice of entries, rebuilt for each query.
pub struct OverlapIndex {
    tree: BasicCOITree<usize, u32>,
}

impl OverlapIndex {
    #[must_use]
    pub fn build(entries: &[IntervalEntry]) -> Self {
        let intervals: Vec<Interval<usize>> = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| Interval::new(to_i32(entry.start), to_i32(entry.end), idx))
            .collect();
        Self {
            tree: BasicCOITree::new(intervals.as_slice()),
        }
    }

    /// Visit the index of every entry overlapping `[start, end]`
    pub fn for_each_overlap<F: FnMut(usize)>(&self, start: u32, end: u32, mut visit: F) {
        self.tree.query(to_i32(start), to_i32(end), |node| {
            visit(node.metadata.to_owned());
        });
    }
}

#[inline]
fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
