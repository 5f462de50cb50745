use std::collections::BTreeMap;

use crate::core::matches::{Match, Rank};

/// Ranked set of matches for one query, optionally bounded.
///
/// Entries are keyed by [`Rank`], so iteration yields output order and the
/// worst entry is the last key.
#[derive(Debug, Clone, Default)]
pub struct BoundedPool {
    capacity: Option<usize>,
    entries: BTreeMap<Rank, String>,
}

impl BoundedPool {
    /// Create a pool holding at most `capacity` matches (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.entries.len() >= cap)
    }

    /// Would a match with this score be kept if inserted now?
    ///
    /// A later match with a score equal to the current worst loses the tie.
    #[must_use]
    pub fn accepts(&self, score: f32) -> bool {
        !self.is_full() || self.worst().is_some_and(|worst| score > worst.score)
    }

    /// Insert respecting the bound, evicting the worst entry on overflow.
    /// Returns false if the match was rejected.
    pub fn insert(&mut self, m: Match) -> bool {
        if !self.accepts(m.score) {
            return false;
        }
        self.insert_unbounded(m);
        if let Some(cap) = self.capacity {
            while self.entries.len() > cap {
                self.entries.pop_last();
            }
        }
        true
    }

    /// Insert ignoring the capacity
    pub fn insert_unbounded(&mut self, m: Match) {
        let rank = m.rank();
        let previous = self.entries.insert(rank, m.record);
        debug_assert!(
            previous.is_none(),
            "two matches share score {} and discovery order {}",
            rank.score,
            rank.discovery_order
        );
    }

    #[must_use]
    pub fn worst(&self) -> Option<Rank> {
        self.entries.last_key_value().map(|(rank, _)| *rank)
    }

    pub fn pop_worst(&mut self) -> Option<Match> {
        self.entries.pop_last().map(|(rank, record)| Match {
            score: rank.score,
            discovery_order: rank.discovery_order,
            record,
        })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Records in output order
    pub fn records(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    /// Ranks in output order
    pub fn ranks(&self) -> impl Iterator<Item = &Rank> {
        self.entries.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(score: f32, order: u32) -> Match {
        Match::new(score, order, format!("r{order}"))
    }

    #[test]
    fn test_bound_is_never_exceeded() {
        let mut pool = BoundedPool::new(3);
        for (i, score) in [5.0, 1.0, 9.0, 3.0, 7.0, 2.0, 8.0].into_iter().enumerate() {
            pool.insert(m(score, i as u32));
            assert!(pool.len() <= 3);
        }
        let scores: Vec<f32> = pool.ranks().map(|r| r.score).collect();
        assert_eq!(scores, vec![9.0, 8.0, 7.0]);
    }

    #[test]
    fn test_equal_score_does_not_evict_earlier() {
        let mut pool = BoundedPool::new(1);
        assert!(pool.insert(m(5.0, 0)));
        assert!(!pool.insert(m(5.0, 1)));
        assert_eq!(pool.records().collect::<Vec<_>>(), vec!["r0"]);
    }

    #[test]
    fn test_accepts_reflects_worst() {
        let mut pool = BoundedPool::new(2);
        pool.insert(m(4.0, 0));
        assert!(pool.accepts(1.0));
        pool.insert(m(6.0, 1));
        assert!(!pool.accepts(4.0));
        assert!(pool.accepts(4.5));
    }

    #[test]
    fn test_pop_worst_and_unbounded() {
        let mut pool = BoundedPool::unbounded();
        for i in 0..10 {
            pool.insert(m(i as f32, i));
        }
        assert_eq!(pool.len(), 10);
        let worst = pool.pop_worst().unwrap();
        assert_eq!(worst.discovery_order, 0);
        assert_eq!(pool.worst().unwrap().score, 1.0);
    }
}
