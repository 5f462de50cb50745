use std::cmp::Ordering;

/// One candidate alignment of a query against a reference, already rendered
/// as a canonical record.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Primary ranking key, higher is better
    pub score: f32,

    /// Position of this match in parse order within its query
    pub discovery_order: u32,

    /// Rendered record, without the trailing newline
    pub record: String,
}

impl Match {
    pub fn new(score: f32, discovery_order: u32, record: impl Into<String>) -> Self {
        Self {
            score,
            discovery_order,
            record: record.into(),
        }
    }

    #[must_use]
    pub fn rank(&self) -> Rank {
        Rank {
            score: self.score,
            discovery_order: self.discovery_order,
        }
    }
}

/// The (score, discovery order) pair that decides where a match sorts.
#[derive(Debug, Clone, Copy)]
pub struct Rank {
    pub score: f32,
    pub discovery_order: u32,
}

/// Total order over ranks: higher score first, then earlier discovery.
///
/// Used both to keep the bounded pool and to order serialized output.
#[must_use]
pub fn rank_order(a: &Rank, b: &Rank) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.discovery_order.cmp(&b.discovery_order))
}

impl PartialEq for Rank {
    fn eq(&self, other: &Self) -> bool {
        rank_order(self, other) == Ordering::Equal
    }
}

impl Eq for Rank {}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_order(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank(score: f32, order: u32) -> Rank {
        Rank {
            score,
            discovery_order: order,
        }
    }

    #[test]
    fn test_higher_score_sorts_first() {
        assert_eq!(rank_order(&rank(50.0, 3), &rank(40.0, 1)), Ordering::Less);
        assert_eq!(rank_order(&rank(40.0, 1), &rank(50.0, 3)), Ordering::Greater);
    }

    #[test]
    fn test_ties_break_by_discovery() {
        assert_eq!(rank_order(&rank(50.0, 1), &rank(50.0, 2)), Ordering::Less);
        assert_eq!(rank_order(&rank(50.0, 2), &rank(50.0, 2)), Ordering::Equal);
    }

    #[test]
    fn test_sorting_matches() {
        let mut ranks = vec![rank(1.0, 0), rank(3.0, 1), rank(3.0, 2), rank(2.0, 3)];
        ranks.sort();
        let orders: Vec<u32> = ranks.iter().map(|r| r.discovery_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 0]);
    }
}
