use crate::core::intervals::{IntervalEntry, OverlapIndex};

/// Thresholds deciding when one long-read match hides another
#[derive(Debug, Clone, Copy)]
pub struct DominationRule {
    /// Fraction of the weaker match's span that must be covered
    pub min_cover_proportion: f32,
    /// The stronger score scaled by this must still beat the weaker score
    pub min_score_proportion: f32,
}

impl DominationRule {
    /// Does `other` dominate `entry`?
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn dominates(&self, other: &IntervalEntry, entry: &IntervalEntry) -> bool {
        let overlap = other.overlap(entry) as f32;
        overlap > self.min_cover_proportion * entry.length() as f32
            && other.matched.score * self.min_score_proportion > entry.matched.score
    }
}

/// Drop every entry dominated by some other entry.
///
/// Domination is judged against the full input set, so an entry that is
/// itself dominated can still remove others.
#[must_use]
pub fn retain_undominated(entries: Vec<IntervalEntry>, rule: DominationRule) -> Vec<IntervalEntry> {
    if entries.len() < 2 {
        return entries;
    }
    let index = OverlapIndex::build(&entries);
    let keep: Vec<bool> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let mut dominated = false;
            index.for_each_overlap(entry.start, entry.end, |other| {
                if !dominated && other != idx && rule.dominates(&entries[other], entry) {
                    dominated = true;
                }
            });
            !dominated
        })
        .collect();

    entries
        .into_iter()
        .zip(keep)
        .filter_map(|(entry, keep)| keep.then_some(entry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matches::Match;

    const RULE: DominationRule = DominationRule {
        min_cover_proportion: 0.9,
        min_score_proportion: 0.9,
    };

    fn entry(start: u32, end: u32, score: f32, order: u32) -> IntervalEntry {
        IntervalEntry {
            start,
            end,
            matched: Match::new(score, order, format!("m{order}")),
        }
    }

    fn orders(entries: &[IntervalEntry]) -> Vec<u32> {
        entries.iter().map(|e| e.matched.discovery_order).collect()
    }

    #[test]
    fn test_full_overlap_drops_weaker() {
        let kept = retain_undominated(vec![entry(1, 100, 100.0, 0), entry(1, 100, 80.0, 1)], RULE);
        assert_eq!(orders(&kept), vec![0]);
    }

    #[test]
    fn test_close_scores_both_survive() {
        // 95 * 0.9 = 85.5 does not beat 90
        let kept = retain_undominated(vec![entry(1, 100, 95.0, 0), entry(1, 100, 90.0, 1)], RULE);
        assert_eq!(orders(&kept), vec![0, 1]);
    }

    #[test]
    fn test_disjoint_spans_never_dominate() {
        let kept = retain_undominated(vec![entry(1, 100, 500.0, 0), entry(101, 200, 1.0, 1)], RULE);
        assert_eq!(orders(&kept), vec![0, 1]);
    }

    #[test]
    fn test_partial_cover_below_threshold_survives() {
        // Weak match of length 100 only half covered
        let kept = retain_undominated(vec![entry(1, 100, 500.0, 0), entry(51, 150, 10.0, 1)], RULE);
        assert_eq!(orders(&kept), vec![0, 1]);
    }

    #[test]
    fn test_short_match_inside_long_one_is_dominated() {
        let kept = retain_undominated(
            vec![entry(1, 1000, 800.0, 0), entry(200, 300, 50.0, 1), entry(900, 1100, 60.0, 2)],
            RULE,
        );
        assert_eq!(orders(&kept), vec![0, 2]);
    }

    #[test]
    fn test_single_entry_kept() {
        let kept = retain_undominated(vec![entry(5, 10, 1.0, 0)], RULE);
        assert_eq!(kept.len(), 1);
    }
}
