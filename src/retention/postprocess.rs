use tracing::debug;

use crate::core::buffer::RecordBuffer;
use crate::core::config::ScanConfig;
use crate::core::intervals::IntervalPool;
use crate::core::matches::Match;
use crate::core::pool::BoundedPool;
use crate::retention::domination::{retain_undominated, DominationRule};

/// Applies the retention policy to one query and serializes the survivors.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    rule: DominationRule,
}

impl PostProcessor {
    #[must_use]
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            rule: DominationRule {
                min_cover_proportion: config.min_cover_proportion,
                min_score_proportion: config.min_score_proportion,
            },
        }
    }

    /// Fill `buffer` with the records kept for `query_name` and return how
    /// many there are.
    ///
    /// A non-empty `ordered` list is written as given. Otherwise, in long-read
    /// mode, `intervals` are filtered for domination and moved into `pool`.
    /// The pool is then written in rank order. A query with nothing left is
    /// written as its bare name and counts as zero records.
    pub fn process(
        &self,
        query_name: &str,
        buffer: &mut RecordBuffer,
        long_reads: bool,
        intervals: Option<&mut IntervalPool>,
        pool: &mut BoundedPool,
        ordered: &[Match],
    ) -> usize {
        buffer.clear();

        if !ordered.is_empty() {
            for m in ordered {
                buffer.push_record(&m.record);
            }
            return ordered.len();
        }

        if long_reads {
            if let Some(intervals) = intervals {
                pool.clear();
                let candidates = intervals.take_entries();
                let total = candidates.len();
                for entry in retain_undominated(candidates, self.rule) {
                    pool.insert_unbounded(entry.matched);
                }
                debug!(
                    query = query_name,
                    total,
                    kept = pool.len(),
                    "long-read domination filter"
                );
            }
        }

        if pool.is_empty() {
            buffer.push_record(query_name);
            return 0;
        }
        for record in pool.records() {
            buffer.push_record(record);
        }
        pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> PostProcessor {
        PostProcessor::new(&ScanConfig::default())
    }

    #[test]
    fn test_empty_query_writes_bare_name() {
        let mut buffer = RecordBuffer::new();
        let mut pool = BoundedPool::new(5);
        let count = processor().process("read7", &mut buffer, false, None, &mut pool, &[]);
        assert_eq!(count, 0);
        assert_eq!(buffer.as_bytes(), b"read7\n");
    }

    #[test]
    fn test_pool_written_in_rank_order() {
        let mut buffer = RecordBuffer::new();
        let mut pool = BoundedPool::new(5);
        pool.insert(Match::new(10.0, 0, "low"));
        pool.insert(Match::new(30.0, 1, "high"));
        pool.insert(Match::new(30.0, 2, "high-later"));
        let count = processor().process("q", &mut buffer, false, None, &mut pool, &[]);
        assert_eq!(count, 3);
        assert_eq!(buffer.as_bytes(), b"high\nhigh-later\nlow\n");
    }

    #[test]
    fn test_ordered_list_written_verbatim() {
        let mut buffer = RecordBuffer::new();
        let mut pool = BoundedPool::new(5);
        pool.insert(Match::new(99.0, 0, "ignored"));
        let ordered = vec![Match::new(1.0, 0, "deep"), Match::new(5.0, 1, "shallow")];
        let count = processor().process("q", &mut buffer, false, None, &mut pool, &ordered);
        assert_eq!(count, 2);
        assert_eq!(buffer.as_bytes(), b"deep\nshallow\n");
    }

    #[test]
    fn test_long_reads_filter_dominated() {
        let mut buffer = RecordBuffer::new();
        let mut pool = BoundedPool::new(1);
        let mut intervals = IntervalPool::new();
        intervals.insert(1, 100, Match::new(100.0, 0, "strong"));
        intervals.insert(100, 1, Match::new(50.0, 1, "weak"));
        intervals.insert(500, 600, Match::new(10.0, 2, "elsewhere"));

        let count = processor().process("q", &mut buffer, true, Some(&mut intervals), &mut pool, &[]);
        assert_eq!(count, 2);
        assert_eq!(buffer.as_bytes(), b"strong\nelsewhere\n");
        assert!(intervals.is_empty());
    }

    #[test]
    fn test_buffer_reused_between_queries() {
        let mut buffer = RecordBuffer::new();
        let mut pool = BoundedPool::new(2);
        pool.insert(Match::new(1.0, 0, "first"));
        processor().process("a", &mut buffer, false, None, &mut pool, &[]);
        pool.clear();
        processor().process("b", &mut buffer, false, None, &mut pool, &[]);
        assert_eq!(buffer.as_bytes(), b"b\n");
    }
}
