//! Per-query bookkeeping shared by the iterators.

use tracing::warn;

use crate::core::buffer::RecordBuffer;
use crate::core::config::ScanConfig;
use crate::core::intervals::IntervalPool;
use crate::core::matches::Match;
use crate::core::pool::BoundedPool;
use crate::parsing::ParseError;
use crate::retention::PostProcessor;

/// Match pools, output buffer and counters for the query being parsed.
///
/// Iterators call [`start_query`](Self::start_query), register each match,
/// and finish with [`finish_query`](Self::finish_query), which runs the
/// retention policy and leaves the records in the buffer.
#[derive(Debug)]
pub struct ScanState {
    max_parse_errors: usize,
    post_processor: PostProcessor,
    pool: BoundedPool,
    intervals: IntervalPool,
    ordered: Vec<Match>,
    buffer: RecordBuffer,
    long_reads: bool,
    query: Option<String>,
    next_order: u32,
    read_count: u64,
    parse_errors: usize,
}

impl ScanState {
    #[must_use]
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            max_parse_errors: config.max_parse_errors,
            post_processor: PostProcessor::new(config),
            pool: BoundedPool::new(config.max_matches_per_read),
            intervals: IntervalPool::new(),
            ordered: Vec::new(),
            buffer: RecordBuffer::new(),
            long_reads: config.long_reads,
            query: None,
            next_order: 0,
            read_count: 0,
            parse_errors: 0,
        }
    }

    pub fn set_long_reads(&mut self, long_reads: bool) {
        self.long_reads = long_reads;
    }

    #[must_use]
    pub fn is_long_reads(&self) -> bool {
        self.long_reads
    }

    /// Begin a new query named by the first word of `name`.
    ///
    /// An empty name is replaced by `Read<N>`, counting queries from 1.
    pub fn start_query(&mut self, name: &str) {
        self.read_count += 1;
        let name = match name.split_whitespace().next() {
            Some(word) => word.to_string(),
            None => format!("Read{}", self.read_count),
        };
        self.query = Some(name);
        self.pool.clear();
        self.intervals.clear();
        self.ordered.clear();
        self.next_order = 0;
    }

    #[must_use]
    pub fn in_query(&self) -> bool {
        self.query.is_some()
    }

    #[must_use]
    pub fn query_name(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Would a match with `score` be kept right now?
    ///
    /// Checked before rendering so hopeless short-read matches are never
    /// formatted. Long reads accept everything until post-processing.
    #[must_use]
    pub fn accepts(&self, score: f32) -> bool {
        self.long_reads || self.pool.accepts(score)
    }

    /// Register a match spanning `query_span` (1-based, either orientation).
    ///
    /// `render` is only called if the match is kept. Returns whether it was.
    pub fn register<F>(&mut self, score: f32, query_span: (u32, u32), render: F) -> bool
    where
        F: FnOnce(&str) -> String,
    {
        let Some(query) = self.query.as_deref() else {
            return false;
        };
        if !self.accepts(score) {
            self.next_order += 1;
            return false;
        }
        let m = Match::new(score, self.next_order, render(query));
        self.next_order += 1;
        if self.long_reads {
            self.intervals.insert(query_span.0, query_span.1, m);
            true
        } else {
            self.pool.insert(m)
        }
    }

    /// Append a record to the explicit ordered list of the current query
    pub fn push_ordered(&mut self, score: f32, record: String) {
        let m = Match::new(score, self.next_order, record);
        self.next_order += 1;
        self.ordered.push(m);
    }

    /// Run retention for the current query and return its record count.
    ///
    /// Returns `None` if no query was started.
    pub fn finish_query(&mut self) -> Option<usize> {
        let query = self.query.take()?;
        let intervals = if self.long_reads {
            Some(&mut self.intervals)
        } else {
            None
        };
        let count = self.post_processor.process(
            &query,
            &mut self.buffer,
            self.long_reads,
            intervals,
            &mut self.pool,
            &self.ordered,
        );
        self.ordered.clear();
        Some(count)
    }

    /// Count a malformed record.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::TooManyErrors` once the count exceeds the limit.
    pub fn record_error(&mut self, error: &ParseError) -> Result<(), ParseError> {
        self.parse_errors += 1;
        warn!(query = self.query.as_deref().unwrap_or("-"), "{error}");
        if self.parse_errors > self.max_parse_errors {
            return Err(ParseError::TooManyErrors(
                self.parse_errors,
                self.max_parse_errors,
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn parse_errors(&self) -> usize {
        self.parse_errors
    }

    #[must_use]
    pub fn record_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Take the current records, leaving the buffer empty
    #[must_use]
    pub fn take_record_bytes(&mut self) -> Vec<u8> {
        let bytes = self.buffer.as_bytes().to_vec();
        self.buffer.clear();
        bytes
    }
}
