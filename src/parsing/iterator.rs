//! Generic driver for line-based formats.
//!
//! A [`QueryParser`] knows one format's grammar; [`LineIterator`] owns the
//! reader and the per-query state, runs the parser one query at a time,
//! and turns recoverable parse errors into counted warnings.

use tracing::debug;

use crate::core::config::ScanConfig;
use crate::parsing::lines::{InputSource, LineReader};
use crate::parsing::state::ScanState;
use crate::parsing::{MatchIterator, ParseError};

/// Grammar for one line-based format
pub trait QueryParser: Send {
    /// Parse the next query, registering its matches in `state`.
    ///
    /// Returns `Ok(false)` when the input holds no further query.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` describing the first malformed line.
    fn parse_query(
        &mut self,
        reader: &mut LineReader,
        state: &mut ScanState,
    ) -> Result<bool, ParseError>;

    /// Skip forward after a malformed record so the next call starts on a
    /// fresh query
    fn recover(&mut self, reader: &mut LineReader);

    /// Whether lines starting with `#` are hidden from the parser
    fn skips_comments(&self) -> bool {
        false
    }

    /// Whether the parser holds input read ahead of the reader
    fn has_pending(&self) -> bool {
        false
    }
}

/// [`MatchIterator`] over a line-based format
pub struct LineIterator<P> {
    reader: LineReader,
    state: ScanState,
    parser: P,
    format_warning: Option<String>,
    closed: bool,
}

impl<P: QueryParser> LineIterator<P> {
    #[must_use]
    pub fn new(source: InputSource, parser: P, config: &ScanConfig) -> Self {
        Self::with_reader(LineReader::new(source), parser, config)
    }

    /// Build around a reader that has already been positioned, e.g. past a
    /// header the parser consumed at construction
    #[must_use]
    pub fn with_reader(mut reader: LineReader, parser: P, config: &ScanConfig) -> Self {
        reader.set_skip_comments(parser.skips_comments());
        Self {
            reader,
            state: ScanState::new(config),
            parser,
            format_warning: None,
            closed: false,
        }
    }

    #[must_use]
    pub fn parser(&self) -> &P {
        &self.parser
    }
}

impl<P: QueryParser> MatchIterator for LineIterator<P> {
    fn has_more(&mut self) -> bool {
        !self.closed && (self.parser.has_pending() || self.reader.has_more_lines())
    }

    fn advance(&mut self) -> Result<Option<usize>, ParseError> {
        if self.closed {
            return Ok(None);
        }
        loop {
            match self.parser.parse_query(&mut self.reader, &mut self.state) {
                Ok(true) => {
                    if let Some(e) = self.reader.take_error() {
                        return Err(ParseError::Io(e));
                    }
                    return Ok(self.state.finish_query());
                }
                Ok(false) => {
                    if let Some(e) = self.reader.take_error() {
                        return Err(ParseError::Io(e));
                    }
                    return Ok(None);
                }
                Err(e) if e.is_recoverable() => {
                    self.state.record_error(&e)?;
                    self.parser.recover(&mut self.reader);
                    if self.state.in_query() {
                        debug!("emitting matches collected before the malformed record");
                        return Ok(self.state.finish_query());
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn record_bytes(&self) -> &[u8] {
        self.state.record_bytes()
    }

    fn set_long_reads(&mut self, long_reads: bool) {
        self.state.set_long_reads(long_reads);
    }

    fn is_long_reads(&self) -> bool {
        self.state.is_long_reads()
    }

    fn progress(&self) -> u64 {
        self.reader.progress()
    }

    fn max_progress(&self) -> u64 {
        self.reader.max_progress()
    }

    fn parse_errors(&self) -> usize {
        self.state.parse_errors()
    }

    fn format_warning(&self) -> Option<&str> {
        self.format_warning.as_deref()
    }

    fn set_format_warning(&mut self, warning: String) {
        self.format_warning = Some(warning);
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Run a parser over `text` and collect each query's records
    pub fn collect<P: QueryParser>(text: &str, parser: P, config: &ScanConfig) -> Vec<(usize, String)> {
        let mut iterator = LineIterator::new(InputSource::from_bytes(text.as_bytes().to_vec()), parser, config);
        let mut out = Vec::new();
        while iterator.has_more() {
            match iterator.advance().unwrap() {
                Some(count) => out.push((
                    count,
                    String::from_utf8(iterator.record_bytes().to_vec()).unwrap(),
                )),
                None => break,
            }
        }
        out
    }
}
