//! FASTA input, one self-assignment per sequence.
//!
//! Every `>` header becomes a query named by its first word, with a single
//! record whose reference is the whole header and whose score is fixed.
//! Sequence lines are skipped.

use crate::core::record::{render_self_assignment, MAX_SCORE};
use crate::parsing::iterator::QueryParser;
use crate::parsing::lines::LineReader;
use crate::parsing::state::ScanState;
use crate::parsing::ParseError;

/// Grammar for FASTA files
#[derive(Debug, Clone, Copy, Default)]
pub struct FastaParser;

impl FastaParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl QueryParser for FastaParser {
    fn parse_query(
        &mut self,
        reader: &mut LineReader,
        state: &mut ScanState,
    ) -> Result<bool, ParseError> {
        let Some(line) = reader.next_line_with_prefix(&[">"]) else {
            return Ok(false);
        };
        let header = line.trim_start()[1..].trim();
        state.start_query(header);

        if let Some(name) = state.query_name().map(str::to_string) {
            let reference = if header.is_empty() { name.as_str() } else { header };
            let record = render_self_assignment(&name, reference);
            state.push_ordered(MAX_SCORE, record);
        }

        while let Some(line) = reader.next_line() {
            if line.trim_start().starts_with('>') {
                reader.push_back(line);
                break;
            }
        }
        Ok(true)
    }

    fn recover(&mut self, reader: &mut LineReader) {
        if let Some(line) = reader.next_line_with_prefix(&[">"]) {
            reader.push_back(line);
        }
    }
}
