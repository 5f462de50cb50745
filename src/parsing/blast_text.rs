//! Pairwise BLAST text reports (BLASTN, BLASTP, BLASTX).
//!
//! A query starts at `Query=`; each reference block starts at `>` and holds
//! a header that may wrap over several lines, a `Length=` line, and one or
//! more score blocks, each followed by its aligned `Query`/`Sbjct` rows.
//! Both the NCBI 2.x layout and the legacy spacing (`Length = 150`,
//! `Query: 1 ...`) are accepted.

use crate::core::record::Hit;
use crate::core::types::AlignmentMode;
use crate::parsing::iterator::QueryParser;
use crate::parsing::lines::{letters_after, text_between, token_after, LineReader};
use crate::parsing::state::ScanState;
use crate::parsing::ParseError;

const QUERY_MARKER: &str = "Query=";
const REFERENCE_MARKER: &str = ">";
const SCORE_TAG: &str = "Score =";

/// One aligned query/reference pair, continuation chunks already joined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedPair {
    pub query_start: u32,
    pub query_end: u32,
    pub query_row: String,
    pub subject_start: u64,
    pub subject_end: u64,
    pub subject_row: String,
}

/// Parse `<tag>[:] <start> <row> <end>` into its three parts
fn aligned_segment(
    line: &str,
    tag: &str,
    line_number: u64,
) -> Result<(u64, String, u64), ParseError> {
    let rest = line.trim_start()[tag.len()..].trim_start_matches(':');
    let mut tokens = rest.split_whitespace();
    let (Some(start), Some(row), Some(end)) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(ParseError::InvalidFormat {
            line: line_number,
            message: format!("expected '{tag} <start> <sequence> <end>'"),
        });
    };
    let parse = |value: &str| {
        value.parse::<u64>().map_err(|_| ParseError::InvalidField {
            line: line_number,
            field: "alignment coordinate",
            value: value.to_string(),
        })
    };
    Ok((parse(start)?, row.to_string(), parse(end)?))
}

fn is_row(line: &str, tag: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(tag) && !trimmed.starts_with(QUERY_MARKER)
}

/// Whether `line` starts a new query, reference, score block or query row
fn ends_alignment(line: &str, query_tag: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(QUERY_MARKER)
        || trimmed.starts_with(REFERENCE_MARKER)
        || trimmed.starts_with("Score")
        || trimmed.contains(" vs ")
        || is_row(trimmed, query_tag)
}

/// Read the aligned rows following a score block.
///
/// Consecutive chunks that restart with `query_tag` continue the same
/// alignment: rows are concatenated, start coordinates come from the first
/// chunk and end coordinates from the last. The first line that belongs to
/// neither a chunk nor a midline is pushed back. Returns `None` when the
/// input ends before any row.
///
/// # Errors
///
/// Returns a `ParseError` if a row is malformed, a query row has no
/// matching reference row, or the joined rows differ in length.
pub fn read_aligned_pair(
    reader: &mut LineReader,
    query_tag: &str,
    subject_tag: &str,
) -> Result<Option<AlignedPair>, ParseError> {
    let mut pair: Option<AlignedPair> = None;

    while let Some(line) = reader.next_line() {
        if line.trim().is_empty() {
            continue;
        }
        if !is_row(&line, query_tag) {
            reader.push_back(line);
            break;
        }
        let (query_start, query_row, query_end) =
            aligned_segment(&line, query_tag, reader.line_number())?;

        // Midline, if any, sits between the two rows
        let subject_line = loop {
            match reader.next_line() {
                Some(next) if next.trim_start().starts_with(subject_tag) => break next,
                Some(next) if ends_alignment(&next, query_tag) => {
                    reader.push_back(next);
                    return Err(ParseError::MissingToken {
                        line: reader.line_number(),
                        token: "reference alignment row",
                    });
                }
                Some(_) => {}
                None => {
                    return Err(ParseError::MissingToken {
                        line: reader.line_number(),
                        token: "reference alignment row",
                    })
                }
            }
        };
        let (subject_start, subject_row, subject_end) =
            aligned_segment(&subject_line, subject_tag, reader.line_number())?;

        let query_start = u32::try_from(query_start).map_err(|_| ParseError::InvalidField {
            line: reader.line_number(),
            field: "query coordinate",
            value: query_start.to_string(),
        })?;
        let query_end = u32::try_from(query_end).map_err(|_| ParseError::InvalidField {
            line: reader.line_number(),
            field: "query coordinate",
            value: query_end.to_string(),
        })?;

        match pair.as_mut() {
            Some(existing) => {
                existing.query_row.push_str(&query_row);
                existing.subject_row.push_str(&subject_row);
                existing.query_end = query_end;
                existing.subject_end = subject_end;
            }
            None => {
                pair = Some(AlignedPair {
                    query_start,
                    query_end,
                    query_row,
                    subject_start,
                    subject_end,
                    subject_row,
                });
            }
        }
    }

    if let Some(p) = &pair {
        if p.query_row.len() != p.subject_row.len() {
            return Err(ParseError::InvalidFormat {
                line: reader.line_number(),
                message: format!(
                    "aligned rows differ in length ({} vs {})",
                    p.query_row.len(),
                    p.subject_row.len()
                ),
            });
        }
    }
    Ok(pair)
}

/// Parse an expect value, accepting the legacy `e-10` spelling
pub(crate) fn parse_expect(value: &str, line: u64) -> Result<f64, ParseError> {
    let normalized = if value.starts_with('e') || value.starts_with('E') {
        format!("1{value}")
    } else {
        value.to_string()
    };
    normalized.parse::<f64>().map_err(|_| ParseError::InvalidField {
        line,
        field: "expect",
        value: value.to_string(),
    })
}

/// Values from a `Score = ... Expect = ...` line and the lines after it
#[derive(Debug, Default)]
struct ScoreBlock {
    bit_score: f32,
    raw_score: Option<f32>,
    expect: Option<f64>,
    percent_identity: Option<f32>,
    strand: Option<String>,
    frame: i32,
}

impl ScoreBlock {
    fn parse_score_line(line: &str, line_number: u64) -> Result<Self, ParseError> {
        let bits = token_after(line, SCORE_TAG).ok_or(ParseError::MissingToken {
            line: line_number,
            token: "Score",
        })?;
        let bit_score = bits.parse::<f32>().map_err(|_| ParseError::InvalidField {
            line: line_number,
            field: "bit score",
            value: bits.to_string(),
        })?;
        let raw_score = token_after(line, "bits")
            .map(|t| t.trim_matches(|c| c == '(' || c == ')' || c == ','))
            .and_then(|t| t.parse::<f32>().ok());

        let expect = match line.find("Expect") {
            Some(pos) => {
                let after = &line[pos..];
                let value = after
                    .find('=')
                    .and_then(|eq| after[eq + 1..].split_whitespace().next())
                    .map(|t| t.trim_end_matches(','))
                    .ok_or(ParseError::MissingToken {
                        line: line_number,
                        token: "Expect value",
                    })?;
                Some(parse_expect(value, line_number)?)
            }
            None => None,
        };

        Ok(Self {
            bit_score,
            raw_score,
            expect,
            ..Self::default()
        })
    }

    /// Pick up identities, strand and frame from a detail line
    fn absorb_detail(&mut self, line: &str) {
        if let Some(identities) = token_after(line, "Identities =") {
            if let Some((same, total)) = identities.split_once('/') {
                if let (Ok(same), Ok(total)) = (same.parse::<f32>(), total.parse::<f32>()) {
                    if total > 0.0 {
                        self.percent_identity = Some(100.0 * same / total);
                    }
                }
            }
        }
        if let Some(strand) = letters_after(line, "Strand =", "") {
            self.strand = Some(strand);
        }
        if let Some(frame) = text_between(line, "Frame =", "") {
            let first = frame.split('/').next().unwrap_or(frame).trim();
            if let Ok(frame) = first.parse::<i32>() {
                self.frame = frame;
            }
        }
    }
}

/// Outcome of parsing one reference block
enum BlockEnd {
    /// Continue with the next reference block of the same query
    Continue,
    /// The rest of the query was skipped
    QueryDone,
}

/// Grammar for BLAST text reports
#[derive(Debug, Clone)]
pub struct BlastTextParser {
    mode: AlignmentMode,
}

impl BlastTextParser {
    #[must_use]
    pub fn new(mode: AlignmentMode) -> Self {
        Self { mode }
    }

    fn parse_reference_block(
        &self,
        header_line: &str,
        reader: &mut LineReader,
        state: &mut ScanState,
    ) -> Result<BlockEnd, ParseError> {
        let mut reference_name = header_line
            .trim_start()
            .trim_start_matches(REFERENCE_MARKER)
            .trim()
            .to_string();

        let reference_length = loop {
            let Some(line) = reader.next_line() else {
                return Ok(BlockEnd::QueryDone);
            };
            let trimmed = line.trim();
            if trimmed.starts_with("Length") {
                let value = token_after(trimmed, "Length =").ok_or(ParseError::MissingToken {
                    line: reader.line_number(),
                    token: "reference length",
                })?;
                break value.parse::<u64>().map_err(|_| ParseError::InvalidField {
                    line: reader.line_number(),
                    field: "reference length",
                    value: value.to_string(),
                })?;
            }
            if trimmed.starts_with("Score") || trimmed.starts_with(QUERY_MARKER) {
                return Err(ParseError::MissingToken {
                    line: reader.line_number(),
                    token: "reference length",
                });
            }
            if !trimmed.is_empty() {
                reference_name.push(' ');
                reference_name.push_str(trimmed);
            }
        };

        let mut blocks_seen = 0usize;
        loop {
            let Some(line) = reader.next_line_with_prefix(&["Score", REFERENCE_MARKER, QUERY_MARKER])
            else {
                return Ok(BlockEnd::QueryDone);
            };
            let trimmed = line.trim_start();
            if !trimmed.starts_with("Score") {
                reader.push_back(line);
                return Ok(BlockEnd::Continue);
            }
            if blocks_seen > 0 && !state.is_long_reads() {
                // A second score block for the same reference ends the query in short-read mode
                if let Some(next_query) = reader.next_line_with_prefix(&[QUERY_MARKER]) {
                    reader.push_back(next_query);
                }
                return Ok(BlockEnd::QueryDone);
            }
            blocks_seen += 1;

            let mut block = ScoreBlock::parse_score_line(trimmed, reader.line_number())?;
            loop {
                let Some(detail) = reader.next_line() else {
                    return Ok(BlockEnd::QueryDone);
                };
                if is_row(&detail, "Query") {
                    reader.push_back(detail);
                    break;
                }
                let t = detail.trim_start();
                if t.starts_with(REFERENCE_MARKER) || t.starts_with(QUERY_MARKER) || t.starts_with("Score") {
                    return Err(ParseError::MissingToken {
                        line: reader.line_number(),
                        token: "query alignment row",
                    });
                }
                block.absorb_detail(&detail);
            }

            let Some(pair) = read_aligned_pair(reader, "Query", "Sbjct")? else {
                return Ok(BlockEnd::QueryDone);
            };
            self.register(&reference_name, reference_length, block, pair, reader, state)?;
        }
    }

    fn register(
        &self,
        reference_name: &str,
        reference_length: u64,
        block: ScoreBlock,
        pair: AlignedPair,
        reader: &LineReader,
        state: &mut ScanState,
    ) -> Result<(), ParseError> {
        let mut reverse = false;
        let mut flip_rows = false;
        if self.mode.is_nucleotide() {
            match block.strand.as_deref() {
                None | Some("PlusPlus") => {}
                Some("PlusMinus") => {
                    reverse = true;
                    flip_rows = true;
                }
                Some("MinusPlus") => reverse = true,
                Some(other) => {
                    let error = ParseError::UnsupportedStrand {
                        line: reader.line_number(),
                        strand: other.to_string(),
                    };
                    return state.record_error(&error);
                }
            }
        }

        let (query_start, query_end) = if pair.query_start <= pair.query_end {
            (pair.query_start, pair.query_end)
        } else {
            (pair.query_end, pair.query_start)
        };
        let hit = Hit {
            reference_name: reference_name.to_string(),
            reference_length: Some(reference_length),
            reference_start: pair.subject_start.min(pair.subject_end),
            reverse,
            bit_score: block.bit_score,
            raw_score: block.raw_score,
            expect: block.expect,
            percent_identity: block.percent_identity,
            frame: block.frame,
            query_start,
            query_end,
            ..Hit::default()
        };
        let AlignedPair {
            query_row,
            subject_row,
            ..
        } = pair;
        state.register(block.bit_score, (query_start, query_end), move |query| {
            hit.with_alignment(&query_row, &subject_row, flip_rows).render(query)
        });
        Ok(())
    }
}

impl QueryParser for BlastTextParser {
    fn parse_query(
        &mut self,
        reader: &mut LineReader,
        state: &mut ScanState,
    ) -> Result<bool, ParseError> {
        let Some(line) = reader.next_line_with_prefix(&[QUERY_MARKER]) else {
            return Ok(false);
        };
        let name = line.trim_start()[QUERY_MARKER.len()..].trim();
        state.start_query(name);

        while let Some(line) = reader.next_line_with_prefix(&[REFERENCE_MARKER, QUERY_MARKER]) {
            if line.trim_start().starts_with(QUERY_MARKER) {
                reader.push_back(line);
                break;
            }
            match self.parse_reference_block(&line, reader, state)? {
                BlockEnd::Continue => {}
                BlockEnd::QueryDone => break,
            }
        }
        Ok(true)
    }

    fn recover(&mut self, reader: &mut LineReader) {
        if let Some(line) = reader.next_line_with_prefix(&[QUERY_MARKER]) {
            reader.push_back(line);
        }
    }
}
