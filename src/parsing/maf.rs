//! LAST multiple alignment format.
//!
//! ```text
//! a score=35 EG2=3.2e+02 E=1.5e-08
//! s chr1   100 10 + 5000 ACGTACGTAC
//! s read1    0 10 + 50   ACGTACGTAC
//! ```
//!
//! The first `s` line of a block is the reference, the second the query.
//! Starts are 0-based and, on the `-` strand, count from the end of the
//! reverse-complemented source sequence. Blocks of the same query are
//! contiguous; the first block of the next query is held back until the
//! next call.

use tracing::debug;

use crate::core::record::Hit;
use crate::parsing::blast_text::parse_expect;
use crate::parsing::iterator::QueryParser;
use crate::parsing::lines::LineReader;
use crate::parsing::state::ScanState;
use crate::parsing::ParseError;

/// One `s` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceLine {
    pub name: String,
    pub start: u64,
    pub size: u64,
    pub reverse: bool,
    pub source_size: u64,
    pub text: String,
}

impl SequenceLine {
    fn parse(line: &str, line_number: u64) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 7 || fields[0] != "s" {
            return Err(ParseError::InvalidFormat {
                line: line_number,
                message: "expected 's name start size strand srcSize text'".to_string(),
            });
        }
        let number = |value: &str, field: &'static str| {
            value.parse::<u64>().map_err(|_| ParseError::InvalidField {
                line: line_number,
                field,
                value: value.to_string(),
            })
        };
        let reverse = match fields[4] {
            "+" => false,
            "-" => true,
            other => {
                return Err(ParseError::InvalidField {
                    line: line_number,
                    field: "strand",
                    value: other.to_string(),
                })
            }
        };
        Ok(Self {
            name: fields[1].to_string(),
            start: number(fields[2], "start")?,
            size: number(fields[3], "size")?,
            reverse,
            source_size: number(fields[5], "source size")?,
            text: fields[6].to_string(),
        })
    }

    /// 1-based inclusive span on the forward strand
    #[must_use]
    pub fn forward_span(&self) -> (u64, u64) {
        let start = if self.reverse {
            self.source_size.saturating_sub(self.start + self.size)
        } else {
            self.start
        };
        (start + 1, start + self.size.max(1))
    }
}

/// A complete alignment block
#[derive(Debug, Clone, PartialEq)]
pub struct MafBlock {
    pub score: f32,
    pub expect: Option<f64>,
    pub reference: SequenceLine,
    pub query: SequenceLine,
}

fn is_block_start(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed == "a" || trimmed.starts_with("a ") || trimmed.starts_with("a\t")
}

/// Read the next block, `None` when the input ends first
fn read_block(reader: &mut LineReader) -> Result<Option<MafBlock>, ParseError> {
    let header = loop {
        match reader.next_line() {
            Some(line) if is_block_start(&line) => break line,
            Some(_) => {}
            None => return Ok(None),
        }
    };
    let header_line = reader.line_number();

    let mut score = None;
    let mut expect = None;
    for token in header.split_whitespace().skip(1) {
        if let Some(value) = token.strip_prefix("score=") {
            score = Some(value.parse::<f32>().map_err(|_| ParseError::InvalidField {
                line: header_line,
                field: "score",
                value: value.to_string(),
            })?);
        } else if let Some(value) = token.strip_prefix("E=") {
            expect = Some(parse_expect(value, header_line)?);
        }
    }
    let score = score.ok_or(ParseError::MissingToken {
        line: header_line,
        token: "score=",
    })?;

    let mut rows = Vec::with_capacity(2);
    while let Some(line) = reader.next_line() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            break;
        }
        if is_block_start(trimmed) {
            reader.push_back(line);
            break;
        }
        if trimmed.starts_with("s ") || trimmed.starts_with("s\t") {
            rows.push(SequenceLine::parse(trimmed, reader.line_number())?);
        }
    }

    if rows.len() < 2 {
        if reader.has_more_lines() {
            return Err(ParseError::InvalidFormat {
                line: header_line,
                message: format!("block has {} sequence lines, expected 2", rows.len()),
            });
        }
        return Ok(None);
    }
    let mut rows = rows.into_iter();
    let (Some(reference), Some(query)) = (rows.next(), rows.next()) else {
        return Ok(None);
    };
    if reference.text.len() != query.text.len() {
        return Err(ParseError::InvalidFormat {
            line: reader.line_number(),
            message: "aligned rows differ in length".to_string(),
        });
    }
    Ok(Some(MafBlock {
        score,
        expect,
        reference,
        query,
    }))
}

/// Grammar for LAST MAF output
#[derive(Debug, Clone, Default)]
pub struct MafParser {
    pending: Option<MafBlock>,
    current: Option<String>,
}

impl MafParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn register(block: MafBlock, state: &mut ScanState) {
        let (query_start, query_end) = block.query.forward_span();
        let query_start = u32::try_from(query_start).unwrap_or(u32::MAX);
        let query_end = u32::try_from(query_end).unwrap_or(u32::MAX);
        let score = block.score;
        let reference_start = block.reference.forward_span().0;

        state.register(score, (query_start, query_end), move |query| {
            let hit = Hit {
                reference_name: block.reference.name,
                reference_length: Some(block.reference.source_size),
                reference_start,
                reverse: block.query.reverse != block.reference.reverse,
                bit_score: block.score,
                raw_score: Some(block.score),
                expect: block.expect,
                query_start,
                query_end,
                ..Hit::default()
            };
            hit.with_alignment(&block.query.text, &block.reference.text, block.reference.reverse)
                .render(query)
        });
    }
}

impl QueryParser for MafParser {
    fn parse_query(
        &mut self,
        reader: &mut LineReader,
        state: &mut ScanState,
    ) -> Result<bool, ParseError> {
        self.current = None;
        let first = match self.pending.take() {
            Some(block) => block,
            None => match read_block(reader)? {
                Some(block) => block,
                None => return Ok(false),
            },
        };
        let name = first.query.name.clone();
        state.start_query(&name);
        self.current = Some(name.clone());
        Self::register(first, state);

        while let Some(block) = read_block(reader)? {
            if block.query.name != name {
                self.pending = Some(block);
                break;
            }
            Self::register(block, state);
        }
        Ok(true)
    }

    fn skips_comments(&self) -> bool {
        true
    }

    fn recover(&mut self, reader: &mut LineReader) {
        self.pending = None;
        let Some(current) = self.current.take() else {
            // Query unknown, resume at the next block
            while let Some(line) = reader.next_line() {
                if is_block_start(&line) {
                    reader.push_back(line);
                    break;
                }
            }
            return;
        };
        loop {
            match read_block(reader) {
                Ok(Some(block)) if block.query.name == current => {}
                Ok(Some(block)) => {
                    self.pending = Some(block);
                    break;
                }
                Ok(None) => break,
                Err(e) => debug!(error = %e, "skipping malformed block"),
            }
        }
    }

    fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ScanConfig;
    use crate::parsing::iterator::testing::collect;
    use crate::parsing::iterator::LineIterator;
    use crate::parsing::lines::InputSource;
    use crate::parsing::MatchIterator;

    const MAF: &str = "##maf version=1 scoring=last
# batch 0
a score=35 EG2=3.2e+02 E=1.5e-08
s chr1   100 10 + 5000 ACGTACGTAC
s read1    0 10 + 50   ACGTACGTAC

a score=30 E=1e-6
s chr2     0 10 + 800  ACGTA-CGTAC
s read1   20 10 - 50   ACGTAGCGTA-

a score=20
s chr3     5  4 + 100  ACGT
s read2    0  4 + 4    ACGT
";

    #[test]
    fn test_blocks_grouped_by_query() {
        let queries = collect(MAF, MafParser::new(), &ScanConfig::default());
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].0, 2);

        let lines: Vec<&str> = queries[0].1.lines().collect();
        assert_eq!(
            lines[0],
            "read1\t0\tchr1\t101\t255\t10M\t*\t0\t0\tACGTACGTAC\t*\tAS:i:35\tNM:i:0\tZL:i:5000\t\
             ZR:i:35\tZE:f:1.5e-8\tZI:i:100\tZS:i:1\tZQ:i:10\tMD:Z:10"
        );
        assert_eq!(
            lines[1],
            "read1\t16\tchr2\t1\t255\t5M1I4M1D\t*\t0\t0\tACGTAGCGTA\t*\tAS:i:30\tNM:i:2\tZL:i:800\t\
             ZR:i:30\tZE:f:1e-6\tZI:i:82\tZS:i:21\tZQ:i:30\tMD:Z:9^C0"
        );
        assert!(queries[1].1.starts_with("read2\t0\tchr3\t6\t255\t4M\t"));
    }

    #[test]
    fn test_forward_span_of_reverse_strand() {
        let line = SequenceLine::parse("s read1 20 10 - 50 ACGTACGTAC", 1).unwrap();
        assert_eq!(line.forward_span(), (21, 30));
        let line = SequenceLine::parse("s read1 20 10 + 50 ACGTACGTAC", 1).unwrap();
        assert_eq!(line.forward_span(), (21, 30));
        let line = SequenceLine::parse("s read1 0 10 - 50 ACGTACGTAC", 1).unwrap();
        assert_eq!(line.forward_span(), (41, 50));
    }

    #[test]
    fn test_truncated_block_ends_query() {
        let truncated = "a score=12\ns chr1 0 4 + 100 ACGT\n";
        let queries = collect(truncated, MafParser::new(), &ScanConfig::default());
        assert!(queries.is_empty());
    }

    #[test]
    fn test_bad_block_skips_rest_of_query() {
        let text = "a score=35
s chr1 0 4 + 100 ACGT
s read1 0 4 + 50 ACGT

a score=oops
s chr2 0 4 + 100 ACGT
s read1 10 4 + 50 ACGT

a\tscore=30
s chr3 0 4 + 100 ACGT
s read1 20 4 + 50 ACGT

a score=20
s chr4 0 4 + 100 ACGT
s read2 0 4 + 4 ACGT
";
        let mut iterator = LineIterator::new(
            InputSource::from_bytes(text.as_bytes().to_vec()),
            MafParser::new(),
            &ScanConfig::default(),
        );
        let mut names = Vec::new();
        while iterator.has_more() {
            let Some(count) = iterator.advance().unwrap() else {
                break;
            };
            let records = String::from_utf8(iterator.record_bytes().to_vec()).unwrap();
            let name = records.split('\t').next().unwrap().to_string();
            names.push((name, count));
        }
        assert_eq!(
            names,
            vec![("read1".to_string(), 1), ("read2".to_string(), 1)]
        );
        assert_eq!(iterator.parse_errors(), 1);
    }

    #[test]
    fn test_bad_strand_is_reported() {
        assert!(matches!(
            SequenceLine::parse("s chr1 0 4 ? 100 ACGT", 9),
            Err(ParseError::InvalidField { line: 9, field: "strand", .. })
        ));
    }
}
