//! Tabular BLAST reports (`-outfmt 6` and `-outfmt 7`).
//!
//! Each row holds the 12 standard columns:
//!
//! | # | column | use |
//! |---|--------|-----|
//! | 1 | qseqid | query name, rows are grouped by it |
//! | 2 | sseqid | reference name |
//! | 3 | pident | `ZI` |
//! | 4 | length | alignment length |
//! | 5 | mismatch | `NM` together with gapopen |
//! | 6 | gapopen | |
//! | 7-8 | qstart, qend | `ZS`, `ZQ` and the long-read interval |
//! | 9-10 | sstart, send | reference start, strand for BLASTN |
//! | 11 | evalue | `ZE` |
//! | 12 | bitscore | score |
//!
//! `#` comment lines written by `-outfmt 7` are skipped. The columns carry
//! no aligned sequences, so records have `*` for operations and sequence.

use crate::core::record::Hit;
use crate::core::types::AlignmentMode;
use crate::parsing::blast_text::parse_expect;
use crate::parsing::iterator::QueryParser;
use crate::parsing::lines::LineReader;
use crate::parsing::state::ScanState;
use crate::parsing::ParseError;

const COLUMNS: usize = 12;

/// One parsed tabular row
#[derive(Debug, Clone, PartialEq)]
pub struct TabularRow {
    pub qseqid: String,
    pub sseqid: String,
    pub pident: f32,
    pub length: u32,
    pub mismatch: u32,
    pub gapopen: u32,
    pub qstart: u32,
    pub qend: u32,
    pub sstart: u64,
    pub send: u64,
    pub evalue: f64,
    pub bitscore: f32,
}

impl TabularRow {
    /// Parse a row split on tabs, or on any whitespace when tabs are missing.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidFormat` when fewer than 12 columns are
    /// present and `ParseError::InvalidField` for unparseable numbers.
    pub fn parse(line: &str, line_number: u64) -> Result<Self, ParseError> {
        let mut fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() < COLUMNS {
            fields = line.split_whitespace().collect();
        }
        if fields.len() < COLUMNS {
            return Err(ParseError::InvalidFormat {
                line: line_number,
                message: format!("expected {COLUMNS} columns, found {}", fields.len()),
            });
        }

        fn number<T: std::str::FromStr>(
            value: &str,
            field: &'static str,
            line: u64,
        ) -> Result<T, ParseError> {
            value.parse::<T>().map_err(|_| ParseError::InvalidField {
                line,
                field,
                value: value.to_string(),
            })
        }

        Ok(Self {
            qseqid: fields[0].to_string(),
            sseqid: fields[1].to_string(),
            pident: number(fields[2], "pident", line_number)?,
            length: number(fields[3], "length", line_number)?,
            mismatch: number(fields[4], "mismatch", line_number)?,
            gapopen: number(fields[5], "gapopen", line_number)?,
            qstart: number(fields[6], "qstart", line_number)?,
            qend: number(fields[7], "qend", line_number)?,
            sstart: number(fields[8], "sstart", line_number)?,
            send: number(fields[9], "send", line_number)?,
            evalue: parse_expect(fields[10], line_number)?,
            bitscore: number(fields[11], "bitscore", line_number)?,
        })
    }

    fn into_hit(self, nucleotide: bool) -> Hit {
        Hit {
            reference_start: self.sstart.min(self.send),
            reverse: nucleotide && self.sstart > self.send,
            bit_score: self.bitscore,
            expect: Some(self.evalue),
            percent_identity: Some(self.pident),
            query_start: self.qstart.min(self.qend),
            query_end: self.qstart.max(self.qend),
            edit_distance: Some(self.mismatch + self.gapopen),
            reference_name: self.sseqid,
            ..Hit::default()
        }
    }
}

/// Grammar for tabular BLAST
#[derive(Debug, Clone)]
pub struct BlastTabParser {
    mode: AlignmentMode,
    current: Option<String>,
}

impl BlastTabParser {
    #[must_use]
    pub fn new(mode: AlignmentMode) -> Self {
        Self {
            mode,
            current: None,
        }
    }

    fn register(&self, row: TabularRow, state: &mut ScanState) {
        let score = row.bitscore;
        let span = (row.qstart, row.qend);
        let nucleotide = self.mode.is_nucleotide();
        state.register(score, span, move |query| row.into_hit(nucleotide).render(query));
    }
}

fn first_token(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

impl QueryParser for BlastTabParser {
    fn parse_query(
        &mut self,
        reader: &mut LineReader,
        state: &mut ScanState,
    ) -> Result<bool, ParseError> {
        let Some(line) = reader.skip_blank_lines() else {
            return Ok(false);
        };
        let name = first_token(&line).to_string();
        state.start_query(&name);
        self.current = Some(name.clone());

        let row = TabularRow::parse(&line, reader.line_number())?;
        self.register(row, state);

        while let Some(line) = reader.next_line() {
            if line.trim().is_empty() {
                continue;
            }
            if first_token(&line) != name {
                reader.push_back(line);
                break;
            }
            let row = TabularRow::parse(&line, reader.line_number())?;
            self.register(row, state);
        }
        Ok(true)
    }

    fn skips_comments(&self) -> bool {
        true
    }

    fn recover(&mut self, reader: &mut LineReader) {
        let Some(current) = self.current.as_deref() else {
            return;
        };
        while let Some(line) = reader.next_line() {
            if !line.trim().is_empty() && first_token(&line) != current {
                reader.push_back(line);
                break;
            }
        }
    }
}
