//! SAM input, already in the canonical layout.
//!
//! Header lines are parsed once with noodles to expose the reference
//! dictionary. Records are passed through unchanged and grouped into
//! queries by read name and mate bits (`flag & 0xC0`), so the two mates of
//! a pair form separate queries. Unmapped records are dropped.

use noodles::sam;
use tracing::debug;

use crate::parsing::iterator::QueryParser;
use crate::parsing::lines::LineReader;
use crate::parsing::state::ScanState;
use crate::parsing::ParseError;

const FLAG_UNMAPPED: u16 = 0x4;
const FLAG_MATES: u16 = 0xC0;

/// A reference sequence from an `@SQ` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSequence {
    pub name: String,
    pub length: u64,
}

/// Fields of one record line needed for grouping and ranking
#[derive(Debug, Clone, PartialEq)]
pub struct SamRecord<'a> {
    pub name: &'a str,
    pub flag: u16,
    pub cigar: &'a str,
    pub sequence: &'a str,
    pub score: f32,
}

impl<'a> SamRecord<'a> {
    /// # Errors
    ///
    /// Returns `ParseError::InvalidFormat` for lines with fewer than 11
    /// columns and `ParseError::InvalidField` for a non-numeric flag.
    pub fn parse(line: &'a str, line_number: u64) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            return Err(ParseError::InvalidFormat {
                line: line_number,
                message: format!("expected at least 11 columns, found {}", fields.len()),
            });
        }
        let flag = fields[1].parse::<u16>().map_err(|_| ParseError::InvalidField {
            line: line_number,
            field: "flag",
            value: fields[1].to_string(),
        })?;
        let score = fields[11..]
            .iter()
            .find_map(|tag| {
                tag.strip_prefix("AS:i:")
                    .or_else(|| tag.strip_prefix("AS:f:"))
                    .and_then(|value| value.parse::<f32>().ok())
            })
            .unwrap_or(0.0);
        Ok(Self {
            name: fields[0],
            flag,
            cigar: fields[5],
            sequence: fields[9],
            score,
        })
    }

    #[must_use]
    pub fn is_unmapped(&self) -> bool {
        self.flag & FLAG_UNMAPPED != 0
    }

    fn group_key(&self) -> (String, u16) {
        (self.name.to_string(), self.flag & FLAG_MATES)
    }

    /// 1-based query span covered by the alignment.
    ///
    /// Leading soft or hard clips give the start; operations consuming the
    /// query give the length.
    #[must_use]
    pub fn query_span(&self) -> (u32, u32) {
        if self.cigar == "*" {
            let length = u32::try_from(self.sequence.len()).unwrap_or(u32::MAX).max(1);
            return (1, length);
        }
        let mut leading_clip = 0u32;
        let mut aligned = 0u32;
        let mut seen_alignment = false;
        let mut count = 0u32;
        for c in self.cigar.chars() {
            if let Some(digit) = c.to_digit(10) {
                count = count.saturating_mul(10).saturating_add(digit);
                continue;
            }
            match c {
                'S' | 'H' if !seen_alignment => leading_clip = leading_clip.saturating_add(count),
                'M' | 'I' | '=' | 'X' => {
                    seen_alignment = true;
                    aligned = aligned.saturating_add(count);
                }
                _ => {}
            }
            count = 0;
        }
        let start = leading_clip + 1;
        (start, start + aligned.max(1) - 1)
    }
}

/// Grammar for SAM records
#[derive(Debug, Clone, Default)]
pub struct SamParser {
    references: Vec<ReferenceSequence>,
    current: Option<(String, u16)>,
}

impl SamParser {
    /// Consume the `@` header lines at the top of `reader`.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Noodles` if noodles rejects the header.
    pub fn read_header(reader: &mut LineReader) -> Result<Self, ParseError> {
        let mut text = String::new();
        while let Some(line) = reader.next_line() {
            if !line.starts_with('@') {
                reader.push_back(line);
                break;
            }
            text.push_str(&line);
            text.push('\n');
        }

        if text.is_empty() {
            return Ok(Self::default());
        }
        let mut header_reader = sam::io::Reader::new(text.as_bytes());
        let header = header_reader
            .read_header()
            .map_err(|e| ParseError::Noodles(e.to_string()))?;

        let references: Vec<ReferenceSequence> = header
            .reference_sequences()
            .iter()
            .map(|(name, map)| ReferenceSequence {
                name: name.to_string(),
                length: map.length().get() as u64,
            })
            .collect();
        debug!(references = references.len(), "read SAM header");

        Ok(Self {
            references,
            current: None,
        })
    }

    /// Reference dictionary from the header
    #[must_use]
    pub fn reference_sequences(&self) -> &[ReferenceSequence] {
        &self.references
    }

    /// Next mapped record line, skipping blanks and unmapped records
    fn next_mapped(reader: &mut LineReader) -> Result<Option<String>, ParseError> {
        while let Some(line) = reader.next_line() {
            if line.trim().is_empty() || line.starts_with('@') {
                continue;
            }
            if !SamRecord::parse(&line, reader.line_number())?.is_unmapped() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    fn register(line: String, line_number: u64, state: &mut ScanState) -> Result<(), ParseError> {
        let record = SamRecord::parse(&line, line_number)?;
        let score = record.score;
        let span = record.query_span();
        state.register(score, span, move |_| line);
        Ok(())
    }
}

impl QueryParser for SamParser {
    fn parse_query(
        &mut self,
        reader: &mut LineReader,
        state: &mut ScanState,
    ) -> Result<bool, ParseError> {
        let Some(first) = Self::next_mapped(reader)? else {
            return Ok(false);
        };
        let key = SamRecord::parse(&first, reader.line_number())?.group_key();
        state.start_query(&key.0);
        self.current = Some(key.clone());
        Self::register(first, reader.line_number(), state)?;

        while let Some(line) = Self::next_mapped(reader)? {
            let line_number = reader.line_number();
            if SamRecord::parse(&line, line_number)?.group_key() != key {
                reader.push_back(line);
                break;
            }
            Self::register(line, line_number, state)?;
        }
        Ok(true)
    }

    fn recover(&mut self, reader: &mut LineReader) {
        let Some(current) = self.current.as_ref() else {
            return;
        };
        while let Some(line) = reader.next_line() {
            let same_query = match SamRecord::parse(&line, reader.line_number()) {
                Ok(record) => record.group_key() == *current,
                Err(_) => true,
            };
            if !same_query {
                reader.push_back(line);
                break;
            }
        }
    }
}
