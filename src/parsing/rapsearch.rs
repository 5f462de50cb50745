//! RAPSearch2 `.aln` listings.
//!
//! ```text
//! read1 vs ref1 description bits=84.3 log(E-value)=-16.64 identity=76.7% aln-len=43 mismatch=10 gap-openings=0 nFrame=2
//! Query:  13 LVKAGGHVAL 42
//! Sbjct:   1 LVKAGGHVAL 10
//! ```
//!
//! A query ends where the name before ` vs ` changes.

use crate::core::record::Hit;
use crate::parsing::blast_text::read_aligned_pair;
use crate::parsing::iterator::QueryParser;
use crate::parsing::lines::{text_between, token_after, LineReader};
use crate::parsing::state::ScanState;
use crate::parsing::ParseError;

const VS: &str = " vs ";

fn query_of(line: &str) -> Option<&str> {
    line.find(VS).map(|pos| line[..pos].trim())
}

/// Grammar for RAPSearch2 alignment listings
#[derive(Debug, Clone, Default)]
pub struct RapSearchParser {
    current: Option<String>,
}

impl RapSearchParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_match(
        line: &str,
        reader: &mut LineReader,
        state: &mut ScanState,
    ) -> Result<(), ParseError> {
        let line_number = reader.line_number();
        let reference_name = text_between(line, VS, "bits=")
            .ok_or(ParseError::MissingToken {
                line: line_number,
                token: "reference name",
            })?
            .to_string();
        let bits = token_after(line, "bits=").ok_or(ParseError::MissingToken {
            line: line_number,
            token: "bits=",
        })?;
        let bit_score = bits.parse::<f32>().map_err(|_| ParseError::InvalidField {
            line: line_number,
            field: "bits",
            value: bits.to_string(),
        })?;
        let expect = match token_after(line, "log(E-value)=") {
            Some(value) => Some(
                value
                    .parse::<f64>()
                    .map(|log| 10f64.powf(log))
                    .map_err(|_| ParseError::InvalidField {
                        line: line_number,
                        field: "log(E-value)",
                        value: value.to_string(),
                    })?,
            ),
            None => None,
        };
        let percent_identity = token_after(line, "identity=")
            .and_then(|value| value.trim_end_matches('%').parse::<f32>().ok());
        let frame = token_after(line, "nFrame=")
            .and_then(|value| value.parse::<i32>().ok())
            .unwrap_or(0);

        let Some(pair) = read_aligned_pair(reader, "Query", "Sbjct")? else {
            return Ok(());
        };
        let query_start = pair.query_start.min(pair.query_end);
        let query_end = pair.query_start.max(pair.query_end);

        state.register(bit_score, (query_start, query_end), move |query| {
            Hit {
                reference_name,
                reference_start: pair.subject_start.min(pair.subject_end),
                bit_score,
                expect,
                percent_identity,
                frame,
                query_start,
                query_end,
                ..Hit::default()
            }
            .with_alignment(&pair.query_row, &pair.subject_row, false)
            .render(query)
        });
        Ok(())
    }
}

impl QueryParser for RapSearchParser {
    fn parse_query(
        &mut self,
        reader: &mut LineReader,
        state: &mut ScanState,
    ) -> Result<bool, ParseError> {
        let Some(line) = reader.next_line_containing(VS) else {
            return Ok(false);
        };
        let name = query_of(&line).unwrap_or_default().to_string();
        state.start_query(&name);
        self.current = Some(name.clone());
        Self::parse_match(&line, reader, state)?;

        while let Some(line) = reader.next_line_containing(VS) {
            if query_of(&line) != Some(name.as_str()) {
                reader.push_back(line);
                break;
            }
            Self::parse_match(&line, reader, state)?;
        }
        Ok(true)
    }

    fn recover(&mut self, reader: &mut LineReader) {
        let Some(current) = self.current.as_deref() else {
            return;
        };
        while let Some(line) = reader.next_line_containing(VS) {
            if query_of(&line) != Some(current) {
                reader.push_back(line);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ScanConfig;
    use crate::parsing::iterator::testing::collect;

    const LISTING: &str = "\
read1 vs ref1 description bits=84.3 log(E-value)=-16.64 identity=76.7% aln-len=10 mismatch=0 gap-openings=0 nFrame=2
Query:  13 LVKAGGHVAL 42
Sbjct:   1 LVKAGGHVAL 10

read1 vs ref2 bits=90.0 log(E-value)=-18 identity=80% aln-len=10 mismatch=1 gap-openings=1 nFrame=0
Query:  13 LVKA-GHVAL 39
Sbjct:   5 LVKAGGHVSL 14

read2 vs ref1 description bits=20.0 log(E-value)=-2 identity=50% aln-len=4 mismatch=2 gap-openings=0 nFrame=1
Query:  1 MKVL 12
Sbjct:  1 MKAA 4
";

    #[test]
    fn test_listing_grouped_by_query() {
        let queries = collect(LISTING, RapSearchParser::new(), &ScanConfig::default());
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].0, 2);

        let lines: Vec<&str> = queries[0].1.lines().collect();
        assert!(lines[0].starts_with(
            "read1\t0\tref2\t5\t255\t4M1D5M\t*\t0\t0\tLVKAGHVAL\t*\tAS:i:90\tNM:i:2\tZE:f:"
        ));
        assert!(lines[0].contains("\tZI:i:80\t"));
        assert!(lines[0].ends_with("\tZS:i:13\tZQ:i:39\tMD:Z:4^G3S1"));
        assert!(lines[1].starts_with("read1\t0\tref1 description\t1\t255\t10M\t"));
        assert!(lines[1].contains("\tZI:i:77\tZF:i:2\tZS:i:13\tZQ:i:42\tMD:Z:10"));

        assert!(queries[1].1.starts_with("read2\t0\tref1 description\t1\t255\t4M\t"));
        assert!(queries[1].1.contains("\tMD:Z:2A0A0\n"));
    }

    #[test]
    fn test_missing_bits_recovers() {
        let text = "\
bad vs refX no score here
Query:  1 MKVL 12
Sbjct:  1 MKVL 4
good vs refY bits=30 log(E-value)=-5
Query:  1 MKVL 12
Sbjct:  1 MKVL 4
";
        let queries = collect(text, RapSearchParser::new(), &ScanConfig::default());
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0], (0, "bad\n".to_string()));
        assert!(queries[1].1.starts_with("good\t0\trefY\t1\t"));
    }
}
