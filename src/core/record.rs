//! Rendering of canonical tab-separated records.
//!
//! Every alignment-based iterator fills a [`Hit`] and renders it here, so the
//! column layout and tag set live in one place:
//!
//! ```text
//! query flag reference ref_start 255 ops * 0 0 sequence * AS:i NM:i ZL:i ZR:i ZE:f ZI:i ZF:i ZS:i ZQ:i MD:Z
//! ```
//!
//! Tags whose value is unknown for a format are left out.

use std::fmt::Write;

use crate::utils::alignment::{reverse_complement, AlignmentSummary};

/// Flag bit marking a reverse-complemented query
pub const FLAG_REVERSE: u16 = 16;

/// Mapping quality written for every converted record
pub const MAPPING_QUALITY: u8 = 255;

/// Score given to trivially self-assigned records (FASTA input)
pub const MAX_SCORE: f32 = 100.0;

/// A parsed alignment of the current query against one reference.
#[derive(Debug, Clone, Default)]
pub struct Hit {
    pub reference_name: String,
    pub reference_length: Option<u64>,
    /// 1-based leftmost reference position
    pub reference_start: u64,
    pub reverse: bool,
    pub bit_score: f32,
    pub raw_score: Option<f32>,
    pub expect: Option<f64>,
    pub percent_identity: Option<f32>,
    /// Translation frame, 0 when not applicable
    pub frame: i32,
    /// 1-based inclusive query span, `query_start <= query_end`
    pub query_start: u32,
    pub query_end: u32,
    pub edit_distance: Option<u32>,
    pub alignment: Option<AlignmentSummary>,
}

impl Hit {
    /// Attach the encodings derived from the aligned rows.
    ///
    /// With `reverse_complement_rows` set, both rows are flipped first so
    /// the encodings read along the forward reference strand.
    #[must_use]
    pub fn with_alignment(
        mut self,
        query_row: &str,
        reference_row: &str,
        reverse_complement_rows: bool,
    ) -> Self {
        let summary = if reverse_complement_rows {
            AlignmentSummary::from_aligned(
                &reverse_complement(query_row),
                &reverse_complement(reference_row),
            )
        } else {
            AlignmentSummary::from_aligned(query_row, reference_row)
        };
        if self.percent_identity.is_none() {
            self.percent_identity = Some(summary.percent_identity());
        }
        self.edit_distance = Some(summary.edit_distance);
        self.alignment = Some(summary);
        self
    }

    /// Render the record for `query_name`, without a trailing newline
    #[must_use]
    pub fn render(&self, query_name: &str) -> String {
        let mut out = String::with_capacity(256);
        let flag = if self.reverse { FLAG_REVERSE } else { 0 };
        let (operations, sequence) = match &self.alignment {
            Some(summary) if !summary.operations.is_empty() => {
                (summary.operations.as_str(), summary.query_sequence.as_str())
            }
            _ => ("*", "*"),
        };

        let _ = write!(
            out,
            "{}\t{flag}\t{}\t{}\t{MAPPING_QUALITY}\t{operations}\t*\t0\t0\t{sequence}\t*",
            query_name,
            sanitize(&self.reference_name),
            self.reference_start,
        );
        let _ = write!(out, "\tAS:i:{}", round(self.bit_score));
        if let Some(distance) = self.edit_distance {
            let _ = write!(out, "\tNM:i:{distance}");
        }
        if let Some(length) = self.reference_length {
            let _ = write!(out, "\tZL:i:{length}");
        }
        if let Some(raw) = self.raw_score {
            let _ = write!(out, "\tZR:i:{}", round(raw));
        }
        if let Some(expect) = self.expect {
            let _ = write!(out, "\tZE:f:{expect:e}");
        }
        if let Some(identity) = self.percent_identity {
            let _ = write!(out, "\tZI:i:{}", round(identity));
        }
        if self.frame != 0 {
            let _ = write!(out, "\tZF:i:{}", self.frame);
        }
        if self.query_start > 0 {
            let _ = write!(out, "\tZS:i:{}\tZQ:i:{}", self.query_start, self.query_end);
        }
        if let Some(summary) = &self.alignment {
            let _ = write!(out, "\tMD:Z:{}", summary.reference_differences);
        }
        out
    }
}

/// Render a classifier assignment at one taxonomic depth
#[must_use]
pub fn render_classification(
    query_name: &str,
    taxon: &str,
    depth: usize,
    confidence: f32,
    source_line: &str,
) -> String {
    format!(
        "{query_name}\t0\t{}\t0\t{MAPPING_QUALITY}\t*\t*\t0\t0\t*\t*\tAS:i:{depth}\tZC:i:{}\tAL:Z:{}",
        sanitize(taxon),
        round(confidence),
        collapse_whitespace(source_line)
    )
}

/// Render the single self-assignment emitted for a FASTA record
#[must_use]
pub fn render_self_assignment(query_name: &str, header: &str) -> String {
    format!(
        "{query_name}\t0\t{}\t0\t{MAPPING_QUALITY}\t*\t*\t0\t0\t*\t*\tAS:i:{}",
        sanitize(header),
        round(MAX_SCORE)
    )
}

/// Replace runs of whitespace (tabs included) with single spaces
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn sanitize(field: &str) -> String {
    field.trim().replace('\t', " ")
}

#[allow(clippy::cast_possible_truncation)]
fn round(value: f32) -> i64 {
    value.round() as i64
}
