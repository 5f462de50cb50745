//! Format-specific record iterators.
//!
//! Each supported input format has an iterator that walks the file one query
//! at a time and exposes the canonical records kept for that query:
//!
//! - **BLAST text** ([`blast_text`]): pairwise BLASTN, BLASTP and BLASTX reports
//! - **BLAST tabular** ([`blast_tab`]): `-outfmt 6` and `-outfmt 7`
//! - **BLAST XML** ([`blast_xml`]): parsed on a worker thread
//! - **LAST MAF** ([`maf`]): alignment blocks grouped by query
//! - **RAPSearch2** ([`rapsearch`]): `.aln` listings
//! - **SAM** ([`sam`]): records passed through, grouped by query and mate
//! - **FASTA** ([`fasta`]): one self-assignment per sequence
//! - **Classifiers** ([`classifier`]): RDP and Mothur taxonomy reports
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hitstream::core::config::ScanConfig;
//! use hitstream::format::factory::open_iterator;
//! use hitstream::parsing::write_records;
//! use hitstream::utils::notify::LogNotifier;
//! use hitstream::{AlignmentMode, Format};
//!
//! let config = ScanConfig::default();
//! let mut iterator = open_iterator(
//!     std::path::Path::new("hits.tab"),
//!     Format::BlastTab,
//!     AlignmentMode::BlastN,
//!     &config,
//!     Arc::new(LogNotifier),
//! )
//! .unwrap();
//! let summary = write_records(iterator.as_mut(), &mut std::io::stdout()).unwrap();
//! eprintln!("{} queries", summary.queries);
//! ```

pub mod blast_tab;
pub mod blast_text;
pub mod blast_xml;
pub mod classifier;
pub mod fasta;
pub mod iterator;
pub mod lines;
pub mod maf;
pub mod rapsearch;
pub mod sam;
pub mod state;

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: invalid {field} '{value}'")]
    InvalidField {
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error("Line {line}: missing {token}")]
    MissingToken { line: u64, token: &'static str },

    #[error("Line {line}: unsupported strand combination {strand}")]
    UnsupportedStrand { line: u64, strand: String },

    #[error("Line {line}: {message}")]
    InvalidFormat { line: u64, message: String },

    #[error("Too many parse errors: {0} exceeds maximum allowed ({1})")]
    TooManyErrors(usize, usize),

    #[error("noodles error: {0}")]
    Noodles(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl ParseError {
    /// Whether the scan can skip the offending query and carry on
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ParseError::InvalidField { .. }
                | ParseError::MissingToken { .. }
                | ParseError::UnsupportedStrand { .. }
                | ParseError::InvalidFormat { .. }
                | ParseError::Noodles(_)
        )
    }
}

/// Query-by-query access to the canonical records of one input.
///
/// Callers loop on [`has_more`](Self::has_more) and
/// [`advance`](Self::advance); after each successful advance the records
/// of that query are available from [`record_bytes`](Self::record_bytes).
pub trait MatchIterator: Send {
    fn has_more(&mut self) -> bool;

    /// Move to the next query and return its record count, `None` at the end.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` when reading fails and
    /// `ParseError::TooManyErrors` once malformed records exceed the limit.
    fn advance(&mut self) -> Result<Option<usize>, ParseError>;

    /// Newline-terminated records of the current query
    fn record_bytes(&self) -> &[u8];

    /// Choose domination filtering over the bounded pool.
    ///
    /// Must be called before the first `has_more`; iterators that read
    /// ahead ignore later changes.
    fn set_long_reads(&mut self, long_reads: bool);

    fn is_long_reads(&self) -> bool;

    /// Bytes consumed from the input file
    fn progress(&self) -> u64;

    /// Size of the input file
    fn max_progress(&self) -> u64;

    /// Malformed records skipped so far
    fn parse_errors(&self) -> usize;

    /// Set when the content did not look like the requested format
    fn format_warning(&self) -> Option<&str>;

    fn set_format_warning(&mut self, warning: String);

    /// Release resources; further calls to `has_more` return false
    fn close(&mut self);
}

/// Counts reported after a complete scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub queries: usize,
    pub records: usize,
    pub parse_errors: usize,
}

/// Drain `iterator` into `out` and close it.
///
/// # Errors
///
/// Returns any error raised by the iterator or by writing to `out`.
pub fn write_records<W: Write>(
    iterator: &mut dyn MatchIterator,
    out: &mut W,
) -> Result<ScanSummary, ParseError> {
    let mut summary = ScanSummary::default();
    let result = drain(iterator, out, &mut summary);
    iterator.close();
    summary.parse_errors = iterator.parse_errors();
    result.map(|()| summary)
}

fn drain<W: Write>(
    iterator: &mut dyn MatchIterator,
    out: &mut W,
    summary: &mut ScanSummary,
) -> Result<(), ParseError> {
    while iterator.has_more() {
        let Some(count) = iterator.advance()? else {
            break;
        };
        out.write_all(iterator.record_bytes())?;
        summary.queries += 1;
        summary.records += count;
    }
    out.flush()?;
    Ok(())
}
