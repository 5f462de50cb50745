//! Input format detection and iterator construction.
//!
//! [`detection`] sniffs the first lines of a file to name its format and
//! alignment mode; [`factory`] turns a format and mode into the matching
//! [`MatchIterator`](crate::parsing::MatchIterator).
//!
//! ```text
//! hitstream detect hits.xml
//! hitstream convert hits.xml --mode blastn -o hits.sam
//! ```

pub mod detection;
pub mod factory;

use thiserror::Error;

use crate::core::types::{AlignmentMode, Format};
use crate::parsing::ParseError;

/// Errors raised before any record is read
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Unable to detect file format from content and filename")]
    UnknownFormat,

    #[error("File appears to be binary and cannot be parsed as text")]
    UnsupportedBinary,

    #[error("{format} input cannot be read in {mode} mode")]
    UnsupportedCombination { format: Format, mode: AlignmentMode },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open input: {0}")]
    Parse(#[from] ParseError),
}
