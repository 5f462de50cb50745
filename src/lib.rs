//! # hitstream
//!
//! A library for turning the output of sequence search and classification
//! tools into one uniform stream of SAM-style records, grouped by query.
//!
//! Every supported report is read one query at a time. For each query the
//! matches are ranked, trimmed to a bounded top-N set (short reads) or
//! filtered by domination along the query (long reads), and rendered as
//! tab-separated records with the alignment encoded as run-length
//! operations, an edit distance and a reference-difference string.
//!
//! ## Features
//!
//! - **Many inputs**: BLAST text, tabular and XML, LAST MAF, RAPSearch2,
//!   SAM, FASTA and RDP/Mothur classifier reports, plain or gzipped
//! - **Format sniffing**: the format and alignment mode are read from the
//!   content, with the filename as a hint
//! - **Bounded memory**: only the current query is held, and the XML parser
//!   runs on a worker thread behind a bounded channel
//! - **Error tolerance**: malformed records are logged, counted and skipped
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hitstream::format::detection::detect_format;
//! use hitstream::format::factory::{open_iterator, read_head};
//! use hitstream::parsing::write_records;
//! use hitstream::utils::notify::LogNotifier;
//! use hitstream::ScanConfig;
//!
//! let path = std::path::Path::new("reads.blastx");
//! let head = read_head(path).unwrap();
//! let (format, mode) = detect_format(&head, Some("reads.blastx")).unwrap();
//!
//! let config = ScanConfig::default();
//! let mut iterator = open_iterator(path, format, mode, &config, Arc::new(LogNotifier)).unwrap();
//! let summary = write_records(iterator.as_mut(), &mut std::io::stdout()).unwrap();
//! println!("{} queries, {} records", summary.queries, summary.records);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Records, ranking, pools and configuration
//! - [`parsing`]: Line scanning and the per-format iterators
//! - [`retention`]: Top-N and long-read domination filtering
//! - [`format`]: Format detection and iterator construction
//! - [`utils`]: Alignment encodings and user notification
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod core;
pub mod format;
pub mod parsing;
pub mod retention;
pub mod utils;

// Re-export commonly used types for convenience
pub use crate::core::config::ScanConfig;
pub use crate::core::types::*;
pub use format::FormatError;
pub use parsing::{MatchIterator, ParseError, ScanSummary};
