//! Core data types shared by every format iterator.
//!
//! - [`matches`]: a candidate [`Match`](matches::Match) and the `rank_order` function
//! - [`pool`]: the bounded top-N pool used for short reads
//! - [`intervals`]: the per-query interval collection used for long reads
//! - [`buffer`]: the growable output buffer holding one query's records
//! - [`record`]: rendering of canonical tab-separated records
//! - [`config`]: [`ScanConfig`](config::ScanConfig) thresholds and limits
//! - [`types`]: [`Format`](types::Format) and [`AlignmentMode`](types::AlignmentMode)
//!
//! ## Ordering
//!
//! Matches sort by score descending, then by the order in which they were
//! found within their query. Output for a query always follows this order
//! unless the iterator supplies an explicit ordered list.

pub mod buffer;
pub mod config;
pub mod intervals;
pub mod matches;
pub mod pool;
pub mod record;
pub mod types;
