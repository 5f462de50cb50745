//! Match retention applied once per query.
//!
//! Short reads keep the best `max_matches_per_read` matches, enforced while
//! parsing by the bounded pool. Long reads keep every match that is not
//! dominated by a better match covering most of the same query span; see
//! [`domination`].

pub mod domination;
pub mod postprocess;

pub use postprocess::PostProcessor;
