//! Encodings derived from a pair of aligned sequence strings.
//!
//! All functions take the query and reference rows of a pairwise alignment
//! as printed by the aligner, using `-` for gaps. The rows are expected to
//! have equal length; the iterators check this before calling in here.
//! Columns where both rows hold a gap carry no information and are ignored.

use std::fmt::Write;

/// Gap character used in aligned rows
pub const GAP: u8 = b'-';

/// Classification of one alignment column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    /// Aligned residue pair, identical or not
    Aligned,
    /// Reference residue against a query gap
    Deletion,
    /// Query residue against a reference gap
    Insertion,
}

impl Column {
    fn op(self) -> char {
        match self {
            Column::Aligned => 'M',
            Column::Deletion => 'D',
            Column::Insertion => 'I',
        }
    }
}

fn columns<'a>(query: &'a [u8], reference: &'a [u8]) -> impl Iterator<Item = (Column, u8, u8)> + 'a {
    query
        .iter()
        .zip(reference.iter())
        .filter_map(|(&q, &r)| match (q == GAP, r == GAP) {
            (true, true) => None,
            (true, false) => Some((Column::Deletion, q, r)),
            (false, true) => Some((Column::Insertion, q, r)),
            (false, false) => Some((Column::Aligned, q, r)),
        })
}

/// Run-length alignment operations, e.g. `10M2D5M1I3M`.
#[must_use]
pub fn alignment_operations(query: &str, reference: &str) -> String {
    let mut out = String::new();
    let mut current: Option<(Column, usize)> = None;

    for (column, _, _) in columns(query.as_bytes(), reference.as_bytes()) {
        current = match current {
            Some((kind, count)) if kind == column => Some((kind, count + 1)),
            Some((kind, count)) => {
                let _ = write!(out, "{count}{}", kind.op());
                Some((column, 1))
            }
            None => Some((column, 1)),
        };
    }
    if let Some((kind, count)) = current {
        let _ = write!(out, "{count}{}", kind.op());
    }
    out
}

/// Reference-difference string in SAM `MD` tag syntax.
///
/// Runs of identical residues become numbers, mismatches emit the reference
/// residue, deletions emit `^` followed by the deleted reference residues.
/// Insertions do not appear. A number, possibly `0`, separates any two
/// letter groups and ends the string.
#[must_use]
pub fn reference_differences(query: &str, reference: &str) -> String {
    let mut out = String::new();
    let mut run = 0usize;
    let mut in_deletion = false;

    for (column, q, r) in columns(query.as_bytes(), reference.as_bytes()) {
        match column {
            Column::Deletion => {
                if !in_deletion {
                    let _ = write!(out, "{run}^");
                    run = 0;
                    in_deletion = true;
                }
                out.push(char::from(r));
            }
            Column::Insertion => {
                in_deletion = false;
            }
            Column::Aligned => {
                in_deletion = false;
                if q.eq_ignore_ascii_case(&r) {
                    run += 1;
                } else {
                    let _ = write!(out, "{run}{}", char::from(r));
                    run = 0;
                }
            }
        }
    }
    let _ = write!(out, "{run}");
    out
}

/// Number of columns holding a gap on either side or differing residues.
#[must_use]
pub fn edit_distance(query: &str, reference: &str) -> u32 {
    let count = columns(query.as_bytes(), reference.as_bytes())
        .filter(|(column, q, r)| *column != Column::Aligned || !q.eq_ignore_ascii_case(r))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// The aligned row with gaps removed
#[must_use]
pub fn ungapped(aligned: &str) -> String {
    aligned.chars().filter(|&c| c != char::from(GAP)).collect()
}

/// Reverse complement of a nucleotide row, keeping gaps and letter case
#[must_use]
pub fn reverse_complement(sequence: &str) -> String {
    sequence
        .bytes()
        .rev()
        .map(|b| {
            let complement = match b.to_ascii_uppercase() {
                b'A' => b'T',
                b'T' | b'U' => b'A',
                b'C' => b'G',
                b'G' => b'C',
                b'R' => b'Y',
                b'Y' => b'R',
                b'K' => b'M',
                b'M' => b'K',
                b'B' => b'V',
                b'V' => b'B',
                b'D' => b'H',
                b'H' => b'D',
                other => other,
            };
            if b.is_ascii_lowercase() {
                char::from(complement.to_ascii_lowercase())
            } else {
                char::from(complement)
            }
        })
        .collect()
}

/// Everything the record renderer needs from an aligned pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentSummary {
    pub operations: String,
    pub reference_differences: String,
    pub edit_distance: u32,
    pub query_sequence: String,
    /// Columns with identical residues
    pub identities: u32,
    /// Columns that are not double gaps
    pub columns: u32,
}

impl AlignmentSummary {
    #[must_use]
    pub fn from_aligned(query: &str, reference: &str) -> Self {
        let mut identities = 0u32;
        let mut total = 0u32;
        for (column, q, r) in columns(query.as_bytes(), reference.as_bytes()) {
            total += 1;
            if column == Column::Aligned && q.eq_ignore_ascii_case(&r) {
                identities += 1;
            }
        }
        Self {
            operations: alignment_operations(query, reference),
            reference_differences: reference_differences(query, reference),
            edit_distance: edit_distance(query, reference),
            query_sequence: ungapped(query),
            identities,
            columns: total,
        }
    }

    /// Percent of columns with identical residues
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_identity(&self) -> f32 {
        if self.columns == 0 {
            0.0
        } else {
            100.0 * self.identities as f32 / self.columns as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_gaps_is_single_match_run() {
        let query = "ACGTACGTAC";
        let reference = "ACGAACGTTC";
        assert_eq!(alignment_operations(query, reference), "10M");
        // Hamming distance
        assert_eq!(edit_distance(query, reference), 2);
        assert_eq!(reference_differences(query, reference), "3A4T1");
    }

    #[test]
    fn test_query_gap_run_becomes_deletion() {
        let query = "ACGT---ACGT";
        let reference = "ACGTTTTACGT";
        assert_eq!(alignment_operations(query, reference), "4M3D4M");
        assert_eq!(reference_differences(query, reference), "4^TTT4");
        assert_eq!(edit_distance(query, reference), 3);
    }

    #[test]
    fn test_reference_gap_is_insertion_and_invisible_in_md() {
        let query = "ACGTTTACGT";
        let reference = "ACG--TACGT";
        assert_eq!(alignment_operations(query, reference), "3M2I5M");
        assert_eq!(reference_differences(query, reference), "8");
        assert_eq!(edit_distance(query, reference), 2);
    }

    #[test]
    fn test_md_zero_separators() {
        // Consecutive mismatches need a zero between them
        assert_eq!(reference_differences("AAAA", "ACCA"), "1C0C1");
        // Deletion at the end finishes with a zero
        assert_eq!(reference_differences("AC--", "ACGT"), "2^GT0");
        // Deletion interrupted by an insertion starts a new deletion group
        assert_eq!(reference_differences("A-T-A", "AG-CA"), "1^G0^C1");
        // Mismatch straight after a deletion
        assert_eq!(reference_differences("A-TA", "AGCA"), "1^G0C1");
    }

    #[test]
    fn test_case_insensitive_identity() {
        assert_eq!(edit_distance("acgt", "ACGT"), 0);
        assert_eq!(reference_differences("acgt", "ACGT"), "4");
    }

    #[test]
    fn test_double_gap_columns_ignored() {
        assert_eq!(alignment_operations("AC-GT", "AC-GT"), "4M");
        assert_eq!(edit_distance("AC-GT", "AC-GT"), 0);
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement("ACGT-Nacg"), "cgtN-ACGT");
        assert_eq!(reverse_complement(""), "");
    }

    #[test]
    fn test_summary() {
        let summary = AlignmentSummary::from_aligned("ACGT-ACGA", "ACGTTACGT");
        assert_eq!(summary.operations, "4M1D4M");
        assert_eq!(summary.query_sequence, "ACGTACGA");
        assert_eq!(summary.edit_distance, 2);
        assert_eq!(summary.identities, 7);
        assert_eq!(summary.columns, 9);
        assert!((summary.percent_identity() - 77.777_78).abs() < 0.01);
    }
}
