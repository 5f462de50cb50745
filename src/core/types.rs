use serde::{Deserialize, Serialize};

/// Input formats understood by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Pairwise BLAST text report (BLASTN, BLASTP or BLASTX)
    BlastText,
    /// BLAST XML report (`-outfmt 5`)
    BlastXml,
    /// Tabular BLAST report (`-outfmt 6` or `7`)
    BlastTab,
    /// LAST multiple alignment format
    LastMaf,
    /// RAPSearch2 `.aln` listing
    RapSearchAln,
    /// SAM records, passed through unchanged
    Sam,
    /// FASTA sequences treated as self-assigned references
    Fasta,
    /// RDP classifier standalone output (tab-separated triples)
    RdpStandalone,
    /// RDP web classifier assignment details (semicolon-separated)
    RdpAssignmentDetails,
    /// Mothur `classify.seqs` taxonomy output
    Mothur,
    /// DIAMOND binary archive, recognised but not parsed here
    Daa,
}

impl Format {
    /// Get the display name for this format
    #[must_use]
    #[allow(clippy::trivially_copy_pass_by_ref)] // Idiomatic method signature
    pub fn display_name(&self) -> &'static str {
        match self {
            Format::BlastText => "BLAST Text",
            Format::BlastXml => "BLAST XML",
            Format::BlastTab => "BLAST Tabular",
            Format::LastMaf => "LAST MAF",
            Format::RapSearchAln => "RAPSearch2 Alignment",
            Format::Sam => "SAM",
            Format::Fasta => "FASTA",
            Format::RdpStandalone => "RDP Standalone",
            Format::RdpAssignmentDetails => "RDP Assignment Details",
            Format::Mothur => "Mothur",
            Format::Daa => "DIAMOND DAA",
        }
    }

    /// Whether matches from this format carry query coordinates usable
    /// for long-read domination filtering
    #[must_use]
    pub fn supports_long_reads(self) -> bool {
        !matches!(
            self,
            Format::Fasta
                | Format::RdpStandalone
                | Format::RdpAssignmentDetails
                | Format::Mothur
                | Format::Daa
        )
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Kind of alignment that produced the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    /// Nucleotide query against nucleotide references
    BlastN,
    /// Protein query against protein references
    BlastP,
    /// Translated nucleotide query against protein references
    BlastX,
    /// Taxonomic classifier output, no alignment
    Classifier,
    /// Not determinable from the content
    #[default]
    Unknown,
}

impl AlignmentMode {
    /// Parse the program name written at the top of BLAST reports
    #[must_use]
    pub fn from_program(program: &str) -> Self {
        let program = program.trim().to_lowercase();
        if program.starts_with("blastn") || program.starts_with("megablast") {
            Self::BlastN
        } else if program.starts_with("blastp") {
            Self::BlastP
        } else if program.starts_with("blastx") {
            Self::BlastX
        } else {
            Self::Unknown
        }
    }

    /// Whether strand information applies to matches in this mode
    #[must_use]
    pub fn is_nucleotide(self) -> bool {
        matches!(self, Self::BlastN)
    }
}

impl std::fmt::Display for AlignmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlastN => write!(f, "BlastN"),
            Self::BlastP => write!(f, "BlastP"),
            Self::BlastX => write!(f, "BlastX"),
            Self::Classifier => write!(f, "Classifier"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}
