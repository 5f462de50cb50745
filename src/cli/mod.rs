//! Command-line interface for hitstream.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **convert**: Write the canonical record stream for an alignment report
//! - **detect**: Report the detected input format and alignment mode
//!
//! ## Usage
//!
//! ```text
//! # Convert a BLASTX report, format and mode sniffed from the content
//! hitstream convert reads.blastx -o reads.sam
//!
//! # Long reads with domination filtering
//! hitstream convert nanopore.maf --long-reads --min-cover 0.8
//!
//! # Summary as JSON for scripting
//! hitstream --format json convert hits.m8 --input-format blast-tab --mode blastn
//!
//! # What is this file?
//! hitstream detect unknown.txt.gz
//! ```

use clap::{Parser, Subcommand};

pub mod convert;
pub mod detect;

#[derive(Parser)]
#[command(name = "hitstream")]
#[command(version)]
#[command(about = "Convert sequence alignment reports into a per-query record stream")]
#[command(
    long_about = "hitstream reads the output of sequence search and classification tools and rewrites it as SAM-style records grouped by query.\n\nSupported inputs:\n- BLAST text (BLASTN, BLASTP, BLASTX), tabular and XML reports\n- LAST MAF and RAPSearch2 alignment listings\n- SAM and FASTA\n- RDP and Mothur classifier reports"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for summaries
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert an alignment report into canonical records
    Convert(convert::ConvertArgs),

    /// Detect the format of an input file
    Detect(detect::DetectArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
