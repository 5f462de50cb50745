use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;

use crate::cli::OutputFormat;
use crate::core::config::ScanConfig;
use crate::core::types::{AlignmentMode, Format};
use crate::format::detection::detect_format;
use crate::format::factory::{open_iterator, read_head};
use crate::parsing::{write_records, ScanSummary};
use crate::utils::notify::LogNotifier;

#[derive(Args)]
pub struct ConvertArgs {
    /// Input report, optionally gzip-compressed
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output file (stdout by default)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Input format (auto-detected by default)
    #[arg(long)]
    pub input_format: Option<InputFormat>,

    /// Alignment mode (read from the report by default)
    #[arg(long)]
    pub mode: Option<ModeArg>,

    /// Filter dominated matches along the query instead of keeping the top N
    #[arg(long)]
    pub long_reads: bool,

    /// Matches kept per query in short-read mode
    #[arg(long)]
    pub max_matches: Option<usize>,

    /// Overlap proportion needed for one match to dominate another (0-1)
    #[arg(long)]
    pub min_cover: Option<f32>,

    /// Score proportion used by the domination test (0-1)
    #[arg(long)]
    pub min_score: Option<f32>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum InputFormat {
    BlastText,
    BlastXml,
    BlastTab,
    Maf,
    Rapsearch,
    Sam,
    Fasta,
    RdpStandalone,
    RdpDetails,
    Mothur,
}

impl From<InputFormat> for Format {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::BlastText => Format::BlastText,
            InputFormat::BlastXml => Format::BlastXml,
            InputFormat::BlastTab => Format::BlastTab,
            InputFormat::Maf => Format::LastMaf,
            InputFormat::Rapsearch => Format::RapSearchAln,
            InputFormat::Sam => Format::Sam,
            InputFormat::Fasta => Format::Fasta,
            InputFormat::RdpStandalone => Format::RdpStandalone,
            InputFormat::RdpDetails => Format::RdpAssignmentDetails,
            InputFormat::Mothur => Format::Mothur,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ModeArg {
    #[value(name = "blastn")]
    BlastN,
    #[value(name = "blastp")]
    BlastP,
    #[value(name = "blastx")]
    BlastX,
    Classifier,
}

impl From<ModeArg> for AlignmentMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::BlastN => AlignmentMode::BlastN,
            ModeArg::BlastP => AlignmentMode::BlastP,
            ModeArg::BlastX => AlignmentMode::BlastX,
            ModeArg::Classifier => AlignmentMode::Classifier,
        }
    }
}

/// Execute convert subcommand
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the input cannot be
/// opened as the requested format, or the scan aborts.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: ConvertArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    let (input_format, mode) = resolve_input(&args)?;

    if verbose {
        eprintln!("Reading {} as {input_format} ({mode})", args.input.display());
    }

    let mut iterator = open_iterator(
        &args.input,
        input_format,
        mode,
        &config,
        Arc::new(LogNotifier),
    )
    .with_context(|| format!("Failed to open {}", args.input.display()))?;

    if let Some(warning) = iterator.format_warning() {
        eprintln!("Warning: {warning}");
    }

    let summary = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            write_records(iterator.as_mut(), &mut out)?
        }
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            write_records(iterator.as_mut(), &mut out)?
        }
    };

    if verbose {
        eprintln!(
            "Processed {} of {} bytes",
            iterator.progress(),
            iterator.max_progress()
        );
    }

    match format {
        OutputFormat::Text => print_text_summary(&summary),
        OutputFormat::Json => print_json_summary(&summary)?,
        OutputFormat::Tsv => print_tsv_summary(&summary),
    }
    Ok(())
}

fn build_config(args: &ConvertArgs) -> anyhow::Result<ScanConfig> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScanConfig::default(),
    };
    if args.long_reads {
        config.long_reads = true;
    }
    if let Some(max_matches) = args.max_matches {
        config.max_matches_per_read = max_matches;
    }
    if let Some(min_cover) = args.min_cover {
        config.min_cover_proportion = min_cover;
    }
    if let Some(min_score) = args.min_score {
        config.min_score_proportion = min_score;
    }
    config.validate()?;
    Ok(config)
}

fn resolve_input(args: &ConvertArgs) -> anyhow::Result<(Format, AlignmentMode)> {
    let requested_mode = args.mode.map(AlignmentMode::from);
    if let Some(input_format) = args.input_format {
        return Ok((input_format.into(), requested_mode.unwrap_or_default()));
    }

    let (detected, detected_mode) = detect_input(&args.input)?;
    Ok((detected, requested_mode.unwrap_or(detected_mode)))
}

/// Detect format and mode of the file at `path`
pub(crate) fn detect_input(path: &Path) -> anyhow::Result<(Format, AlignmentMode)> {
    let head = read_head(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path.file_name().and_then(|name| name.to_str());
    let detected = detect_format(&head, filename)
        .with_context(|| format!("Cannot detect the format of {}", path.display()))?;
    Ok(detected)
}

fn print_text_summary(summary: &ScanSummary) {
    eprintln!("Queries: {}", summary.queries);
    eprintln!("Records: {}", summary.records);
    eprintln!("Parse errors: {}", summary.parse_errors);
}

fn print_json_summary(summary: &ScanSummary) -> anyhow::Result<()> {
    eprintln!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

fn print_tsv_summary(summary: &ScanSummary) {
    eprintln!("queries\trecords\tparse_errors");
    eprintln!(
        "{}\t{}\t{}",
        summary.queries, summary.records, summary.parse_errors
    );
}
