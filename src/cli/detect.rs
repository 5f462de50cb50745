use std::path::PathBuf;

use clap::Args;

use crate::cli::convert::detect_input;
use crate::cli::OutputFormat;
use crate::core::types::{AlignmentMode, Format};

#[derive(Args)]
pub struct DetectArgs {
    /// Input file, optionally gzip-compressed
    #[arg(required = true)]
    pub input: PathBuf,
}

/// Execute detect subcommand
///
/// # Errors
///
/// Returns an error if the file cannot be read or its format is unknown.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: DetectArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let (detected, mode) = detect_input(&args.input)?;
    if verbose {
        eprintln!("Sniffed the start of {}", args.input.display());
    }

    match format {
        OutputFormat::Text => print_text(detected, mode),
        OutputFormat::Json => print_json(&args, detected, mode)?,
        OutputFormat::Tsv => print_tsv(detected, mode),
    }
    Ok(())
}

fn print_text(format: Format, mode: AlignmentMode) {
    println!("Format: {format}");
    println!("Mode: {mode}");
    if !format.supports_long_reads() {
        println!("Long-read filtering: not applicable");
    }
}

fn print_json(args: &DetectArgs, format: Format, mode: AlignmentMode) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "path": args.input.display().to_string(),
        "format": format,
        "display_name": format.display_name(),
        "mode": mode,
        "supports_long_reads": format.supports_long_reads(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv(format: Format, mode: AlignmentMode) {
    println!("format\tmode");
    println!("{}\t{mode}", format.display_name());
}
