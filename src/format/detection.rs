use std::path::Path;

use crate::core::types::{AlignmentMode, Format};
use crate::format::FormatError;

/// Leading bytes of a DIAMOND archive (little-endian magic number)
const DAA_MAGIC: [u8; 8] = [0x6b, 0xe3, 0x3e, 0x6d, 0x47, 0x53, 0x0e, 0x3c];

/// Lines sampled for content sniffing
const SAMPLE_LINES: usize = 50;

/// Detect file format and alignment mode from content and optional filename
///
/// The filename only provides a hint: a format suggested by the extension is
/// accepted when the content agrees, otherwise the content decides.
///
/// # Errors
///
/// Returns `FormatError::UnknownFormat` if the format cannot be detected,
/// or `FormatError::UnsupportedBinary` if the content is binary but not a
/// recognised archive.
pub fn detect_format(
    content: &[u8],
    filename: Option<&str>,
) -> Result<(Format, AlignmentMode), FormatError> {
    if content.starts_with(&DAA_MAGIC) {
        return Ok((Format::Daa, AlignmentMode::Unknown));
    }

    if let Some(name) = filename {
        if let Some(format) = detect_format_from_filename(name) {
            // Binary archives cannot be validated against text
            if format == Format::Daa {
                return Ok((format, AlignmentMode::Unknown));
            }
            let text = String::from_utf8_lossy(content);
            if looks_like(format, &text) {
                return Ok((format, detect_mode(format, &text)));
            }
        }
    }

    detect_format_from_content(content)
}

/// Detect format based on filename and extension
fn detect_format_from_filename(filename: &str) -> Option<Format> {
    let lower_name = filename.to_lowercase();
    let stem = lower_name.strip_suffix(".gz").unwrap_or(&lower_name);
    let extension = Path::new(stem).extension()?.to_str()?;

    match extension {
        "xml" => Some(Format::BlastXml),
        "maf" => Some(Format::LastMaf),
        "aln" => Some(Format::RapSearchAln),
        "sam" => Some(Format::Sam),
        "fa" | "fasta" | "fna" | "faa" => Some(Format::Fasta),
        "daa" => Some(Format::Daa),
        "m8" | "tab" | "blasttab" | "tsv" => Some(Format::BlastTab),
        "blast" | "blastn" | "blastp" | "blastx" => Some(Format::BlastText),
        "txt" => {
            if stem.contains("mothur") || stem.contains(".taxonomy") {
                Some(Format::Mothur)
            } else if stem.contains("rdp") {
                Some(Format::RdpStandalone)
            } else {
                Some(Format::BlastText)
            }
        }
        "taxonomy" => Some(Format::Mothur),
        _ => None,
    }
}

fn sample(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .take(SAMPLE_LINES)
        .collect()
}

/// Detect format from file content analysis
fn detect_format_from_content(content: &[u8]) -> Result<(Format, AlignmentMode), FormatError> {
    let text = match std::str::from_utf8(content) {
        Ok(text) => text,
        // Multi-byte character cut off at the end of the sample
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&content[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return Err(FormatError::UnsupportedBinary),
    };

    if text.trim().is_empty() {
        return Err(FormatError::UnknownFormat);
    }

    // Check for binary content (control characters)
    if text
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
    {
        return Err(FormatError::UnsupportedBinary);
    }

    // Most specific signatures first; tabular BLAST must precede the
    // classifiers, whose rows are also tab-separated.
    let order = [
        Format::BlastXml,
        Format::Sam,
        Format::LastMaf,
        Format::RapSearchAln,
        Format::BlastText,
        Format::Fasta,
        Format::BlastTab,
        Format::Mothur,
        Format::RdpAssignmentDetails,
        Format::RdpStandalone,
    ];
    order
        .into_iter()
        .find(|format| looks_like(*format, text))
        .map(|format| (format, detect_mode(format, text)))
        .ok_or(FormatError::UnknownFormat)
}

/// Alignment mode implied by the content for `format`
#[must_use]
pub fn detect_mode(format: Format, content: &str) -> AlignmentMode {
    match format {
        Format::BlastText => sample(content)
            .iter()
            .map(|line| AlignmentMode::from_program(line))
            .find(|mode| *mode != AlignmentMode::Unknown)
            .unwrap_or_default(),
        Format::BlastTab => sample(content)
            .iter()
            .filter_map(|line| line.strip_prefix('#'))
            .map(|line| AlignmentMode::from_program(line))
            .find(|mode| *mode != AlignmentMode::Unknown)
            .unwrap_or_default(),
        Format::BlastXml => content
            .find("<BlastOutput_program>")
            .map(|pos| &content[pos + "<BlastOutput_program>".len()..])
            .and_then(|rest| rest.split('<').next())
            .map(AlignmentMode::from_program)
            .unwrap_or_default(),
        Format::RdpStandalone | Format::RdpAssignmentDetails | Format::Mothur => {
            AlignmentMode::Classifier
        }
        Format::LastMaf
        | Format::RapSearchAln
        | Format::Sam
        | Format::Fasta
        | Format::Daa => AlignmentMode::Unknown,
    }
}

fn is_tabular_row(line: &str) -> bool {
    let fields: Vec<&str> = line.split('\t').collect();
    fields.len() >= 12
        && fields[2..12]
            .iter()
            .all(|f| f.trim().parse::<f64>().is_ok())
}

fn is_mothur_row(line: &str) -> bool {
    let Some((_, taxonomy)) = line.split_once('\t') else {
        return false;
    };
    !taxonomy.contains('\t') && taxonomy.trim_end().ends_with(';')
}

fn is_rdp_details_row(line: &str) -> bool {
    let fields: Vec<&str> = line.split(';').map(str::trim).collect();
    fields.len() >= 4 && fields.iter().any(|f| f.ends_with('%'))
}

fn is_rdp_standalone_row(line: &str) -> bool {
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    let mut rest = fields.get(1..).unwrap_or_default();
    if rest.first().is_some_and(|f| f.is_empty() || *f == "-") {
        rest = &rest[1..];
    }
    rest.len() >= 3
        && rest
            .chunks(3)
            .filter(|chunk| chunk.len() == 3)
            .all(|chunk| chunk[2].parse::<f32>().is_ok_and(|c| (0.0..=1.0).contains(&c)))
}

/// Whether `content` carries the signature of `format`
#[must_use]
pub fn looks_like(format: Format, content: &str) -> bool {
    let lines = sample(content);
    match format {
        Format::BlastXml => {
            content.contains("<BlastOutput>")
                || (content.trim_start().starts_with("<?xml") && content.contains("<BlastOutput"))
        }
        Format::BlastText => lines.iter().any(|line| {
            line.starts_with("Query=")
                || (AlignmentMode::from_program(line) != AlignmentMode::Unknown
                    && line.contains(' ')
                    && !line.starts_with('#'))
        }),
        Format::BlastTab => {
            lines.iter().any(|line| line.starts_with("# BLAST"))
                || (lines.iter().any(|line| !line.starts_with('#'))
                    && lines
                        .iter()
                        .filter(|line| !line.starts_with('#'))
                        .take(5)
                        .all(|line| is_tabular_row(line)))
        }
        Format::LastMaf => {
            lines.iter().any(|line| line.starts_with("##maf"))
                || (lines.iter().any(|line| line.starts_with("a score="))
                    && lines.iter().any(|line| line.starts_with("s ")))
        }
        Format::RapSearchAln => lines
            .iter()
            .any(|line| line.contains(" vs ") && line.contains("bits=")),
        Format::Sam => {
            lines
                .iter()
                .any(|line| line.starts_with("@HD\t") || line.starts_with("@SQ\t"))
                || lines.first().is_some_and(|line| {
                    let fields: Vec<&str> = line.split('\t').collect();
                    fields.len() >= 11
                        && fields[1].parse::<u16>().is_ok()
                        && fields[3].parse::<u64>().is_ok()
                })
        }
        Format::Fasta => lines.first().is_some_and(|line| line.starts_with('>')),
        Format::Mothur => !lines.is_empty() && lines.iter().take(5).all(|line| is_mothur_row(line)),
        Format::RdpAssignmentDetails => lines.iter().any(|line| is_rdp_details_row(line)),
        Format::RdpStandalone => {
            !lines.is_empty() && lines.iter().take(5).all(|line| is_rdp_standalone_row(line))
        }
        Format::Daa => false,
    }
}
