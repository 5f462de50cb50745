use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::config::ScanConfig;
use crate::core::types::{AlignmentMode, Format};
use crate::format::detection::{detect_mode, looks_like};
use crate::format::FormatError;
use crate::parsing::blast_tab::BlastTabParser;
use crate::parsing::blast_text::BlastTextParser;
use crate::parsing::blast_xml::BlastXmlIterator;
use crate::parsing::classifier::{ClassifierKind, ClassifierParser};
use crate::parsing::fasta::FastaParser;
use crate::parsing::iterator::LineIterator;
use crate::parsing::lines::{InputSource, LineReader};
use crate::parsing::maf::MafParser;
use crate::parsing::rapsearch::RapSearchParser;
use crate::parsing::sam::SamParser;
use crate::parsing::MatchIterator;
use crate::utils::notify::Notifier;

/// Bytes read from the start of a file for sniffing
pub const HEAD_BYTES: usize = 64 * 1024;

/// Read the (decompressed) start of a file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or read.
pub fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let reader = InputSource::open(path)?.into_reader();
    let mut head = Vec::with_capacity(HEAD_BYTES);
    reader.take(HEAD_BYTES as u64).read_to_end(&mut head)?;
    Ok(head)
}

/// Check that `format` can be read in `mode`.
///
/// # Errors
///
/// Returns `FormatError::UnsupportedBinary` for DIAMOND archives and
/// `FormatError::UnsupportedCombination` for pairs no iterator handles.
pub fn check_combination(format: Format, mode: AlignmentMode) -> Result<(), FormatError> {
    use AlignmentMode::{BlastN, BlastP, BlastX, Classifier, Unknown};

    let supported = match format {
        Format::Daa => return Err(FormatError::UnsupportedBinary),
        Format::BlastText => matches!(mode, BlastN | BlastP | BlastX),
        Format::BlastXml | Format::BlastTab | Format::LastMaf => mode != Classifier,
        Format::RapSearchAln => matches!(mode, BlastP | BlastX | Unknown),
        Format::Sam | Format::Fasta => true,
        Format::RdpStandalone | Format::RdpAssignmentDetails | Format::Mothur => {
            matches!(mode, Classifier | Unknown)
        }
    };
    if supported {
        Ok(())
    } else {
        Err(FormatError::UnsupportedCombination { format, mode })
    }
}

/// Open `path` as `format` and return an iterator over its queries.
///
/// An `Unknown` mode is resolved from the content where the format
/// records it. Long-read mode is enabled when the config asks for it and
/// the format carries query coordinates. Content that does not look like
/// `format` is accepted with a format warning.
///
/// # Errors
///
/// Returns `FormatError::Io` if the file cannot be read,
/// `FormatError::UnsupportedCombination` or `FormatError::UnsupportedBinary`
/// for inputs no iterator handles, and `FormatError::Parse` if a SAM header
/// is rejected.
pub fn open_iterator(
    path: &Path,
    format: Format,
    mode: AlignmentMode,
    config: &ScanConfig,
    notifier: Arc<dyn Notifier>,
) -> Result<Box<dyn MatchIterator>, FormatError> {
    let head = read_head(path)?;
    let source = InputSource::open(path)?;
    debug!(path = %path.display(), %format, %mode, size = source.size(), "opening input");
    build(source, &head, format, mode, config, notifier)
}

/// Like [`open_iterator`], over content already in memory.
///
/// # Errors
///
/// See [`open_iterator`].
pub fn iterator_from_bytes(
    bytes: Vec<u8>,
    format: Format,
    mode: AlignmentMode,
    config: &ScanConfig,
    notifier: Arc<dyn Notifier>,
) -> Result<Box<dyn MatchIterator>, FormatError> {
    let head = bytes[..bytes.len().min(HEAD_BYTES)].to_vec();
    build(
        InputSource::from_bytes(bytes),
        &head,
        format,
        mode,
        config,
        notifier,
    )
}

fn build(
    source: InputSource,
    head: &[u8],
    format: Format,
    mode: AlignmentMode,
    config: &ScanConfig,
    notifier: Arc<dyn Notifier>,
) -> Result<Box<dyn MatchIterator>, FormatError> {
    let text = String::from_utf8_lossy(head);
    let mode = if mode == AlignmentMode::Unknown {
        detect_mode(format, &text)
    } else {
        mode
    };
    check_combination(format, mode)?;

    let mut iterator: Box<dyn MatchIterator> = match format {
        Format::BlastText => Box::new(LineIterator::new(source, BlastTextParser::new(mode), config)),
        Format::BlastTab => Box::new(LineIterator::new(source, BlastTabParser::new(mode), config)),
        Format::BlastXml => Box::new(BlastXmlIterator::new(source, mode, config, notifier)),
        Format::LastMaf => Box::new(LineIterator::new(source, MafParser::new(), config)),
        Format::RapSearchAln => Box::new(LineIterator::new(source, RapSearchParser::new(), config)),
        Format::Sam => {
            let mut reader = LineReader::new(source);
            let parser = SamParser::read_header(&mut reader)?;
            Box::new(LineIterator::with_reader(reader, parser, config))
        }
        Format::Fasta => Box::new(LineIterator::new(source, FastaParser::new(), config)),
        Format::RdpStandalone => Box::new(LineIterator::new(
            source,
            ClassifierParser::new(ClassifierKind::RdpStandalone),
            config,
        )),
        Format::RdpAssignmentDetails => Box::new(LineIterator::new(
            source,
            ClassifierParser::new(ClassifierKind::RdpAssignmentDetails),
            config,
        )),
        Format::Mothur => Box::new(LineIterator::new(
            source,
            ClassifierParser::new(ClassifierKind::Mothur),
            config,
        )),
        Format::Daa => return Err(FormatError::UnsupportedBinary),
    };

    iterator.set_long_reads(config.long_reads && format.supports_long_reads());
    if !text.trim().is_empty() && !looks_like(format, &text) {
        let warning = format!("Input does not look like {format}");
        warn!("{warning}");
        iterator.set_format_warning(warning);
    }
    Ok(iterator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::write_records;
    use crate::utils::notify::LogNotifier;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TAB: &str = "Q1\tR1\t98.5\t50\t1\t0\t1\t50\t1\t50\t1e-20\t95.0\n";

    fn convert(bytes: &[u8], format: Format, mode: AlignmentMode, config: &ScanConfig) -> String {
        let mut iterator =
            iterator_from_bytes(bytes.to_vec(), format, mode, config, Arc::new(LogNotifier)).unwrap();
        let mut out = Vec::new();
        write_records(iterator.as_mut(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_combinations() {
        assert!(check_combination(Format::BlastText, AlignmentMode::BlastX).is_ok());
        assert!(matches!(
            check_combination(Format::BlastText, AlignmentMode::Unknown),
            Err(FormatError::UnsupportedCombination { .. })
        ));
        assert!(matches!(
            check_combination(Format::RapSearchAln, AlignmentMode::BlastN),
            Err(FormatError::UnsupportedCombination { .. })
        ));
        assert!(matches!(
            check_combination(Format::Mothur, AlignmentMode::BlastN),
            Err(FormatError::UnsupportedCombination { .. })
        ));
        assert!(matches!(
            check_combination(Format::Daa, AlignmentMode::BlastP),
            Err(FormatError::UnsupportedBinary)
        ));
    }

    #[test]
    fn test_tabular_row_from_bytes() {
        let config = ScanConfig::default().with_max_matches(5);
        let out = convert(TAB.as_bytes(), Format::BlastTab, AlignmentMode::BlastN, &config);
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("\tAS:i:95\t"));
        assert!(out.contains("\tZI:i:99"));
    }

    #[test]
    fn test_blast_text_mode_from_content() {
        let report = "BLASTN 2.12.0+\n\nQuery= read1\n\nLength=20\n\n***** No hits found *****\n";
        let out = convert(report.as_bytes(), Format::BlastText, AlignmentMode::Unknown, &ScanConfig::default());
        assert_eq!(out, "read1\n");

        let result = iterator_from_bytes(
            b"Query= read1\n".to_vec(),
            Format::BlastText,
            AlignmentMode::Unknown,
            &ScanConfig::default(),
            Arc::new(LogNotifier),
        );
        assert!(matches!(result, Err(FormatError::UnsupportedCombination { .. })));
    }

    #[test]
    fn test_format_warning_on_mismatch() {
        let iterator = iterator_from_bytes(
            b">seq1\nACGT\n".to_vec(),
            Format::BlastTab,
            AlignmentMode::BlastN,
            &ScanConfig::default(),
            Arc::new(LogNotifier),
        )
        .unwrap();
        assert_eq!(iterator.format_warning(), Some("Input does not look like BLAST Tabular"));

        let iterator = iterator_from_bytes(
            TAB.as_bytes().to_vec(),
            Format::BlastTab,
            AlignmentMode::BlastN,
            &ScanConfig::default(),
            Arc::new(LogNotifier),
        )
        .unwrap();
        assert_eq!(iterator.format_warning(), None);
    }

    #[test]
    fn test_long_reads_only_for_coordinate_formats() {
        let config = ScanConfig::default().with_long_reads(true);
        let tab = iterator_from_bytes(
            TAB.as_bytes().to_vec(),
            Format::BlastTab,
            AlignmentMode::BlastN,
            &config,
            Arc::new(LogNotifier),
        )
        .unwrap();
        assert!(tab.is_long_reads());

        let fasta = iterator_from_bytes(
            b">seq1\nACGT\n".to_vec(),
            Format::Fasta,
            AlignmentMode::Unknown,
            &config,
            Arc::new(LogNotifier),
        )
        .unwrap();
        assert!(!fasta.is_long_reads());
    }

    #[test]
    fn test_open_gzipped_file() {
        let mut file = tempfile::Builder::new().suffix(".m8.gz").tempfile().unwrap();
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(TAB.as_bytes()).unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
        file.flush().unwrap();

        let head = read_head(file.path()).unwrap();
        assert_eq!(head, TAB.as_bytes());

        let mut iterator = open_iterator(
            file.path(),
            Format::BlastTab,
            AlignmentMode::BlastN,
            &ScanConfig::default(),
            Arc::new(LogNotifier),
        )
        .unwrap();
        let mut out = Vec::new();
        let summary = write_records(iterator.as_mut(), &mut out).unwrap();
        assert_eq!(summary.queries, 1);
        assert_eq!(summary.records, 1);
    }

    #[test]
    fn test_missing_file() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        drop(file);
        let result = open_iterator(
            &path,
            Format::Sam,
            AlignmentMode::Unknown,
            &ScanConfig::default(),
            Arc::new(LogNotifier),
        );
        assert!(matches!(result, Err(FormatError::Io(_))));
    }
}
