//! Hierarchical taxonomy reports from read classifiers.
//!
//! Three layouts are understood:
//!
//! | kind | example |
//! |------|---------|
//! | RDP standalone | `r1<TAB>-<TAB>Bacteria<TAB>domain<TAB>1.0<TAB>Firmicutes<TAB>phylum<TAB>0.98` |
//! | RDP assignment details | `r1; -; Bacteria; 100%; Firmicutes; 98%` |
//! | Mothur | `r1<TAB>Bacteria(100);Firmicutes(98);` |
//!
//! Each taxonomic level becomes one record. Deeper levels score higher, and
//! records are written deepest first.

use crate::core::record::render_classification;
use crate::parsing::iterator::QueryParser;
use crate::parsing::lines::LineReader;
use crate::parsing::state::ScanState;
use crate::parsing::ParseError;

/// Layout of a classifier report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    RdpStandalone,
    RdpAssignmentDetails,
    Mothur,
}

/// One taxonomic level of an assignment
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub taxon: String,
    /// Confidence in percent
    pub confidence: f32,
}

fn invalid(line: u64, field: &'static str, value: &str) -> ParseError {
    ParseError::InvalidField {
        line,
        field,
        value: value.to_string(),
    }
}

/// Split a line into the query name and its levels, root first.
///
/// # Errors
///
/// Returns `ParseError::InvalidField` for an unparseable confidence.
pub fn parse_levels(
    kind: ClassifierKind,
    line: &str,
    line_number: u64,
) -> Result<(String, Vec<Level>), ParseError> {
    match kind {
        ClassifierKind::RdpStandalone => {
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let name = fields.first().copied().unwrap_or_default().to_string();
            let mut rest = &fields[1.min(fields.len())..];
            if rest.first().is_some_and(|f| f.is_empty() || *f == "-") {
                rest = &rest[1..];
            }
            let mut levels = Vec::new();
            for triple in rest.chunks(3) {
                let [taxon, _rank, confidence] = triple else {
                    break;
                };
                let confidence = confidence
                    .parse::<f32>()
                    .map_err(|_| invalid(line_number, "confidence", confidence))?;
                levels.push(Level {
                    taxon: taxon.trim_matches('"').to_string(),
                    confidence: confidence * 100.0,
                });
            }
            Ok((name, levels))
        }
        ClassifierKind::RdpAssignmentDetails => {
            let fields: Vec<&str> = line.split(';').map(str::trim).collect();
            let name = fields.first().copied().unwrap_or_default().to_string();
            let mut rest = &fields[1.min(fields.len())..];
            if rest.first().is_some_and(|f| f.is_empty() || *f == "-") {
                rest = &rest[1..];
            }
            let mut levels = Vec::new();
            for pair in rest.chunks(2) {
                let [taxon, confidence] = pair else {
                    break;
                };
                if taxon.is_empty() {
                    continue;
                }
                let value = confidence.trim_end_matches('%');
                let confidence = value
                    .parse::<f32>()
                    .map_err(|_| invalid(line_number, "confidence", confidence))?;
                levels.push(Level {
                    taxon: taxon.trim_matches('"').to_string(),
                    confidence,
                });
            }
            Ok((name, levels))
        }
        ClassifierKind::Mothur => {
            let (name, taxonomy) = line.split_once('\t').unwrap_or((line, ""));
            let mut levels = Vec::new();
            for entry in taxonomy.split(';').map(str::trim).filter(|e| !e.is_empty()) {
                let level = match entry.strip_suffix(')').and_then(|e| e.rsplit_once('(')) {
                    Some((taxon, confidence)) => Level {
                        taxon: taxon.to_string(),
                        confidence: confidence
                            .parse::<f32>()
                            .map_err(|_| invalid(line_number, "confidence", confidence))?,
                    },
                    None => Level {
                        taxon: entry.to_string(),
                        confidence: 100.0,
                    },
                };
                levels.push(level);
            }
            Ok((name.trim().to_string(), levels))
        }
    }
}

/// Grammar for classifier reports
#[derive(Debug, Clone)]
pub struct ClassifierParser {
    kind: ClassifierKind,
    current: Option<String>,
}

impl ClassifierParser {
    #[must_use]
    pub fn new(kind: ClassifierKind) -> Self {
        Self {
            kind,
            current: None,
        }
    }

    fn name_of(&self, line: &str) -> String {
        let separator = match self.kind {
            ClassifierKind::RdpAssignmentDetails => ';',
            ClassifierKind::RdpStandalone | ClassifierKind::Mothur => '\t',
        };
        line.split(separator).next().unwrap_or_default().trim().to_string()
    }

    fn register(&self, line: &str, line_number: u64, state: &mut ScanState) -> Result<(), ParseError> {
        let (_, levels) = parse_levels(self.kind, line, line_number)?;
        let Some(query) = state.query_name().map(str::to_string) else {
            return Ok(());
        };
        for (idx, level) in levels.iter().enumerate().rev() {
            let depth = idx + 1;
            let record = render_classification(&query, &level.taxon, depth, level.confidence, line);
            #[allow(clippy::cast_precision_loss)]
            state.push_ordered(depth as f32, record);
        }
        Ok(())
    }
}

impl QueryParser for ClassifierParser {
    fn parse_query(
        &mut self,
        reader: &mut LineReader,
        state: &mut ScanState,
    ) -> Result<bool, ParseError> {
        let Some(line) = reader.skip_blank_lines() else {
            return Ok(false);
        };
        let name = self.name_of(&line);
        state.start_query(&name);
        self.current = Some(name.clone());
        self.register(&line, reader.line_number(), state)?;

        while let Some(line) = reader.next_line() {
            if line.trim().is_empty() {
                continue;
            }
            if self.name_of(&line) != name {
                reader.push_back(line);
                break;
            }
            self.register(&line, reader.line_number(), state)?;
        }
        Ok(true)
    }

    fn recover(&mut self, reader: &mut LineReader) {
        let Some(current) = self.current.clone() else {
            return;
        };
        while let Some(line) = reader.next_line() {
            if !line.trim().is_empty() && self.name_of(&line) != current {
                reader.push_back(line);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ScanConfig;
    use crate::parsing::iterator::testing::collect;

    #[test]
    fn test_mothur_levels_deepest_first() {
        let text = "r1\tBacteria(100);Firmicutes(98);Bacilli(80);\nr2\tunknown;\n";
        let queries = collect(text, ClassifierParser::new(ClassifierKind::Mothur), &ScanConfig::default());
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].0, 3);
        let lines: Vec<&str> = queries[0].1.lines().collect();
        assert_eq!(
            lines[0],
            "r1\t0\tBacilli\t0\t255\t*\t*\t0\t0\t*\t*\tAS:i:3\tZC:i:80\tAL:Z:r1 Bacteria(100);Firmicutes(98);Bacilli(80);"
        );
        assert!(lines[1].starts_with("r1\t0\tFirmicutes\t"));
        assert!(lines[2].contains("\tAS:i:1\tZC:i:100\t"));
        assert!(queries[1].1.starts_with("r2\t0\tunknown\t"));
    }

    #[test]
    fn test_rdp_standalone() {
        let line = "r1\t-\tBacteria\tdomain\t1.0\tFirmicutes\tphylum\t0.98\tBacilli\tclass\t0.5";
        let (name, levels) = parse_levels(ClassifierKind::RdpStandalone, line, 1).unwrap();
        assert_eq!(name, "r1");
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[1].taxon, "Firmicutes");
        assert!((levels[1].confidence - 98.0).abs() < 1e-3);

        // Strand column is optional
        let line = "r1\tBacteria\tdomain\t1.0";
        let (_, levels) = parse_levels(ClassifierKind::RdpStandalone, line, 1).unwrap();
        assert_eq!(levels[0].taxon, "Bacteria");
    }

    #[test]
    fn test_rdp_assignment_details() {
        let line = "r7; -; Root; 100%; Bacteria; 100%; \"Proteobacteria\"; 91%";
        let (name, levels) = parse_levels(ClassifierKind::RdpAssignmentDetails, line, 1).unwrap();
        assert_eq!(name, "r7");
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[2].taxon, "Proteobacteria");
        assert!((levels[2].confidence - 91.0).abs() < 1e-3);
    }

    #[test]
    fn test_bad_confidence() {
        let result = parse_levels(ClassifierKind::Mothur, "r1\tBacteria(high);", 5);
        assert!(matches!(
            result,
            Err(ParseError::InvalidField { line: 5, field: "confidence", .. })
        ));
    }

    #[test]
    fn test_unclassified_line_gives_bare_name() {
        let text = "r1\t-\n";
        let queries = collect(
            text,
            ClassifierParser::new(ClassifierKind::RdpStandalone),
            &ScanConfig::default(),
        );
        assert_eq!(queries, vec![(0, "r1\n".to_string())]);
    }
}
