//! End-to-end tests of the `hitstream` binary

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

const TABULAR: &str = "\
# BLASTN 2.12.0+
# Query: Q1
Q1\tR1\t98.5\t50\t1\t0\t1\t50\t1\t50\t1e-20\t95.0
Q1\tR2\t90.0\t50\t5\t0\t1\t50\t101\t150\t1e-10\t60.0
Q2\tR1\t100.0\t20\t0\t0\t1\t20\t31\t50\t1e-5\t40.0
";

const REPORT: &str = "BLASTN 2.12.0+

Query= read1 some description

Length=20

> ref|NC_1| Escherichia coli
Length=5000

 Score = 34.6 bits (18),  Expect = 1e-05
 Identities = 19/20 (95%), Gaps = 0/20 (0%)
 Strand=Plus/Plus

Query  1    ACGTACGTACGTACGTACGT  20
            |||||||||||||||||| |
Sbjct  101  ACGTACGTACGTACGTACCT  120


Query= read2

Length=10

***** No hits found *****
";

fn fixture(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn hitstream() -> Command {
    Command::cargo_bin("hitstream").unwrap()
}

#[test]
fn test_convert_tabular_to_stdout() {
    let input = fixture(".m8", TABULAR);
    hitstream()
        .arg("convert")
        .arg(input.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Q1\t0\tR1\t1\t255\t*\t*\t0\t0\t*\t*\tAS:i:95\t"))
        .stdout(predicate::str::contains("\nQ1\t0\tR2\t101\t"))
        .stdout(predicate::str::contains("\nQ2\t0\tR1\t31\t"))
        .stderr(predicate::str::contains("Queries: 2"))
        .stderr(predicate::str::contains("Records: 3"));
}

#[test]
fn test_convert_with_max_matches() {
    let input = fixture(".m8", TABULAR);
    hitstream()
        .args(["convert", "--max-matches", "1"])
        .arg(input.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("R2").not())
        .stderr(predicate::str::contains("Records: 2"));
}

#[test]
fn test_convert_to_file_with_json_summary() {
    let input = fixture(".blastn", REPORT);
    let output = NamedTempFile::new().unwrap();
    hitstream()
        .args(["--format", "json", "convert"])
        .arg(input.path())
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("\"queries\": 2"))
        .stderr(predicate::str::contains("\"records\": 1"))
        .stderr(predicate::str::contains("\"parse_errors\": 0"));

    let written = std::fs::read_to_string(output.path()).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("read1\t0\tref|NC_1| Escherichia coli\t101\t255\t20M\t"));
    assert!(lines[0].ends_with("\tMD:Z:18C1"));
    assert_eq!(lines[1], "read2");
}

#[test]
fn test_convert_tsv_summary() {
    let input = fixture(".m8", TABULAR);
    hitstream()
        .args(["-f", "tsv", "convert"])
        .arg(input.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("queries\trecords\tparse_errors\n2\t3\t0"));
}

#[test]
fn test_convert_blast_text_needs_mode() {
    let input = fixture(".txt", "Query= read1\n\nLength=10\n\n***** No hits found *****\n");
    hitstream()
        .args(["convert", "--input-format", "blast-text"])
        .arg(input.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be read in Unknown mode"));

    hitstream()
        .args(["convert", "--input-format", "blast-text", "--mode", "blastp"])
        .arg(input.path())
        .assert()
        .success()
        .stdout("read1\n");
}

#[test]
fn test_convert_rejects_bad_proportion() {
    let input = fixture(".m8", TABULAR);
    hitstream()
        .args(["convert", "--min-cover", "1.5"])
        .arg(input.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("min_cover_proportion"));
}

#[test]
fn test_convert_with_config_file() {
    let input = fixture(".m8", TABULAR);
    let config = fixture(".json", r#"{"max_matches_per_read": 1}"#);
    hitstream()
        .arg("convert")
        .arg(input.path())
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Records: 2"));
}

#[test]
fn test_detect_text_and_json() {
    let input = fixture(".blastn", REPORT);
    hitstream()
        .arg("detect")
        .arg(input.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Format: BLAST Text"))
        .stdout(predicate::str::contains("Mode: BlastN"));

    hitstream()
        .args(["detect", "--format", "json"])
        .arg(input.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"format\": \"blast_text\""))
        .stdout(predicate::str::contains("\"mode\": \"blast_n\""));
}

#[test]
fn test_detect_unknown_content() {
    let input = fixture(".dat", "nothing to see here\n");
    hitstream()
        .arg("detect")
        .arg(input.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot detect the format"));
}

#[test]
fn test_missing_input() {
    hitstream()
        .args(["convert", "/nonexistent/hits.m8"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}
