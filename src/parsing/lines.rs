//! Pull-style line scanning shared by every text format.
//!
//! [`LineReader`] hands out one line at a time, can look ahead for lines
//! with a given prefix or substring, and keeps a single push-back slot so a
//! parser that reads one line too far (typically the first line of the next
//! query) can return it.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use flate2::read::MultiGzDecoder;
use tracing::warn;

/// Reader wrapper that counts the bytes pulled from the underlying file
struct CountingReader<R> {
    inner: R,
    consumed: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// A buffered input plus the counters needed to report progress.
pub struct InputSource {
    reader: Box<dyn BufRead + Send>,
    consumed: Arc<AtomicU64>,
    size: u64,
}

impl InputSource {
    /// Open a file, decompressing transparently when the name ends in `.gz`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or its size read.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        let consumed = Arc::new(AtomicU64::new(0));
        let counting = CountingReader {
            inner: file,
            consumed: Arc::clone(&consumed),
        };

        let is_gzip = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("gz"));
        let reader: Box<dyn BufRead + Send> = if is_gzip {
            Box::new(BufReader::new(MultiGzDecoder::new(counting)))
        } else {
            Box::new(BufReader::new(counting))
        };

        Ok(Self {
            reader,
            consumed,
            size,
        })
    }

    /// In-memory input, used for tests and for already-buffered content
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let size = bytes.len() as u64;
        let consumed = Arc::new(AtomicU64::new(0));
        let counting = CountingReader {
            inner: io::Cursor::new(bytes),
            consumed: Arc::clone(&consumed),
        };
        Self {
            reader: Box::new(BufReader::new(counting)),
            consumed,
            size,
        }
    }

    /// Shared byte counter, readable from other threads
    #[must_use]
    pub fn progress_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.consumed)
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Give up the line interface and hand out the raw buffered reader
    #[must_use]
    pub fn into_reader(self) -> Box<dyn BufRead + Send> {
        self.reader
    }
}

/// Line reader with one-slot push-back and peek-ahead helpers.
pub struct LineReader {
    reader: Box<dyn BufRead + Send>,
    consumed: Arc<AtomicU64>,
    size: u64,
    /// Line returned by the caller, with its line number
    pushed_back: Option<(String, u64)>,
    /// Line read ahead by `has_more_lines`
    peeked: Option<(String, u64)>,
    physical_line: u64,
    line_number: u64,
    skip_comments: bool,
    error: Option<io::Error>,
    scratch: Vec<u8>,
}

impl LineReader {
    #[must_use]
    pub fn new(source: InputSource) -> Self {
        Self {
            reader: source.reader,
            consumed: source.consumed,
            size: source.size,
            pushed_back: None,
            peeked: None,
            physical_line: 0,
            line_number: 0,
            skip_comments: false,
            error: None,
            scratch: Vec::with_capacity(1024),
        }
    }

    /// Hide lines starting with `#` from every read operation
    pub fn set_skip_comments(&mut self, skip: bool) {
        self.skip_comments = skip;
    }

    pub fn has_more_lines(&mut self) -> bool {
        if self.pushed_back.is_some() || self.peeked.is_some() {
            return true;
        }
        self.peeked = self.read_physical();
        self.peeked.is_some()
    }

    /// Next line without its terminator, `None` at end of input
    pub fn next_line(&mut self) -> Option<String> {
        let (line, number) = match self.pushed_back.take() {
            Some(entry) => entry,
            None => match self.peeked.take() {
                Some(entry) => entry,
                None => self.read_physical()?,
            },
        };
        self.line_number = number;
        Some(line)
    }

    /// Return a line so the next read yields it again.
    ///
    /// Only one line can be pending; pushing a second one replaces the first.
    pub fn push_back(&mut self, line: String) {
        if let Some((previous, number)) = self.pushed_back.take() {
            warn!(
                line = number,
                "push-back slot already occupied, dropping line: {previous}"
            );
        }
        self.pushed_back = Some((line, self.line_number));
        self.line_number = self.line_number.saturating_sub(1);
    }

    /// Skip lines until one starts, after leading whitespace, with any of `prefixes`
    pub fn next_line_with_prefix(&mut self, prefixes: &[&str]) -> Option<String> {
        while let Some(line) = self.next_line() {
            let trimmed = line.trim_start();
            if prefixes.iter().any(|prefix| trimmed.starts_with(prefix)) {
                return Some(line);
            }
        }
        None
    }

    /// Skip lines until one contains `needle`
    pub fn next_line_containing(&mut self, needle: &str) -> Option<String> {
        while let Some(line) = self.next_line() {
            if line.contains(needle) {
                return Some(line);
            }
        }
        None
    }

    /// First line that is not empty or whitespace only
    pub fn skip_blank_lines(&mut self) -> Option<String> {
        while let Some(line) = self.next_line() {
            if !line.trim().is_empty() {
                return Some(line);
            }
        }
        None
    }

    /// 1-based number of the most recently returned line
    #[must_use]
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Bytes consumed from the underlying file
    #[must_use]
    pub fn progress(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }

    /// Size of the underlying file in bytes
    #[must_use]
    pub fn max_progress(&self) -> u64 {
        self.size
    }

    /// The I/O error that ended reading early, if any
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    fn read_physical(&mut self) -> Option<(String, u64)> {
        if self.error.is_some() {
            return None;
        }
        loop {
            self.scratch.clear();
            match self.reader.read_until(b'\n', &mut self.scratch) {
                Ok(0) => return None,
                Ok(_) => {
                    self.physical_line += 1;
                    while matches!(self.scratch.last(), Some(b'\n' | b'\r')) {
                        self.scratch.pop();
                    }
                    if self.skip_comments && self.scratch.first() == Some(&b'#') {
                        continue;
                    }
                    let line = String::from_utf8_lossy(&self.scratch).into_owned();
                    return Some((line, self.physical_line));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.error = Some(e);
                    return None;
                }
            }
        }
    }
}

/// Byte offset just past `tag` in `line`.
///
/// When the tag is not found verbatim, it is retried with its spaces
/// removed, so `"Length ="` also finds `"Length=123"`.
fn find_tag(line: &str, tag: &str) -> Option<usize> {
    if let Some(pos) = line.find(tag) {
        return Some(pos + tag.len());
    }
    let compact: String = tag.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() || compact.len() == tag.len() {
        return None;
    }
    line.find(&compact).map(|pos| pos + compact.len())
}

/// Whitespace-delimited token following `tag`, with a trailing comma removed
#[must_use]
pub fn token_after<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    let start = find_tag(line, tag)?;
    line[start..]
        .split_whitespace()
        .next()
        .map(|token| token.trim_end_matches(','))
        .filter(|token| !token.is_empty())
}

/// Text following `tag1` up to `tag2`, or to the end of the line when
/// `tag2` is empty or absent. Surrounding whitespace is trimmed.
#[must_use]
pub fn text_between<'a>(line: &'a str, tag1: &str, tag2: &str) -> Option<&'a str> {
    let start = find_tag(line, tag1)?;
    let rest = &line[start..];
    let end = if tag2.is_empty() {
        rest.len()
    } else {
        rest.find(tag2)
            .or_else(|| {
                let compact: String = tag2.chars().filter(|c| !c.is_whitespace()).collect();
                if compact.is_empty() {
                    None
                } else {
                    rest.find(&compact)
                }
            })
            .unwrap_or(rest.len())
    };
    let text = rest[..end].trim();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Letters following `tag1` up to `tag2`; every other character is dropped
#[must_use]
pub fn letters_after(line: &str, tag1: &str, tag2: &str) -> Option<String> {
    let letters: String = text_between(line, tag1, tag2)?
        .chars()
        .filter(char::is_ascii_alphabetic)
        .collect();
    if letters.is_empty() {
        None
    } else {
        Some(letters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(text: &str) -> LineReader {
        LineReader::new(InputSource::from_bytes(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_next_line_strips_terminators() {
        let mut lines = reader("a\r\nb\nc");
        assert_eq!(lines.next_line().as_deref(), Some("a"));
        assert_eq!(lines.next_line().as_deref(), Some("b"));
        assert_eq!(lines.next_line().as_deref(), Some("c"));
        assert_eq!(lines.line_number(), 3);
        assert!(lines.next_line().is_none());
        assert!(!lines.has_more_lines());
    }

    #[test]
    fn test_push_back_and_line_numbers() {
        let mut lines = reader("one\ntwo\nthree\n");
        lines.next_line();
        let second = lines.next_line().unwrap();
        assert_eq!(lines.line_number(), 2);
        lines.push_back(second);
        assert_eq!(lines.line_number(), 1);
        assert!(lines.has_more_lines());
        assert_eq!(lines.next_line().as_deref(), Some("two"));
        assert_eq!(lines.line_number(), 2);
    }

    #[test]
    fn test_second_push_back_overwrites() {
        let mut lines = reader("x\n");
        lines.push_back("first".to_string());
        lines.push_back("second".to_string());
        assert_eq!(lines.next_line().as_deref(), Some("second"));
        assert_eq!(lines.next_line().as_deref(), Some("x"));
    }

    #[test]
    fn test_has_more_lines_peeks_without_consuming() {
        let mut lines = reader("only\n");
        assert!(lines.has_more_lines());
        assert!(lines.has_more_lines());
        assert_eq!(lines.next_line().as_deref(), Some("only"));
        assert!(!lines.has_more_lines());
    }

    #[test]
    fn test_prefix_and_substring_search() {
        let mut lines = reader("junk\n  Query= r1\nLength=10\n> ref\n");
        assert_eq!(
            lines.next_line_with_prefix(&["Query="]).as_deref(),
            Some("  Query= r1")
        );
        assert_eq!(lines.next_line_containing("ref").as_deref(), Some("> ref"));
        assert!(lines.next_line_with_prefix(&["Query="]).is_none());
    }

    #[test]
    fn test_skip_comments() {
        let mut lines = reader("# header\nq1\tr1\n#mid\nq2\tr2\n");
        lines.set_skip_comments(true);
        assert_eq!(lines.next_line().as_deref(), Some("q1\tr1"));
        assert_eq!(lines.next_line().as_deref(), Some("q2\tr2"));
        assert_eq!(lines.line_number(), 4);
    }

    #[test]
    fn test_skip_blank_lines() {
        let mut lines = reader("\n   \nvalue\n");
        assert_eq!(lines.skip_blank_lines().as_deref(), Some("value"));
    }

    #[test]
    fn test_progress_counts_bytes() {
        let mut lines = reader("abc\ndef\n");
        assert_eq!(lines.max_progress(), 8);
        while lines.next_line().is_some() {}
        assert_eq!(lines.progress(), 8);
    }

    #[test]
    fn test_token_after_tolerates_spacing() {
        assert_eq!(token_after("Length=4641652", "Length ="), Some("4641652"));
        assert_eq!(token_after("Length = 150", "Length ="), Some("150"));
        assert_eq!(
            token_after(" Score = 257 bits (139),  Expect = 1e-66", "Expect ="),
            Some("1e-66")
        );
        assert_eq!(token_after(" Score = 40.0 bits (19), Expect(2) = 0.5,", "Score ="), Some("40.0"));
        assert_eq!(token_after("nothing here", "Score ="), None);
    }

    #[test]
    fn test_text_between() {
        assert_eq!(
            text_between(" Strand=Plus/Minus", "Strand =", ""),
            Some("Plus/Minus")
        );
        assert_eq!(
            text_between("r1 vs ref|NC_1| some desc bits=84.3", " vs ", "bits="),
            Some("ref|NC_1| some desc")
        );
        assert_eq!(text_between("Frame = ", "Frame =", ""), None);
    }

    #[test]
    fn test_letters_after_keeps_only_letters() {
        assert_eq!(
            letters_after(" Strand = Plus/Minus 42", "Strand =", "").as_deref(),
            Some("PlusMinus")
        );
        assert_eq!(
            letters_after(" Strand = Plus / Plus", "Strand =", "").as_deref(),
            Some("PlusPlus")
        );
        assert_eq!(letters_after(" Frame = -2/+1", "Frame =", ""), None);
    }

    #[test]
    fn test_gzip_input_is_decompressed() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.tab.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(b"q1\tr1\nq2\tr2\n").unwrap();
        encoder.finish().unwrap();

        let mut lines = LineReader::new(InputSource::open(&path).unwrap());
        assert_eq!(lines.next_line().as_deref(), Some("q1\tr1"));
        assert_eq!(lines.next_line().as_deref(), Some("q2\tr2"));
        assert!(lines.next_line().is_none());
        assert_eq!(lines.progress(), lines.max_progress());
    }
}
