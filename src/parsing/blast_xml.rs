//! BLAST XML reports (`-outfmt 5`), parsed on a worker thread.
//!
//! The worker walks the document with quick-xml and, for every completed
//! `Iteration`, runs the retention step and sends the serialized records
//! through a bounded channel. A [`Bundle::Finished`] sentinel always ends
//! the stream, whether the document was read to the end or parsing failed.
//! Worker failures never cross the channel: they are logged and reported
//! once through the [`Notifier`].

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::{debug, error, warn};

use crate::core::config::ScanConfig;
use crate::core::record::Hit;
use crate::core::types::AlignmentMode;
use crate::parsing::lines::InputSource;
use crate::parsing::state::ScanState;
use crate::parsing::{MatchIterator, ParseError};
use crate::utils::notify::Notifier;

/// Queries buffered between the worker and the consumer
pub const CHANNEL_CAPACITY: usize = 10_000;

/// Message from the worker
#[derive(Debug)]
pub enum Bundle {
    /// Serialized records of one query
    Query { bytes: Vec<u8>, count: usize },
    /// No further queries follow
    Finished,
}

/// Raw element text of one `Hsp`, parsed when the element closes
#[derive(Debug, Default)]
struct RawHsp {
    bit_score: String,
    score: String,
    evalue: String,
    query_from: String,
    query_to: String,
    hit_from: String,
    hit_to: String,
    query_frame: String,
    hit_frame: String,
    identity: String,
    align_len: String,
    qseq: String,
    hseq: String,
}

#[derive(Debug, Default)]
struct RawHit {
    id: String,
    def: String,
    accession: String,
    length: String,
}

impl RawHit {
    fn reference_name(&self) -> String {
        let def = self.def.trim();
        let accession = self.accession.trim();
        if def.is_empty() || def.starts_with("No definition line") {
            if accession.is_empty() {
                self.id.trim().to_string()
            } else {
                accession.to_string()
            }
        } else if accession.is_empty() || def.contains(accession) {
            def.to_string()
        } else {
            format!("{accession} {def}")
        }
    }
}

fn field<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, ParseError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ParseError::Xml(format!("invalid {name} '{value}'")))
}

fn optional<T: std::str::FromStr>(value: &str, name: &str) -> Result<Option<T>, ParseError> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        field(value, name).map(Some)
    }
}

/// Element-level state of the document walk
struct Document {
    mode: AlignmentMode,
    query_id: String,
    query_def: String,
    hit: RawHit,
    hsp: RawHsp,
}

impl Document {
    fn new(mode: AlignmentMode) -> Self {
        Self {
            mode,
            query_id: String::new(),
            query_def: String::new(),
            hit: RawHit::default(),
            hsp: RawHsp::default(),
        }
    }

    fn ensure_query(&self, state: &mut ScanState) {
        if state.in_query() {
            return;
        }
        let def = self.query_def.trim();
        if def.is_empty() || def.starts_with("No definition line") {
            state.start_query(&self.query_id);
        } else {
            state.start_query(def);
        }
    }

    /// Handle a closing tag; returns a bundle when a query is complete
    fn end_element(
        &mut self,
        name: &[u8],
        text: &str,
        state: &mut ScanState,
    ) -> Result<Option<Bundle>, ParseError> {
        let slot = match name {
            b"BlastOutput_program" => {
                if self.mode == AlignmentMode::Unknown {
                    self.mode = AlignmentMode::from_program(text);
                }
                return Ok(None);
            }
            b"Iteration_query-ID" => &mut self.query_id,
            b"Iteration_query-def" => &mut self.query_def,
            b"Hit_id" => &mut self.hit.id,
            b"Hit_def" => &mut self.hit.def,
            b"Hit_accession" => &mut self.hit.accession,
            b"Hit_len" => &mut self.hit.length,
            b"Hsp_bit-score" => &mut self.hsp.bit_score,
            b"Hsp_score" => &mut self.hsp.score,
            b"Hsp_evalue" => &mut self.hsp.evalue,
            b"Hsp_query-from" => &mut self.hsp.query_from,
            b"Hsp_query-to" => &mut self.hsp.query_to,
            b"Hsp_hit-from" => &mut self.hsp.hit_from,
            b"Hsp_hit-to" => &mut self.hsp.hit_to,
            b"Hsp_query-frame" => &mut self.hsp.query_frame,
            b"Hsp_hit-frame" => &mut self.hsp.hit_frame,
            b"Hsp_identity" => &mut self.hsp.identity,
            b"Hsp_align-len" => &mut self.hsp.align_len,
            b"Hsp_qseq" => &mut self.hsp.qseq,
            b"Hsp_hseq" => &mut self.hsp.hseq,
            b"Hsp" => {
                self.ensure_query(state);
                let hsp = std::mem::take(&mut self.hsp);
                if let Err(e) = self.register_hsp(hsp, state) {
                    state.record_error(&e)?;
                }
                return Ok(None);
            }
            b"Hit" => {
                self.hit = RawHit::default();
                return Ok(None);
            }
            b"Iteration" => {
                self.ensure_query(state);
                let count = state.finish_query().unwrap_or(0);
                let bytes = state.take_record_bytes();
                self.query_id.clear();
                self.query_def.clear();
                return Ok(Some(Bundle::Query { bytes, count }));
            }
            _ => return Ok(None),
        };
        text.clone_into(slot);
        Ok(None)
    }

    fn register_hsp(&self, hsp: RawHsp, state: &mut ScanState) -> Result<(), ParseError> {
        let bit_score: f32 = field(&hsp.bit_score, "Hsp_bit-score")?;
        let raw_score: Option<f32> = optional(&hsp.score, "Hsp_score")?;
        let expect: Option<f64> = optional(&hsp.evalue, "Hsp_evalue")?;
        let query_from: u32 = field(&hsp.query_from, "Hsp_query-from")?;
        let query_to: u32 = field(&hsp.query_to, "Hsp_query-to")?;
        let hit_from: u64 = field(&hsp.hit_from, "Hsp_hit-from")?;
        let hit_to: u64 = field(&hsp.hit_to, "Hsp_hit-to")?;
        let query_frame: i32 = optional(&hsp.query_frame, "Hsp_query-frame")?.unwrap_or(1);
        let hit_frame: i32 = optional(&hsp.hit_frame, "Hsp_hit-frame")?.unwrap_or(1);
        let identity: Option<u32> = optional(&hsp.identity, "Hsp_identity")?;
        let align_len: Option<u32> = optional(&hsp.align_len, "Hsp_align-len")?;
        let reference_length: Option<u64> = optional(&self.hit.length, "Hit_len")?;

        if hsp.qseq.len() != hsp.hseq.len() {
            return Err(ParseError::Xml(format!(
                "Hsp_qseq and Hsp_hseq differ in length ({} vs {})",
                hsp.qseq.len(),
                hsp.hseq.len()
            )));
        }

        let (reverse, flip_rows) = if self.mode.is_nucleotide() {
            match (query_frame >= 0, hit_frame >= 0) {
                (true, true) => (false, false),
                (true, false) => (true, true),
                (false, true) => (true, false),
                (false, false) => {
                    return Err(ParseError::Xml(
                        "unsupported strand combination Minus/Minus".to_string(),
                    ))
                }
            }
        } else {
            (false, false)
        };

        #[allow(clippy::cast_precision_loss)]
        let percent_identity = match (identity, align_len) {
            (Some(same), Some(total)) if total > 0 => Some(100.0 * same as f32 / total as f32),
            _ => None,
        };
        let query_start = query_from.min(query_to);
        let query_end = query_from.max(query_to);

        let hit = Hit {
            reference_name: self.hit.reference_name(),
            reference_length,
            reference_start: hit_from.min(hit_to),
            reverse,
            bit_score,
            raw_score,
            expect,
            percent_identity,
            frame: if self.mode == AlignmentMode::BlastX { query_frame } else { 0 },
            query_start,
            query_end,
            ..Hit::default()
        };
        state.register(bit_score, (query_start, query_end), move |query| {
            hit.with_alignment(&hsp.qseq, &hsp.hseq, flip_rows).render(query)
        });
        Ok(())
    }
}

/// Everything the worker thread owns
struct Worker {
    input: Box<dyn BufRead + Send>,
    mode: AlignmentMode,
    config: ScanConfig,
    sender: SyncSender<Bundle>,
    stop: Arc<AtomicBool>,
    parse_errors: Arc<AtomicUsize>,
    notifier: Arc<dyn Notifier>,
}

impl Worker {
    fn run(self) {
        let sender = self.sender.clone();
        let notifier = Arc::clone(&self.notifier);
        if let Err(e) = self.parse_document() {
            error!("BLAST XML parsing stopped: {e}");
            notifier.warn(&format!("BLAST XML parsing stopped: {e}"));
        }
        let _ = sender.send(Bundle::Finished);
    }

    fn parse_document(self) -> Result<(), ParseError> {
        let mut xml = Reader::from_reader(self.input);
        xml.config_mut().trim_text(true);
        let mut state = ScanState::new(&self.config);
        let mut document = Document::new(self.mode);
        let mut buf = Vec::new();
        let mut text = String::new();

        loop {
            let event = xml.read_event_into(&mut buf).map_err(|e| {
                ParseError::Xml(format!("at byte {}: {e}", xml.buffer_position()))
            })?;
            let bundle = match event {
                Event::Start(_) => {
                    text.clear();
                    None
                }
                Event::Text(e) => {
                    let unescaped = e.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                    text.push_str(&unescaped);
                    None
                }
                Event::End(e) => {
                    let bundle = document.end_element(e.name().as_ref(), &text, &mut state)?;
                    text.clear();
                    bundle
                }
                Event::Empty(e) => {
                    text.clear();
                    document.end_element(e.name().as_ref(), "", &mut state)?
                }
                Event::Eof => break,
                _ => None,
            };
            buf.clear();

            if let Some(bundle) = bundle {
                self.parse_errors.store(state.parse_errors(), Ordering::Relaxed);
                if self.sender.send(bundle).is_err() {
                    debug!("BLAST XML consumer went away");
                    return Ok(());
                }
                if self.stop.load(Ordering::Relaxed) {
                    return Ok(());
                }
            }
        }
        self.parse_errors.store(state.parse_errors(), Ordering::Relaxed);
        Ok(())
    }
}

/// [`MatchIterator`] over BLAST XML, fed by a worker thread.
///
/// The worker starts on the first call to `has_more`, so the long-read
/// setting can still be changed after construction.
pub struct BlastXmlIterator {
    input: Option<Box<dyn BufRead + Send>>,
    mode: AlignmentMode,
    config: ScanConfig,
    notifier: Arc<dyn Notifier>,
    receiver: Option<Receiver<Bundle>>,
    worker: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    consumed: Arc<AtomicU64>,
    size: u64,
    parse_errors: Arc<AtomicUsize>,
    cached: Option<Bundle>,
    current: Vec<u8>,
    finished: bool,
    format_warning: Option<String>,
}

impl BlastXmlIterator {
    #[must_use]
    pub fn new(
        source: InputSource,
        mode: AlignmentMode,
        config: &ScanConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let consumed = source.progress_counter();
        let size = source.size();
        Self {
            input: Some(source.into_reader()),
            mode,
            config: config.clone(),
            notifier,
            receiver: None,
            worker: None,
            stop: Arc::new(AtomicBool::new(false)),
            consumed,
            size,
            parse_errors: Arc::new(AtomicUsize::new(0)),
            cached: None,
            current: Vec::new(),
            finished: false,
            format_warning: None,
        }
    }

    fn start_worker(&mut self) {
        let Some(input) = self.input.take() else {
            return;
        };
        let (sender, receiver): (SyncSender<Bundle>, Receiver<Bundle>) =
            mpsc::sync_channel(CHANNEL_CAPACITY);
        let worker = Worker {
            input,
            mode: self.mode,
            config: self.config.clone(),
            sender,
            stop: Arc::clone(&self.stop),
            parse_errors: Arc::clone(&self.parse_errors),
            notifier: Arc::clone(&self.notifier),
        };
        self.worker = Some(thread::spawn(move || worker.run()));
        self.receiver = Some(receiver);
    }
}

impl MatchIterator for BlastXmlIterator {
    fn has_more(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.start_worker();
        if self.cached.is_none() {
            let next = self
                .receiver
                .as_ref()
                .and_then(|receiver| receiver.recv().ok())
                .unwrap_or(Bundle::Finished);
            self.cached = Some(next);
        }
        if matches!(self.cached, Some(Bundle::Finished)) {
            self.finished = true;
            return false;
        }
        true
    }

    fn advance(&mut self) -> Result<Option<usize>, ParseError> {
        if !self.has_more() {
            return Ok(None);
        }
        match self.cached.take() {
            Some(Bundle::Query { bytes, count }) => {
                self.current = bytes;
                Ok(Some(count))
            }
            _ => Ok(None),
        }
    }

    fn record_bytes(&self) -> &[u8] {
        &self.current
    }

    fn set_long_reads(&mut self, long_reads: bool) {
        if self.input.is_none() {
            if long_reads != self.config.long_reads {
                warn!(long_reads, "BLAST XML worker already running, long-read setting unchanged");
            }
            return;
        }
        self.config.long_reads = long_reads;
    }

    fn is_long_reads(&self) -> bool {
        self.config.long_reads
    }

    fn progress(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }

    fn max_progress(&self) -> u64 {
        self.size
    }

    fn parse_errors(&self) -> usize {
        self.parse_errors.load(Ordering::Relaxed)
    }

    fn format_warning(&self) -> Option<&str> {
        self.format_warning.as_deref()
    }

    fn set_format_warning(&mut self, warning: String) {
        self.format_warning = Some(warning);
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.finished = true;
        self.cached = None;
        // Dropping the receiver unblocks a worker waiting on a full channel
        self.receiver = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("BLAST XML worker panicked");
            }
        }
    }
}

impl Drop for BlastXmlIterator {
    fn drop(&mut self) {
        self.close();
    }
}
