// The read loop.
//
// All decision logic lives in ReaderCore::step, which never touches a
// source: it tokenizes the current window and reports when it needs a fill.
// The synchronous driver satisfies fills with std::io::Read; the async
// driver (feature "async") with tokio::io::AsyncRead. Both re-enter the
// identical loop, so suspension can only happen at the refill boundary and
// the two modes produce byte-identical output.

#[cfg(feature = "async")]
pub mod async_io;

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;

use crate::buffer::{BufferWithPushback, PartialValue};
use crate::config::{Config, HeaderMode, RowEnding};
use crate::core::classify::{CharClassifier, SymbolClass};
use crate::core::state::State;
use crate::core::table::{self, Action, TableKey, TransitionTable};
use crate::detect::{DetectStep, RowEndingDetector};
use crate::error::{Error, ParseErrorKind, Result};
use crate::header::ColumnNames;
use crate::row::{RequiredSet, RowAssembler, RowRef};

/// Advisory cancellation flag, checked only at would-be suspension points
/// (never mid-batch). Cancellation poisons the reader.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// One item produced by [`Reader::next_event`].
#[derive(Debug)]
pub enum ReadEvent<'r> {
    Record(RowRef<'r>),
    Comment(&'r [u8]),
}

/// Reader progress counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Data records yielded so far (headers and comments excluded).
    pub records: u64,
    /// Bytes consumed by the tokenizer.
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Detect,
    Header,
    Rows,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderStatus {
    Ready,
    Poisoned,
    Disposed,
}

/// What the shared loop asks of its driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// Refill the buffer. `force` requests source bytes even when staged
    /// pushback exists (multi-byte separator lookahead).
    NeedFill { force: bool },
    Record,
    Comment,
    End,
}

/// Internal flow control between the scan loop and `step`.
enum Flow {
    NeedFill { force: bool },
    Record,
    Comment,
    End,
    /// The probed first row is not a header; replay it as data.
    RejectHeader,
    /// Stage the unconsumed window tail and force a refill (separator
    /// lookahead ran out of window).
    StageTail { keep: usize },
}

/// Pack the probed row into the dual-encoding name store.
fn store_header_names(
    names: &mut ColumnNames,
    row: &RowAssembler,
    window: &[u8],
    replay: &[u8],
    spans: &[(usize, usize)],
) {
    let row_ref = RowRef::new(row, window);
    for (index, field) in row_ref.iter().enumerate() {
        let raw = spans
            .get(index)
            .map(|&(start, end)| &replay[start..end.max(start)])
            .unwrap_or(field);
        names.push(field, raw);
    }
}

pub(crate) struct ReaderCore {
    config: Config,
    classifier: CharClassifier,
    table: Option<Arc<TransitionTable>>,
    buffer: BufferWithPushback,
    partial: PartialValue,
    row: RowAssembler,
    names: ColumnNames,
    required: Option<RequiredSet>,
    detector: RowEndingDetector,
    state: State,
    phase: Phase,
    status: ReaderStatus,
    resolved_ending: Option<RowEnding>,
    comment_buf: Vec<u8>,

    pos: usize,
    source_done: bool,
    row_consumed: bool,
    pending_record: bool,

    // Raw-byte replay capture, active during detection and the header probe.
    replay_raw: Vec<u8>,
    raw_base: usize,
    raw_captured: usize,
    row_raw_start: usize,
    value_raw_start: usize,
    raw_name_spans: Vec<(usize, usize)>,
    reject_consumed_raw_end: usize,

    rows_seen: u64,
    records_read: u64,
    consumed_offset: u64,
}

impl ReaderCore {
    pub(crate) fn new(config: Config) -> Self {
        let classifier = CharClassifier::new(&config);
        let detector = RowEndingDetector::new(&config);
        let window = config.buffer_capacity.max(4 * config.separator().len());
        let buffer = BufferWithPushback::with_capacity(window);
        let row = RowAssembler::new(config.trim_leading, config.trim_trailing);

        let required = if config.required_columns.is_empty() {
            None
        } else {
            let width = config.required_columns.iter().max().copied().unwrap_or(0) + 1;
            let mut set = RequiredSet::new(width);
            for &column in &config.required_columns {
                set.require(column);
            }
            Some(set)
        };

        let mut core = ReaderCore {
            classifier,
            table: None,
            buffer,
            partial: PartialValue::new(),
            row,
            names: ColumnNames::new(),
            required,
            detector,
            state: State::RecordStart,
            phase: Phase::Detect,
            status: ReaderStatus::Ready,
            resolved_ending: None,
            comment_buf: Vec::new(),
            pos: 0,
            source_done: false,
            row_consumed: false,
            pending_record: false,
            replay_raw: Vec::new(),
            raw_base: 0,
            raw_captured: 0,
            row_raw_start: 0,
            value_raw_start: 0,
            raw_name_spans: Vec::new(),
            reject_consumed_raw_end: 0,
            rows_seen: 0,
            records_read: 0,
            consumed_offset: 0,
            config,
        };
        match core.config.row_ending() {
            RowEnding::Detect => core.phase = Phase::Detect,
            ending => core.resolve_ending(ending),
        }
        core
    }

    fn resolve_ending(&mut self, ending: RowEnding) {
        debug!("row ending resolved to {:?}", ending);
        self.resolved_ending = Some(ending);
        self.table = Some(table::shared(TableKey::for_config(&self.config, ending)));
        if !self.replay_raw.is_empty() {
            // Replay every byte consumed during detection.
            self.buffer.push_back_external(&self.replay_raw);
            self.replay_raw.clear();
        }
        self.raw_captured = 0;
        self.raw_base = 0;
        self.row_raw_start = 0;
        self.value_raw_start = 0;
        match self.config.header() {
            HeaderMode::Never => {
                self.phase = Phase::Rows;
                self.state = State::RecordStart;
            }
            HeaderMode::Always | HeaderMode::Detect => {
                self.phase = Phase::Header;
                self.state = State::HeaderStart;
            }
        }
    }

    pub(crate) fn ensure_ready(&self) -> Result<()> {
        match self.status {
            ReaderStatus::Ready => Ok(()),
            ReaderStatus::Poisoned => Err(Error::Poisoned),
            ReaderStatus::Disposed => Err(Error::Disposed),
        }
    }

    pub(crate) fn poison(&mut self) {
        if self.status == ReaderStatus::Ready {
            debug!("reader poisoned");
            self.status = ReaderStatus::Poisoned;
        }
    }

    /// Release pooled memory and refuse further use. Safe after poisoning.
    pub(crate) fn close(&mut self) {
        self.buffer.release();
        self.partial.release();
        self.row.release();
        self.replay_raw = Vec::new();
        self.comment_buf = Vec::new();
        self.status = ReaderStatus::Disposed;
    }

    pub(crate) fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub(crate) fn before_headers(&self) -> bool {
        matches!(self.phase, Phase::Detect | Phase::Header)
    }

    pub(crate) fn names(&self) -> &ColumnNames {
        &self.names
    }

    pub(crate) fn row_ref(&self) -> RowRef<'_> {
        RowRef::new(&self.row, self.buffer.window())
    }

    pub(crate) fn comment(&self) -> &[u8] {
        &self.comment_buf
    }

    pub(crate) fn take_pending_record(&mut self) -> bool {
        std::mem::take(&mut self.pending_record)
    }

    pub(crate) fn set_pending_record(&mut self) {
        self.pending_record = true;
    }

    pub(crate) fn position(&self) -> Position {
        Position {
            records: self.records_read,
            bytes: self.consumed_offset,
        }
    }

    pub(crate) fn resolved_ending(&self) -> Option<RowEnding> {
        self.resolved_ending
    }

    /// Start a refill. Seals window-resident row state first, because the
    /// drain overwrites the window. Returns the region to read source bytes
    /// into, or `None` when staged pushback satisfied the fill.
    pub(crate) fn prepare_fill(&mut self, force: bool) -> Option<&mut [u8]> {
        {
            let window = self.buffer.window();
            self.row.seal(window);
            self.partial.detach(window);
        }
        let spare = self.buffer.begin_fill(force);
        self.pos = 0;
        self.raw_captured = 0;
        spare
    }

    pub(crate) fn complete_fill(&mut self, read: usize) {
        if read == 0 {
            self.source_done = true;
        }
        self.buffer.commit_fill(read);
    }

    /// Advance the shared decision loop until it produces an outcome.
    pub(crate) fn step(&mut self) -> Result<StepOutcome> {
        loop {
            match self.phase {
                Phase::Detect => {
                    if let Some(outcome) = self.detect_step() {
                        return Ok(outcome);
                    }
                }
                Phase::Header | Phase::Rows => match self.scan()? {
                    Flow::NeedFill { force } => return Ok(StepOutcome::NeedFill { force }),
                    Flow::Record => return Ok(StepOutcome::Record),
                    Flow::Comment => return Ok(StepOutcome::Comment),
                    Flow::End => {
                        self.phase = Phase::Done;
                        return Ok(StepOutcome::End);
                    }
                    Flow::RejectHeader => {
                        self.apply_header_rejection();
                    }
                    Flow::StageTail { keep } => {
                        let consumed = self.buffer.window_len();
                        self.buffer.push_back_from_window(consumed, keep);
                        return Ok(StepOutcome::NeedFill { force: true });
                    }
                },
                Phase::Done => return Ok(StepOutcome::End),
            }
        }
    }

    fn detect_step(&mut self) -> Option<StepOutcome> {
        let win_len = self.buffer.window_len();
        if self.pos >= win_len {
            if !self.source_done {
                return Some(StepOutcome::NeedFill { force: false });
            }
            let ending = self.detector.finish();
            self.resolve_ending(ending);
            return None;
        }
        if self.raw_captured < win_len {
            {
                let window = self.buffer.window();
                self.replay_raw
                    .extend_from_slice(&window[self.raw_captured..win_len]);
            }
            self.raw_captured = win_len;
        }
        let step = {
            let window = self.buffer.window();
            self.detector.feed(&window[self.pos..win_len])
        };
        self.pos = win_len;
        if let DetectStep::Finished(ending) = step {
            self.resolve_ending(ending);
        }
        None
    }

    fn apply_header_rejection(&mut self) {
        debug!("first row is not a header; replaying it as data");
        let replay_from = self.row_raw_start;
        self.buffer.push_back_external(&self.replay_raw[replay_from..]);
        // Replayed bytes will be consumed again; take the already-counted
        // portion back out of the offset.
        self.consumed_offset -= (self.reject_consumed_raw_end - replay_from) as u64;
        self.replay_raw.clear();
        self.raw_name_spans.clear();
        self.row.clear_row();
        self.partial.clear();
        self.state = State::RecordStart;
        self.phase = Phase::Rows;
    }

    /// Tokenize the current window. Returns control whenever an event
    /// surfaces or more input is required.
    fn scan(&mut self) -> Result<Flow> {
        if self.row_consumed {
            self.row.clear_row();
            self.row_consumed = false;
        }
        loop {
            let win_len = self.buffer.window_len();
            if self.pos >= win_len {
                if self.buffer.staged_len() > 0 || !self.source_done {
                    return Ok(Flow::NeedFill { force: false });
                }
                if self.state == State::DataEnded {
                    return Ok(Flow::End);
                }
                match self.consume_data_end()? {
                    Some(flow) => return Ok(flow),
                    None => continue,
                }
            }

            if self.phase == Phase::Header && self.raw_captured < win_len {
                {
                    let window = self.buffer.window();
                    self.replay_raw
                        .extend_from_slice(&window[self.raw_captured..win_len]);
                }
                self.raw_base = self.replay_raw.len() - win_len;
                self.raw_captured = win_len;
            }

            let table = self
                .table
                .as_ref()
                .expect("row ending resolved before tokenizing")
                .clone();
            let window = self.buffer.window();
            let mut state = self.state;
            let mut i = self.pos;
            let mut run_start = i;

            while i < win_len {
                let byte = window[i];
                let class = self.classifier.classify(byte);
                let mut rule = table.rule(state, class);
                let mut consume = 1usize;

                if rule.action == Action::LookAheadMultiCharSeparator {
                    let separator = self.config.separator();
                    if i + separator.len() <= win_len {
                        if window[i..].starts_with(separator) {
                            rule = table.separator_rule(state);
                            consume = separator.len();
                        } else {
                            rule = table.rule(state, SymbolClass::Other);
                        }
                    } else if self.source_done {
                        // Not enough bytes left to ever complete the
                        // separator: the byte is data.
                        rule = table.rule(state, SymbolClass::Other);
                    } else {
                        self.partial.append_window(window, run_start, i);
                        if self.phase == Phase::Header {
                            self.replay_raw.truncate(self.raw_base + i);
                        }
                        self.state = state;
                        self.consumed_offset += (i - self.pos) as u64;
                        let keep = win_len - i;
                        self.pos = win_len;
                        return Ok(Flow::StageTail { keep });
                    }
                }

                // Invariant of the SeenCarriageReturn states: the consumed
                // CR is appended when anything but the CRLF's LF follows.
                if state.holds_carriage_return()
                    && class != SymbolClass::LineFeed
                    && matches!(
                        rule.action,
                        Action::FinishUnescapedValue
                            | Action::FinishUnescapedRecord
                            | Action::FinishComment
                    )
                {
                    self.partial.push_byte(window, b'\r');
                }

                match rule.action {
                    Action::SkipCharacter => {
                        self.partial.append_window(window, run_start, i);
                        if rule.next.is_in_escaped_value() && !state.is_in_escaped_value() {
                            self.row.open_value();
                        }
                        run_start = i + consume;
                    }
                    Action::AppendCharacter => {
                        // Batched: the run extends; the buffer write happens
                        // when the run breaks.
                    }
                    Action::AppendCarriageReturnAndCharacter => {
                        self.partial.append_window(window, run_start, i);
                        self.partial.push_byte(window, b'\r');
                        if !rule.next.holds_carriage_return() {
                            self.partial.append_window(window, i, i + 1);
                        }
                        run_start = i + consume;
                    }
                    Action::FinishUnescapedValue | Action::FinishEscapedValue => {
                        self.partial.append_window(window, run_start, i);
                        let escaped = rule.action == Action::FinishEscapedValue;
                        if self.phase == Phase::Header {
                            self.raw_name_spans
                                .push((self.value_raw_start, self.raw_base + i));
                            self.value_raw_start = self.raw_base + i + consume;
                        }
                        self.row.push_field(&mut self.partial, window, escaped);
                        if self.phase == Phase::Rows {
                            if let Some(required) = self.required.as_mut() {
                                required.mark(self.row.len() - 1);
                            }
                        }
                        run_start = i + consume;
                    }
                    Action::FinishUnescapedRecord | Action::FinishEscapedRecord => {
                        self.partial.append_window(window, run_start, i);
                        let escaped = rule.action == Action::FinishEscapedRecord;
                        let emitted = self.row.finish_record(&mut self.partial, window, escaped);

                        if self.phase == Phase::Header {
                            if !emitted {
                                // Blank line before the header row.
                                state = State::HeaderStart;
                                self.row_raw_start = self.raw_base + i + 1;
                                self.value_raw_start = self.row_raw_start;
                                run_start = i + 1;
                                i += 1;
                                continue;
                            }
                            // A CRLF terminator started one byte earlier;
                            // the CR may sit in the previous window, but it
                            // is always present in the replay capture.
                            let raw_end = if class == SymbolClass::LineFeed
                                && matches!(
                                    state,
                                    State::HeaderSeenCarriageReturn
                                        | State::HeaderExpectingEndOfRecord
                                ) {
                                self.raw_base + i - 1
                            } else {
                                self.raw_base + i
                            };
                            self.raw_name_spans.push((self.value_raw_start, raw_end));
                            if self.header_accepted(window) {
                                store_header_names(
                                    &mut self.names,
                                    &self.row,
                                    window,
                                    &self.replay_raw,
                                    &self.raw_name_spans,
                                );
                                self.rows_seen += 1;
                                self.row.clear_row();
                                self.raw_name_spans.clear();
                                self.replay_raw.clear();
                                self.phase = Phase::Rows;
                                state = rule.next;
                                run_start = i + 1;
                                i += 1;
                                continue;
                            }
                            self.reject_consumed_raw_end = self.raw_base + i + 1;
                            self.consumed_offset += (i + 1 - self.pos) as u64;
                            self.pos = win_len;
                            self.state = rule.next;
                            return Ok(Flow::RejectHeader);
                        }

                        self.rows_seen += 1;
                        self.consumed_offset += (i + 1 - self.pos) as u64;
                        self.pos = i + 1;
                        self.state = rule.next;
                        if emitted {
                            self.records_read += 1;
                            self.row_consumed = true;
                            if let Some(required) = self.required.as_mut() {
                                required.mark(self.row.len() - 1);
                                if let Err(column) = required.check_required_and_clear() {
                                    return Err(Error::MissingRequiredColumn {
                                        row: self.rows_seen - 1,
                                        column,
                                    });
                                }
                            }
                            return Ok(Flow::Record);
                        }
                        state = rule.next;
                        run_start = i + 1;
                        i += 1;
                        continue;
                    }
                    Action::FinishComment => {
                        self.partial.append_window(window, run_start, i);
                        self.comment_buf.clear();
                        self.comment_buf
                            .extend_from_slice(self.partial.bytes(window));
                        self.partial.clear();
                        self.rows_seen += 1;
                        if self.phase == Phase::Header {
                            self.row_raw_start = self.raw_base + i + 1;
                            self.value_raw_start = self.row_raw_start;
                        }
                        self.consumed_offset += (i + 1 - self.pos) as u64;
                        self.pos = i + 1;
                        self.state = rule.next;
                        return Ok(Flow::Comment);
                    }
                    Action::LookAheadMultiCharSeparator => {
                        // Resolved above; reaching here is a table bug.
                        let err = self.parse_error(ParseErrorKind::UnexpectedState, Some(byte), i);
                        self.poison_with_state();
                        return Err(err);
                    }
                    Action::Error(kind) => {
                        let err = self.parse_error(kind, Some(byte), i);
                        self.poison_with_state();
                        return Err(err);
                    }
                }

                state = rule.next;
                i += consume;
            }

            self.partial.append_window(window, run_start, win_len);
            self.state = state;
            self.consumed_offset += (win_len - self.pos) as u64;
            self.pos = win_len;
        }
    }

    /// Feed the end-of-data pseudo-symbol once the source and the window
    /// are both exhausted.
    fn consume_data_end(&mut self) -> Result<Option<Flow>> {
        let table = self
            .table
            .as_ref()
            .expect("row ending resolved before tokenizing")
            .clone();
        let state = self.state;
        let rule = table.rule(state, SymbolClass::DataEnd);

        if state.holds_carriage_return()
            && matches!(
                rule.action,
                Action::FinishUnescapedRecord | Action::FinishComment
            )
        {
            let window = self.buffer.window();
            self.partial.push_byte(window, b'\r');
        }

        match rule.action {
            Action::FinishUnescapedRecord | Action::FinishEscapedRecord => {
                let escaped = rule.action == Action::FinishEscapedRecord;
                let emitted = {
                    let window = self.buffer.window();
                    self.row.finish_record(&mut self.partial, window, escaped)
                };
                if self.phase == Phase::Header {
                    if !emitted {
                        self.state = rule.next;
                        return Ok(None);
                    }
                    self.raw_name_spans
                        .push((self.value_raw_start, self.replay_raw.len()));
                    let accepted = {
                        let window = self.buffer.window();
                        self.header_accepted(window)
                    };
                    if accepted {
                        {
                            let window = self.buffer.window();
                            store_header_names(
                                &mut self.names,
                                &self.row,
                                window,
                                &self.replay_raw,
                                &self.raw_name_spans,
                            );
                        }
                        self.rows_seen += 1;
                        self.row.clear_row();
                        self.raw_name_spans.clear();
                        self.replay_raw.clear();
                        self.phase = Phase::Rows;
                        self.state = rule.next;
                        return Ok(None);
                    }
                    self.reject_consumed_raw_end = self.replay_raw.len();
                    self.state = rule.next;
                    return Ok(Some(Flow::RejectHeader));
                }

                self.state = rule.next;
                if emitted {
                    self.rows_seen += 1;
                    self.records_read += 1;
                    self.row_consumed = true;
                    if let Some(required) = self.required.as_mut() {
                        required.mark(self.row.len() - 1);
                        if let Err(column) = required.check_required_and_clear() {
                            return Err(Error::MissingRequiredColumn {
                                row: self.rows_seen - 1,
                                column,
                            });
                        }
                    }
                    return Ok(Some(Flow::Record));
                }
                Ok(None)
            }
            Action::FinishComment => {
                self.comment_buf.clear();
                {
                    let window = self.buffer.window();
                    self.comment_buf
                        .extend_from_slice(self.partial.bytes(window));
                }
                self.partial.clear();
                self.rows_seen += 1;
                self.state = rule.next;
                Ok(Some(Flow::Comment))
            }
            Action::Error(kind) => {
                let at = self.pos;
                let err = self.parse_error(kind, None, at);
                self.poison_with_state();
                Err(err)
            }
            _ => {
                let at = self.pos;
                let err = self.parse_error(ParseErrorKind::UnexpectedState, None, at);
                self.poison_with_state();
                Err(err)
            }
        }
    }

    fn header_accepted(&self, window: &[u8]) -> bool {
        match self.config.header() {
            HeaderMode::Always => true,
            HeaderMode::Detect => {
                let row = RowRef::new(&self.row, window);
                self.config
                    .expected_columns
                    .iter()
                    .any(|expected| row.iter().any(|field| field == &expected[..]))
            }
            HeaderMode::Never => true,
        }
    }

    fn poison_with_state(&mut self) {
        self.state = State::Invalid;
        self.poison();
    }

    fn parse_error(&self, kind: ParseErrorKind, symbol: Option<u8>, at: usize) -> Error {
        Error::Parse {
            kind,
            row: self.rows_seen,
            column: self.row.len(),
            offset: self.consumed_offset + at.saturating_sub(self.pos) as u64,
            symbol,
        }
    }
}

/// Synchronous reader over any `std::io::Read` source.
pub struct Reader<R> {
    core: ReaderCore,
    source: R,
    cancel: Option<CancelToken>,
}

impl<R: Read> Reader<R> {
    pub fn new(source: R, config: Config) -> Self {
        Reader {
            core: ReaderCore::new(config),
            source,
            cancel: None,
        }
    }

    /// Install an advisory cancellation token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Column names probed from the header row. Drives detection and the
    /// probe if they have not run yet; a data record surfacing during the
    /// probe is held for the next `next_row` call. Comments preceding the
    /// header are skipped.
    pub fn headers(&mut self) -> Result<&ColumnNames> {
        self.core.ensure_ready()?;
        while self.core.before_headers() && !self.core.is_done() {
            match self.drive()? {
                StepOutcome::Record => {
                    self.core.set_pending_record();
                    break;
                }
                StepOutcome::Comment => continue,
                StepOutcome::End => break,
                StepOutcome::NeedFill { .. } => unreachable!("drive resolves fills"),
            }
        }
        Ok(self.core.names())
    }

    /// Next data record, skipping comment lines.
    pub fn next_row(&mut self) -> Result<Option<RowRef<'_>>> {
        self.core.ensure_ready()?;
        if self.core.take_pending_record() {
            return Ok(Some(self.core.row_ref()));
        }
        loop {
            match self.drive()? {
                StepOutcome::Record => return Ok(Some(self.core.row_ref())),
                StepOutcome::Comment => continue,
                StepOutcome::End => return Ok(None),
                StepOutcome::NeedFill { .. } => unreachable!("drive resolves fills"),
            }
        }
    }

    /// Next record or comment.
    pub fn next_event(&mut self) -> Result<Option<ReadEvent<'_>>> {
        self.core.ensure_ready()?;
        if self.core.take_pending_record() {
            return Ok(Some(ReadEvent::Record(self.core.row_ref())));
        }
        match self.drive()? {
            StepOutcome::Record => Ok(Some(ReadEvent::Record(self.core.row_ref()))),
            StepOutcome::Comment => Ok(Some(ReadEvent::Comment(self.core.comment()))),
            StepOutcome::End => Ok(None),
            StepOutcome::NeedFill { .. } => unreachable!("drive resolves fills"),
        }
    }

    /// Progress counters.
    pub fn position(&self) -> Position {
        self.core.position()
    }

    /// The resolved row ending, once known.
    pub fn row_ending(&self) -> Option<RowEnding> {
        self.core.resolved_ending()
    }

    /// Release buffers and refuse further reads.
    pub fn close(&mut self) {
        self.core.close();
    }

    fn drive(&mut self) -> Result<StepOutcome> {
        loop {
            match self.core.step() {
                Ok(StepOutcome::NeedFill { force }) => {
                    if let Some(token) = &self.cancel {
                        if token.is_cancelled() {
                            self.core.poison();
                            return Err(Error::Cancelled);
                        }
                    }
                    if let Some(spare) = self.core.prepare_fill(force) {
                        let read = loop {
                            match self.source.read(&mut *spare) {
                                Ok(n) => break n,
                                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                                Err(e) => {
                                    self.core.poison();
                                    return Err(e.into());
                                }
                            }
                        };
                        self.core.complete_fill(read);
                    }
                }
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    if err.poisons() {
                        self.core.poison();
                    }
                    return Err(err);
                }
            }
        }
    }
}
