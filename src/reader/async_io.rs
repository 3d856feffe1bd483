// Asynchronous driver.
//
// Same decision loop as the synchronous reader; the only difference is how
// a fill is satisfied. Suspension happens exclusively at the source read —
// never mid-classification, mid-batch, or mid-column — so driving the loop
// asynchronously produces byte-identical output to the synchronous reader.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::{Config, RowEnding};
use crate::error::{Error, Result};
use crate::header::ColumnNames;
use crate::reader::{CancelToken, Position, ReadEvent, ReaderCore, StepOutcome};
use crate::row::RowRef;

/// Asynchronous reader over any `tokio::io::AsyncRead` source.
pub struct AsyncReader<R> {
    core: ReaderCore,
    source: R,
    cancel: Option<CancelToken>,
}

impl<R: AsyncRead + Unpin> AsyncReader<R> {
    pub fn new(source: R, config: Config) -> Self {
        AsyncReader {
            core: ReaderCore::new(config),
            source,
            cancel: None,
        }
    }

    /// Install an advisory cancellation token, checked before each source
    /// read.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Column names probed from the header row; see the synchronous
    /// reader's `headers` for semantics.
    pub async fn headers(&mut self) -> Result<&ColumnNames> {
        self.core.ensure_ready()?;
        while self.core.before_headers() && !self.core.is_done() {
            match self.drive().await? {
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
    pub async fn next_row(&mut self) -> Result<Option<RowRef<'_>>> {
        self.core.ensure_ready()?;
        if self.core.take_pending_record() {
            return Ok(Some(self.core.row_ref()));
        }
        loop {
            match self.drive().await? {
                StepOutcome::Record => return Ok(Some(self.core.row_ref())),
                StepOutcome::Comment => continue,
                StepOutcome::End => return Ok(None),
                StepOutcome::NeedFill { .. } => unreachable!("drive resolves fills"),
            }
        }
    }

    /// Next record or comment.
    pub async fn next_event(&mut self) -> Result<Option<ReadEvent<'_>>> {
        self.core.ensure_ready()?;
        if self.core.take_pending_record() {
            return Ok(Some(ReadEvent::Record(self.core.row_ref())));
        }
        match self.drive().await? {
            StepOutcome::Record => Ok(Some(ReadEvent::Record(self.core.row_ref()))),
            StepOutcome::Comment => Ok(Some(ReadEvent::Comment(self.core.comment()))),
            StepOutcome::End => Ok(None),
            StepOutcome::NeedFill { .. } => unreachable!("drive resolves fills"),
        }
    }

    pub fn position(&self) -> Position {
        self.core.position()
    }

    pub fn row_ending(&self) -> Option<RowEnding> {
        self.core.resolved_ending()
    }

    pub fn close(&mut self) {
        self.core.close();
    }

    async fn drive(&mut self) -> Result<StepOutcome> {
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
                        // The sole suspension point: no window slice or
                        // table reference is held across this await.
                        match self.source.read(&mut *spare).await {
                            Ok(read) => self.core.complete_fill(read),
                            Err(e) => {
                                self.core.poison();
                                return Err(e.into());
                            }
                        }
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
