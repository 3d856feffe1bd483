// Error surface for the tokenizing core.
//
// Every malformed-input condition is detected by the transition table as an
// Error(kind) rule, never by ad hoc checks in the read loop. Parse errors
// carry enough context (row, column, byte offset, offending byte) to build a
// message without re-scanning the source.

use thiserror::Error;

/// Parse-failure taxonomy. Each variant corresponds to one family of
/// transition rules in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// A character appeared where only a row terminator was legal
    /// (e.g. a stray byte between the `\r` and `\n` of a CRLF ending).
    ExpectedEndOfRecord,
    /// A character appeared right after a closed escaped value where only a
    /// separator or a row terminator is legal.
    ExpectedEndOfRecordOrValue,
    /// An escape-start (quote) byte appeared in the middle of an unescaped
    /// value.
    StartEscapeInValue,
    /// When the escape prefix is distinct from the quote, an invalid byte
    /// followed a pending escape.
    UnexpectedCharacterInEscapeSequence,
    /// Input ended inside an escaped value or mid-escape-sequence.
    UnexpectedEnd,
    /// The automaton was already in the terminal `Invalid` state; the reader
    /// was reused after a previous error.
    InvalidState,
    /// Defensive: a row-ending rule was consulted in a mode where the state
    /// is unreachable. Indicates a table-construction bug, not bad input.
    UnexpectedLineEnding,
    /// Defensive: a rule was consulted for a state/mode combination the
    /// builder never produces. Indicates a table-construction bug.
    UnexpectedState,
}

impl ParseErrorKind {
    /// True for the two "should be unreachable" kinds that indicate a bug in
    /// table construction rather than malformed input.
    pub fn is_internal(self) -> bool {
        matches!(
            self,
            ParseErrorKind::UnexpectedLineEnding | ParseErrorKind::UnexpectedState
        )
    }
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ParseErrorKind::ExpectedEndOfRecord => "expected end of record",
            ParseErrorKind::ExpectedEndOfRecordOrValue => "expected end of record or value",
            ParseErrorKind::StartEscapeInValue => "quote inside unescaped value",
            ParseErrorKind::UnexpectedCharacterInEscapeSequence => {
                "unexpected character in escape sequence"
            }
            ParseErrorKind::UnexpectedEnd => "unexpected end of input",
            ParseErrorKind::InvalidState => "reader used after a previous error",
            ParseErrorKind::UnexpectedLineEnding => "internal error: unexpected line ending",
            ParseErrorKind::UnexpectedState => "internal error: unexpected state",
        };
        f.write_str(msg)
    }
}

/// Errors surfaced by readers.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input, reported with position context. Not retried; the
    /// reader is poisoned afterwards.
    #[error("{kind} at row {row}, column {column} (byte offset {offset})")]
    Parse {
        kind: ParseErrorKind,
        /// Zero-based row index (header and comment rows included).
        row: u64,
        /// Zero-based index of the column being tokenized.
        column: usize,
        /// Absolute byte offset of the offending symbol.
        offset: u64,
        /// The offending byte, absent when the error fired on end-of-data.
        symbol: Option<u8>,
    },

    /// A column marked required produced no value in a row. Does not poison
    /// the reader: the automaton is consistent at a record boundary.
    #[error("required column {column} missing in row {row}")]
    MissingRequiredColumn { row: u64, column: usize },

    /// The underlying source failed.
    #[error("read from source failed: {0}")]
    Io(#[from] std::io::Error),

    /// The read was cancelled via a `CancelToken`. Poisons the reader.
    #[error("read cancelled")]
    Cancelled,

    /// The reader previously failed and can no longer be used.
    #[error("reader is poisoned by an earlier error")]
    Poisoned,

    /// The reader was closed.
    #[error("reader is disposed")]
    Disposed,

    /// Rejected configuration (conflicting special characters, oversized
    /// separator, and so on).
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// True when further calls on the owning reader must fail fast.
    pub fn poisons(&self) -> bool {
        matches!(
            self,
            Error::Parse { .. } | Error::Io(_) | Error::Cancelled
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
