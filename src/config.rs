// Reader configuration.
//
// The builder validates at build time so the tokenizing core never has to
// re-check character conflicts on the hot path. Separator patterns may be
// multi-byte (resolved by lookahead); quote and escape are single bytes,
// either equal (doubled-quote escaping) or distinct (prefix escaping).

use crate::error::{Error, Result};

/// Maximum supported separator length. Bounds lookahead so a short window
/// never forces unbounded buffer growth.
pub const MAX_SEPARATOR_LEN: usize = 64;

/// Default window size hint in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Row terminator convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowEnding {
    CarriageReturn,
    LineFeed,
    CarriageReturnLineFeed,
    /// Probe the stream once before the first row and replay the probed
    /// bytes. Defaults to CRLF if the stream ends before any terminator.
    Detect,
}

impl RowEnding {
    /// The terminator bytes for a resolved mode. Panics on `Detect`; resolve
    /// first.
    pub fn terminator(self) -> &'static [u8] {
        match self {
            RowEnding::CarriageReturn => b"\r",
            RowEnding::LineFeed => b"\n",
            RowEnding::CarriageReturnLineFeed => b"\r\n",
            RowEnding::Detect => unreachable!("terminator() on unresolved Detect"),
        }
    }
}

/// Whether the first row is column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMode {
    /// First row is data.
    Never,
    /// First row is always consumed as the header.
    Always,
    /// First row is a header iff any of its names matches one of the
    /// expected column names; otherwise it is replayed as data.
    Detect,
}

/// Validated reader configuration. Construct through [`ReaderBuilder`].
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) separator: Vec<u8>,
    pub(crate) quote: u8,
    pub(crate) escape: u8,
    pub(crate) comment: Option<u8>,
    pub(crate) row_ending: RowEnding,
    pub(crate) header: HeaderMode,
    pub(crate) expected_columns: Vec<Vec<u8>>,
    pub(crate) required_columns: Vec<usize>,
    pub(crate) trim_leading: bool,
    pub(crate) trim_trailing: bool,
    pub(crate) buffer_capacity: usize,
}

impl Config {
    pub fn separator(&self) -> &[u8] {
        &self.separator
    }

    pub fn quote(&self) -> u8 {
        self.quote
    }

    pub fn escape(&self) -> u8 {
        self.escape
    }

    /// True when the quote byte doubles as the escape prefix (RFC-style
    /// doubled quotes).
    pub fn quote_is_escape(&self) -> bool {
        self.quote == self.escape
    }

    pub fn comment(&self) -> Option<u8> {
        self.comment
    }

    pub fn row_ending(&self) -> RowEnding {
        self.row_ending
    }

    pub fn header(&self) -> HeaderMode {
        self.header
    }
}

/// Builder for [`Config`]. Defaults: comma separator, `"` quote acting as
/// its own escape, no comments, detected row ending, no header, 8 KiB
/// buffer, no trimming.
#[derive(Debug, Clone)]
pub struct ReaderBuilder {
    separator: Vec<u8>,
    quote: u8,
    escape: Option<u8>,
    comment: Option<u8>,
    row_ending: RowEnding,
    header: HeaderMode,
    expected_columns: Vec<Vec<u8>>,
    required_columns: Vec<usize>,
    trim_leading: bool,
    trim_trailing: bool,
    buffer_capacity: usize,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderBuilder {
    pub fn new() -> Self {
        ReaderBuilder {
            separator: vec![b','],
            quote: b'"',
            escape: None,
            comment: None,
            row_ending: RowEnding::Detect,
            header: HeaderMode::Never,
            expected_columns: Vec::new(),
            required_columns: Vec::new(),
            trim_leading: false,
            trim_trailing: false,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Single-byte value separator.
    pub fn separator(mut self, separator: u8) -> Self {
        self.separator = vec![separator];
        self
    }

    /// Multi-byte value separator, e.g. `b"::"`. Resolved by lookahead.
    pub fn separator_bytes(mut self, separator: &[u8]) -> Self {
        self.separator = separator.to_vec();
        self
    }

    /// Escape start/end byte (the quote).
    pub fn quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    /// Escape prefix inside escaped values. Defaults to the quote byte
    /// (doubled-quote escaping).
    pub fn escape(mut self, escape: u8) -> Self {
        self.escape = Some(escape);
        self
    }

    /// Byte starting a comment line, e.g. `b'#'`.
    pub fn comment(mut self, comment: u8) -> Self {
        self.comment = Some(comment);
        self
    }

    pub fn row_ending(mut self, ending: RowEnding) -> Self {
        self.row_ending = ending;
        self
    }

    pub fn header(mut self, header: HeaderMode) -> Self {
        self.header = header;
        self
    }

    /// Column names used by [`HeaderMode::Detect`] to classify the first
    /// row, compared ordinally against the unescaped names.
    pub fn expected_columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.expected_columns = names
            .into_iter()
            .map(|s| s.as_ref().as_bytes().to_vec())
            .collect();
        self
    }

    /// Column indexes that must produce a value in every data row.
    pub fn required_columns<I: IntoIterator<Item = usize>>(mut self, columns: I) -> Self {
        self.required_columns = columns.into_iter().collect();
        self
    }

    /// Trim leading ASCII blanks from unescaped values.
    pub fn trim_leading(mut self, trim: bool) -> Self {
        self.trim_leading = trim;
        self
    }

    /// Trim trailing ASCII blanks from unescaped values.
    pub fn trim_trailing(mut self, trim: bool) -> Self {
        self.trim_trailing = trim;
        self
    }

    /// Window size hint in bytes. Clamped to a small minimum and to the
    /// lookahead requirement of the separator.
    pub fn buffer_capacity(mut self, bytes: usize) -> Self {
        self.buffer_capacity = bytes;
        self
    }

    /// Validate and produce a [`Config`].
    pub fn build(self) -> Result<Config> {
        if self.separator.is_empty() {
            return Err(Error::Config("separator must not be empty".into()));
        }
        if self.separator.len() > MAX_SEPARATOR_LEN {
            return Err(Error::Config(format!(
                "separator longer than {} bytes",
                MAX_SEPARATOR_LEN
            )));
        }
        let escape = self.escape.unwrap_or(self.quote);

        // CR and LF always belong to the terminator alphabet.
        if self.separator.iter().any(|&b| b == b'\r' || b == b'\n') {
            return Err(Error::Config("separator cannot contain CR or LF".into()));
        }
        for (name, byte) in [("quote", self.quote), ("escape", escape)] {
            if byte == b'\r' || byte == b'\n' {
                return Err(Error::Config(format!("{} cannot be CR or LF", name)));
            }
        }
        if let Some(c) = self.comment {
            if c == b'\r' || c == b'\n' {
                return Err(Error::Config("comment cannot be CR or LF".into()));
            }
            if c == self.quote || c == self.separator[0] || c == escape {
                return Err(Error::Config(
                    "comment conflicts with separator, quote, or escape".into(),
                ));
            }
        }
        if self.separator[0] == self.quote {
            return Err(Error::Config("separator conflicts with quote".into()));
        }
        if self.separator[0] == escape {
            return Err(Error::Config("separator conflicts with escape".into()));
        }

        Ok(Config {
            separator: self.separator,
            quote: self.quote,
            escape,
            comment: self.comment,
            row_ending: self.row_ending,
            header: self.header,
            expected_columns: self.expected_columns,
            required_columns: self.required_columns,
            trim_leading: self.trim_leading,
            trim_trailing: self.trim_trailing,
            buffer_capacity: self.buffer_capacity,
        })
    }
}
