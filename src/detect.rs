// Row-ending detection.
//
// Runs once per reader, before the first row, when the ending is not
// configured explicitly. The detector scans ahead tracking escaped-value and
// comment context so only a terminator in a position where ending a record
// is legal decides the result. Everything consumed is replayed to the main
// loop through external pushback, so detection followed by normal reads is
// indistinguishable from configuring the detected mode up front.

use crate::config::{Config, RowEnding};

/// Outcome of feeding one chunk to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectStep {
    /// No terminator seen yet; feed more input.
    Continue,
    /// A CR is pending at the chunk boundary; the next byte decides between
    /// CR and CRLF.
    ContinuePushbackOne,
    Finished(RowEnding),
    /// Unused by the current rules; detection is permissive and defaults
    /// rather than failing.
    Error,
}

#[derive(Debug)]
pub struct RowEndingDetector {
    quote: u8,
    escape: u8,
    comment: Option<u8>,
    quote_is_escape: bool,
    in_escaped: bool,
    /// quote==escape only: a quote inside an escaped value, awaiting the
    /// next byte to tell closing from doubled.
    pending_quote: bool,
    /// quote!=escape only: the next byte is an escaped literal.
    escape_next: bool,
    in_comment: bool,
    at_line_start: bool,
    pending_cr: bool,
}

impl RowEndingDetector {
    pub fn new(config: &Config) -> Self {
        RowEndingDetector {
            quote: config.quote(),
            escape: config.escape(),
            comment: config.comment(),
            quote_is_escape: config.quote_is_escape(),
            in_escaped: false,
            pending_quote: false,
            escape_next: false,
            in_comment: false,
            at_line_start: true,
            pending_cr: false,
        }
    }

    /// Scan a chunk. Consumes the whole chunk unless a terminator decides
    /// the mode first.
    pub fn feed(&mut self, chunk: &[u8]) -> DetectStep {
        for &byte in chunk {
            if let Some(ending) = self.step_byte(byte) {
                return DetectStep::Finished(ending);
            }
        }
        if self.pending_cr {
            DetectStep::ContinuePushbackOne
        } else {
            DetectStep::Continue
        }
    }

    /// End of stream reached without a decision.
    pub fn finish(&self) -> RowEnding {
        if self.pending_cr {
            // A CR in a legal position with nothing after it.
            RowEnding::CarriageReturn
        } else {
            // No terminator at all: single row, treated permissively.
            RowEnding::CarriageReturnLineFeed
        }
    }

    fn step_byte(&mut self, byte: u8) -> Option<RowEnding> {
        if self.pending_cr {
            return Some(if byte == b'\n' {
                RowEnding::CarriageReturnLineFeed
            } else {
                RowEnding::CarriageReturn
            });
        }

        if self.in_comment {
            // Ending a record inside a comment is legal.
            match byte {
                b'\r' => self.pending_cr = true,
                b'\n' => return Some(RowEnding::LineFeed),
                _ => {}
            }
            return None;
        }

        if self.in_escaped {
            if self.escape_next {
                self.escape_next = false;
                return None;
            }
            if self.pending_quote {
                self.pending_quote = false;
                if byte == self.quote {
                    // Doubled quote: literal, still inside the value.
                    return None;
                }
                // The pending quote closed the value; reprocess this byte
                // in unescaped context below.
                self.in_escaped = false;
            } else {
                if self.quote_is_escape {
                    if byte == self.quote {
                        self.pending_quote = true;
                    }
                } else if byte == self.escape {
                    self.escape_next = true;
                } else if byte == self.quote {
                    self.in_escaped = false;
                }
                return None;
            }
        }

        // Unescaped context: terminators are legal here.
        match byte {
            b'\r' => self.pending_cr = true,
            b'\n' => return Some(RowEnding::LineFeed),
            _ if byte == self.quote => self.in_escaped = true,
            _ if self.at_line_start && Some(byte) == self.comment => self.in_comment = true,
            _ => {}
        }
        self.at_line_start = false;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReaderBuilder;

    fn detector() -> RowEndingDetector {
        RowEndingDetector::new(&ReaderBuilder::new().comment(b'#').build().unwrap())
    }

    #[test]
    fn test_detects_lf() {
        let mut d = detector();
        assert_eq!(d.feed(b"a,b\nc,d"), DetectStep::Finished(RowEnding::LineFeed));
    }

    #[test]
    fn test_detects_crlf() {
        let mut d = detector();
        assert_eq!(
            d.feed(b"a,b\r\nc"),
            DetectStep::Finished(RowEnding::CarriageReturnLineFeed)
        );
    }

    #[test]
    fn test_detects_bare_cr() {
        let mut d = detector();
        assert_eq!(
            d.feed(b"a\rb"),
            DetectStep::Finished(RowEnding::CarriageReturn)
        );
    }

    #[test]
    fn test_cr_at_chunk_boundary() {
        let mut d = detector();
        assert_eq!(d.feed(b"a,b\r"), DetectStep::ContinuePushbackOne);
        // The next chunk resolves it.
        assert_eq!(
            d.feed(b"\nrest"),
            DetectStep::Finished(RowEnding::CarriageReturnLineFeed)
        );
    }

    #[test]
    fn test_cr_then_eof_is_cr() {
        let mut d = detector();
        assert_eq!(d.feed(b"a\r"), DetectStep::ContinuePushbackOne);
        assert_eq!(d.finish(), RowEnding::CarriageReturn);
    }

    #[test]
    fn test_eof_without_terminator_defaults_to_crlf() {
        let mut d = detector();
        assert_eq!(d.feed(b"a,b,c"), DetectStep::Continue);
        assert_eq!(d.finish(), RowEnding::CarriageReturnLineFeed);
    }

    #[test]
    fn test_terminator_inside_escaped_value_is_ignored() {
        let mut d = detector();
        assert_eq!(
            d.feed(b"\"a\nb\",c\r\n"),
            DetectStep::Finished(RowEnding::CarriageReturnLineFeed)
        );
    }

    #[test]
    fn test_doubled_quote_keeps_value_open() {
        let mut d = detector();
        assert_eq!(
            d.feed(b"\"a\"\"\nb\",c\n"),
            DetectStep::Finished(RowEnding::LineFeed)
        );
    }

    #[test]
    fn test_terminator_right_after_closing_quote() {
        let mut d = detector();
        assert_eq!(d.feed(b"\"abc\"\n"), DetectStep::Finished(RowEnding::LineFeed));
    }

    #[test]
    fn test_terminator_inside_comment_is_legal() {
        let mut d = detector();
        assert_eq!(
            d.feed(b"#quotes \" do not count\nx"),
            DetectStep::Finished(RowEnding::LineFeed)
        );
    }

    #[test]
    fn test_distinct_escape_sequences() {
        let config = ReaderBuilder::new().escape(b'\\').build().unwrap();
        let mut d = RowEndingDetector::new(&config);
        // \" inside the value keeps it open; the real close precedes \r\n.
        assert_eq!(
            d.feed(b"\"a\\\"b\"\r\n"),
            DetectStep::Finished(RowEnding::CarriageReturnLineFeed)
        );
    }
}
