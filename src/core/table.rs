// Transition table construction and the process-wide table cache.
//
// The tokenizer is a lookup, not branching code: a dense array of
// (next state, action) rules indexed by state * alphabet + symbol class.
// Construction is pure and deterministic — the same configuration tuple
// always yields a bit-identical table — which is what allows tables to be
// built once and shared read-only across readers and threads.
//
// A parallel per-state array holds the confirmed-separator rules consulted
// after a successful multi-byte separator lookahead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;
use once_cell::sync::Lazy;

use crate::config::{Config, RowEnding};
use crate::core::classify::{SymbolClass, ALPHABET_SIZE};
use crate::core::state::{State, STATE_COUNT};
use crate::error::ParseErrorKind;

/// What the driving loop must do with the current symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SkipCharacter,
    AppendCharacter,
    /// Append the carriage return held by a `*SeenCarriageReturn` state,
    /// then the current byte (unless the next state holds it again).
    AppendCarriageReturnAndCharacter,
    FinishUnescapedValue,
    FinishEscapedValue,
    /// Finish the pending unescaped value (if the row has content), then
    /// the record.
    FinishUnescapedRecord,
    FinishEscapedRecord,
    FinishComment,
    /// The separator is wider than one byte; the engine must confirm it
    /// with lookahead before consuming anything.
    LookAheadMultiCharSeparator,
    Error(ParseErrorKind),
}

/// One cell of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub next: State,
    pub action: Action,
}

impl TransitionRule {
    const fn new(next: State, action: Action) -> Self {
        TransitionRule { next, action }
    }
}

fn error_rule(kind: ParseErrorKind) -> TransitionRule {
    TransitionRule::new(State::Invalid, Action::Error(kind))
}

/// Configuration tuple a table is built for. Value-equal keys share one
/// table instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableKey {
    /// Resolved mode; never `Detect`.
    pub row_ending: RowEnding,
    pub quote_is_escape: bool,
    pub comments: bool,
    pub multi_byte_separator: bool,
    pub trim_leading: bool,
    pub trim_trailing: bool,
}

impl TableKey {
    /// Key for a configuration with the row ending already resolved.
    pub fn for_config(config: &Config, resolved_ending: RowEnding) -> Self {
        debug_assert!(resolved_ending != RowEnding::Detect);
        TableKey {
            row_ending: resolved_ending,
            quote_is_escape: config.quote_is_escape(),
            comments: config.comment().is_some(),
            multi_byte_separator: config.separator().len() > 1,
            trim_leading: config.trim_leading,
            trim_trailing: config.trim_trailing,
        }
    }
}

/// Immutable rule table for one configuration tuple.
#[derive(Debug)]
pub struct TransitionTable {
    key: TableKey,
    rules: Vec<TransitionRule>,
    separator_rules: Vec<TransitionRule>,
}

impl TransitionTable {
    /// Pure O(1) advance: next state and action for the current symbol.
    #[inline]
    pub fn rule(&self, state: State, class: SymbolClass) -> TransitionRule {
        self.rules[state.index() * ALPHABET_SIZE + class as usize]
    }

    /// Rule to apply once a multi-byte separator lookahead confirmed a
    /// full separator at the current position.
    #[inline]
    pub fn separator_rule(&self, state: State) -> TransitionRule {
        self.separator_rules[state.index()]
    }

    pub fn key(&self) -> &TableKey {
        &self.key
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// The per-phase states (header rows tokenize with the same rules as record
/// rows, but through their own state group).
struct Phase {
    no_value: State,
    with_value: State,
    in_escaped: State,
    pending_escape: State,
    escaped_expecting_end: State,
    seen_cr: State,
    expecting_eol: State,
}

fn phase_of(state: State) -> Phase {
    if state.is_header() {
        Phase {
            no_value: State::HeaderUnescapedNoValue,
            with_value: State::HeaderUnescapedWithValue,
            in_escaped: State::HeaderInEscapedValue,
            pending_escape: State::HeaderInEscapedValueWithPendingEscape,
            escaped_expecting_end: State::HeaderInEscapedValueExpectingEnd,
            seen_cr: State::HeaderSeenCarriageReturn,
            expecting_eol: State::HeaderExpectingEndOfRecord,
        }
    } else {
        Phase {
            no_value: State::RecordUnescapedNoValue,
            with_value: State::RecordUnescapedWithValue,
            in_escaped: State::RecordInEscapedValue,
            pending_escape: State::RecordInEscapedValueWithPendingEscape,
            escaped_expecting_end: State::RecordInEscapedValueExpectingEnd,
            seen_cr: State::RecordSeenCarriageReturn,
            expecting_eol: State::RecordExpectingEndOfRecord,
        }
    }
}

/// Where a finished comment returns to.
fn comment_return(state: State) -> State {
    match state {
        State::CommentBeforeHeader | State::CommentBeforeHeaderSeenCarriageReturn => {
            State::HeaderStart
        }
        _ => State::RecordStart,
    }
}

fn build(key: TableKey) -> TransitionTable {
    let classes = [
        SymbolClass::Separator,
        SymbolClass::EscapeStartEnd,
        SymbolClass::Escape,
        SymbolClass::CarriageReturn,
        SymbolClass::LineFeed,
        SymbolClass::CommentStart,
        SymbolClass::Other,
        SymbolClass::DataEnd,
    ];

    let mut rules = Vec::with_capacity(STATE_COUNT * ALPHABET_SIZE);
    for state in State::all() {
        for class in classes {
            rules.push(rule_for(state, class, &key));
        }
    }

    // Snapshot the single-byte separator rules, then widen the structural
    // separator cells to lookahead when the separator is multi-byte.
    let mut separator_rules = Vec::with_capacity(STATE_COUNT);
    for state in State::all() {
        separator_rules.push(rules[state.index() * ALPHABET_SIZE + SymbolClass::Separator as usize]);
    }
    if key.multi_byte_separator {
        for state in State::all() {
            if separator_is_structural(state) {
                rules[state.index() * ALPHABET_SIZE + SymbolClass::Separator as usize] =
                    TransitionRule::new(state, Action::LookAheadMultiCharSeparator);
            }
        }
    }

    TransitionTable {
        key,
        rules,
        separator_rules,
    }
}

/// States where a separator acts as a field boundary rather than data or an
/// error. Only these need lookahead for multi-byte separators.
fn separator_is_structural(state: State) -> bool {
    matches!(
        state,
        State::HeaderStart
            | State::HeaderUnescapedNoValue
            | State::HeaderUnescapedWithValue
            | State::HeaderInEscapedValueWithPendingEscape
            | State::HeaderInEscapedValueExpectingEnd
            | State::HeaderSeenCarriageReturn
            | State::RecordStart
            | State::RecordUnescapedNoValue
            | State::RecordUnescapedWithValue
            | State::RecordInEscapedValueWithPendingEscape
            | State::RecordInEscapedValueExpectingEnd
            | State::RecordSeenCarriageReturn
    )
}

fn rule_for(state: State, class: SymbolClass, key: &TableKey) -> TransitionRule {
    use Action::*;
    use SymbolClass as C;

    let ending = key.row_ending;
    let p = phase_of(state);

    match state {
        State::HeaderStart | State::RecordStart => match class {
            C::Separator => TransitionRule::new(p.no_value, FinishUnescapedValue),
            C::EscapeStartEnd => TransitionRule::new(p.in_escaped, SkipCharacter),
            C::CommentStart if key.comments => {
                let target = if state.is_header() {
                    State::CommentBeforeHeader
                } else {
                    State::CommentBeforeRecord
                };
                TransitionRule::new(target, SkipCharacter)
            }
            C::CarriageReturn => match ending {
                RowEnding::CarriageReturnLineFeed => TransitionRule::new(p.seen_cr, SkipCharacter),
                RowEnding::CarriageReturn => {
                    TransitionRule::new(State::RecordStart, FinishUnescapedRecord)
                }
                _ => TransitionRule::new(p.with_value, AppendCharacter),
            },
            C::LineFeed => match ending {
                RowEnding::LineFeed => TransitionRule::new(State::RecordStart, FinishUnescapedRecord),
                _ => TransitionRule::new(p.with_value, AppendCharacter),
            },
            C::DataEnd => TransitionRule::new(State::DataEnded, FinishUnescapedRecord),
            _ => TransitionRule::new(p.with_value, AppendCharacter),
        },

        State::HeaderUnescapedNoValue | State::RecordUnescapedNoValue => match class {
            C::Separator => TransitionRule::new(p.no_value, FinishUnescapedValue),
            C::EscapeStartEnd => TransitionRule::new(p.in_escaped, SkipCharacter),
            C::CarriageReturn => match ending {
                RowEnding::CarriageReturnLineFeed => TransitionRule::new(p.seen_cr, SkipCharacter),
                RowEnding::CarriageReturn => {
                    TransitionRule::new(State::RecordStart, FinishUnescapedRecord)
                }
                _ => TransitionRule::new(p.with_value, AppendCharacter),
            },
            C::LineFeed => match ending {
                RowEnding::LineFeed => TransitionRule::new(State::RecordStart, FinishUnescapedRecord),
                _ => TransitionRule::new(p.with_value, AppendCharacter),
            },
            C::DataEnd => TransitionRule::new(State::DataEnded, FinishUnescapedRecord),
            _ => TransitionRule::new(p.with_value, AppendCharacter),
        },

        State::HeaderUnescapedWithValue | State::RecordUnescapedWithValue => match class {
            C::Separator => TransitionRule::new(p.no_value, FinishUnescapedValue),
            C::EscapeStartEnd => error_rule(ParseErrorKind::StartEscapeInValue),
            C::CarriageReturn => match ending {
                RowEnding::CarriageReturnLineFeed => TransitionRule::new(p.seen_cr, SkipCharacter),
                RowEnding::CarriageReturn => {
                    TransitionRule::new(State::RecordStart, FinishUnescapedRecord)
                }
                _ => TransitionRule::new(p.with_value, AppendCharacter),
            },
            C::LineFeed => match ending {
                RowEnding::LineFeed => TransitionRule::new(State::RecordStart, FinishUnescapedRecord),
                _ => TransitionRule::new(p.with_value, AppendCharacter),
            },
            C::DataEnd => TransitionRule::new(State::DataEnded, FinishUnescapedRecord),
            _ => TransitionRule::new(p.with_value, AppendCharacter),
        },

        State::HeaderInEscapedValue | State::RecordInEscapedValue => match class {
            C::EscapeStartEnd => {
                if key.quote_is_escape {
                    // Closing quote or first of a doubled pair; the next
                    // symbol disambiguates.
                    TransitionRule::new(p.pending_escape, SkipCharacter)
                } else {
                    TransitionRule::new(p.escaped_expecting_end, SkipCharacter)
                }
            }
            C::Escape => TransitionRule::new(p.pending_escape, SkipCharacter),
            C::DataEnd => error_rule(ParseErrorKind::UnexpectedEnd),
            _ => TransitionRule::new(p.in_escaped, AppendCharacter),
        },

        State::HeaderInEscapedValueWithPendingEscape
        | State::RecordInEscapedValueWithPendingEscape => {
            if key.quote_is_escape {
                match class {
                    C::Separator => TransitionRule::new(p.no_value, FinishEscapedValue),
                    C::EscapeStartEnd => TransitionRule::new(p.in_escaped, AppendCharacter),
                    // No byte classes as Escape in this variant.
                    C::Escape => error_rule(ParseErrorKind::UnexpectedState),
                    C::CarriageReturn => match ending {
                        RowEnding::CarriageReturnLineFeed => {
                            TransitionRule::new(p.expecting_eol, SkipCharacter)
                        }
                        RowEnding::CarriageReturn => {
                            TransitionRule::new(State::RecordStart, FinishEscapedRecord)
                        }
                        _ => error_rule(ParseErrorKind::ExpectedEndOfRecordOrValue),
                    },
                    C::LineFeed => match ending {
                        RowEnding::LineFeed => {
                            TransitionRule::new(State::RecordStart, FinishEscapedRecord)
                        }
                        _ => error_rule(ParseErrorKind::ExpectedEndOfRecordOrValue),
                    },
                    C::DataEnd => TransitionRule::new(State::DataEnded, FinishEscapedRecord),
                    _ => error_rule(ParseErrorKind::ExpectedEndOfRecordOrValue),
                }
            } else {
                match class {
                    // Escaped quote or escaped escape resolve to a literal.
                    C::EscapeStartEnd | C::Escape => {
                        TransitionRule::new(p.in_escaped, AppendCharacter)
                    }
                    C::DataEnd => error_rule(ParseErrorKind::UnexpectedEnd),
                    _ => error_rule(ParseErrorKind::UnexpectedCharacterInEscapeSequence),
                }
            }
        }

        State::HeaderInEscapedValueExpectingEnd | State::RecordInEscapedValueExpectingEnd => {
            match class {
                C::Separator => TransitionRule::new(p.no_value, FinishEscapedValue),
                C::CarriageReturn => match ending {
                    RowEnding::CarriageReturnLineFeed => {
                        TransitionRule::new(p.expecting_eol, SkipCharacter)
                    }
                    RowEnding::CarriageReturn => {
                        TransitionRule::new(State::RecordStart, FinishEscapedRecord)
                    }
                    _ => error_rule(ParseErrorKind::ExpectedEndOfRecordOrValue),
                },
                C::LineFeed => match ending {
                    RowEnding::LineFeed => {
                        TransitionRule::new(State::RecordStart, FinishEscapedRecord)
                    }
                    _ => error_rule(ParseErrorKind::ExpectedEndOfRecordOrValue),
                },
                C::DataEnd => TransitionRule::new(State::DataEnded, FinishEscapedRecord),
                _ => error_rule(ParseErrorKind::ExpectedEndOfRecordOrValue),
            }
        }

        State::HeaderSeenCarriageReturn | State::RecordSeenCarriageReturn => {
            if ending != RowEnding::CarriageReturnLineFeed {
                // Never entered outside CRLF mode.
                return error_rule(ParseErrorKind::UnexpectedLineEnding);
            }
            match class {
                C::Separator => TransitionRule::new(p.no_value, FinishUnescapedValue),
                C::EscapeStartEnd => error_rule(ParseErrorKind::StartEscapeInValue),
                C::CarriageReturn => {
                    TransitionRule::new(p.seen_cr, AppendCarriageReturnAndCharacter)
                }
                C::LineFeed => TransitionRule::new(State::RecordStart, FinishUnescapedRecord),
                C::DataEnd => TransitionRule::new(State::DataEnded, FinishUnescapedRecord),
                _ => TransitionRule::new(p.with_value, AppendCarriageReturnAndCharacter),
            }
        }

        State::HeaderExpectingEndOfRecord | State::RecordExpectingEndOfRecord => {
            if ending != RowEnding::CarriageReturnLineFeed {
                return error_rule(ParseErrorKind::UnexpectedLineEnding);
            }
            match class {
                C::LineFeed => TransitionRule::new(State::RecordStart, FinishEscapedRecord),
                C::DataEnd => error_rule(ParseErrorKind::UnexpectedEnd),
                _ => error_rule(ParseErrorKind::ExpectedEndOfRecord),
            }
        }

        State::CommentBeforeHeader | State::CommentBeforeRecord => {
            if !key.comments {
                return error_rule(ParseErrorKind::UnexpectedState);
            }
            let seen_cr = if state == State::CommentBeforeHeader {
                State::CommentBeforeHeaderSeenCarriageReturn
            } else {
                State::CommentBeforeRecordSeenCarriageReturn
            };
            match class {
                C::CarriageReturn => match ending {
                    RowEnding::CarriageReturnLineFeed => TransitionRule::new(seen_cr, SkipCharacter),
                    RowEnding::CarriageReturn => {
                        TransitionRule::new(comment_return(state), FinishComment)
                    }
                    _ => TransitionRule::new(state, AppendCharacter),
                },
                C::LineFeed => match ending {
                    RowEnding::LineFeed => TransitionRule::new(comment_return(state), FinishComment),
                    _ => TransitionRule::new(state, AppendCharacter),
                },
                C::DataEnd => TransitionRule::new(State::DataEnded, FinishComment),
                _ => TransitionRule::new(state, AppendCharacter),
            }
        }

        State::CommentBeforeHeaderSeenCarriageReturn
        | State::CommentBeforeRecordSeenCarriageReturn => {
            if !key.comments {
                return error_rule(ParseErrorKind::UnexpectedState);
            }
            if ending != RowEnding::CarriageReturnLineFeed {
                return error_rule(ParseErrorKind::UnexpectedLineEnding);
            }
            let comment = if state == State::CommentBeforeHeaderSeenCarriageReturn {
                State::CommentBeforeHeader
            } else {
                State::CommentBeforeRecord
            };
            match class {
                C::LineFeed => TransitionRule::new(comment_return(state), FinishComment),
                C::CarriageReturn => {
                    TransitionRule::new(state, AppendCarriageReturnAndCharacter)
                }
                C::DataEnd => TransitionRule::new(State::DataEnded, FinishComment),
                _ => TransitionRule::new(comment, AppendCarriageReturnAndCharacter),
            }
        }

        // Absorbing terminals: advancing past either is caller misuse.
        State::DataEnded | State::Invalid => error_rule(ParseErrorKind::InvalidState),
    }
}

// ---------------------------------------------------------------------------
// Process-wide cache
// ---------------------------------------------------------------------------

static TABLE_CACHE: Lazy<Mutex<HashMap<TableKey, Arc<TransitionTable>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Fetch (building on first use) the shared table for a configuration
/// tuple. Tables are immutable after construction and safe to share across
/// readers and threads.
pub fn shared(key: TableKey) -> Arc<TransitionTable> {
    let mut cache = TABLE_CACHE.lock().unwrap();
    cache
        .entry(key)
        .or_insert_with(|| {
            debug!("building transition table for {:?}", key);
            Arc::new(build(key))
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReaderBuilder;

    fn key(ending: RowEnding) -> TableKey {
        TableKey::for_config(&ReaderBuilder::new().build().unwrap(), ending)
    }

    fn crlf() -> TableKey {
        key(RowEnding::CarriageReturnLineFeed)
    }

    #[test]
    fn test_invalid_state_is_absorbing() {
        let table = build(crlf());
        let classes = [
            SymbolClass::Separator,
            SymbolClass::EscapeStartEnd,
            SymbolClass::Escape,
            SymbolClass::CarriageReturn,
            SymbolClass::LineFeed,
            SymbolClass::CommentStart,
            SymbolClass::Other,
            SymbolClass::DataEnd,
        ];
        for class in classes {
            let rule = table.rule(State::Invalid, class);
            assert_eq!(rule.next, State::Invalid);
            assert_eq!(rule.action, Action::Error(ParseErrorKind::InvalidState));
        }
    }

    #[test]
    fn test_construction_is_deterministic() {
        let a = build(crlf());
        let b = build(crlf());
        assert_eq!(a.rules, b.rules);
        assert_eq!(a.separator_rules, b.separator_rules);
    }

    #[test]
    fn test_cache_shares_one_instance() {
        let a = shared(crlf());
        let b = shared(crlf());
        assert!(Arc::ptr_eq(&a, &b));
        let c = shared(key(RowEnding::LineFeed));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_crlf_needs_two_symbols_to_end_a_record() {
        // A lone \r never decides record-end on its own in CRLF mode.
        let table = build(crlf());
        let cr = table.rule(State::RecordUnescapedWithValue, SymbolClass::CarriageReturn);
        assert_eq!(cr.next, State::RecordSeenCarriageReturn);
        assert_eq!(cr.action, Action::SkipCharacter);

        let lf = table.rule(State::RecordSeenCarriageReturn, SymbolClass::LineFeed);
        assert_eq!(lf.next, State::RecordStart);
        assert_eq!(lf.action, Action::FinishUnescapedRecord);

        // \r followed by data resolves the \r to value text.
        let other = table.rule(State::RecordSeenCarriageReturn, SymbolClass::Other);
        assert_eq!(other.next, State::RecordUnescapedWithValue);
        assert_eq!(other.action, Action::AppendCarriageReturnAndCharacter);
    }

    #[test]
    fn test_doubled_quote_is_data_until_next_symbol() {
        let table = build(crlf());
        let pending = table.rule(State::RecordInEscapedValue, SymbolClass::EscapeStartEnd);
        assert_eq!(pending.next, State::RecordInEscapedValueWithPendingEscape);

        // Second quote: literal quote, still inside the value.
        let doubled = table.rule(
            State::RecordInEscapedValueWithPendingEscape,
            SymbolClass::EscapeStartEnd,
        );
        assert_eq!(doubled.next, State::RecordInEscapedValue);
        assert_eq!(doubled.action, Action::AppendCharacter);

        // Separator: the pending quote was the closing quote.
        let sep = table.rule(
            State::RecordInEscapedValueWithPendingEscape,
            SymbolClass::Separator,
        );
        assert_eq!(sep.next, State::RecordUnescapedNoValue);
        assert_eq!(sep.action, Action::FinishEscapedValue);
    }

    #[test]
    fn test_distinct_escape_variant() {
        let config = ReaderBuilder::new().escape(b'\\').build().unwrap();
        let table = build(TableKey::for_config(&config, RowEnding::LineFeed));

        // Quote inside the value closes it outright.
        let close = table.rule(State::RecordInEscapedValue, SymbolClass::EscapeStartEnd);
        assert_eq!(close.next, State::RecordInEscapedValueExpectingEnd);

        // Backslash starts a pending escape; a data byte after it errors.
        let esc = table.rule(State::RecordInEscapedValue, SymbolClass::Escape);
        assert_eq!(esc.next, State::RecordInEscapedValueWithPendingEscape);
        let bad = table.rule(
            State::RecordInEscapedValueWithPendingEscape,
            SymbolClass::Other,
        );
        assert_eq!(
            bad.action,
            Action::Error(ParseErrorKind::UnexpectedCharacterInEscapeSequence)
        );
    }

    #[test]
    fn test_data_end_finishes_truncated_input() {
        let table = build(crlf());
        let rule = table.rule(State::RecordUnescapedWithValue, SymbolClass::DataEnd);
        assert_eq!(rule.next, State::DataEnded);
        assert_eq!(rule.action, Action::FinishUnescapedRecord);

        // Mid-escaped-value truncation is an error.
        let rule = table.rule(State::RecordInEscapedValue, SymbolClass::DataEnd);
        assert_eq!(rule.action, Action::Error(ParseErrorKind::UnexpectedEnd));
    }

    #[test]
    fn test_stray_byte_after_closed_value_cr() {
        let table = build(crlf());
        let rule = table.rule(State::RecordExpectingEndOfRecord, SymbolClass::Other);
        assert_eq!(rule.action, Action::Error(ParseErrorKind::ExpectedEndOfRecord));
    }

    #[test]
    fn test_quote_mid_unescaped_value_errors() {
        let table = build(crlf());
        let rule = table.rule(State::RecordUnescapedWithValue, SymbolClass::EscapeStartEnd);
        assert_eq!(rule.action, Action::Error(ParseErrorKind::StartEscapeInValue));
    }

    #[test]
    fn test_multi_byte_separator_uses_lookahead() {
        let config = ReaderBuilder::new().separator_bytes(b"::").build().unwrap();
        let table = build(TableKey::for_config(&config, RowEnding::LineFeed));

        let rule = table.rule(State::RecordUnescapedWithValue, SymbolClass::Separator);
        assert_eq!(rule.action, Action::LookAheadMultiCharSeparator);
        assert_eq!(rule.next, State::RecordUnescapedWithValue);

        // Confirmed rule behaves like the single-byte separator.
        let confirmed = table.separator_rule(State::RecordUnescapedWithValue);
        assert_eq!(confirmed.action, Action::FinishUnescapedValue);
        assert_eq!(confirmed.next, State::RecordUnescapedNoValue);

        // Inside an escaped value the separator stays data: no lookahead.
        let inside = table.rule(State::RecordInEscapedValue, SymbolClass::Separator);
        assert_eq!(inside.action, Action::AppendCharacter);
    }

    #[test]
    fn test_header_rows_finish_into_record_states() {
        let table = build(key(RowEnding::LineFeed));
        let rule = table.rule(State::HeaderUnescapedWithValue, SymbolClass::LineFeed);
        assert_eq!(rule.next, State::RecordStart);
        assert_eq!(rule.action, Action::FinishUnescapedRecord);
    }

    #[test]
    fn test_comment_rules() {
        let config = ReaderBuilder::new().comment(b'#').build().unwrap();
        let table = build(TableKey::for_config(&config, RowEnding::LineFeed));

        let open = table.rule(State::RecordStart, SymbolClass::CommentStart);
        assert_eq!(open.next, State::CommentBeforeRecord);
        assert_eq!(open.action, Action::SkipCharacter);

        // Mid-value comment byte is data.
        let mid = table.rule(State::RecordUnescapedWithValue, SymbolClass::CommentStart);
        assert_eq!(mid.action, Action::AppendCharacter);

        let finish = table.rule(State::CommentBeforeRecord, SymbolClass::LineFeed);
        assert_eq!(finish.next, State::RecordStart);
        assert_eq!(finish.action, Action::FinishComment);

        let before_header = table.rule(State::CommentBeforeHeader, SymbolClass::LineFeed);
        assert_eq!(before_header.next, State::HeaderStart);
    }

    #[test]
    fn test_unreachable_line_ending_states_are_defensive() {
        let table = build(key(RowEnding::LineFeed));
        let rule = table.rule(State::RecordSeenCarriageReturn, SymbolClass::Other);
        assert_eq!(
            rule.action,
            Action::Error(ParseErrorKind::UnexpectedLineEnding)
        );
    }

    #[test]
    fn test_cr_mode_ends_records_on_cr_alone() {
        let table = build(key(RowEnding::CarriageReturn));
        let rule = table.rule(State::RecordUnescapedWithValue, SymbolClass::CarriageReturn);
        assert_eq!(rule.next, State::RecordStart);
        assert_eq!(rule.action, Action::FinishUnescapedRecord);

        // LF is plain data in CR mode.
        let lf = table.rule(State::RecordUnescapedWithValue, SymbolClass::LineFeed);
        assert_eq!(lf.action, Action::AppendCharacter);
    }
}
