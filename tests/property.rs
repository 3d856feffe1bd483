// Property tests.
//
// Fields are generated with hostile content (separators, quotes, CR, LF),
// written back out fully quoted, then tokenized. The reader must recover
// the original fields, and must do so identically at every buffer size.

use proptest::prelude::*;

use streamcsv::{Reader, ReaderBuilder, RowEnding};

/// Quote every field so any byte sequence round-trips.
fn encode(rows: &[Vec<String>]) -> Vec<u8> {
    let mut out = Vec::new();
    for row in rows {
        for (index, field) in row.iter().enumerate() {
            if index > 0 {
                out.push(b',');
            }
            out.push(b'"');
            for &byte in field.as_bytes() {
                if byte == b'"' {
                    out.push(b'"');
                }
                out.push(byte);
            }
            out.push(b'"');
        }
        out.push(b'\n');
    }
    out
}

fn parse(input: &[u8], capacity: usize) -> Vec<Vec<String>> {
    let config = ReaderBuilder::new()
        .row_ending(RowEnding::LineFeed)
        .buffer_capacity(capacity)
        .build()
        .unwrap();
    let mut reader = Reader::new(input, config);
    let mut rows = Vec::new();
    while let Some(row) = reader.next_row().unwrap() {
        rows.push(
            row.iter()
                .map(|field| String::from_utf8_lossy(field).to_string())
                .collect(),
        );
    }
    rows
}

fn field_strategy() -> impl Strategy<Value = String> {
    // Printable ASCII plus the structurally interesting bytes.
    proptest::string::string_regex("[a-z0-9 ,\"\r\n]{0,12}").unwrap()
}

fn rows_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    proptest::collection::vec(proptest::collection::vec(field_strategy(), 1..5), 0..8)
}

proptest! {
    #[test]
    fn prop_quoted_round_trip(rows in rows_strategy()) {
        let input = encode(&rows);
        let parsed = parse(&input, 4096);
        prop_assert_eq!(parsed, rows);
    }

    #[test]
    fn prop_buffer_size_invariance(rows in rows_strategy(), capacity in 1usize..32) {
        let input = encode(&rows);
        let small = parse(&input, capacity);
        let large = parse(&input, input.len().max(1));
        prop_assert_eq!(small, large);
    }

    #[test]
    fn prop_unquoted_buffer_size_invariance(
        rows in proptest::collection::vec(
            proptest::collection::vec("[a-z0-9 ]{0,10}", 1..5),
            1..6,
        ),
        capacity in 1usize..16,
    ) {
        // Unquoted form exercises the zero-copy path and empty-row skipping.
        let mut input = Vec::new();
        for row in &rows {
            input.extend_from_slice(row.join(",").as_bytes());
            input.push(b'\n');
        }
        let small = parse(&input, capacity);
        let large = parse(&input, input.len().max(1));
        prop_assert_eq!(small, large);
    }
}

// ---------------------------------------------------------------------------
// Pushback round-trips at the buffer level
// ---------------------------------------------------------------------------

mod pushback {
    use proptest::prelude::*;
    use streamcsv::buffer::BufferWithPushback;

    proptest! {
        #[test]
        fn prop_pushback_from_window_round_trips(
            bytes in proptest::collection::vec(any::<u8>(), 1..64),
            keep_fraction in 0usize..64,
        ) {
            let mut buffer = BufferWithPushback::with_capacity(64);
            let spare = buffer.begin_fill(false).unwrap();
            spare[..bytes.len()].copy_from_slice(&bytes);
            buffer.commit_fill(bytes.len());

            let keep = keep_fraction % (bytes.len() + 1);
            buffer.push_back_from_window(bytes.len(), keep);

            if keep == 0 {
                // Nothing staged; next fill needs the source.
                prop_assert!(buffer.begin_fill(false).is_some());
            } else {
                // Staged bytes come back verbatim, before any source byte.
                prop_assert!(buffer.begin_fill(false).is_none());
                prop_assert_eq!(buffer.window(), &bytes[bytes.len() - keep..]);
            }
        }

        #[test]
        fn prop_external_pushback_round_trips(
            bytes in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let mut buffer = BufferWithPushback::with_capacity(8);
            if bytes.is_empty() {
                return Ok(());
            }
            buffer.push_back_external(&bytes);
            prop_assert!(buffer.begin_fill(false).is_none());
            prop_assert_eq!(buffer.window(), &bytes[..]);
        }
    }
}
