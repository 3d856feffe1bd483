// streamcsv - Streaming CSV tokenizer and record assembler
//
// Pipeline:
//   source -> BufferWithPushback (fills the window)
//          -> classifier + transition table (one lookup per byte)
//          -> PartialValue (in-place or copied value accumulation)
//          -> RowAssembler (finished spans, row boundaries)
//          -> Reader / AsyncReader (the caller-facing loop)
//
// The synchronous and asynchronous readers are two drivers of the same
// decision loop; suspension can only happen at the buffer-refill boundary,
// so both produce identical output for identical input.

pub mod buffer;
pub mod config;
pub mod core;
pub mod detect;
pub mod error;
pub mod header;
pub mod reader;
pub mod row;

pub use config::{Config, HeaderMode, ReaderBuilder, RowEnding};
pub use error::{Error, ParseErrorKind, Result};
pub use header::ColumnNames;
pub use reader::{CancelToken, Position, ReadEvent, Reader};
pub use row::{Fields, RequiredSet, RowRef};

#[cfg(feature = "async")]
pub use reader::async_io::AsyncReader;
