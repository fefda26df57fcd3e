//! Error types for block decoding.
//!
//! Failures are split into two levels. A [`ParseError`] is raised by a bank
//! grammar and carries the word offset into the bank payload where the
//! violation was detected. The walker wraps it into a [`DecodeError::Bank`]
//! together with the ROC and bank ids, so callers always see the full
//! addressing context. Allow-list loading has its own [`FilterError`].

use thiserror::Error;

/// Grammar-level violations inside a single bank's word stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A control word arrived in a position the grammar does not allow,
    /// e.g. an event header before any block header.
    #[error("control word out of order: {0}")]
    ControlOrder(&'static str),

    /// More event headers than the block header declared, or a block
    /// trailer while declared events were still outstanding.
    #[error("event count exhausted before the block trailer")]
    NEventsOverflow,

    /// Event-header slot does not match the block-header slot.
    #[error("event header slot {event_slot} does not match block header slot {block_slot}")]
    SlotMismatch { event_slot: u32, block_slot: u32 },

    /// Number of decoded waveform samples differs from the descriptor.
    #[error("waveform descriptor declared {declared} samples, decoded {decoded}")]
    WaveformLengthMismatch { declared: u32, decoded: u32 },

    /// The grammar needed more words than the bank payload contains.
    #[error("word stream truncated while reading {0}")]
    Truncated(&'static str),
}

/// A grammar failure, located at a word offset into the bank payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} (word {word})")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Index of the offending word within the bank's 32-bit payload.
    pub word: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, word: usize) -> Self {
        Self { kind, word }
    }
}

/// Decoder-level errors surfaced to the caller.
///
/// The entire block is dropped when one of these is returned; the decoder
/// performs no intra-block recovery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The top-level record does not have the expected block shape.
    #[error("malformed record tree: {0}")]
    TreeShape(&'static str),

    /// A declared count disagrees with the record tree.
    #[error("count mismatch: {what}: expected {expected}, found {found}")]
    CountMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// Trigger-meta ROC tag does not match the data sub-record's masked tag.
    #[error(
        "ROC id mismatch at segment {index}: trigger meta has {meta_roc:#05x}, \
         data sub-record has {data_roc:#05x}"
    )]
    RocIdMismatch {
        index: usize,
        meta_roc: u16,
        data_roc: u16,
    },

    /// No grammar is registered for this bank id.
    #[error("no grammar registered for bank {bank_id:#x}")]
    UnknownBank { bank_id: u32 },

    /// The record is not the container the decoder expected.
    #[error("record is not the expected container: {0}")]
    IoFormat(&'static str),

    /// A bank grammar failed; carries the originating [`ParseError`].
    #[error("bank {bank_id:#x} on ROC {roc_id} failed to decode: {source}")]
    Bank {
        roc_id: u32,
        bank_id: u32,
        #[source]
        source: ParseError,
    },
}

/// Errors raised while loading the allow-list filter table.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("failed to read filter table: {0}")]
    Io(#[from] std::io::Error),

    /// A data line did not parse as four whitespace-separated integers.
    #[error("malformed filter line {line_no}: {line:?}")]
    Malformed { line_no: usize, line: String },
}
