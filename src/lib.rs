//! Decoder for hierarchical event-record blocks from a nuclear-physics
//! data-acquisition chain.
//!
//! A top-level record is either a *run-control* record (tags
//! `0xFFD0..=0xFFDF`, mutating the current run number) or a *block*: a
//! container whose first child carries trigger metadata and whose remaining
//! children hold per-ROC device banks. The decoder walks the tree,
//! cross-checks it against the trigger metadata, dispatches every bank to
//! the grammar registered for its bank id, and assembles the decoded hits
//! into per-trigger [`PhysicsEvent`]s keyed by event number.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use eviodec::{BlockDecoder, Decoded, FadcParser, FilterDb, ParserRegistry, Record};
//!
//! let mut registry = ParserRegistry::new();
//! registry.register(250, Arc::new(FadcParser::new()));
//!
//! let mut decoder = BlockDecoder::new(Arc::new(registry), Arc::new(FilterDb::disabled()));
//!
//! # let record: Record = unimplemented!();
//! match decoder.decode(&record)? {
//!     Decoded::Events(events) => {
//!         for event in &events {
//!             println!("event {}: {} hits", event.event_number, event.hits.len());
//!         }
//!     }
//!     Decoded::RunControl { tag, run_number } => {
//!         println!("run control {tag:#06x}, run number {run_number:?}");
//!     }
//! }
//! # Ok::<(), eviodec::DecodeError>(())
//! ```
//!
//! # Concurrency
//!
//! Blocks are decoded independently: [`BlockDecoder::decode_block`] takes
//! `&self`, so one decoder can serve a pool of workers with one block each.
//! The registry and the allow-list filter are frozen behind `Arc`s before
//! decoding starts and are shared without locks. Run-control records are
//! processed outside the parallel stream through [`BlockDecoder::decode`].

pub mod assembler;
pub mod banks;
pub mod decoder;
pub mod error;
pub mod filter;
pub mod parser;
pub mod record;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use assembler::EventMap;
pub use banks::{
    BankParser, FadcParser, FadcScalerParser, HelicityParser, MpdParser, ScalerEventNumber,
    TiScalerParser, VftdcParser,
};
pub use decoder::{BlockDecoder, Decoded, TriggerMeta, PRESTART_TAG};
pub use error::{DecodeError, FilterError, ParseError, ParseErrorKind};
pub use filter::{FilterConfig, FilterDb};
pub use record::{DataType, Record, RecordSource};
pub use registry::ParserRegistry;
pub use types::{
    EventHits, FadcPulseHit, FadcScalerHit, FadcWaveformHit, HelicityData, HitAddress, MpdHit,
    PhysicsEvent, TiScalerHit, VftdcHit,
};
