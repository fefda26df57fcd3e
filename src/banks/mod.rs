//! Bank grammars: one parser per device word-stream format.
//!
//! Every grammar implements [`BankParser`] and owns the decoding of its
//! device's words into typed hits, inserted into the shared [`EventMap`]
//! keyed by event number. Grammars never depend on one another.
//!
//! The FADC, MPD, VFTDC and helicity formats share the same outer control
//! structure (block header / event header / trigger time / block trailer);
//! [`ControlState`] implements that shared bookkeeping so the device modules
//! only handle their own data types.

mod fadc;
mod fadc_scaler;
mod helicity;
mod mpd;
mod ti_scaler;
mod vftdc;

pub use fadc::FadcParser;
pub use fadc_scaler::{FadcScalerParser, ScalerEventNumber};
pub use helicity::HelicityParser;
pub use mpd::MpdParser;
pub use ti_scaler::TiScalerParser;
pub use vftdc::VftdcParser;

use tracing::warn;

use crate::assembler::EventMap;
use crate::decoder::TriggerMeta;
use crate::error::{ParseError, ParseErrorKind};
use crate::parser;
use crate::record::Record;
use crate::types::HitAddress;

/// A device grammar: decodes one bank's word stream into hits.
///
/// Implementations are shared read-only between decoding workers, so they
/// must be `Send + Sync` and keep all per-block state on the stack.
pub trait BankParser: Send + Sync {
    /// Decodes `bank` and inserts the resulting hits into `events`.
    ///
    /// On a grammar violation the error carries the offending word offset;
    /// the walker adds ROC and bank context before surfacing it.
    fn parse(
        &self,
        bank: &Record,
        roc_id: u32,
        meta: &TriggerMeta,
        events: &mut EventMap,
    ) -> Result<(), ParseError>;
}

/// Shared bookkeeping for the common control-word types.
///
/// Tracks the open block (slot, module id, declared event count) and the
/// current event (trigger number, trigger time, running event index).
/// The trigger-number field width differs per device and is fixed at
/// construction.
#[derive(Debug)]
pub(crate) struct ControlState {
    slot: u32,
    module_id: u32,
    block_number: u32,
    /// Remaining declared events; `None` while no block is open.
    nevents: Option<u32>,
    event_open: bool,
    event_index: u64,
    trigger_num: u32,
    ts_lo: u32,
    ts_hi: u32,
    /// Highest bit of the trigger-number field in event headers.
    trigger_hi: u32,
}

impl ControlState {
    pub fn new(trigger_hi: u32) -> Self {
        Self {
            slot: 0,
            module_id: 0,
            block_number: 0,
            nevents: None,
            event_open: false,
            event_index: 0,
            trigger_num: 0,
            ts_lo: 0,
            ts_hi: 0,
            trigger_hi,
        }
    }

    pub fn module_id(&self) -> u32 {
        self.module_id
    }

    pub fn trigger_num(&self) -> u32 {
        self.trigger_num
    }

    /// Latches slot, module id, block number and the declared event count.
    pub fn on_block_header(&mut self, word: u32) {
        self.slot = parser::block_slot(word);
        self.module_id = parser::block_module_id(word);
        self.block_number = parser::block_number(word);
        self.nevents = Some(parser::block_nevents(word));
    }

    /// Opens the next event; checks ordering, count and slot invariants.
    pub fn on_event_header(&mut self, word: u32, idx: usize) -> Result<(), ParseError> {
        let remaining = self.nevents.ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::ControlOrder("event header before block header"),
                idx,
            )
        })?;
        if remaining == 0 {
            return Err(ParseError::new(ParseErrorKind::NEventsOverflow, idx));
        }
        self.nevents = Some(remaining - 1);

        let event_slot = parser::event_slot(word);
        if event_slot != self.slot {
            return Err(ParseError::new(
                ParseErrorKind::SlotMismatch {
                    event_slot,
                    block_slot: self.slot,
                },
                idx,
            ));
        }

        if self.event_open {
            self.event_index += 1;
        } else {
            self.event_open = true;
        }
        self.trigger_num = parser::event_trigger_num(word, self.trigger_hi);
        Ok(())
    }

    /// Latches both trigger-time halves, consuming the word after `*idx`.
    pub fn on_trigger_time(&mut self, words: &[u32], idx: &mut usize) -> Result<(), ParseError> {
        if self.nevents.is_none() {
            return Err(ParseError::new(
                ParseErrorKind::ControlOrder("trigger time before block header"),
                *idx,
            ));
        }
        self.ts_lo = parser::trigger_time_bits(words[*idx]);
        *idx += 1;
        let high = *words.get(*idx).ok_or_else(|| {
            ParseError::new(ParseErrorKind::Truncated("trigger time high word"), *idx)
        })?;
        self.ts_hi = parser::trigger_time_bits(high);
        Ok(())
    }

    /// Closes the block; all declared events must have been read.
    pub fn on_block_trailer(&mut self, word: u32, idx: usize) -> Result<(), ParseError> {
        let remaining = self.nevents.ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::ControlOrder("block trailer before block header"),
                idx,
            )
        })?;
        if remaining != 0 {
            return Err(ParseError::new(ParseErrorKind::NEventsOverflow, idx));
        }
        let trailer_slot = parser::block_slot(word);
        if trailer_slot != self.slot {
            warn!(
                trailer_slot,
                block_slot = self.slot,
                block_number = self.block_number,
                "block trailer slot differs from block header slot"
            );
        }
        // A following block in the same bank restarts at event index 0 and
        // merges into the same event numbers.
        self.nevents = None;
        self.event_open = false;
        self.event_index = 0;
        Ok(())
    }

    /// Errors unless an event header has been seen in the open block.
    pub fn require_event(&self, what: &'static str, idx: usize) -> Result<(), ParseError> {
        if !self.event_open {
            return Err(ParseError::new(ParseErrorKind::ControlOrder(what), idx));
        }
        Ok(())
    }

    /// Event-map key for the current event: block-first event number plus
    /// the running index.
    pub fn event_key(&self, meta: &TriggerMeta) -> u64 {
        meta.first_event_number + self.event_index
    }

    /// Hit address for the current event and the given channel.
    pub fn address(&self, roc_id: u32, channel: u32) -> HitAddress {
        HitAddress {
            roc_id,
            slot: self.slot,
            module_id: self.module_id,
            channel,
            trigger_num: self.trigger_num,
            ts_lo: self.ts_lo,
            ts_hi: self.ts_hi,
        }
    }
}
