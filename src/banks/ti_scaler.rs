//! TI scaler bank grammar.
//!
//! Block-level like the FADC scaler, but with a fixed hardware layout:
//! one header word followed by twelve scaler words. The event number is a
//! 48-bit value split across words 10 and 11.

use crate::assembler::EventMap;
use crate::decoder::TriggerMeta;
use crate::error::{ParseError, ParseErrorKind};
use crate::parser;
use crate::record::Record;
use crate::types::{HitAddress, TiScalerHit};

use super::BankParser;

/// Minimum payload: header word plus twelve scaler words.
const MIN_WORDS: usize = 13;

/// Grammar for TI scaler banks.
#[derive(Debug, Default)]
pub struct TiScalerParser;

impl TiScalerParser {
    pub fn new() -> Self {
        Self
    }
}

impl BankParser for TiScalerParser {
    fn parse(
        &self,
        bank: &Record,
        roc_id: u32,
        _meta: &TriggerMeta,
        events: &mut EventMap,
    ) -> Result<(), ParseError> {
        let words = bank.uint32_data();
        if words.len() < MIN_WORDS {
            return Err(ParseError::new(
                ParseErrorKind::Truncated("TI scaler bank payload"),
                words.len(),
            ));
        }

        let header = words[0];
        let hit = TiScalerHit {
            addr: HitAddress {
                roc_id,
                slot: u32::from(parser::scaler_slot(header)),
                ..HitAddress::default()
            },
            words_idx: parser::scaler_words_idx(header),
            slot: parser::scaler_slot(header),
            nscaler_words: parser::scaler_ncounts(header),
            live_time: words[1],
            busy_time: words[2],
            ts_inputs: [words[3], words[4], words[5], words[6], words[7], words[8]],
            all_triggers_before_busy: words[9],
            ts_inputs_before_busy: words[12],
        };

        let event_number = (u64::from(words[10]) << 16) | u64::from(words[11]);
        events.bundle(event_number).ti_scalers.push(hit);
        Ok(())
    }
}
