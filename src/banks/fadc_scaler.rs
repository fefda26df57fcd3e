//! FADC scaler bank grammar.
//!
//! Scaler banks are block-level: the whole bank describes one event, whose
//! number is carried by the last two payload words. Everything before them
//! is a sequence of scaler records, one per slot, each a header word
//! followed by sixteen counters.

use crate::assembler::EventMap;
use crate::decoder::TriggerMeta;
use crate::error::{ParseError, ParseErrorKind};
use crate::parser;
use crate::record::Record;
use crate::types::{FadcScalerHit, HitAddress};

use super::BankParser;

/// How the trailing two words encode the event number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScalerEventNumber {
    /// `(words[n-2] << 32) | words[n-1]` — full 64-bit concatenation.
    #[default]
    Concat64,
    /// `(words[n-2] << 16) | words[n-1]` — 48-bit layout.
    Concat48,
}

impl ScalerEventNumber {
    fn decode(self, high: u32, low: u32) -> u64 {
        match self {
            Self::Concat64 => (u64::from(high) << 32) | u64::from(low),
            Self::Concat48 => (u64::from(high) << 16) | u64::from(low),
        }
    }
}

/// Grammar for FADC scaler banks.
#[derive(Debug, Default)]
pub struct FadcScalerParser {
    event_number: ScalerEventNumber,
}

impl FadcScalerParser {
    pub fn new(event_number: ScalerEventNumber) -> Self {
        Self { event_number }
    }
}

impl BankParser for FadcScalerParser {
    fn parse(
        &self,
        bank: &Record,
        roc_id: u32,
        _meta: &TriggerMeta,
        events: &mut EventMap,
    ) -> Result<(), ParseError> {
        let words = bank.uint32_data();
        // At least one header word plus the two event-number words
        if words.len() < 3 {
            return Err(ParseError::new(
                ParseErrorKind::Truncated("FADC scaler bank payload"),
                words.len(),
            ));
        }

        let event_number = self
            .event_number
            .decode(words[words.len() - 2], words[words.len() - 1]);
        let payload_end = words.len() - 2;

        let bundle = events.bundle(event_number);
        let mut i = 0;
        while i < payload_end {
            let header = words[i];
            let mut hit = FadcScalerHit {
                addr: HitAddress {
                    roc_id,
                    slot: u32::from(parser::scaler_slot(header)),
                    ..HitAddress::default()
                },
                words_idx: parser::scaler_words_idx(header),
                slot: parser::scaler_slot(header),
                ncounts: parser::scaler_ncounts(header),
                counts: [0; 16],
            };
            for count in hit.counts.iter_mut() {
                i += 1;
                if i >= payload_end {
                    break;
                }
                *count = words[i];
            }
            bundle.fadc_scalers.push(hit);
            i += 1;
        }
        Ok(())
    }
}
