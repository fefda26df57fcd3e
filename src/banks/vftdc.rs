//! VFTDC bank grammar: per-edge timing measurements.

use crate::assembler::EventMap;
use crate::decoder::TriggerMeta;
use crate::error::{ParseError, ParseErrorKind};
use crate::parser::{
    self, DT_BLOCK_HEADER, DT_BLOCK_TRAILER, DT_EVENT_HEADER, DT_TRIGGER_TIME, DT_VFTDC_HIT,
};
use crate::record::Record;
use crate::types::VftdcHit;

use super::{BankParser, ControlState};

/// Highest bit of the VFTDC event-header trigger-number field.
const TRIGGER_HI: u32 = 21;

/// Grammar for VFTDC banks.
///
/// Unlike the other per-event grammars, VFTDC keys its bundles by the raw
/// event number carried in the event header rather than by position within
/// the block.
#[derive(Debug, Default)]
pub struct VftdcParser;

impl VftdcParser {
    pub fn new() -> Self {
        Self
    }
}

impl BankParser for VftdcParser {
    fn parse(
        &self,
        bank: &Record,
        roc_id: u32,
        _meta: &TriggerMeta,
        events: &mut EventMap,
    ) -> Result<(), ParseError> {
        let words = bank.uint32_data();
        if words.is_empty() {
            return Err(ParseError::new(
                ParseErrorKind::Truncated("VFTDC bank payload"),
                0,
            ));
        }

        let mut st = ControlState::new(TRIGGER_HI);
        let mut i = 0;
        while i < words.len() {
            let d = words[i];
            if parser::is_control(d) {
                match parser::data_type(d) {
                    DT_BLOCK_HEADER => st.on_block_header(d),
                    DT_BLOCK_TRAILER => st.on_block_trailer(d, i)?,
                    DT_EVENT_HEADER => {
                        st.on_event_header(d, i)?;
                        events.bundle(u64::from(st.trigger_num()));
                    }
                    DT_TRIGGER_TIME => st.on_trigger_time(words, &mut i)?,
                    DT_VFTDC_HIT => {
                        st.require_event("VFTDC data word before event header", i)?;
                        let hit = VftdcHit {
                            addr: st.address(roc_id, u32::from(parser::vftdc_channel(d))),
                            board_id: st.module_id() as u8,
                            group_num: parser::vftdc_group(d),
                            channel_num: parser::vftdc_channel(d),
                            edge_type: parser::vftdc_edge(d),
                            coarse_time: parser::vftdc_coarse_time(d),
                            two_ns: parser::vftdc_two_ns(d),
                            fine_time: parser::vftdc_fine_time(d),
                        };
                        events.bundle(u64::from(st.trigger_num())).vftdc.push(hit);
                    }
                    _ => {}
                }
            }
            i += 1;
        }
        Ok(())
    }
}
