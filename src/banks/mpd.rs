//! MPD bank grammar: APV sample triplets per fiber frame.

use crate::assembler::EventMap;
use crate::decoder::TriggerMeta;
use crate::error::{ParseError, ParseErrorKind};
use crate::parser::{
    self, DT_BLOCK_HEADER, DT_BLOCK_TRAILER, DT_EVENT_HEADER, DT_MPD_FRAME, DT_TRIGGER_TIME,
};
use crate::record::Record;
use crate::types::MpdHit;

use super::{BankParser, ControlState};

/// Highest bit of the MPD event-header trigger-number field.
const TRIGGER_HI: u32 = 15;

/// Grammar for MPD banks carrying APV readout frames.
///
/// An MPD frame word is followed by any number of three-word APV triplets;
/// each triplet yields one [`MpdHit`] with six samples. The APV channel is
/// recombined from the 5-bit halves in the first two triplet words.
#[derive(Debug, Default)]
pub struct MpdParser;

impl MpdParser {
    pub fn new() -> Self {
        Self
    }
}

impl BankParser for MpdParser {
    fn parse(
        &self,
        bank: &Record,
        roc_id: u32,
        meta: &TriggerMeta,
        events: &mut EventMap,
    ) -> Result<(), ParseError> {
        let words = bank.uint32_data();
        if words.is_empty() {
            return Err(ParseError::new(
                ParseErrorKind::Truncated("MPD bank payload"),
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
                        events.bundle(st.event_key(meta));
                    }
                    DT_TRIGGER_TIME => st.on_trigger_time(words, &mut i)?,
                    DT_MPD_FRAME => {
                        st.require_event("MPD frame before event header", i)?;
                        read_frame(words, &mut i, &st, roc_id, d, meta, events)?;
                    }
                    _ => {}
                }
            }
            i += 1;
        }
        Ok(())
    }
}

/// Reads the APV triplets following an MPD frame word.
///
/// Triplets are consumed while the next word is a continuation word. The
/// triplet layout is:
/// word 1 - samples 0/1 and the low channel half,
/// word 2 - samples 2/3 and the high channel half,
/// word 3 - samples 4/5 and the APV id.
fn read_frame(
    words: &[u32],
    i: &mut usize,
    st: &ControlState,
    roc_id: u32,
    frame: u32,
    meta: &TriggerMeta,
    events: &mut EventMap,
) -> Result<(), ParseError> {
    let fiber_id = parser::mpd_fiber_id(frame);
    let mpd_id = parser::mpd_id(frame);

    while matches!(words.get(*i + 1), Some(&next) if !parser::is_control(next)) {
        if *i + 3 >= words.len() {
            return Err(ParseError::new(
                ParseErrorKind::Truncated("APV triplet"),
                words.len(),
            ));
        }
        let w1 = words[*i + 1];
        let w2 = words[*i + 2];
        let w3 = words[*i + 3];
        if parser::is_control(w2) || parser::is_control(w3) {
            return Err(ParseError::new(
                ParseErrorKind::Truncated("APV triplet"),
                *i + if parser::is_control(w2) { 2 } else { 3 },
            ));
        }

        let channel_low = parser::apv_field(w1);
        let channel_high = parser::apv_field(w2);
        let apv_channel = (u16::from(channel_high) << 5) | u16::from(channel_low);

        let hit = MpdHit {
            addr: st.address(roc_id, u32::from(apv_channel)),
            fiber_id,
            mpd_id,
            apv_id: parser::apv_field(w3),
            apv_channel,
            apv_samples: [
                parser::apv_sample_even(w1),
                parser::apv_sample_odd(w1),
                parser::apv_sample_even(w2),
                parser::apv_sample_odd(w2),
                parser::apv_sample_even(w3),
                parser::apv_sample_odd(w3),
            ],
        };
        events.bundle(st.event_key(meta)).mpd.push(hit);

        *i += 3;
    }
    Ok(())
}
