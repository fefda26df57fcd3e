//! Helicity-decoder bank grammar.

use tracing::warn;

use crate::assembler::EventMap;
use crate::decoder::TriggerMeta;
use crate::error::{ParseError, ParseErrorKind};
use crate::parser::{
    self, DT_BLOCK_HEADER, DT_BLOCK_TRAILER, DT_EVENT_HEADER, DT_HELICITY, DT_TRIGGER_TIME,
};
use crate::record::Record;
use crate::types::HelicityData;

use super::{BankParser, ControlState};

/// Highest bit of the helicity event-header trigger-number field.
const TRIGGER_HI: u32 = 11;

/// Number of data words in a well-formed helicity record.
const HELICITY_NWORDS: u32 = 14;

/// Grammar for helicity-decoder banks.
///
/// A data header opens a fixed 14-word record of seed, counter and history
/// registers. A different word count is reported as a warning and decoding
/// continues with whatever words are present.
#[derive(Debug, Default)]
pub struct HelicityParser;

impl HelicityParser {
    pub fn new() -> Self {
        Self
    }
}

impl BankParser for HelicityParser {
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
                ParseErrorKind::Truncated("helicity bank payload"),
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
                    DT_HELICITY => {
                        st.require_event("helicity data header before event header", i)?;
                        let hit = read_decoder_data(words, &mut i, &st, roc_id, d);
                        events.bundle(st.event_key(meta)).helicity.push(hit);
                    }
                    _ => {}
                }
            }
            i += 1;
        }
        Ok(())
    }
}

/// Reads the fixed-layout decoder record following a data header.
fn read_decoder_data(
    words: &[u32],
    i: &mut usize,
    st: &ControlState,
    roc_id: u32,
    header: u32,
) -> HelicityData {
    let nwords = parser::helicity_nwords(header);
    if nwords != HELICITY_NWORDS {
        warn!(
            trigger_num = st.trigger_num(),
            nwords, "helicity decoder record does not have 14 data words"
        );
    }

    let mut hit = HelicityData::new(st.address(roc_id, 0));
    for k in *i + 1..=*i + nwords as usize {
        let Some(&ww) = words.get(k) else { break };
        match k - *i {
            1 => hit.seed = ww,
            2 => hit.n_tstable_fall = ww,
            3 => hit.n_tstable_rise = ww,
            4 => hit.n_pattsync = ww,
            5 => hit.n_pairsync = ww,
            6 => hit.time_tstable_start = ww,
            7 => hit.time_tstable_end = ww,
            8 => hit.last_tstable_duration = ww,
            9 => hit.last_tsettle_duration = ww,
            10 => {
                hit.trig_tstable = parser::helicity_flag(ww, 0);
                hit.trig_pattsync = parser::helicity_flag(ww, 1);
                hit.trig_pairsync = parser::helicity_flag(ww, 2);
                hit.trig_helicity = parser::helicity_flag(ww, 3);
                hit.trig_pat0_helicity = parser::helicity_flag(ww, 4);
                hit.trig_polarity = parser::helicity_flag(ww, 5);
                hit.trig_pat_count = parser::helicity_pat_count(ww);
            }
            11 => hit.last32wins_pattsync = ww,
            12 => hit.last32wins_pairsync = ww,
            13 => hit.last32wins_helicity = ww,
            14 => hit.last32wins_pattsync_hel = ww,
            _ => {}
        }
    }
    *i += nwords as usize;
    hit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> TriggerMeta {
        TriggerMeta {
            first_event_number: 42,
            roc_ids: vec![0x18],
        }
    }

    fn control(data_type: u32) -> u32 {
        0x8000_0000 | (data_type << 27)
    }

    fn parse(words: Vec<u32>) -> Result<EventMap, ParseError> {
        let bank = Record::leaf_u32(270, 0, words);
        let mut events = EventMap::new();
        HelicityParser::new().parse(&bank, 24, &meta(), &mut events)?;
        Ok(events)
    }

    #[test]
    fn decodes_fourteen_word_record() {
        let mut words = vec![
            control(DT_BLOCK_HEADER) | 1,
            control(DT_EVENT_HEADER) | 5,
            control(DT_HELICITY) | 14,
        ];
        // Words 1..9: counters
        words.extend((1..=9).map(|n| n * 100));
        // Word 10: flags 0,2,4 set and pattern count 0xAB
        words.push((0xAB << 8) | 0b010101);
        // Words 11..14: window histories
        words.extend([0x1111, 0x2222, 0x3333, 0x4444]);
        words.push(control(DT_BLOCK_TRAILER));

        let out = parse(words).unwrap().into_events();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event_number, 42);

        let hit = &out[0].hits.helicity[0];
        assert_eq!(hit.addr.trigger_num, 5);
        assert_eq!(hit.seed, 100);
        assert_eq!(hit.n_tstable_fall, 200);
        assert_eq!(hit.n_tstable_rise, 300);
        assert_eq!(hit.n_pattsync, 400);
        assert_eq!(hit.n_pairsync, 500);
        assert_eq!(hit.time_tstable_start, 600);
        assert_eq!(hit.time_tstable_end, 700);
        assert_eq!(hit.last_tstable_duration, 800);
        assert_eq!(hit.last_tsettle_duration, 900);
        assert!(hit.trig_tstable);
        assert!(!hit.trig_pattsync);
        assert!(hit.trig_pairsync);
        assert!(!hit.trig_helicity);
        assert!(hit.trig_pat0_helicity);
        assert!(!hit.trig_polarity);
        assert_eq!(hit.trig_pat_count, 0xAB);
        assert_eq!(hit.last32wins_pattsync, 0x1111);
        assert_eq!(hit.last32wins_pairsync, 0x2222);
        assert_eq!(hit.last32wins_helicity, 0x3333);
        assert_eq!(hit.last32wins_pattsync_hel, 0x4444);
    }

    #[test]
    fn short_record_is_a_warning_not_an_error() {
        let out = parse(vec![
            control(DT_BLOCK_HEADER) | 1,
            control(DT_EVENT_HEADER) | 5,
            control(DT_HELICITY) | 2,
            7,
            8,
            control(DT_BLOCK_TRAILER),
        ])
        .unwrap()
        .into_events();

        let hit = &out[0].hits.helicity[0];
        assert_eq!(hit.seed, 7);
        assert_eq!(hit.n_tstable_fall, 8);
        assert_eq!(hit.n_tstable_rise, 0);
    }

    #[test]
    fn trigger_number_uses_twelve_bits() {
        let mut words = vec![
            control(DT_BLOCK_HEADER) | 1,
            control(DT_EVENT_HEADER) | (1 << 12) | 0xFFF,
            control(DT_HELICITY) | 14,
        ];
        words.extend([0u32; 14]);
        words.push(control(DT_BLOCK_TRAILER));
        let out = parse(words).unwrap().into_events();

        assert_eq!(out[0].hits.helicity[0].addr.trigger_num, 0xFFF);
    }
}
