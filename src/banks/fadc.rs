//! FADC bank grammar: waveform and pulse readout.

use tracing::warn;

use crate::assembler::EventMap;
use crate::decoder::TriggerMeta;
use crate::error::{ParseError, ParseErrorKind};
use crate::parser::{
    self, DT_BLOCK_HEADER, DT_BLOCK_TRAILER, DT_EVENT_HEADER, DT_PULSE, DT_TRIGGER_TIME,
    DT_WAVEFORM,
};
use crate::record::Record;
use crate::types::{FadcPulseHit, FadcWaveformHit};

use super::{BankParser, ControlState};

/// Highest bit of the FADC event-header trigger-number field.
const TRIGGER_HI: u32 = 21;

/// Grammar for FADC banks carrying raw waveforms and pulse analysis.
#[derive(Debug, Default)]
pub struct FadcParser;

impl FadcParser {
    pub fn new() -> Self {
        Self
    }
}

impl BankParser for FadcParser {
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
                ParseErrorKind::Truncated("FADC bank payload"),
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
                        // The event exists even if no data words follow
                        events.bundle(st.event_key(meta));
                    }
                    DT_TRIGGER_TIME => st.on_trigger_time(words, &mut i)?,
                    DT_WAVEFORM => {
                        st.require_event("waveform descriptor before event header", i)?;
                        let hit = read_waveform(words, &mut i, &st, roc_id, d)?;
                        events.bundle(st.event_key(meta)).waveforms.push(hit);
                    }
                    DT_PULSE => {
                        st.require_event("pulse descriptor before event header", i)?;
                        read_pulses(words, &mut i, &st, roc_id, d, meta, events);
                    }
                    _ => {}
                }
            }
            i += 1;
        }
        Ok(())
    }
}

/// Reads the continuation words following a waveform descriptor.
///
/// Each continuation word carries up to two 13-bit samples, each gated by
/// its own not-valid flag. The number of kept samples must match the count
/// declared in the descriptor.
fn read_waveform(
    words: &[u32],
    i: &mut usize,
    st: &ControlState,
    roc_id: u32,
    descriptor: u32,
) -> Result<FadcWaveformHit, ParseError> {
    let channel = parser::waveform_channel(descriptor);
    let declared = parser::waveform_length(descriptor);
    let nwords = ((declared + 1) / 2) as usize;

    let mut hit = FadcWaveformHit::new(st.address(roc_id, channel));
    hit.waveform.reserve(declared as usize);

    for k in *i + 1..=*i + nwords {
        let ww = match words.get(k) {
            Some(&ww) if !parser::is_control(ww) => ww,
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::Truncated("waveform samples"),
                    k,
                ))
            }
        };
        if !parser::sample0_invalid(ww) {
            hit.waveform.push(parser::sample0(ww));
        }
        if !parser::sample1_invalid(ww) {
            hit.waveform.push(parser::sample1(ww));
        }
    }

    if hit.waveform.len() != declared as usize {
        return Err(ParseError::new(
            ParseErrorKind::WaveformLengthMismatch {
                declared,
                decoded: hit.waveform.len() as u32,
            },
            *i,
        ));
    }

    *i += nwords;
    Ok(hit)
}

/// Reads pulse word pairs following a pulse descriptor.
///
/// Pairs are consumed until a control word or the end of the stream; the
/// terminating words are left for the outer loop. A lone continuation word
/// that cannot form a pair is reported as a warning and skipped.
fn read_pulses(
    words: &[u32],
    i: &mut usize,
    st: &ControlState,
    roc_id: u32,
    descriptor: u32,
    meta: &TriggerMeta,
    events: &mut EventMap,
) {
    let channel = parser::pulse_channel(descriptor);
    let pedestal_quality = parser::pulse_pedestal_quality(descriptor);
    let pedestal_sum = parser::pulse_pedestal_sum(descriptor);

    while *i + 2 < words.len() {
        let w2 = words[*i + 1];
        let w3 = words[*i + 2];
        if parser::is_control(w2) || parser::is_control(w3) {
            break;
        }

        let mut hit = FadcPulseHit::new(st.address(roc_id, channel), pedestal_quality, pedestal_sum);
        hit.integral_sum = parser::pulse_integral_sum(w2);
        hit.integral_quality = parser::pulse_integral_quality(w2);
        hit.nsamples_above_th = parser::pulse_nsamples_above_th(w2);
        hit.coarse_time = parser::pulse_coarse_time(w3);
        hit.fine_time = parser::pulse_fine_time(w3);
        hit.pulse_peak = parser::pulse_peak(w3);
        hit.time_quality = parser::pulse_time_quality(w3);
        events.bundle(st.event_key(meta)).pulses.push(hit);

        *i += 2;
    }

    // However the loop exited, a remaining continuation word has no pair:
    // either the stream ends or a control word follows it.
    if let Some(&next) = words.get(*i + 1) {
        if !parser::is_control(next) {
            warn!(
                word = *i + 1,
                "dangling pulse continuation word without a pair"
            );
            *i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> TriggerMeta {
        TriggerMeta {
            first_event_number: 1000,
            roc_ids: vec![0x15],
        }
    }

    fn control(data_type: u32) -> u32 {
        0x8000_0000 | (data_type << 27)
    }

    fn block_header(slot: u32, nevents: u32) -> u32 {
        control(DT_BLOCK_HEADER) | (slot << 22) | nevents
    }

    fn event_header(slot: u32, trigger: u32) -> u32 {
        control(DT_EVENT_HEADER) | (slot << 22) | trigger
    }

    fn waveform_descriptor(channel: u32, len: u32) -> u32 {
        control(DT_WAVEFORM) | (channel << 23) | len
    }

    fn sample_pair(s0: u16, s1: u16) -> u32 {
        (u32::from(s0) << 16) | u32::from(s1)
    }

    fn parse(words: Vec<u32>) -> Result<EventMap, ParseError> {
        let bank = Record::leaf_u32(250, 0, words);
        let mut events = EventMap::new();
        FadcParser::new().parse(&bank, 21, &meta(), &mut events)?;
        Ok(events)
    }

    #[test]
    fn decodes_single_waveform_event() {
        let events = parse(vec![
            block_header(1, 1),
            event_header(1, 1),
            control(DT_TRIGGER_TIME) | 0x10,
            0x20,
            waveform_descriptor(0, 4),
            sample_pair(1, 2),
            sample_pair(3, 4),
            control(DT_BLOCK_TRAILER) | (1 << 22),
        ])
        .unwrap();

        let out = events.into_events();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event_number, 1000);
        let hit = &out[0].hits.waveforms[0];
        assert_eq!(hit.addr.slot, 1);
        assert_eq!(hit.addr.channel, 0);
        assert_eq!(hit.addr.trigger_num, 1);
        assert_eq!(hit.addr.time(), (0x20 << 24) | 0x10);
        assert_eq!(hit.waveform, vec![1, 2, 3, 4]);
    }

    #[test]
    fn not_valid_samples_are_dropped() {
        // Three samples declared: the second word's odd sample is flagged
        let events = parse(vec![
            block_header(1, 1),
            event_header(1, 1),
            waveform_descriptor(2, 3),
            sample_pair(10, 11),
            sample_pair(12, 0) | (1 << 13),
            control(DT_BLOCK_TRAILER) | (1 << 22),
        ])
        .unwrap();

        let out = events.into_events();
        assert_eq!(out[0].hits.waveforms[0].waveform, vec![10, 11, 12]);
    }

    #[test]
    fn waveform_length_mismatch_is_fatal() {
        // Descriptor says 4 samples but one is flagged not-valid
        let err = parse(vec![
            block_header(1, 1),
            event_header(1, 1),
            waveform_descriptor(0, 4),
            sample_pair(1, 2),
            sample_pair(3, 4) | (1 << 29),
            control(DT_BLOCK_TRAILER) | (1 << 22),
        ])
        .unwrap_err();

        assert_eq!(
            err.kind,
            ParseErrorKind::WaveformLengthMismatch {
                declared: 4,
                decoded: 3
            }
        );
    }

    #[test]
    fn waveform_cut_short_by_control_word_is_truncated() {
        let err = parse(vec![
            block_header(1, 1),
            event_header(1, 1),
            waveform_descriptor(0, 4),
            sample_pair(1, 2),
            control(DT_BLOCK_TRAILER) | (1 << 22),
        ])
        .unwrap_err();

        assert!(matches!(err.kind, ParseErrorKind::Truncated(_)));
    }

    #[test]
    fn decodes_pulse_pairs_until_control_word() {
        let descriptor = control(DT_PULSE) | (3 << 15) | (1 << 14) | 0x123;
        let w2 = (100 << 12) | (2 << 9) | 5;
        let w3 = (7 << 21) | (8 << 15) | (9 << 3) | 1;
        let events = parse(vec![
            block_header(1, 1),
            event_header(1, 77),
            descriptor,
            w2,
            w3,
            w2,
            w3,
            control(DT_BLOCK_TRAILER) | (1 << 22),
        ])
        .unwrap();

        let out = events.into_events();
        let pulses = &out[0].hits.pulses;
        assert_eq!(pulses.len(), 2);
        for hit in pulses {
            assert_eq!(hit.addr.channel, 3);
            assert_eq!(hit.addr.trigger_num, 77);
            assert_eq!(hit.pedestal_quality, 1);
            assert_eq!(hit.pedestal_sum, 0x123);
            assert_eq!(hit.integral_sum, 100);
            assert_eq!(hit.integral_quality, 2);
            assert_eq!(hit.nsamples_above_th, 5);
            assert_eq!(hit.coarse_time, 7);
            assert_eq!(hit.fine_time, 8);
            assert_eq!(hit.pulse_peak, 9);
            assert_eq!(hit.time_quality, 1);
        }
    }

    #[test]
    fn dangling_pulse_word_is_warned_and_skipped() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct WarnCounter(Arc<AtomicUsize>);
        impl tracing::Subscriber for WarnCounter {
            fn enabled(&self, metadata: &tracing::Metadata<'_>) -> bool {
                *metadata.level() == tracing::Level::WARN
            }
            fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
                tracing::span::Id::from_u64(1)
            }
            fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}
            fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}
            fn event(&self, _: &tracing::Event<'_>) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
            fn enter(&self, _: &tracing::span::Id) {}
            fn exit(&self, _: &tracing::span::Id) {}
        }

        let warnings = Arc::new(AtomicUsize::new(0));
        let events = tracing::subscriber::with_default(
            WarnCounter(Arc::clone(&warnings)),
            || {
                // A lone continuation word right before the block trailer:
                // it cannot form a pulse pair and must not derail the trailer
                parse(vec![
                    block_header(1, 1),
                    event_header(1, 1),
                    control(DT_PULSE) | (1 << 15),
                    0x0000_1234,
                    control(DT_BLOCK_TRAILER) | (1 << 22),
                ])
                .unwrap()
            },
        );

        assert_eq!(warnings.load(Ordering::Relaxed), 1);
        let out = events.into_events();
        assert_eq!(out.len(), 1);
        assert!(out[0].hits.pulses.is_empty());
    }

    #[test]
    fn dangling_pulse_word_at_end_of_stream_is_warned() {
        // Same anomaly, but the stream simply ends after the lone word
        let events = parse(vec![
            block_header(1, 1),
            event_header(1, 1),
            control(DT_PULSE) | (1 << 15),
            0x0000_1234,
        ])
        .unwrap();

        let out = events.into_events();
        assert_eq!(out.len(), 1);
        assert!(out[0].hits.pulses.is_empty());
    }

    #[test]
    fn interleaved_events_attribute_hits_in_header_order() {
        let events = parse(vec![
            block_header(1, 2),
            event_header(1, 1),
            waveform_descriptor(0, 2),
            sample_pair(1, 2),
            event_header(1, 2),
            waveform_descriptor(0, 2),
            sample_pair(3, 4),
            control(DT_BLOCK_TRAILER) | (1 << 22),
        ])
        .unwrap();

        let out = events.into_events();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].event_number, 1000);
        assert_eq!(out[0].hits.waveforms[0].waveform, vec![1, 2]);
        assert_eq!(out[1].event_number, 1001);
        assert_eq!(out[1].hits.waveforms[0].waveform, vec![3, 4]);
    }

    #[test]
    fn event_without_data_words_still_appears() {
        let events = parse(vec![
            block_header(1, 1),
            event_header(1, 1),
            control(DT_BLOCK_TRAILER) | (1 << 22),
        ])
        .unwrap();

        let out = events.into_events();
        assert_eq!(out.len(), 1);
        assert!(out[0].hits.is_empty());
    }

    #[test]
    fn premature_trailer_is_rejected() {
        let err = parse(vec![
            block_header(1, 2),
            event_header(1, 1),
            control(DT_BLOCK_TRAILER) | (1 << 22),
        ])
        .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NEventsOverflow);
    }

    #[test]
    fn empty_bank_is_truncated() {
        let err = parse(vec![]).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Truncated(_)));
    }
}
