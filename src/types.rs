//! Decoded hit types and the per-trigger output record.
//!
//! Every hit carries a [`HitAddress`] with the shared addressing fields;
//! the device-specific payload follows. Field widths narrower than the
//! storage type are enforced by the grammars at decode time.

/// Shared addressing for all decoded hits.
///
/// Identifies where in the detector a hit originated, which trigger it
/// belongs to, and the 48-bit trigger time split into two 24-bit halves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HitAddress {
    /// Read-out controller id (crate).
    pub roc_id: u32,
    /// Slot within the crate, from the block header.
    pub slot: u32,
    /// Module id from the block header.
    pub module_id: u32,
    /// Device channel number.
    pub channel: u32,
    /// Trigger number from the event header.
    pub trigger_num: u32,
    /// Low 24 bits of the trigger time.
    pub ts_lo: u32,
    /// High 24 bits of the trigger time.
    pub ts_hi: u32,
}

impl HitAddress {
    /// The full 48-bit trigger time.
    #[inline]
    pub fn time(&self) -> u64 {
        (u64::from(self.ts_hi) << 24) | u64::from(self.ts_lo)
    }
}

/// An FADC waveform hit: the raw ADC samples recorded for one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FadcWaveformHit {
    pub addr: HitAddress,
    /// 13-bit ADC samples, in readout order.
    pub waveform: Vec<u16>,
}

impl FadcWaveformHit {
    pub fn new(addr: HitAddress) -> Self {
        Self {
            addr,
            waveform: Vec::new(),
        }
    }
}

/// An FADC pulse hit: integrated pulse analysis for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FadcPulseHit {
    pub addr: HitAddress,
    /// Pedestal quality flag (1 bit).
    pub pedestal_quality: u8,
    /// Pedestal sum (14 bits).
    pub pedestal_sum: u16,
    /// Pulse integral sum (18 bits).
    pub integral_sum: u32,
    /// Integral quality flags (3 bits).
    pub integral_quality: u8,
    /// Number of samples above threshold (9 bits).
    pub nsamples_above_th: u16,
    /// Coarse pulse time (9 bits).
    pub coarse_time: u16,
    /// Fine pulse time (6 bits).
    pub fine_time: u8,
    /// Pulse peak amplitude (12 bits).
    pub pulse_peak: u16,
    /// Time quality flags (3 bits).
    pub time_quality: u8,
}

impl FadcPulseHit {
    pub fn new(addr: HitAddress, pedestal_quality: u8, pedestal_sum: u16) -> Self {
        Self {
            addr,
            pedestal_quality,
            pedestal_sum,
            ..Self::default()
        }
    }
}

/// A block-level FADC scaler readout: one set of counters per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadcScalerHit {
    pub addr: HitAddress,
    /// Words index from the scaler header.
    pub words_idx: u16,
    /// Slot from the scaler header.
    pub slot: u8,
    /// Declared counter count.
    pub ncounts: u8,
    /// Scaler counters.
    pub counts: [u32; 16],
}

/// A block-level TI scaler readout with the fixed 12-word layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TiScalerHit {
    pub addr: HitAddress,
    pub words_idx: u16,
    pub slot: u8,
    /// Declared scaler word count.
    pub nscaler_words: u8,
    pub live_time: u32,
    pub busy_time: u32,
    /// Trigger-supervisor input counters.
    pub ts_inputs: [u32; 6],
    pub all_triggers_before_busy: u32,
    pub ts_inputs_before_busy: u32,
}

/// An MPD hit: one APV triplet of six samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MpdHit {
    pub addr: HitAddress,
    /// Fiber id (5 bits).
    pub fiber_id: u8,
    /// MPD id (5 bits).
    pub mpd_id: u8,
    /// APV id (5 bits).
    pub apv_id: u8,
    /// APV channel (10 bits, high and low halves recombined).
    pub apv_channel: u16,
    /// Six 13-bit APV samples.
    pub apv_samples: [u16; 6],
}

/// A VFTDC hit: one edge measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VftdcHit {
    pub addr: HitAddress,
    /// Board id from the block header (4 bits).
    pub board_id: u8,
    /// Channel group (3 bits).
    pub group_num: u8,
    /// Channel within the group (5 bits).
    pub channel_num: u8,
    /// Edge type: 0 = leading, 1 = trailing.
    pub edge_type: u8,
    /// Coarse time (10 bits).
    pub coarse_time: u16,
    /// 2 ns resolution flag.
    pub two_ns: u8,
    /// Fine time (7 bits).
    pub fine_time: u8,
}

/// Helicity-decoder status and counter registers for one trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HelicityData {
    pub addr: HitAddress,
    /// Helicity generator seed.
    pub seed: u32,
    pub n_tstable_fall: u32,
    pub n_tstable_rise: u32,
    pub n_pattsync: u32,
    pub n_pairsync: u32,
    pub time_tstable_start: u32,
    pub time_tstable_end: u32,
    pub last_tstable_duration: u32,
    pub last_tsettle_duration: u32,
    /// State of tstable at trigger time.
    pub trig_tstable: bool,
    pub trig_pattsync: bool,
    pub trig_pairsync: bool,
    pub trig_helicity: bool,
    pub trig_pat0_helicity: bool,
    pub trig_polarity: bool,
    /// Pattern count at trigger time (8 bits).
    pub trig_pat_count: u8,
    /// Pattern-sync history for the last 32 windows.
    pub last32wins_pattsync: u32,
    pub last32wins_pairsync: u32,
    pub last32wins_helicity: u32,
    pub last32wins_pattsync_hel: u32,
}

impl HelicityData {
    pub fn new(addr: HitAddress) -> Self {
        Self {
            addr,
            ..Self::default()
        }
    }
}

/// All hits attributed to one event, grouped per device.
///
/// Grammars append into the vector for their device; merging bundles from
/// several blocks of the same bank preserves insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventHits {
    pub waveforms: Vec<FadcWaveformHit>,
    pub pulses: Vec<FadcPulseHit>,
    pub fadc_scalers: Vec<FadcScalerHit>,
    pub ti_scalers: Vec<TiScalerHit>,
    pub mpd: Vec<MpdHit>,
    pub vftdc: Vec<VftdcHit>,
    pub helicity: Vec<HelicityData>,
}

impl EventHits {
    /// Total number of hits across all devices.
    pub fn len(&self) -> usize {
        self.waveforms.len()
            + self.pulses.len()
            + self.fadc_scalers.len()
            + self.ti_scalers.len()
            + self.mpd.len()
            + self.vftdc.len()
            + self.helicity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The decoder's per-trigger output record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicsEvent {
    /// Global event sequence number.
    pub event_number: u64,
    /// All hits attributed to this event across contributing ROCs.
    pub hits: EventHits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_time_concatenates_halves() {
        let addr = HitAddress {
            ts_lo: 0x00AB_CDEF,
            ts_hi: 0x0012_3456,
            ..HitAddress::default()
        };
        assert_eq!(addr.time(), 0x123456ABCDEF);
    }

    #[test]
    fn event_hits_counts_all_devices() {
        let mut hits = EventHits::default();
        assert!(hits.is_empty());

        hits.waveforms.push(FadcWaveformHit::new(HitAddress::default()));
        hits.mpd.push(MpdHit::default());
        hits.vftdc.push(VftdcHit::default());
        assert_eq!(hits.len(), 3);
        assert!(!hits.is_empty());
    }

    #[test]
    fn pulse_hit_keeps_descriptor_fields() {
        let hit = FadcPulseHit::new(HitAddress::default(), 1, 0x3FFF);
        assert_eq!(hit.pedestal_quality, 1);
        assert_eq!(hit.pedestal_sum, 0x3FFF);
        assert_eq!(hit.integral_sum, 0);
    }
}
