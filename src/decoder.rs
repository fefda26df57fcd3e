//! The record-tree walker.
//!
//! [`BlockDecoder`] turns one top-level record at a time into either a list
//! of [`PhysicsEvent`]s (for physics blocks) or a run-control notification.
//! A block is validated against its trigger metadata, its ROC sub-records
//! are matched to the trigger-meta segments, and every bank is dispatched
//! to its registered grammar. The decoder keeps no state between blocks
//! apart from the current run number, the registry and the filter.

use std::sync::Arc;

use tracing::{debug, info};

use crate::assembler::EventMap;
use crate::error::DecodeError;
use crate::filter::FilterDb;
use crate::record::{DataType, Record};
use crate::registry::ParserRegistry;
use crate::types::PhysicsEvent;

/// First tag of the run-control range.
pub const RUN_CONTROL_FIRST: u16 = 0xFFD0;
/// Last tag of the run-control range.
pub const RUN_CONTROL_LAST: u16 = 0xFFDF;
/// Prestart records carry the run number.
pub const PRESTART_TAG: u16 = 0xFFD1;

/// Mask applied to a data sub-record tag to obtain its ROC id.
const ROC_ID_MASK: u16 = 0x0FFF;

/// Block-level metadata extracted from the trigger-meta record before any
/// grammar runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMeta {
    /// Sequence number of the first physics event in the block.
    pub first_event_number: u64,
    /// ROC tags of the per-ROC segments, in order; used to cross-check the
    /// data sub-records.
    pub roc_ids: Vec<u16>,
}

impl TriggerMeta {
    /// Extracts the metadata from the block's first child.
    ///
    /// The first segment carries the first event number as its leading
    /// 64-bit word; the `UInt32`-typed children are the per-ROC segments
    /// and their count must match the record's `num` field.
    pub fn from_record(record: &Record) -> Result<Self, DecodeError> {
        let children = record.children();
        let lead = children
            .first()
            .ok_or(DecodeError::TreeShape("trigger-meta record has no segments"))?;
        let first_event_number = *lead.ulong64_data().first().ok_or(DecodeError::TreeShape(
            "trigger-meta lead segment has no 64-bit event number",
        ))?;

        let roc_ids: Vec<u16> = children
            .iter()
            .filter(|child| child.data_type() == DataType::UInt32)
            .map(Record::tag)
            .collect();
        if roc_ids.len() != usize::from(record.num()) {
            return Err(DecodeError::CountMismatch {
                what: "ROC segments in trigger meta",
                expected: usize::from(record.num()),
                found: roc_ids.len(),
            });
        }

        Ok(Self {
            first_event_number,
            roc_ids,
        })
    }
}

/// Outcome of decoding one top-level record.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A physics block: the assembled events, ascending by event number.
    Events(Vec<PhysicsEvent>),
    /// A run-control record. `run_number` is set when the record changed
    /// the decoder's current run (prestart).
    RunControl {
        tag: u16,
        run_number: Option<u32>,
    },
}

/// Decodes top-level records into physics events.
///
/// The registry and filter are shared read-only; [`BlockDecoder::decode_block`]
/// takes `&self` and may be called from parallel workers, one block each.
/// Run-control records arrive outside the parallel stream and go through
/// [`BlockDecoder::decode`], which updates the current run number.
#[derive(Debug)]
pub struct BlockDecoder {
    registry: Arc<ParserRegistry>,
    filter: Arc<FilterDb>,
    run_number: Option<u32>,
}

impl BlockDecoder {
    pub fn new(registry: Arc<ParserRegistry>, filter: Arc<FilterDb>) -> Self {
        Self {
            registry,
            filter,
            run_number: None,
        }
    }

    /// The run number from the most recent prestart record, if any.
    pub fn run_number(&self) -> Option<u32> {
        self.run_number
    }

    /// Decodes one top-level record, routing run-control records away from
    /// the grammar-dispatch path.
    pub fn decode(&mut self, record: &Record) -> Result<Decoded, DecodeError> {
        let tag = record.tag();
        if (RUN_CONTROL_FIRST..=RUN_CONTROL_LAST).contains(&tag) {
            let mut changed = None;
            if tag == PRESTART_TAG {
                let run_number = *record.uint32_data().get(1).ok_or(DecodeError::IoFormat(
                    "prestart record carries no run number",
                ))?;
                info!(run_number, "run change");
                self.run_number = Some(run_number);
                changed = Some(run_number);
            }
            return Ok(Decoded::RunControl {
                tag,
                run_number: changed,
            });
        }

        Ok(Decoded::Events(self.decode_block(record)?))
    }

    /// Decodes one physics block into its ordered list of events.
    pub fn decode_block(&self, record: &Record) -> Result<Vec<PhysicsEvent>, DecodeError> {
        let children = record.children();
        if children.len() < 2 {
            return Err(DecodeError::TreeShape(
                "block record needs trigger meta and at least one ROC sub-record",
            ));
        }

        let meta = TriggerMeta::from_record(&children[0])?;
        let data_records = &children[1..];
        if data_records.len() != meta.roc_ids.len() {
            return Err(DecodeError::CountMismatch {
                what: "data sub-records vs trigger-meta ROC segments",
                expected: meta.roc_ids.len(),
                found: data_records.len(),
            });
        }

        let mut events = EventMap::new();
        for (index, sub) in data_records.iter().enumerate() {
            let data_roc = sub.tag() & ROC_ID_MASK;
            let meta_roc = meta.roc_ids[index];
            if meta_roc != data_roc {
                return Err(DecodeError::RocIdMismatch {
                    index,
                    meta_roc,
                    data_roc,
                });
            }

            let roc_id = u32::from(data_roc);
            if !self.filter.roc_allowed(roc_id) {
                debug!(roc_id, "ROC filtered out");
                continue;
            }

            for bank in sub.children() {
                let bank_id = u32::from(bank.tag());
                if !self.filter.bank_allowed(roc_id, bank_id) {
                    debug!(roc_id, bank_id, "bank filtered out");
                    continue;
                }
                let grammar = self
                    .registry
                    .get(bank_id)
                    .ok_or(DecodeError::UnknownBank { bank_id })?;
                grammar
                    .parse(bank, roc_id, &meta, &mut events)
                    .map_err(|source| DecodeError::Bank {
                        roc_id,
                        bank_id,
                        source,
                    })?;
            }
        }

        Ok(events.into_events())
    }
}
