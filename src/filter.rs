//! Optional allow-list filter for ROCs, slots, models and banks.
//!
//! The table is loaded eagerly at startup from a plain-text file: `#`
//! starts a comment, blank lines are ignored, and every data line carries
//! four whitespace-separated decimal integers `roc_id slot model bank_id`.
//! An empty table behaves as filtering disabled and every query answers
//! true.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::FilterError;

/// Configuration for the allow-list component.
///
/// Mirrors the `FILTER:ENABLE` and `FILTER:FILE` parameters of the
/// surrounding framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// Load the allow-list and consult it.
    pub enable: bool,
    /// Source file for the allow-list.
    pub file: PathBuf,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enable: false,
            file: PathBuf::from("config/filter.db"),
        }
    }
}

impl FilterConfig {
    /// Builds the filter: loads the table when enabled, otherwise returns
    /// the pass-through filter.
    pub fn build(&self) -> Result<FilterDb, FilterError> {
        if self.enable {
            FilterDb::load(&self.file)
        } else {
            Ok(FilterDb::disabled())
        }
    }
}

#[derive(Debug, Default)]
struct RocEntry {
    slots: Vec<u32>,
    models: Vec<u32>,
    banks: Vec<u32>,
}

/// The loaded allow-list table.
///
/// Read-only after loading; safe to share between decoding workers.
#[derive(Debug, Default)]
pub struct FilterDb {
    rocs: HashMap<u32, RocEntry>,
}

impl FilterDb {
    /// A pass-through filter that allows everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Loads the table from `path`. Malformed lines are fatal.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FilterError> {
        let text = fs::read_to_string(path)?;
        let db = Self::parse(&text)?;
        info!(rocs = db.rocs.len(), "loaded decode filter table");
        Ok(db)
    }

    /// Parses the table from text. See the module docs for the format.
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let mut db = Self::default();
        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut fields = trimmed.split_whitespace().map(str::parse::<u32>);
            let mut next = || fields.next().and_then(Result::ok);
            match (next(), next(), next(), next()) {
                (Some(roc_id), Some(slot), Some(model), Some(bank_id)) => {
                    db.insert(roc_id, slot, model, bank_id);
                }
                _ => {
                    return Err(FilterError::Malformed {
                        line_no: line_no + 1,
                        line: line.to_string(),
                    });
                }
            }
        }
        Ok(db)
    }

    fn insert(&mut self, roc_id: u32, slot: u32, model: u32, bank_id: u32) {
        let entry = self.rocs.entry(roc_id).or_default();
        entry.slots.push(slot);
        entry.models.push(model);
        entry.banks.push(bank_id);
    }

    /// True when the table is empty, i.e. filtering is effectively off.
    pub fn is_pass_through(&self) -> bool {
        self.rocs.is_empty()
    }

    /// Is this ROC allowed?
    pub fn roc_allowed(&self, roc_id: u32) -> bool {
        self.rocs.is_empty() || self.rocs.contains_key(&roc_id)
    }

    /// Is this slot allowed on the given ROC?
    pub fn slot_allowed(&self, roc_id: u32, slot: u32) -> bool {
        self.allowed(roc_id, |entry| &entry.slots, slot)
    }

    /// Is this model allowed on the given ROC?
    pub fn model_allowed(&self, roc_id: u32, model: u32) -> bool {
        self.allowed(roc_id, |entry| &entry.models, model)
    }

    /// Is this bank allowed on the given ROC?
    pub fn bank_allowed(&self, roc_id: u32, bank_id: u32) -> bool {
        self.allowed(roc_id, |entry| &entry.banks, bank_id)
    }

    fn allowed(&self, roc_id: u32, list: impl Fn(&RocEntry) -> &Vec<u32>, value: u32) -> bool {
        if self.rocs.is_empty() {
            return true;
        }
        self.rocs
            .get(&roc_id)
            .is_some_and(|entry| list(entry).contains(&value))
    }
}
