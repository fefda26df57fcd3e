//! Registry mapping bank ids to device grammars.
//!
//! Registration happens once at startup; afterwards the registry is frozen
//! behind an `Arc` and shared read-only by all decoding workers, so lookups
//! need no synchronization.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::banks::BankParser;

/// Write-once map from bank id to the grammar that decodes it.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: HashMap<u32, Arc<dyn BankParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `parser` for `bank_id`, replacing any earlier registration.
    pub fn register(&mut self, bank_id: u32, parser: Arc<dyn BankParser>) {
        if self.parsers.insert(bank_id, parser).is_some() {
            debug!(bank_id, "replacing grammar registration");
        }
    }

    /// Looks up the grammar for `bank_id`.
    pub fn get(&self, bank_id: u32) -> Option<&dyn BankParser> {
        self.parsers.get(&bank_id).map(Arc::as_ref)
    }

    pub fn contains(&self, bank_id: u32) -> bool {
        self.parsers.contains_key(&bank_id)
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bank_ids: Vec<u32> = self.parsers.keys().copied().collect();
        bank_ids.sort_unstable();
        f.debug_struct("ParserRegistry")
            .field("bank_ids", &bank_ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banks::{FadcParser, MpdParser};

    #[test]
    fn lookup_after_registration() {
        let mut registry = ParserRegistry::new();
        assert!(registry.is_empty());

        registry.register(250, Arc::new(FadcParser::new()));
        registry.register(300, Arc::new(MpdParser::new()));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(250));
        assert!(registry.get(300).is_some());
        assert!(registry.get(999).is_none());
    }

    #[test]
    fn shared_registry_is_usable_from_threads() {
        let mut registry = ParserRegistry::new();
        registry.register(250, Arc::new(FadcParser::new()));
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.contains(250))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
