//! Per-pair best-path selection.
//!
//! Tracks, for every ordered (transmitter, receiver) pair, the single
//! reflector achieving the smallest steering angle seen so far. Supports
//! streaming updates during a sweep iteration.

use std::collections::BTreeMap;

use crate::reflect::PathRecord;

/// Mapping from (tx, rx) to the best `PathRecord` offered so far.
/// The key is an ordered pair with tx != rx. Replacement requires a
/// strictly smaller steering angle, so ties keep the first-seen record.
#[derive(Debug, Clone, Default)]
pub struct BestPathTable {
    entries: BTreeMap<(usize, usize), PathRecord>,
}

impl BestPathTable {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Clears all entries; called at the start of each height evaluation.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Offers a record for its (tx, rx) key. Inserts on first sight,
    /// replaces only when the new steering angle is strictly smaller.
    pub fn offer(&mut self, record: PathRecord) {
        let key = (record.tx, record.rx);
        match self.entries.get(&key) {
            Some(current) if record.steering >= current.steering => {}
            _ => {
                self.entries.insert(key, record);
            }
        }
    }

    /// Iterates the stored records grouped by transmitter, then receiver,
    /// in ascending identifier order.
    pub fn snapshot(&self) -> impl Iterator<Item = &PathRecord> + '_ {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
