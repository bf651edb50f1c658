//! # Pending Delta Ledger
//!
//! Accumulated local increments that have not been replayed to the remote
//! service yet.
//!
//! ## Delta Merging
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Pending Ledger                                 │
//! │                                                                         │
//! │  increment(e1, 5)  ──►  e1: 5                                           │
//! │  increment(e1, 3)  ──►  e1: 8        Deltas are ADDITIVE               │
//! │  increment(e2, 1)  ──►  e1: 8, e2: 1                                    │
//! │                                                                         │
//! │  flush captures {e1: 8, e2: 1} and replays it                           │
//! │  increment(e1, 2)  ──►  e1: 10, e2: 1   (arrives mid-flush)             │
//! │  settle(e1, 8), settle(e2, 1)  ──►  e1: 2                               │
//! │                                                                         │
//! │  Settling subtracts what was replayed instead of clearing, so deltas   │
//! │  that raced in during the replay survive for the next flush.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use tally_core::PendingDelta;
use tracing::warn;

/// Map from event id to un-replayed amount. Never holds a zero amount.
#[derive(Debug, Default)]
pub struct PendingDeltaLedger {
    deltas: BTreeMap<String, i64>,
}

impl PendingDeltaLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Returns the pending amount for `id`.
    pub fn amount(&self, id: &str) -> Option<i64> {
        self.deltas.get(id).copied()
    }

    /// Sum of every pending amount.
    pub fn total(&self) -> i64 {
        self.deltas.values().fold(0i64, |acc, v| acc.saturating_add(*v))
    }

    /// Accumulates `amount` onto the entry for `id`.
    pub fn add(&mut self, id: &str, amount: i64) {
        if amount == 0 {
            return;
        }

        let entry = self.deltas.entry(id.to_string()).or_insert(0);
        *entry = entry.saturating_add(amount);
        if *entry == 0 {
            self.deltas.remove(id);
        }
    }

    /// Removes `replayed` from the entry for `id` after a flush replayed it.
    ///
    /// Whatever accumulated on top of the replayed amount stays pending.
    pub fn settle(&mut self, id: &str, replayed: i64) {
        let Some(entry) = self.deltas.get_mut(id) else {
            warn!(event_id = %id, replayed, "Settled a delta that is no longer pending");
            return;
        };

        *entry = entry.saturating_sub(replayed);
        if *entry == 0 {
            self.deltas.remove(id);
        }
    }

    /// Copies every entry out, ordered by id.
    pub fn entries(&self) -> Vec<PendingDelta> {
        self.deltas
            .iter()
            .map(|(id, amount)| PendingDelta {
                id: id.clone(),
                amount: *amount,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_accumulates() {
        let mut ledger = PendingDeltaLedger::new();
        ledger.add("e1", 5);
        ledger.add("e1", 3);
        ledger.add("e2", 1);

        assert_eq!(ledger.amount("e1"), Some(8));
        assert_eq!(ledger.amount("e2"), Some(1));
        assert_eq!(ledger.total(), 9);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_zero_amounts_never_stored() {
        let mut ledger = PendingDeltaLedger::new();
        ledger.add("e1", 0);
        assert!(ledger.is_empty());
        assert_eq!(ledger.amount("e1"), None);
    }

    #[test]
    fn test_settle_keeps_racing_deltas() {
        let mut ledger = PendingDeltaLedger::new();
        ledger.add("e1", 8);
        let captured = ledger.entries();

        // Arrives while the captured amounts are being replayed
        ledger.add("e1", 2);

        for delta in &captured {
            ledger.settle(&delta.id, delta.amount);
        }

        assert_eq!(ledger.amount("e1"), Some(2));
    }

    #[test]
    fn test_settle_removes_fully_replayed() {
        let mut ledger = PendingDeltaLedger::new();
        ledger.add("e1", 8);
        ledger.add("e2", 4);

        ledger.settle("e1", 8);
        ledger.settle("e2", 4);
        ledger.settle("gone", 1);

        assert!(ledger.is_empty());
    }

    #[test]
    fn test_entries_ordered() {
        let mut ledger = PendingDeltaLedger::new();
        ledger.add("b", 1);
        ledger.add("a", 2);
        assert_eq!(
            ledger.entries(),
            vec![
                PendingDelta {
                    id: "a".into(),
                    amount: 2
                },
                PendingDelta {
                    id: "b".into(),
                    amount: 1
                },
            ]
        );
    }
}
