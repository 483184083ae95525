// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Correlation table: key → active handler.
//!
//! Owned exclusively by the requester's event loop; enforces the
//! admission-control invariant that at most one handler exists per key
//! at any time.

use crate::handler::Handler;
use std::collections::HashMap;
use std::hash::Hash;

pub(crate) struct CorrelationTable<K, I, R> {
    entries: HashMap<K, Handler<K, I, R>>,
}

impl<K: Eq + Hash + Clone, I, R> CorrelationTable<K, I, R> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert a handler for a previously-unseen key.
    ///
    /// Returns the handler back if the key is already occupied: the
    /// caller must treat the incoming request as a duplicate.
    pub(crate) fn try_insert(
        &mut self,
        handler: Handler<K, I, R>,
    ) -> Result<(), Handler<K, I, R>> {
        if self.entries.contains_key(handler.key()) {
            return Err(handler);
        }
        self.entries.insert(handler.key().clone(), handler);
        Ok(())
    }

    pub(crate) fn get_mut(&mut self, key: &K) -> Option<&mut Handler<K, I, R>> {
        self.entries.get_mut(key)
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<Handler<K, I, R>> {
        self.entries.remove(key)
    }

    /// Look up the handler a retry wake-up is aimed at.
    ///
    /// `None` when the key is gone (handler resolved or exhausted) or
    /// when the generation does not match (the key was reused by a newer
    /// request after the wake-up was scheduled). Either way the wake-up
    /// is stale and must have no effect.
    pub(crate) fn get_for_wakeup(
        &mut self,
        key: &K,
        generation: u64,
    ) -> Option<&mut Handler<K, I, R>> {
        self.entries
            .get_mut(key)
            .filter(|h| h.generation() == generation)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Table = CorrelationTable<&'static str, u32, u32>;

    #[test]
    fn second_insert_for_same_key_is_refused() {
        let mut table: Table = CorrelationTable::new();
        assert!(table.try_insert(Handler::new("a", 1, 10)).is_ok());

        let dup = Handler::new("a", 2, 11);
        let back = table.try_insert(dup).unwrap_err();
        assert_eq!(*back.request(), 11);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn key_is_reusable_after_removal() {
        let mut table: Table = CorrelationTable::new();
        assert!(table.try_insert(Handler::new("a", 1, 10)).is_ok());
        assert!(table.remove(&"a").is_some());
        assert!(table.try_insert(Handler::new("a", 2, 20)).is_ok());
        assert_eq!(table.get_mut(&"a").unwrap().generation(), 2);
    }

    #[test]
    fn wakeup_lookup_checks_generation() {
        let mut table: Table = CorrelationTable::new();
        assert!(table.try_insert(Handler::new("a", 7, 10)).is_ok());

        assert!(table.get_for_wakeup(&"a", 7).is_some());
        // Stale wake-up from a previous handler for the same key.
        assert!(table.get_for_wakeup(&"a", 6).is_none());
        // Unknown key.
        assert!(table.get_for_wakeup(&"b", 7).is_none());
    }
}
