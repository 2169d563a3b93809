//! Escrow registry: the set of escrow contracts whose events are indexed.
//!
//! Escrows are clones deployed at runtime, so their addresses cannot be
//! handed to the sync engine upfront. The registry is filled from creation
//! events and every escrow-level event is filtered through it. It lives in
//! memory only and is rebuilt by replaying creation events (or by reloading
//! the committed escrow rows, see `SwapIndexer::restore`).

use std::collections::HashMap;

use crate::codec::normalize_hex;
use crate::entity::EscrowSide;

/// Tracked escrow addresses, per chain id.
#[derive(Debug, Clone, Default)]
pub struct EscrowRegistry {
    chains: HashMap<u64, HashMap<String, EscrowSide>>,
}

impl EscrowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `address` on `chain_id`.
    ///
    /// Returns `true` if the address was not tracked before.
    pub fn register(&mut self, chain_id: u64, address: &str, side: EscrowSide) -> bool {
        let address = normalize_hex(address);
        let tracked = self.chains.entry(chain_id).or_default();
        if tracked.contains_key(&address) {
            return false;
        }
        tracing::info!(chain_id, address = %address, side = %side, "Escrow discovered");
        tracked.insert(address, side);
        true
    }

    /// Side of a tracked escrow, or `None` if the address is not tracked.
    pub fn side_of(&self, chain_id: u64, address: &str) -> Option<EscrowSide> {
        self.chains
            .get(&chain_id)?
            .get(&normalize_hex(address))
            .copied()
    }

    pub fn contains(&self, chain_id: u64, address: &str) -> bool {
        self.side_of(chain_id, address).is_some()
    }

    /// Tracked addresses on `chain_id`, sorted.
    pub fn addresses(&self, chain_id: u64) -> Vec<String> {
        let mut out: Vec<String> = self
            .chains
            .get(&chain_id)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Total number of tracked escrows across all chains.
    pub fn len(&self) -> usize {
        self.chains.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
