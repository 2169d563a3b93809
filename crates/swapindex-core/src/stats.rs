//! Running per-chain statistics.
//!
//! Counters only ever grow and `last_updated_block` only moves forward. Each
//! update is written in the same unit of work as the entity rows it counts,
//! so replaying from the last committed block reproduces the same values.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Aggregates for one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatistics {
    /// Decimal chain id.
    pub id: String,
    pub chain_id: u64,
    pub total_src_escrows: u64,
    pub total_dst_escrows: u64,
    pub total_withdrawals: u64,
    pub total_cancellations: u64,
    pub total_volume_locked: U256,
    pub total_volume_withdrawn: U256,
    pub last_updated_block: u64,
}

impl ChainStatistics {
    pub fn new(chain_id: u64) -> Self {
        Self {
            id: chain_id.to_string(),
            chain_id,
            ..Default::default()
        }
    }

    pub fn record_src_escrow(&mut self, amount: U256, block: u64) {
        self.total_src_escrows += 1;
        self.total_volume_locked = self.total_volume_locked.saturating_add(amount);
        self.touch(block);
    }

    pub fn record_dst_escrow(&mut self, block: u64) {
        self.total_dst_escrows += 1;
        self.touch(block);
    }

    pub fn record_withdrawal(&mut self, amount: U256, block: u64) {
        self.total_withdrawals += 1;
        self.total_volume_withdrawn = self.total_volume_withdrawn.saturating_add(amount);
        self.touch(block);
    }

    pub fn record_cancellation(&mut self, block: u64) {
        self.total_cancellations += 1;
        self.touch(block);
    }

    fn touch(&mut self, block: u64) {
        self.last_updated_block = self.last_updated_block.max(block);
    }
}
