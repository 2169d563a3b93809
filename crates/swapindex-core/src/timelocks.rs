//! Packed escrow timelocks.
//!
//! The `timelocks` word carries seven 32-bit stage offsets (stage `i` lives in
//! bits `32*i .. 32*i + 32`) and the escrow deployment timestamp in the top
//! 32 bits. A stage deadline is `deployed_at + offset`.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Lifecycle stages encoded in a timelocks word, in bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SrcWithdrawal = 0,
    SrcPublicWithdrawal = 1,
    SrcCancellation = 2,
    SrcPublicCancellation = 3,
    DstWithdrawal = 4,
    DstPublicWithdrawal = 5,
    DstCancellation = 6,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::SrcWithdrawal,
        Stage::SrcPublicWithdrawal,
        Stage::SrcCancellation,
        Stage::SrcPublicCancellation,
        Stage::DstWithdrawal,
        Stage::DstPublicWithdrawal,
        Stage::DstCancellation,
    ];
}

/// Decoded timelocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timelocks {
    /// Unix timestamp the escrow was deployed at.
    pub deployed_at: u64,
    /// Per-stage offsets in seconds, indexed by [`Stage`].
    pub offsets: [u32; 7],
}

impl Timelocks {
    /// Unpack a raw `uint256` timelocks value.
    pub fn from_packed(value: U256) -> Self {
        let limbs = value.as_limbs();
        let word32 = |i: usize| -> u32 {
            let limb = limbs[i / 2];
            (limb >> ((i % 2) * 32)) as u32
        };
        let mut offsets = [0u32; 7];
        for (i, slot) in offsets.iter_mut().enumerate() {
            *slot = word32(i);
        }
        Self {
            deployed_at: word32(7) as u64,
            offsets,
        }
    }

    /// Absolute deadline (unix seconds) at which `stage` begins.
    pub fn stage_deadline(&self, stage: Stage) -> u64 {
        self.deployed_at + self.offsets[stage as usize] as u64
    }
}
