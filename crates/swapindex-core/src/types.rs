//! Shared types for the indexing pipeline.

use serde::{Deserialize, Serialize};

use crate::codec::normalize_hex;

// ─── DecodedEvent ─────────────────────────────────────────────────────────────

/// A decoded contract event as delivered by the sync engine.
///
/// Arguments stay loosely typed here; [`SwapEvent::decode`] turns them into
/// one statically-typed variant per event kind.
///
/// [`SwapEvent::decode`]: crate::event::SwapEvent::decode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// The ABI event name (e.g. `"SrcEscrowCreated"`).
    pub schema: String,
    /// EVM chain id of the emitting network.
    pub chain_id: u64,
    /// Contract address that emitted the event.
    pub address: String,
    /// Block number.
    pub block_number: u64,
    /// Unix timestamp of the block (seconds since epoch).
    pub block_timestamp: i64,
    /// Transaction hash.
    pub tx_hash: String,
    /// Log index within the block.
    pub log_index: u32,
    /// Decoded event arguments, keyed by ABI parameter name.
    #[serde(default)]
    pub fields_json: serde_json::Value,
}

// ─── EventMeta ───────────────────────────────────────────────────────────────

/// Where and when an event happened, with identifiers in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    pub chain_id: u64,
    /// Lowercase `0x…` address of the emitting contract.
    pub address: String,
    pub block_number: u64,
    pub block_timestamp: i64,
    /// Lowercase `0x…` transaction hash.
    pub tx_hash: String,
    pub log_index: u32,
}

impl From<&DecodedEvent> for EventMeta {
    fn from(event: &DecodedEvent) -> Self {
        Self {
            chain_id: event.chain_id,
            address: normalize_hex(&event.address),
            block_number: event.block_number,
            block_timestamp: event.block_timestamp,
            tx_hash: normalize_hex(&event.tx_hash),
            log_index: event.log_index,
        }
    }
}
