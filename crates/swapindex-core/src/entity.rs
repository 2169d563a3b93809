//! Indexed entities.
//!
//! Every row is keyed by a string id that embeds the chain id, so rows from
//! the two networks never collide. The engine is the only writer; the
//! storage layer holds a projection of these rows.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::codec::decode_packed_address;
use crate::event::SrcEscrowCreated;
use crate::timelocks::Timelocks;
use crate::types::EventMeta;

// ─── Keys ─────────────────────────────────────────────────────────────────────

/// `"{chain_id}-{address}"`, for escrow rows.
pub fn escrow_id(chain_id: u64, address: &str) -> String {
    format!("{chain_id}-{address}")
}

/// `"{chain_id}-{address}-{tx_hash}"`, for withdrawal and cancellation facts.
pub fn fact_id(meta: &EventMeta) -> String {
    format!("{}-{}-{}", meta.chain_id, meta.address, meta.tx_hash)
}

/// `"{chain_id}-{address}-{tx_hash}-{log_index}"`, for rescue facts, which can
/// repeat within one transaction.
pub fn rescue_id(meta: &EventMeta) -> String {
    format!("{}-{}", fact_id(meta), meta.log_index)
}

// ─── Status enums ─────────────────────────────────────────────────────────────

/// Which side of a swap an escrow belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowSide {
    Source,
    Destination,
}

impl std::fmt::Display for EscrowSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// Per-escrow state: `created -> {withdrawn | cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Created,
    Withdrawn,
    Cancelled,
}

impl EscrowStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Created)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Withdrawn => "withdrawn",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Lifecycle of a cross-chain swap.
///
/// Partially ordered:
/// `pending < {src_created, dst_created} < both_created < {completed, cancelled}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    #[default]
    Pending,
    SrcCreated,
    DstCreated,
    BothCreated,
    Completed,
    Cancelled,
}

impl SwapStatus {
    /// Height in the partial order.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::SrcCreated | Self::DstCreated => 1,
            Self::BothCreated => 2,
            Self::Completed | Self::Cancelled => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 3
    }

    /// Least upper bound of two statuses. Terminal states absorb everything
    /// after them, so the first terminal status reached wins.
    pub fn join(self, other: SwapStatus) -> SwapStatus {
        if self.is_terminal() || self == other {
            return self;
        }
        match self.rank().cmp(&other.rank()) {
            std::cmp::Ordering::Less => other,
            std::cmp::Ordering::Greater => self,
            // src_created vs dst_created
            std::cmp::Ordering::Equal => SwapStatus::BothCreated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::SrcCreated => "src_created",
            Self::DstCreated => "dst_created",
            Self::BothCreated => "both_created",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

// ─── Escrows ──────────────────────────────────────────────────────────────────

/// Escrow deployed on the source chain for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEscrow {
    pub id: String,
    pub chain_id: u64,
    pub address: String,
    pub order_hash: String,
    pub hashlock: String,
    pub maker: String,
    pub taker: String,
    pub token: String,
    pub amount: U256,
    pub safety_deposit: U256,
    pub dst_maker: String,
    pub dst_token: String,
    pub dst_amount: U256,
    pub dst_safety_deposit: U256,
    pub dst_chain_id: u64,
    /// Raw packed timelocks word.
    pub timelocks: U256,
    pub decoded_timelocks: Timelocks,
    pub created_block: u64,
    pub created_at: i64,
    pub created_tx: String,
    pub status: EscrowStatus,
}

impl SourceEscrow {
    /// Build the row for a freshly created escrow at `address`.
    pub fn created(meta: &EventMeta, address: &str, event: &SrcEscrowCreated) -> Self {
        let src = &event.src;
        let dst = &event.dst;
        Self {
            id: escrow_id(meta.chain_id, address),
            chain_id: meta.chain_id,
            address: address.to_string(),
            order_hash: format!("0x{}", hex::encode(src.order_hash)),
            hashlock: format!("0x{}", hex::encode(src.hashlock)),
            maker: decode_packed_address(src.maker),
            taker: decode_packed_address(src.taker),
            token: decode_packed_address(src.token),
            amount: src.amount,
            safety_deposit: src.safety_deposit,
            dst_maker: decode_packed_address(dst.maker),
            dst_token: decode_packed_address(dst.token),
            dst_amount: dst.amount,
            dst_safety_deposit: dst.safety_deposit,
            dst_chain_id: dst.chain_id,
            timelocks: src.timelocks,
            decoded_timelocks: src.decoded_timelocks(),
            created_block: meta.block_number,
            created_at: meta.block_timestamp,
            created_tx: meta.tx_hash.clone(),
            status: EscrowStatus::Created,
        }
    }
}

/// Escrow deployed on the destination chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationEscrow {
    pub id: String,
    pub chain_id: u64,
    pub address: String,
    pub hashlock: String,
    pub taker: String,
    /// Source-chain cancellation deadline this escrow must respect.
    pub src_cancellation_timestamp: Option<u64>,
    pub created_block: u64,
    pub created_at: i64,
    pub created_tx: String,
    pub status: EscrowStatus,
}

// ─── Facts ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowWithdrawal {
    pub id: String,
    pub chain_id: u64,
    pub escrow: String,
    pub secret: String,
    pub block_number: u64,
    pub timestamp: i64,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowCancellation {
    pub id: String,
    pub chain_id: u64,
    pub escrow: String,
    pub block_number: u64,
    pub timestamp: i64,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsRescued {
    pub id: String,
    pub chain_id: u64,
    pub escrow: String,
    pub token: String,
    pub amount: U256,
    pub block_number: u64,
    pub timestamp: i64,
    pub tx_hash: String,
    pub log_index: u32,
}

// ─── AtomicSwap ───────────────────────────────────────────────────────────────

/// Merged view of one cross-chain swap.
///
/// Keyed by order hash. A destination leg seen before its source leg creates
/// a placeholder keyed by hashlock (with `order_hash == None`), which is
/// re-keyed when the source leg arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicSwap {
    pub id: String,
    pub order_hash: Option<String>,
    pub hashlock: String,
    pub src_chain_id: Option<u64>,
    pub dst_chain_id: Option<u64>,
    pub src_escrow: Option<String>,
    pub dst_escrow: Option<String>,
    pub src_maker: Option<String>,
    pub src_taker: Option<String>,
    pub dst_maker: Option<String>,
    pub dst_taker: Option<String>,
    pub src_token: Option<String>,
    pub src_amount: Option<U256>,
    pub src_safety_deposit: Option<U256>,
    pub dst_token: Option<String>,
    pub dst_amount: Option<U256>,
    pub dst_safety_deposit: Option<U256>,
    pub timelocks: Option<U256>,
    pub status: SwapStatus,
    pub src_created_at: Option<i64>,
    pub dst_created_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub secret: Option<String>,
}

impl AtomicSwap {
    /// Empty swap for an order whose legs have not been seen yet.
    pub fn for_order(order_hash: &str, hashlock: &str) -> Self {
        Self {
            id: order_hash.to_string(),
            order_hash: Some(order_hash.to_string()),
            hashlock: hashlock.to_string(),
            ..Default::default()
        }
    }

    /// Placeholder for a destination leg whose order hash is still unknown.
    pub fn placeholder(hashlock: &str) -> Self {
        Self {
            id: hashlock.to_string(),
            order_hash: None,
            hashlock: hashlock.to_string(),
            ..Default::default()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.order_hash.is_none()
    }

    /// Escrow row id of one leg, once linked.
    pub fn leg_escrow_id(&self, side: EscrowSide) -> Option<String> {
        let (chain, address) = match side {
            EscrowSide::Source => (self.src_chain_id, self.src_escrow.as_deref()),
            EscrowSide::Destination => (self.dst_chain_id, self.dst_escrow.as_deref()),
        };
        Some(escrow_id(chain?, address?))
    }
}
