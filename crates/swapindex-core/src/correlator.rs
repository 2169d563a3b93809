//! Cross-chain correlator.
//!
//! Merges the two creation legs of a swap into one [`AtomicSwap`] regardless
//! of which chain reports first. Every merge is a join: a field that is set
//! is never cleared or replaced, and the status only moves up the
//! [`SwapStatus`] order.

use serde::{Deserialize, Serialize};

use crate::entity::{AtomicSwap, DestinationEscrow, SourceEscrow, SwapStatus};

/// When a swap counts as completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Completed once both escrows are withdrawn.
    #[default]
    BothLegsWithdrawn,
    /// Completed on the first withdrawal of either leg.
    FirstWithdrawal,
}

/// Result of merging a creation leg into a swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Merge {
    /// The merged row, plus the id of a placeholder it replaces (if re-keyed).
    Merged {
        swap: AtomicSwap,
        replaces: Option<String>,
    },
    /// The swap already links a different escrow (or order) on this leg.
    Conflict { existing: AtomicSwap },
}

/// Fill `slot` if empty. Returns `false` if it holds a different value.
fn join<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    match slot {
        Some(current) => *current == value,
        None => {
            *slot = Some(value);
            true
        }
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

/// Merge a source escrow into the swap found for its order hash (or the
/// destination-first placeholder found for its hashlock).
pub fn merge_source(existing: Option<AtomicSwap>, escrow: &SourceEscrow) -> Merge {
    let mut swap = existing
        .clone()
        .unwrap_or_else(|| AtomicSwap::for_order(&escrow.order_hash, &escrow.hashlock));

    let mut replaces = None;
    if swap.is_placeholder() {
        if swap.hashlock != escrow.hashlock {
            return Merge::Conflict { existing: swap };
        }
        replaces = Some(swap.id.clone());
        swap.id = escrow.order_hash.clone();
        swap.order_hash = Some(escrow.order_hash.clone());
    }

    let linked = swap.order_hash.as_deref() == Some(escrow.order_hash.as_str())
        && join(&mut swap.src_escrow, escrow.address.clone())
        && join(&mut swap.src_chain_id, escrow.chain_id)
        && join(&mut swap.dst_chain_id, escrow.dst_chain_id);
    if !linked {
        return Merge::Conflict {
            existing: existing.unwrap_or(swap),
        };
    }

    set_once(&mut swap.src_maker, escrow.maker.clone());
    set_once(&mut swap.src_taker, escrow.taker.clone());
    set_once(&mut swap.src_token, escrow.token.clone());
    set_once(&mut swap.src_amount, escrow.amount);
    set_once(&mut swap.src_safety_deposit, escrow.safety_deposit);
    set_once(&mut swap.timelocks, escrow.timelocks);
    set_once(&mut swap.dst_maker, escrow.dst_maker.clone());
    set_once(&mut swap.dst_token, escrow.dst_token.clone());
    set_once(&mut swap.dst_amount, escrow.dst_amount);
    set_once(&mut swap.dst_safety_deposit, escrow.dst_safety_deposit);
    set_once(&mut swap.src_created_at, escrow.created_at);
    swap.status = swap.status.join(SwapStatus::SrcCreated);

    Merge::Merged { swap, replaces }
}

/// Merge a destination escrow into the swap found for its hashlock, or start
/// a placeholder when the source leg has not been seen yet.
pub fn merge_destination(existing: Option<AtomicSwap>, escrow: &DestinationEscrow) -> Merge {
    let mut swap = existing
        .clone()
        .unwrap_or_else(|| AtomicSwap::placeholder(&escrow.hashlock));

    let linked = swap.hashlock == escrow.hashlock
        && join(&mut swap.dst_escrow, escrow.address.clone())
        && join(&mut swap.dst_chain_id, escrow.chain_id);
    if !linked {
        return Merge::Conflict {
            existing: existing.unwrap_or(swap),
        };
    }

    set_once(&mut swap.dst_taker, escrow.taker.clone());
    set_once(&mut swap.dst_created_at, escrow.created_at);
    swap.status = swap.status.join(SwapStatus::DstCreated);

    Merge::Merged {
        swap,
        replaces: None,
    }
}

/// Move `swap` toward `target`, stamping the transition time if it moves.
fn advance(swap: &mut AtomicSwap, target: SwapStatus, at: i64) {
    let next = swap.status.join(target);
    if next == swap.status {
        return;
    }
    match next {
        SwapStatus::Completed => set_once(&mut swap.completed_at, at),
        SwapStatus::Cancelled => set_once(&mut swap.cancelled_at, at),
        _ => {}
    }
    swap.status = next;
}

/// Apply a withdrawal of one leg. `other_leg_withdrawn` reports whether the
/// opposite escrow is already withdrawn.
pub fn apply_withdrawal(
    swap: &mut AtomicSwap,
    secret: &str,
    at: i64,
    other_leg_withdrawn: bool,
    policy: CompletionPolicy,
) {
    set_once(&mut swap.secret, secret.to_string());
    let completes = match policy {
        CompletionPolicy::FirstWithdrawal => true,
        CompletionPolicy::BothLegsWithdrawn => other_leg_withdrawn,
    };
    if completes {
        advance(swap, SwapStatus::Completed, at);
    }
}

/// Apply a cancellation of either leg.
pub fn apply_cancellation(swap: &mut AtomicSwap, at: i64) {
    advance(swap, SwapStatus::Cancelled, at);
}
