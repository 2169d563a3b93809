//! Built-in handlers, one per escrow event kind.

use alloy_primitives::U256;
use async_trait::async_trait;

use crate::codec::compute_deployment_address;
use crate::correlator::{self, Merge};
use crate::entity::{
    escrow_id, fact_id, rescue_id, AtomicSwap, DestinationEscrow, EscrowCancellation,
    EscrowSide, EscrowStatus, EscrowWithdrawal, FundsRescued, SourceEscrow,
};
use crate::error::IndexerError;
use crate::event::{EventKind, SwapEvent};
use crate::handler::{Discovery, EventHandler, HandlerContext, HandlerOutcome};
use crate::stats::ChainStatistics;
use crate::store::{StoreOp, UnitOfWork};
use crate::timelocks::{Stage, Timelocks};

fn mismatch(handler: &str, event: &SwapEvent) -> IndexerError {
    IndexerError::Handler {
        handler: handler.to_string(),
        reason: format!("unexpected event {}", event.kind()),
    }
}

async fn load_statistics(
    ctx: &HandlerContext<'_>,
    chain_id: u64,
) -> Result<ChainStatistics, IndexerError> {
    Ok(ctx
        .store
        .statistics(chain_id)
        .await?
        .unwrap_or_else(|| ChainStatistics::new(chain_id)))
}

fn src_cancellation_deadline(timelocks: U256) -> u64 {
    Timelocks::from_packed(timelocks).stage_deadline(Stage::SrcCancellation)
}

// ─── Creation ────────────────────────────────────────────────────────────────

/// Derives the source escrow address, records the escrow and merges it into
/// the swap for its order.
pub struct SrcEscrowCreatedHandler;

#[async_trait]
impl EventHandler for SrcEscrowCreatedHandler {
    fn kind(&self) -> EventKind {
        EventKind::SrcEscrowCreated
    }

    async fn handle(
        &self,
        event: &SwapEvent,
        ctx: &HandlerContext<'_>,
    ) -> Result<HandlerOutcome, IndexerError> {
        let SwapEvent::SrcEscrowCreated(created) = event else {
            return Err(mismatch("SrcEscrowCreatedHandler", event));
        };
        let meta = ctx.meta;
        let deployment = ctx.config.src_deployment(meta.chain_id)?;
        let address = compute_deployment_address(
            deployment.factory,
            created.src.salt(),
            deployment.init_code_hash,
        );
        let discovery = Discovery {
            chain_id: meta.chain_id,
            address: address.clone(),
            side: EscrowSide::Source,
        };

        let escrow = SourceEscrow::created(meta, &address, created);
        if ctx.store.source_escrow(&escrow.id).await?.is_some() {
            return Ok(HandlerOutcome::duplicate().discovering(discovery));
        }

        let mut unit = UnitOfWork::new();

        let existing = match ctx.store.swap(&escrow.order_hash).await? {
            Some(swap) => Some(swap),
            None => ctx.store.swap_by_hashlock(&escrow.hashlock).await?,
        };
        match correlator::merge_source(existing, &escrow) {
            Merge::Merged { swap, replaces } => {
                if let Some(old) = replaces {
                    unit.push(StoreOp::DeleteSwap(old));
                }
                if let Some(dst) = backfill_deadline(ctx, &swap, &escrow).await? {
                    unit.push(StoreOp::PutDestinationEscrow(dst));
                }
                unit.push(StoreOp::PutSwap(swap));
            }
            Merge::Conflict { existing } => {
                tracing::warn!(
                    swap = %existing.id,
                    linked = ?existing.src_escrow,
                    rejected = %escrow.address,
                    "Source escrow conflicts with the linked swap, link unchanged"
                );
            }
        }

        let mut stats = load_statistics(ctx, meta.chain_id).await?;
        stats.record_src_escrow(escrow.amount, meta.block_number);
        unit.push(StoreOp::PutSourceEscrow(escrow));
        unit.push(StoreOp::PutStatistics(stats));

        Ok(HandlerOutcome::applied(unit).discovering(discovery))
    }
}

/// Fill the source cancellation deadline of an already linked destination
/// escrow that was created without one.
async fn backfill_deadline(
    ctx: &HandlerContext<'_>,
    swap: &AtomicSwap,
    src: &SourceEscrow,
) -> Result<Option<DestinationEscrow>, IndexerError> {
    let Some(dst_id) = swap.leg_escrow_id(EscrowSide::Destination) else {
        return Ok(None);
    };
    let Some(mut dst) = ctx.store.destination_escrow(&dst_id).await? else {
        return Ok(None);
    };
    if dst.src_cancellation_timestamp.is_some() {
        return Ok(None);
    }
    dst.src_cancellation_timestamp = Some(src_cancellation_deadline(src.timelocks));
    Ok(Some(dst))
}

/// Records the destination escrow and merges it into the swap for its
/// hashlock, starting a placeholder when the source leg is still unknown.
pub struct DstEscrowCreatedHandler;

#[async_trait]
impl EventHandler for DstEscrowCreatedHandler {
    fn kind(&self) -> EventKind {
        EventKind::DstEscrowCreated
    }

    async fn handle(
        &self,
        event: &SwapEvent,
        ctx: &HandlerContext<'_>,
    ) -> Result<HandlerOutcome, IndexerError> {
        let SwapEvent::DstEscrowCreated(created) = event else {
            return Err(mismatch("DstEscrowCreatedHandler", event));
        };
        let meta = ctx.meta;
        let discovery = Discovery {
            chain_id: meta.chain_id,
            address: created.escrow.clone(),
            side: EscrowSide::Destination,
        };

        let id = escrow_id(meta.chain_id, &created.escrow);
        if ctx.store.destination_escrow(&id).await?.is_some() {
            return Ok(HandlerOutcome::duplicate().discovering(discovery));
        }

        let existing = ctx.store.swap_by_hashlock(&created.hashlock).await?;
        let src_cancellation_timestamp = created.src_cancellation_timestamp.or_else(|| {
            existing
                .as_ref()
                .and_then(|s| s.timelocks)
                .map(src_cancellation_deadline)
        });
        let escrow = DestinationEscrow {
            id,
            chain_id: meta.chain_id,
            address: created.escrow.clone(),
            hashlock: created.hashlock.clone(),
            taker: created.taker.clone(),
            src_cancellation_timestamp,
            created_block: meta.block_number,
            created_at: meta.block_timestamp,
            created_tx: meta.tx_hash.clone(),
            status: EscrowStatus::Created,
        };

        let mut unit = UnitOfWork::new();
        match correlator::merge_destination(existing, &escrow) {
            Merge::Merged { swap, .. } => {
                if swap.is_placeholder() {
                    tracing::debug!(hashlock = %swap.hashlock, "Destination leg seen first, placeholder swap");
                }
                unit.push(StoreOp::PutSwap(swap));
            }
            Merge::Conflict { existing } => {
                tracing::warn!(
                    swap = %existing.id,
                    linked = ?existing.dst_escrow,
                    rejected = %escrow.address,
                    "Destination escrow conflicts with the linked swap, link unchanged"
                );
            }
        }

        let mut stats = load_statistics(ctx, meta.chain_id).await?;
        stats.record_dst_escrow(meta.block_number);
        unit.push(StoreOp::PutDestinationEscrow(escrow));
        unit.push(StoreOp::PutStatistics(stats));

        Ok(HandlerOutcome::applied(unit).discovering(discovery))
    }
}

// ─── Escrow lifecycle ────────────────────────────────────────────────────────

/// The escrow an escrow-level event was emitted by.
enum Leg {
    Source(SourceEscrow),
    Destination(DestinationEscrow),
}

impl Leg {
    async fn load(ctx: &HandlerContext<'_>) -> Result<Self, IndexerError> {
        let meta = ctx.meta;
        let id = escrow_id(meta.chain_id, &meta.address);
        let missing = || IndexerError::Handler {
            handler: "escrow".into(),
            reason: format!("tracked escrow {id} has no stored row"),
        };
        match ctx.side {
            Some(EscrowSide::Source) => ctx
                .store
                .source_escrow(&id)
                .await?
                .map(Leg::Source)
                .ok_or_else(missing),
            Some(EscrowSide::Destination) => ctx
                .store
                .destination_escrow(&id)
                .await?
                .map(Leg::Destination)
                .ok_or_else(missing),
            None => Err(IndexerError::Handler {
                handler: "escrow".into(),
                reason: format!("escrow {id} is not tracked"),
            }),
        }
    }

    fn side(&self) -> EscrowSide {
        match self {
            Leg::Source(_) => EscrowSide::Source,
            Leg::Destination(_) => EscrowSide::Destination,
        }
    }

    fn status(&self) -> EscrowStatus {
        match self {
            Leg::Source(e) => e.status,
            Leg::Destination(e) => e.status,
        }
    }

    fn id(&self) -> &str {
        match self {
            Leg::Source(e) => &e.id,
            Leg::Destination(e) => &e.id,
        }
    }

    /// The swap this escrow is linked to, if any. An escrow rejected by the
    /// correlator shares the swap's key but is not linked to it.
    async fn swap(&self, ctx: &HandlerContext<'_>) -> Result<Option<AtomicSwap>, IndexerError> {
        let swap = match self {
            Leg::Source(e) => ctx.store.swap(&e.order_hash).await?,
            Leg::Destination(e) => ctx.store.swap_by_hashlock(&e.hashlock).await?,
        };
        Ok(swap.filter(|s| {
            let linked = match self {
                Leg::Source(e) => s.src_escrow.as_deref() == Some(e.address.as_str()),
                Leg::Destination(e) => s.dst_escrow.as_deref() == Some(e.address.as_str()),
            };
            if !linked {
                tracing::warn!(
                    swap = %s.id,
                    escrow = %self.id(),
                    "Escrow is not linked to the swap, swap left unchanged"
                );
            }
            linked
        }))
    }

    /// Write op moving this escrow to `status`.
    fn transition(self, status: EscrowStatus) -> StoreOp {
        match self {
            Leg::Source(mut e) => {
                e.status = status;
                StoreOp::PutSourceEscrow(e)
            }
            Leg::Destination(mut e) => {
                e.status = status;
                StoreOp::PutDestinationEscrow(e)
            }
        }
    }
}

/// Status of the escrow on the other side of `swap`, once linked and stored.
async fn other_leg_status(
    ctx: &HandlerContext<'_>,
    swap: &AtomicSwap,
    side: EscrowSide,
) -> Result<Option<EscrowStatus>, IndexerError> {
    let other = match side {
        EscrowSide::Source => EscrowSide::Destination,
        EscrowSide::Destination => EscrowSide::Source,
    };
    let Some(id) = swap.leg_escrow_id(other) else {
        return Ok(None);
    };
    Ok(match other {
        EscrowSide::Source => ctx.store.source_escrow(&id).await?.map(|e| e.status),
        EscrowSide::Destination => ctx.store.destination_escrow(&id).await?.map(|e| e.status),
    })
}

/// Records a withdrawal, reveals the secret on the swap and completes it
/// according to the configured policy.
pub struct WithdrawalHandler;

#[async_trait]
impl EventHandler for WithdrawalHandler {
    fn kind(&self) -> EventKind {
        EventKind::EscrowWithdrawal
    }

    async fn handle(
        &self,
        event: &SwapEvent,
        ctx: &HandlerContext<'_>,
    ) -> Result<HandlerOutcome, IndexerError> {
        let SwapEvent::EscrowWithdrawal(args) = event else {
            return Err(mismatch("WithdrawalHandler", event));
        };
        let meta = ctx.meta;
        let leg = Leg::load(ctx).await?;
        if leg.status().is_terminal() {
            return Ok(HandlerOutcome::duplicate());
        }

        let mut unit = UnitOfWork::new();
        unit.push(StoreOp::PutWithdrawal(EscrowWithdrawal {
            id: fact_id(meta),
            chain_id: meta.chain_id,
            escrow: leg.id().to_string(),
            secret: args.secret.clone(),
            block_number: meta.block_number,
            timestamp: meta.block_timestamp,
            tx_hash: meta.tx_hash.clone(),
        }));

        let side = leg.side();
        let swap = leg.swap(ctx).await?;
        // destination volume is known only through the linked swap
        let amount = match (&leg, &swap) {
            (Leg::Source(e), _) => e.amount,
            (Leg::Destination(_), Some(swap)) => swap.dst_amount.unwrap_or(U256::ZERO),
            (Leg::Destination(_), None) => U256::ZERO,
        };

        if let Some(mut swap) = swap {
            let other_withdrawn =
                other_leg_status(ctx, &swap, side).await? == Some(EscrowStatus::Withdrawn);
            let before = swap.clone();
            correlator::apply_withdrawal(
                &mut swap,
                &args.secret,
                meta.block_timestamp,
                other_withdrawn,
                ctx.config.completion_policy,
            );
            if swap != before {
                unit.push(StoreOp::PutSwap(swap));
            }
        }

        unit.push(leg.transition(EscrowStatus::Withdrawn));
        let mut stats = load_statistics(ctx, meta.chain_id).await?;
        stats.record_withdrawal(amount, meta.block_number);
        unit.push(StoreOp::PutStatistics(stats));

        Ok(HandlerOutcome::applied(unit))
    }
}

/// Records a cancellation; the swap is cancelled once either leg cancels.
pub struct CancellationHandler;

#[async_trait]
impl EventHandler for CancellationHandler {
    fn kind(&self) -> EventKind {
        EventKind::EscrowCancelled
    }

    async fn handle(
        &self,
        event: &SwapEvent,
        ctx: &HandlerContext<'_>,
    ) -> Result<HandlerOutcome, IndexerError> {
        if !matches!(event, SwapEvent::EscrowCancelled) {
            return Err(mismatch("CancellationHandler", event));
        }
        let meta = ctx.meta;
        let leg = Leg::load(ctx).await?;
        if leg.status().is_terminal() {
            return Ok(HandlerOutcome::duplicate());
        }

        let mut unit = UnitOfWork::new();
        unit.push(StoreOp::PutCancellation(EscrowCancellation {
            id: fact_id(meta),
            chain_id: meta.chain_id,
            escrow: leg.id().to_string(),
            block_number: meta.block_number,
            timestamp: meta.block_timestamp,
            tx_hash: meta.tx_hash.clone(),
        }));

        if let Some(mut swap) = leg.swap(ctx).await? {
            let before = swap.status;
            correlator::apply_cancellation(&mut swap, meta.block_timestamp);
            if swap.status != before {
                unit.push(StoreOp::PutSwap(swap));
            }
        }

        unit.push(leg.transition(EscrowStatus::Cancelled));
        let mut stats = load_statistics(ctx, meta.chain_id).await?;
        stats.record_cancellation(meta.block_number);
        unit.push(StoreOp::PutStatistics(stats));

        Ok(HandlerOutcome::applied(unit))
    }
}

/// Appends a rescue record. Rescues touch neither statuses nor counters.
pub struct RescueHandler;

#[async_trait]
impl EventHandler for RescueHandler {
    fn kind(&self) -> EventKind {
        EventKind::FundsRescued
    }

    async fn handle(
        &self,
        event: &SwapEvent,
        ctx: &HandlerContext<'_>,
    ) -> Result<HandlerOutcome, IndexerError> {
        let SwapEvent::FundsRescued(args) = event else {
            return Err(mismatch("RescueHandler", event));
        };
        let meta = ctx.meta;
        let id = rescue_id(meta);
        if ctx.store.rescue(&id).await?.is_some() {
            return Ok(HandlerOutcome::duplicate());
        }

        let mut unit = UnitOfWork::new();
        unit.push(StoreOp::PutRescue(FundsRescued {
            id,
            chain_id: meta.chain_id,
            escrow: escrow_id(meta.chain_id, &meta.address),
            token: args.token.clone(),
            amount: args.amount,
            block_number: meta.block_number,
            timestamp: meta.block_timestamp,
            tx_hash: meta.tx_hash.clone(),
            log_index: meta.log_index,
        }));
        Ok(HandlerOutcome::applied(unit))
    }
}
