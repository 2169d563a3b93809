//! Storage seam.
//!
//! Handlers read through [`SwapStore`] and describe their writes as a
//! [`UnitOfWork`]; the engine hands the whole unit to
//! [`SwapStore::commit`], which must apply it all-or-nothing. Every write is
//! an upsert or delete by key, so re-committing the same unit is harmless.

use async_trait::async_trait;

use crate::entity::{
    AtomicSwap, DestinationEscrow, EscrowCancellation, EscrowWithdrawal, FundsRescued,
    SourceEscrow,
};
use crate::error::IndexerError;
use crate::stats::ChainStatistics;

/// A single keyed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    PutSourceEscrow(SourceEscrow),
    PutDestinationEscrow(DestinationEscrow),
    PutWithdrawal(EscrowWithdrawal),
    PutCancellation(EscrowCancellation),
    PutRescue(FundsRescued),
    PutSwap(AtomicSwap),
    /// Remove a swap row (a placeholder that was re-keyed under its order hash).
    DeleteSwap(String),
    PutStatistics(ChainStatistics),
}

/// All writes produced by one event, applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOfWork {
    pub ops: Vec<StoreOp>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: StoreOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Read access to the indexed tables plus atomic commits.
///
/// Implementations: `InMemoryStorage` and `SqliteStorage` in
/// `swapindex-storage`.
#[async_trait]
pub trait SwapStore: Send + Sync {
    async fn source_escrow(&self, id: &str) -> Result<Option<SourceEscrow>, IndexerError>;

    async fn destination_escrow(&self, id: &str)
        -> Result<Option<DestinationEscrow>, IndexerError>;

    async fn withdrawal(&self, id: &str) -> Result<Option<EscrowWithdrawal>, IndexerError>;

    async fn cancellation(&self, id: &str) -> Result<Option<EscrowCancellation>, IndexerError>;

    async fn rescue(&self, id: &str) -> Result<Option<FundsRescued>, IndexerError>;

    async fn swap(&self, id: &str) -> Result<Option<AtomicSwap>, IndexerError>;

    /// The swap correlated by `hashlock`, if any.
    async fn swap_by_hashlock(&self, hashlock: &str) -> Result<Option<AtomicSwap>, IndexerError>;

    async fn statistics(&self, chain_id: u64) -> Result<Option<ChainStatistics>, IndexerError>;

    /// All source escrows, ordered by id.
    async fn source_escrows(&self) -> Result<Vec<SourceEscrow>, IndexerError>;

    /// All destination escrows, ordered by id.
    async fn destination_escrows(&self) -> Result<Vec<DestinationEscrow>, IndexerError>;

    /// All swaps, ordered by id.
    async fn swaps(&self) -> Result<Vec<AtomicSwap>, IndexerError>;

    /// Statistics for every chain seen, ordered by chain id.
    async fn all_statistics(&self) -> Result<Vec<ChainStatistics>, IndexerError>;

    /// Apply every op in `unit`, or none of them.
    async fn commit(&self, unit: UnitOfWork) -> Result<(), IndexerError>;
}
