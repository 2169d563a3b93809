//! In-memory storage backend.
//!
//! Keeps every table and the checkpoints in RAM behind one mutex, so a
//! commit is atomic with respect to every reader. Useful for testing and
//! short-lived indexers that don't need persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use swapindex_core::checkpoint::{Checkpoint, CheckpointStore};
use swapindex_core::entity::{
    AtomicSwap, DestinationEscrow, EscrowCancellation, EscrowWithdrawal, FundsRescued,
    SourceEscrow,
};
use swapindex_core::error::IndexerError;
use swapindex_core::stats::ChainStatistics;
use swapindex_core::store::{StoreOp, SwapStore, UnitOfWork};

#[derive(Default)]
struct Tables {
    source_escrows: BTreeMap<String, SourceEscrow>,
    destination_escrows: BTreeMap<String, DestinationEscrow>,
    withdrawals: BTreeMap<String, EscrowWithdrawal>,
    cancellations: BTreeMap<String, EscrowCancellation>,
    rescues: BTreeMap<String, FundsRescued>,
    swaps: BTreeMap<String, AtomicSwap>,
    statistics: BTreeMap<u64, ChainStatistics>,
    checkpoints: HashMap<(u64, String), Checkpoint>,
}

impl Tables {
    fn apply(&mut self, op: StoreOp) {
        match op {
            StoreOp::PutSourceEscrow(e) => {
                self.source_escrows.insert(e.id.clone(), e);
            }
            StoreOp::PutDestinationEscrow(e) => {
                self.destination_escrows.insert(e.id.clone(), e);
            }
            StoreOp::PutWithdrawal(w) => {
                self.withdrawals.insert(w.id.clone(), w);
            }
            StoreOp::PutCancellation(c) => {
                self.cancellations.insert(c.id.clone(), c);
            }
            StoreOp::PutRescue(r) => {
                self.rescues.insert(r.id.clone(), r);
            }
            StoreOp::PutSwap(s) => {
                self.swaps.insert(s.id.clone(), s);
            }
            StoreOp::DeleteSwap(id) => {
                self.swaps.remove(&id);
            }
            StoreOp::PutStatistics(s) => {
                self.statistics.insert(s.chain_id, s);
            }
        }
    }
}

/// In-memory indexer storage.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStorage {
    tables: Mutex<Tables>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, IndexerError> {
        self.tables
            .lock()
            .map_err(|e| IndexerError::Storage(format!("memory store poisoned: {e}")))
    }

    /// All withdrawal facts, ordered by id.
    pub fn withdrawals(&self) -> Result<Vec<EscrowWithdrawal>, IndexerError> {
        Ok(self.tables()?.withdrawals.values().cloned().collect())
    }

    /// All cancellation facts, ordered by id.
    pub fn cancellations(&self) -> Result<Vec<EscrowCancellation>, IndexerError> {
        Ok(self.tables()?.cancellations.values().cloned().collect())
    }

    /// All rescue facts, ordered by id.
    pub fn rescues(&self) -> Result<Vec<FundsRescued>, IndexerError> {
        Ok(self.tables()?.rescues.values().cloned().collect())
    }
}

#[async_trait]
impl SwapStore for InMemoryStorage {
    async fn source_escrow(&self, id: &str) -> Result<Option<SourceEscrow>, IndexerError> {
        Ok(self.tables()?.source_escrows.get(id).cloned())
    }

    async fn destination_escrow(
        &self,
        id: &str,
    ) -> Result<Option<DestinationEscrow>, IndexerError> {
        Ok(self.tables()?.destination_escrows.get(id).cloned())
    }

    async fn withdrawal(&self, id: &str) -> Result<Option<EscrowWithdrawal>, IndexerError> {
        Ok(self.tables()?.withdrawals.get(id).cloned())
    }

    async fn cancellation(&self, id: &str) -> Result<Option<EscrowCancellation>, IndexerError> {
        Ok(self.tables()?.cancellations.get(id).cloned())
    }

    async fn rescue(&self, id: &str) -> Result<Option<FundsRescued>, IndexerError> {
        Ok(self.tables()?.rescues.get(id).cloned())
    }

    async fn swap(&self, id: &str) -> Result<Option<AtomicSwap>, IndexerError> {
        Ok(self.tables()?.swaps.get(id).cloned())
    }

    async fn swap_by_hashlock(&self, hashlock: &str) -> Result<Option<AtomicSwap>, IndexerError> {
        Ok(self
            .tables()?
            .swaps
            .values()
            .find(|s| s.hashlock == hashlock)
            .cloned())
    }

    async fn statistics(&self, chain_id: u64) -> Result<Option<ChainStatistics>, IndexerError> {
        Ok(self.tables()?.statistics.get(&chain_id).cloned())
    }

    async fn source_escrows(&self) -> Result<Vec<SourceEscrow>, IndexerError> {
        Ok(self.tables()?.source_escrows.values().cloned().collect())
    }

    async fn destination_escrows(&self) -> Result<Vec<DestinationEscrow>, IndexerError> {
        Ok(self.tables()?.destination_escrows.values().cloned().collect())
    }

    async fn swaps(&self) -> Result<Vec<AtomicSwap>, IndexerError> {
        Ok(self.tables()?.swaps.values().cloned().collect())
    }

    async fn all_statistics(&self) -> Result<Vec<ChainStatistics>, IndexerError> {
        Ok(self.tables()?.statistics.values().cloned().collect())
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<(), IndexerError> {
        let mut tables = self.tables()?;
        for op in unit.ops {
            tables.apply(op);
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStorage {
    async fn load(
        &self,
        chain_id: u64,
        indexer_id: &str,
    ) -> Result<Option<Checkpoint>, IndexerError> {
        Ok(self
            .tables()?
            .checkpoints
            .get(&(chain_id, indexer_id.to_string()))
            .cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        let key = (checkpoint.chain_id, checkpoint.indexer_id.clone());
        self.tables()?.checkpoints.insert(key, checkpoint);
        Ok(())
    }

    async fn delete(&self, chain_id: u64, indexer_id: &str) -> Result<(), IndexerError> {
        self.tables()?
            .checkpoints
            .remove(&(chain_id, indexer_id.to_string()));
        Ok(())
    }
}
