//! Checkpoint manager: persists the last fully applied block per chain.
//!
//! Every unit of work is committed before its block is reported complete, so
//! a checkpoint never points past data that is missing from the store. On
//! restart the sync engine resumes from the block after the checkpoint;
//! re-applying events of a partially processed block is harmless because all
//! writes are keyed upserts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

/// A persisted checkpoint for one chain of an indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub chain_id: u64,
    /// Unique indexer identifier.
    pub indexer_id: String,
    /// Last fully applied block number.
    pub block_number: u64,
    /// Hash of that block, if the sync engine supplied one.
    pub block_hash: String,
    /// Unix timestamp of when this checkpoint was saved.
    pub updated_at: i64,
}

/// Trait for storing and loading checkpoints.
///
/// Implemented by `InMemoryStorage` and `SqliteStorage`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the latest checkpoint for a given chain + indexer pair.
    async fn load(&self, chain_id: u64, indexer_id: &str)
        -> Result<Option<Checkpoint>, IndexerError>;

    /// Save (upsert) a checkpoint.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError>;

    /// Delete a checkpoint (e.g. when resetting an indexer).
    async fn delete(&self, chain_id: u64, indexer_id: &str) -> Result<(), IndexerError>;
}

/// Throttles checkpoint writes to one every `save_interval` blocks per chain.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    indexer_id: String,
    save_interval: u64,
    /// Blocks completed since the last save, per chain.
    counters: HashMap<u64, u64>,
    /// Last completed block not yet saved, per chain.
    pending: HashMap<u64, (u64, String)>,
}

impl CheckpointManager {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        indexer_id: impl Into<String>,
        save_interval: u64,
    ) -> Self {
        Self {
            store,
            indexer_id: indexer_id.into(),
            save_interval: save_interval.max(1),
            counters: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn indexer_id(&self) -> &str {
        &self.indexer_id
    }

    /// Load the saved checkpoint for `chain_id` (returns `None` if none exists).
    pub async fn load(&self, chain_id: u64) -> Result<Option<Checkpoint>, IndexerError> {
        self.store.load(chain_id, &self.indexer_id).await
    }

    /// Record that `block_number` is fully applied, saving every
    /// `save_interval` blocks.
    ///
    /// Returns `true` if a checkpoint was written.
    pub async fn maybe_save(
        &mut self,
        chain_id: u64,
        block_number: u64,
        block_hash: &str,
    ) -> Result<bool, IndexerError> {
        let counter = self.counters.entry(chain_id).or_default();
        *counter += 1;
        if *counter < self.save_interval {
            self.pending
                .insert(chain_id, (block_number, block_hash.to_string()));
            return Ok(false);
        }
        self.force_save(chain_id, block_number, block_hash).await?;
        Ok(true)
    }

    /// Immediately save a checkpoint for `chain_id`.
    pub async fn force_save(
        &mut self,
        chain_id: u64,
        block_number: u64,
        block_hash: &str,
    ) -> Result<(), IndexerError> {
        let cp = Checkpoint {
            chain_id,
            indexer_id: self.indexer_id.clone(),
            block_number,
            block_hash: block_hash.to_string(),
            updated_at: chrono::Utc::now().timestamp(),
        };
        self.store.save(cp).await?;
        self.counters.insert(chain_id, 0);
        self.pending.remove(&chain_id);
        tracing::debug!(chain_id, block_number, "Checkpoint saved");
        Ok(())
    }

    /// Save every block completed since the last save (used on shutdown).
    pub async fn flush(&mut self) -> Result<(), IndexerError> {
        let mut pending: Vec<(u64, (u64, String))> = self.pending.drain().collect();
        pending.sort_by_key(|(chain, _)| *chain);
        for (chain_id, (block_number, block_hash)) in pending {
            self.force_save(chain_id, block_number, &block_hash).await?;
        }
        Ok(())
    }
}
