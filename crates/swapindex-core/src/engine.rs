//! `SwapIndexer`: the entry point the sync engine feeds decoded events into.
//!
//! Per event: filter by schema, factory or escrow registry, decode into a
//! [`SwapEvent`], let the handler for its kind compute a [`UnitOfWork`],
//! commit it, and only then register newly discovered escrows. The whole
//! sequence runs under one async mutex, so events from concurrently driven
//! chains never interleave their read-compute-commit steps.
//!
//! [`UnitOfWork`]: crate::store::UnitOfWork

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::checkpoint::{CheckpointManager, CheckpointStore};
use crate::config::IndexerConfig;
use crate::entity::EscrowSide;
use crate::error::IndexerError;
use crate::event::{EventKind, SwapEvent};
use crate::handler::{HandlerContext, HandlerRegistry};
use crate::registry::EscrowRegistry;
use crate::store::SwapStore;
use crate::types::{DecodedEvent, EventMeta};

/// Why an event was skipped without touching storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Not one of the escrow event schemas.
    UnknownSchema,
    /// A creation event emitted by a contract other than the configured factory.
    UnknownFactory,
    /// An escrow-level event from an address the registry does not track.
    UnregisteredEscrow,
}

/// Result of [`SwapIndexer::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The event's writes were committed.
    Applied(EventKind),
    /// The event had already been applied; nothing was written.
    Duplicate(EventKind),
    Ignored(IgnoreReason),
}

struct EngineState {
    registry: EscrowRegistry,
    checkpoints: CheckpointManager,
}

/// Cross-chain swap indexer over a storage backend `S`.
pub struct SwapIndexer<S> {
    config: IndexerConfig,
    store: Arc<S>,
    handlers: HandlerRegistry,
    state: Mutex<EngineState>,
}

impl<S> SwapIndexer<S>
where
    S: SwapStore + CheckpointStore + 'static,
{
    /// Indexer with the built-in handlers.
    pub fn new(config: IndexerConfig, store: Arc<S>) -> Self {
        Self::with_handlers(config, store, HandlerRegistry::standard())
    }

    pub fn with_handlers(config: IndexerConfig, store: Arc<S>, handlers: HandlerRegistry) -> Self {
        let checkpoints = CheckpointManager::new(
            store.clone() as Arc<dyn CheckpointStore>,
            config.id.clone(),
            config.checkpoint_interval,
        );
        Self {
            config,
            store,
            handlers,
            state: Mutex::new(EngineState {
                registry: EscrowRegistry::new(),
                checkpoints,
            }),
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Rebuild the escrow registry from the committed escrow rows.
    ///
    /// Returns the number of escrows now tracked.
    pub async fn restore(&self) -> Result<usize, IndexerError> {
        let sources = self.store.source_escrows().await?;
        let destinations = self.store.destination_escrows().await?;

        let mut state = self.state.lock().await;
        for e in &sources {
            state.registry.register(e.chain_id, &e.address, EscrowSide::Source);
        }
        for e in &destinations {
            state
                .registry
                .register(e.chain_id, &e.address, EscrowSide::Destination);
        }
        let tracked = state.registry.len();
        tracing::info!(indexer = %self.config.id, tracked, "Escrow registry restored");
        Ok(tracked)
    }

    /// Apply one decoded event.
    ///
    /// Errors leave storage and the registry exactly as they were; the event
    /// can be redelivered.
    pub async fn process(&self, event: &DecodedEvent) -> Result<ProcessOutcome, IndexerError> {
        let Some(kind) = EventKind::from_schema(&event.schema) else {
            tracing::debug!(schema = %event.schema, "Unknown schema, skipping");
            return Ok(ProcessOutcome::Ignored(IgnoreReason::UnknownSchema));
        };
        let meta = EventMeta::from(event);

        let mut state = self.state.lock().await;

        let side = if kind.is_factory_event() {
            if !self.config.accepts_factory(meta.chain_id, &meta.address) {
                tracing::debug!(chain_id = meta.chain_id, address = %meta.address, %kind, "Not the configured factory, skipping");
                return Ok(ProcessOutcome::Ignored(IgnoreReason::UnknownFactory));
            }
            None
        } else {
            match state.registry.side_of(meta.chain_id, &meta.address) {
                Some(side) => Some(side),
                None => {
                    tracing::debug!(chain_id = meta.chain_id, address = %meta.address, %kind, "Unregistered escrow, skipping");
                    return Ok(ProcessOutcome::Ignored(IgnoreReason::UnregisteredEscrow));
                }
            }
        };

        let decoded = match SwapEvent::decode(kind, event) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::error!(
                    chain_id = meta.chain_id,
                    block = meta.block_number,
                    tx = %meta.tx_hash,
                    log_index = meta.log_index,
                    error = %e,
                    "Failed to decode event"
                );
                return Err(e);
            }
        };

        let handler = self.handlers.get(kind).ok_or_else(|| IndexerError::Handler {
            handler: kind.to_string(),
            reason: "no handler registered".into(),
        })?;
        let ctx = HandlerContext {
            meta: &meta,
            store: self.store.as_ref(),
            config: &self.config,
            side,
        };
        let outcome = handler.handle(&decoded, &ctx).await?;

        if !outcome.unit.is_empty() {
            let ops = outcome.unit.len();
            self.store.commit(outcome.unit).await?;
            tracing::info!(
                chain_id = meta.chain_id,
                block = meta.block_number,
                tx = %meta.tx_hash,
                %kind,
                ops,
                "Event applied"
            );
        }

        if let Some(d) = outcome.discovered {
            state.registry.register(d.chain_id, &d.address, d.side);
        }

        if outcome.duplicate {
            tracing::debug!(chain_id = meta.chain_id, tx = %meta.tx_hash, %kind, "Duplicate event");
            Ok(ProcessOutcome::Duplicate(kind))
        } else {
            Ok(ProcessOutcome::Applied(kind))
        }
    }

    /// Report that every event of `block_number` on `chain_id` has been
    /// processed. Saves a checkpoint every `checkpoint_interval` blocks.
    pub async fn complete_block(
        &self,
        chain_id: u64,
        block_number: u64,
        block_hash: &str,
    ) -> Result<(), IndexerError> {
        let mut state = self.state.lock().await;
        state
            .checkpoints
            .maybe_save(chain_id, block_number, block_hash)
            .await?;
        Ok(())
    }

    /// Save checkpoints for every completed block not yet persisted.
    pub async fn flush_checkpoints(&self) -> Result<(), IndexerError> {
        self.state.lock().await.checkpoints.flush().await
    }

    /// First block the sync engine should deliver for `chain_id`, or `None`
    /// if this indexer has never checkpointed it.
    pub async fn resume_block(&self, chain_id: u64) -> Result<Option<u64>, IndexerError> {
        let state = self.state.lock().await;
        Ok(state
            .checkpoints
            .load(chain_id)
            .await?
            .map(|cp| cp.block_number + 1))
    }

    pub async fn is_tracked(&self, chain_id: u64, address: &str) -> bool {
        self.state.lock().await.registry.contains(chain_id, address)
    }

    /// Tracked escrow addresses on `chain_id`, for the sync engine's log filter.
    pub async fn tracked_escrows(&self, chain_id: u64) -> Vec<String> {
        self.state.lock().await.registry.addresses(chain_id)
    }
}
