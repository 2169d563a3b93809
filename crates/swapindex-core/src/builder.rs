//! Fluent builder API for creating swap indexers.
//!
//! # Example
//!
//! ```rust,no_run
//! use swapindex_core::{ChainConfig, CompletionPolicy, IndexerBuilder};
//!
//! let config = IndexerBuilder::new()
//!     .id("fusion-base-etherlink")
//!     .chain(
//!         ChainConfig::new(8453, "base")
//!             .factory("0xa7bcb4eac8964306f9e3764f67db6a7af6ddf99a")
//!             .src_escrow_implementation("0x1111111111111111111111111111111111111111"),
//!     )
//!     .chain(ChainConfig::new(42793, "etherlink"))
//!     .completion_policy(CompletionPolicy::BothLegsWithdrawn)
//!     .build_config()
//!     .expect("valid config");
//! ```

use std::sync::Arc;

use crate::checkpoint::CheckpointStore;
use crate::config::{ChainConfig, IndexerConfig};
use crate::correlator::CompletionPolicy;
use crate::engine::SwapIndexer;
use crate::error::IndexerError;
use crate::handler::HandlerRegistry;
use crate::store::SwapStore;

/// Fluent builder for `IndexerConfig` and `SwapIndexer`.
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
    handlers: Option<HandlerRegistry>,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config (e.g. one loaded from a file).
    pub fn from_config(config: IndexerConfig) -> Self {
        Self {
            config,
            handlers: None,
        }
    }

    /// Set the indexer ID (used for checkpoint keys).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Add a chain, replacing an earlier entry with the same chain id.
    pub fn chain(mut self, chain: ChainConfig) -> Self {
        self.config.chains.retain(|c| c.chain_id != chain.chain_id);
        self.config.chains.push(chain);
        self
    }

    pub fn completion_policy(mut self, policy: CompletionPolicy) -> Self {
        self.config.completion_policy = policy;
        self
    }

    /// Set checkpoint save interval (every N blocks).
    pub fn checkpoint_interval(mut self, n: u64) -> Self {
        self.config.checkpoint_interval = n;
        self
    }

    /// Replace the built-in handlers.
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Build and validate the `IndexerConfig`.
    pub fn build_config(self) -> Result<IndexerConfig, IndexerError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build an indexer over `store`.
    pub fn build<S>(self, store: Arc<S>) -> Result<SwapIndexer<S>, IndexerError>
    where
        S: SwapStore + CheckpointStore + 'static,
    {
        let handlers = self.handlers.unwrap_or_else(HandlerRegistry::standard);
        self.config.validate()?;
        Ok(SwapIndexer::with_handlers(self.config, store, handlers))
    }
}
