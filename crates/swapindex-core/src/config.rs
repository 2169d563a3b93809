//! Indexer configuration.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::codec::{minimal_proxy_init_code_hash, normalize_hex};
use crate::correlator::CompletionPolicy;
use crate::error::IndexerError;

/// Per-chain settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// EVM chain id (e.g. `8453` for Base, `42793` for Etherlink).
    pub chain_id: u64,
    /// Human-readable slug used in logs.
    #[serde(default)]
    pub name: String,
    /// Escrow factory address. When set, creation events from any other
    /// address on this chain are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<String>,
    /// Implementation the factory clones source escrows from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_escrow_implementation: Option<String>,
    /// Init code hash of the source escrow clone; overrides
    /// `src_escrow_implementation` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_escrow_init_code_hash: Option<String>,
}

impl ChainConfig {
    pub fn new(chain_id: u64, name: impl Into<String>) -> Self {
        Self {
            chain_id,
            name: name.into(),
            factory: None,
            src_escrow_implementation: None,
            src_escrow_init_code_hash: None,
        }
    }

    pub fn factory(mut self, address: impl Into<String>) -> Self {
        self.factory = Some(address.into());
        self
    }

    pub fn src_escrow_implementation(mut self, address: impl Into<String>) -> Self {
        self.src_escrow_implementation = Some(address.into());
        self
    }

    pub fn src_escrow_init_code_hash(mut self, hash: impl Into<String>) -> Self {
        self.src_escrow_init_code_hash = Some(hash.into());
        self
    }

    /// Factory address and clone init code hash used to derive source escrow
    /// addresses on this chain.
    pub fn src_deployment(&self) -> Result<SrcDeployment, IndexerError> {
        let factory = self.factory.as_deref().ok_or_else(|| {
            IndexerError::Config(format!("chain {}: no escrow factory configured", self.chain_id))
        })?;
        let factory = parse_address(self.chain_id, "factory", factory)?;

        let init_code_hash = match (
            self.src_escrow_init_code_hash.as_deref(),
            self.src_escrow_implementation.as_deref(),
        ) {
            (Some(hash), _) => hash.parse::<B256>().map_err(|e| {
                IndexerError::Config(format!(
                    "chain {}: invalid src_escrow_init_code_hash '{hash}': {e}",
                    self.chain_id
                ))
            })?,
            (None, Some(implementation)) => minimal_proxy_init_code_hash(parse_address(
                self.chain_id,
                "src_escrow_implementation",
                implementation,
            )?),
            (None, None) => {
                return Err(IndexerError::Config(format!(
                    "chain {}: no source escrow implementation or init code hash configured",
                    self.chain_id
                )))
            }
        };

        Ok(SrcDeployment {
            factory,
            init_code_hash,
        })
    }
}

fn parse_address(chain_id: u64, field: &str, value: &str) -> Result<Address, IndexerError> {
    value.parse::<Address>().map_err(|e| {
        IndexerError::Config(format!("chain {chain_id}: invalid {field} '{value}': {e}"))
    })
}

/// Inputs of the create2 derivation for source escrows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrcDeployment {
    pub factory: Address,
    pub init_code_hash: B256,
}

/// Configuration for an indexer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Unique name for this indexer (used for checkpoint keys).
    #[serde(default = "default_id")]
    pub id: String,
    /// Chains whose events this indexer consumes.
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    /// When a swap is considered completed.
    #[serde(default)]
    pub completion_policy: CompletionPolicy,
    /// How often to save a checkpoint (every N completed blocks per chain).
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,
}

fn default_id() -> String {
    "swapindex".into()
}

fn default_checkpoint_interval() -> u64 {
    100
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            id: default_id(),
            chains: Vec::new(),
            completion_policy: CompletionPolicy::default(),
            checkpoint_interval: default_checkpoint_interval(),
        }
    }
}

impl IndexerConfig {
    /// Settings for `chain_id`, if configured.
    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Whether a creation event emitted by `address` on `chain_id` comes
    /// from the configured factory. Chains without a factory accept any.
    pub fn accepts_factory(&self, chain_id: u64, address: &str) -> bool {
        match self.chain(chain_id).and_then(|c| c.factory.as_deref()) {
            Some(factory) => normalize_hex(factory) == normalize_hex(address),
            None => true,
        }
    }

    pub fn src_deployment(&self, chain_id: u64) -> Result<SrcDeployment, IndexerError> {
        self.chain(chain_id)
            .ok_or_else(|| IndexerError::Config(format!("chain {chain_id} is not configured")))?
            .src_deployment()
    }

    /// Reject duplicate chain ids and unparsable addresses up front.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.checkpoint_interval == 0 {
            return Err(IndexerError::Config("checkpoint_interval must be > 0".into()));
        }
        for (i, chain) in self.chains.iter().enumerate() {
            if self.chains[..i].iter().any(|c| c.chain_id == chain.chain_id) {
                return Err(IndexerError::Config(format!(
                    "chain {} configured twice",
                    chain.chain_id
                )));
            }
            if let Some(factory) = &chain.factory {
                parse_address(chain.chain_id, "factory", factory)?;
            }
            if chain.src_escrow_implementation.is_some() || chain.src_escrow_init_code_hash.is_some()
            {
                chain.src_deployment()?;
            }
        }
        Ok(())
    }
}
