//! swapindex-core: event correlation engine for cross-chain atomic swaps.
//!
//! # Architecture
//!
//! ```text
//! sync engine ──DecodedEvent──▶ SwapIndexer::process
//!                                   ├── EscrowRegistry    (dynamic escrow discovery)
//!                                   ├── SwapEvent::decode (typed event variants)
//!                                   ├── HandlerRegistry   (one handler per EventKind)
//!                                   │     └── correlator  (src/dst legs → AtomicSwap)
//!                                   ├── SwapStore::commit (one UnitOfWork per event)
//!                                   └── CheckpointManager (resume position per chain)
//! ```

pub mod builder;
pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod correlator;
pub mod engine;
pub mod entity;
pub mod error;
pub mod event;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod stats;
pub mod store;
pub mod timelocks;
pub mod types;

pub use builder::IndexerBuilder;
pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointStore};
pub use config::{ChainConfig, IndexerConfig};
pub use correlator::CompletionPolicy;
pub use engine::{IgnoreReason, ProcessOutcome, SwapIndexer};
pub use entity::{
    AtomicSwap, DestinationEscrow, EscrowCancellation, EscrowSide, EscrowStatus,
    EscrowWithdrawal, FundsRescued, SourceEscrow, SwapStatus,
};
pub use error::IndexerError;
pub use event::{EventKind, SwapEvent};
pub use handler::{EventHandler, HandlerRegistry};
pub use registry::EscrowRegistry;
pub use stats::ChainStatistics;
pub use store::{StoreOp, SwapStore, UnitOfWork};
pub use types::{DecodedEvent, EventMeta};
