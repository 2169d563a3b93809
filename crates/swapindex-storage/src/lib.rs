//! swapindex-storage: storage backends for the swap indexer.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)
//!
//! Both implement [`SwapStore`](swapindex_core::SwapStore) and
//! [`CheckpointStore`](swapindex_core::CheckpointStore), and apply a
//! [`UnitOfWork`](swapindex_core::UnitOfWork) all-or-nothing.

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryStorage;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
