//! SQLite storage backend for swapindex.
//!
//! One table per entity: key and lookup columns plus the full row as JSON in
//! `data`. A [`UnitOfWork`] runs inside a single `sqlx` transaction. Uses WAL
//! mode for concurrent read performance.
//!
//! # Usage
//! ```rust,no_run
//! use swapindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./swaps.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{Sqlite, SqlitePoolOptions};
use sqlx::{Row, SqlitePool, Transaction};
use tracing::debug;

use swapindex_core::checkpoint::{Checkpoint, CheckpointStore};
use swapindex_core::entity::{
    AtomicSwap, DestinationEscrow, EscrowCancellation, EscrowWithdrawal, FundsRescued,
    SourceEscrow,
};
use swapindex_core::error::IndexerError;
use swapindex_core::stats::ChainStatistics;
use swapindex_core::store::{StoreOp, SwapStore, UnitOfWork};

fn storage_err(e: impl std::fmt::Display) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, IndexerError> {
    serde_json::to_string(value).map_err(storage_err)
}

fn from_json<T: DeserializeOwned>(data: &str) -> Result<T, IndexerError> {
    serde_json::from_str(data).map_err(storage_err)
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS source_escrows (
        id         TEXT    PRIMARY KEY,
        chain_id   INTEGER NOT NULL,
        address    TEXT    NOT NULL,
        order_hash TEXT    NOT NULL,
        hashlock   TEXT    NOT NULL,
        status     TEXT    NOT NULL,
        data       TEXT    NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS destination_escrows (
        id         TEXT    PRIMARY KEY,
        chain_id   INTEGER NOT NULL,
        address    TEXT    NOT NULL,
        hashlock   TEXT    NOT NULL,
        status     TEXT    NOT NULL,
        data       TEXT    NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS escrow_withdrawals (
        id         TEXT    PRIMARY KEY,
        chain_id   INTEGER NOT NULL,
        escrow     TEXT    NOT NULL,
        data       TEXT    NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS escrow_cancellations (
        id         TEXT    PRIMARY KEY,
        chain_id   INTEGER NOT NULL,
        escrow     TEXT    NOT NULL,
        data       TEXT    NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS funds_rescued (
        id         TEXT    PRIMARY KEY,
        chain_id   INTEGER NOT NULL,
        escrow     TEXT    NOT NULL,
        data       TEXT    NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS atomic_swaps (
        id         TEXT    PRIMARY KEY,
        hashlock   TEXT    NOT NULL,
        status     TEXT    NOT NULL,
        data       TEXT    NOT NULL
    );",
    "CREATE INDEX IF NOT EXISTS idx_atomic_swaps_hashlock ON atomic_swaps (hashlock);",
    "CREATE TABLE IF NOT EXISTS chain_statistics (
        chain_id   INTEGER PRIMARY KEY,
        data       TEXT    NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS checkpoints (
        chain_id     INTEGER NOT NULL,
        indexer_id   TEXT    NOT NULL,
        block_number INTEGER NOT NULL,
        block_hash   TEXT    NOT NULL,
        updated_at   INTEGER NOT NULL,
        PRIMARY KEY (chain_id, indexer_id)
    );",
];

/// SQLite-backed storage for swap entities, statistics and checkpoints.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./swaps.db"`) or a full
    /// SQLite URL (`"sqlite:./swaps.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Every connection to `:memory:` is a separate database, so the pool is
    /// pinned to one connection that is never recycled. All data is lost
    /// when the pool is dropped.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }
        Ok(())
    }

    /// Fetch the `data` column of the row with `id` in `table`.
    async fn get<T: DeserializeOwned>(
        &self,
        table: &'static str,
        id: &str,
    ) -> Result<Option<T>, IndexerError> {
        let row = sqlx::query(&format!("SELECT data FROM {table} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|r| from_json(&r.get::<String, _>("data")))
            .transpose()
    }

    /// Every row of `table`, ordered by `order_by`.
    async fn all<T: DeserializeOwned>(
        &self,
        table: &'static str,
        order_by: &'static str,
    ) -> Result<Vec<T>, IndexerError> {
        let rows = sqlx::query(&format!("SELECT data FROM {table} ORDER BY {order_by}"))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.iter()
            .map(|r| from_json(&r.get::<String, _>("data")))
            .collect()
    }

    /// Apply one op inside `tx`.
    async fn apply(tx: &mut Transaction<'_, Sqlite>, op: StoreOp) -> Result<(), IndexerError> {
        let result = match op {
            StoreOp::PutSourceEscrow(e) => {
                sqlx::query(
                    "INSERT OR REPLACE INTO source_escrows
                     (id, chain_id, address, order_hash, hashlock, status, data)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&e.id)
                .bind(e.chain_id as i64)
                .bind(&e.address)
                .bind(&e.order_hash)
                .bind(&e.hashlock)
                .bind(e.status.as_str())
                .bind(to_json(&e)?)
                .execute(&mut **tx)
                .await
            }
            StoreOp::PutDestinationEscrow(e) => {
                sqlx::query(
                    "INSERT OR REPLACE INTO destination_escrows
                     (id, chain_id, address, hashlock, status, data)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(&e.id)
                .bind(e.chain_id as i64)
                .bind(&e.address)
                .bind(&e.hashlock)
                .bind(e.status.as_str())
                .bind(to_json(&e)?)
                .execute(&mut **tx)
                .await
            }
            StoreOp::PutWithdrawal(w) => {
                sqlx::query(
                    "INSERT OR REPLACE INTO escrow_withdrawals (id, chain_id, escrow, data)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(&w.id)
                .bind(w.chain_id as i64)
                .bind(&w.escrow)
                .bind(to_json(&w)?)
                .execute(&mut **tx)
                .await
            }
            StoreOp::PutCancellation(c) => {
                sqlx::query(
                    "INSERT OR REPLACE INTO escrow_cancellations (id, chain_id, escrow, data)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(&c.id)
                .bind(c.chain_id as i64)
                .bind(&c.escrow)
                .bind(to_json(&c)?)
                .execute(&mut **tx)
                .await
            }
            StoreOp::PutRescue(r) => {
                sqlx::query(
                    "INSERT OR REPLACE INTO funds_rescued (id, chain_id, escrow, data)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(&r.id)
                .bind(r.chain_id as i64)
                .bind(&r.escrow)
                .bind(to_json(&r)?)
                .execute(&mut **tx)
                .await
            }
            StoreOp::PutSwap(s) => {
                sqlx::query(
                    "INSERT OR REPLACE INTO atomic_swaps (id, hashlock, status, data)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(&s.id)
                .bind(&s.hashlock)
                .bind(s.status.as_str())
                .bind(to_json(&s)?)
                .execute(&mut **tx)
                .await
            }
            StoreOp::DeleteSwap(id) => {
                sqlx::query("DELETE FROM atomic_swaps WHERE id = ?")
                    .bind(&id)
                    .execute(&mut **tx)
                    .await
            }
            StoreOp::PutStatistics(s) => {
                sqlx::query("INSERT OR REPLACE INTO chain_statistics (chain_id, data) VALUES (?, ?)")
                    .bind(s.chain_id as i64)
                    .bind(to_json(&s)?)
                    .execute(&mut **tx)
                    .await
            }
        };
        result.map_err(storage_err)?;
        Ok(())
    }
}

// ─── SwapStore impl ──────────────────────────────────────────────────────────

#[async_trait]
impl SwapStore for SqliteStorage {
    async fn source_escrow(&self, id: &str) -> Result<Option<SourceEscrow>, IndexerError> {
        self.get("source_escrows", id).await
    }

    async fn destination_escrow(
        &self,
        id: &str,
    ) -> Result<Option<DestinationEscrow>, IndexerError> {
        self.get("destination_escrows", id).await
    }

    async fn withdrawal(&self, id: &str) -> Result<Option<EscrowWithdrawal>, IndexerError> {
        self.get("escrow_withdrawals", id).await
    }

    async fn cancellation(&self, id: &str) -> Result<Option<EscrowCancellation>, IndexerError> {
        self.get("escrow_cancellations", id).await
    }

    async fn rescue(&self, id: &str) -> Result<Option<FundsRescued>, IndexerError> {
        self.get("funds_rescued", id).await
    }

    async fn swap(&self, id: &str) -> Result<Option<AtomicSwap>, IndexerError> {
        self.get("atomic_swaps", id).await
    }

    async fn swap_by_hashlock(&self, hashlock: &str) -> Result<Option<AtomicSwap>, IndexerError> {
        let row = sqlx::query("SELECT data FROM atomic_swaps WHERE hashlock = ? ORDER BY id LIMIT 1")
            .bind(hashlock)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|r| from_json(&r.get::<String, _>("data")))
            .transpose()
    }

    async fn statistics(&self, chain_id: u64) -> Result<Option<ChainStatistics>, IndexerError> {
        let row = sqlx::query("SELECT data FROM chain_statistics WHERE chain_id = ?")
            .bind(chain_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|r| from_json(&r.get::<String, _>("data")))
            .transpose()
    }

    async fn source_escrows(&self) -> Result<Vec<SourceEscrow>, IndexerError> {
        self.all("source_escrows", "id").await
    }

    async fn destination_escrows(&self) -> Result<Vec<DestinationEscrow>, IndexerError> {
        self.all("destination_escrows", "id").await
    }

    async fn swaps(&self) -> Result<Vec<AtomicSwap>, IndexerError> {
        self.all("atomic_swaps", "id").await
    }

    async fn all_statistics(&self) -> Result<Vec<ChainStatistics>, IndexerError> {
        self.all("chain_statistics", "chain_id").await
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<(), IndexerError> {
        let ops = unit.len();
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        for op in unit.ops {
            // dropping `tx` on error rolls back
            Self::apply(&mut tx, op).await?;
        }
        tx.commit().await.map_err(storage_err)?;
        debug!(ops, "unit of work committed");
        Ok(())
    }
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteStorage {
    async fn load(
        &self,
        chain_id: u64,
        indexer_id: &str,
    ) -> Result<Option<Checkpoint>, IndexerError> {
        let row = sqlx::query(
            "SELECT chain_id, indexer_id, block_number, block_hash, updated_at
             FROM checkpoints WHERE chain_id = ? AND indexer_id = ?",
        )
        .bind(chain_id as i64)
        .bind(indexer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|r| Checkpoint {
            chain_id: r.get::<i64, _>("chain_id") as u64,
            indexer_id: r.get("indexer_id"),
            block_number: r.get::<i64, _>("block_number") as u64,
            block_hash: r.get("block_hash"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT OR REPLACE INTO checkpoints
             (chain_id, indexer_id, block_number, block_hash, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(checkpoint.chain_id as i64)
        .bind(&checkpoint.indexer_id)
        .bind(checkpoint.block_number as i64)
        .bind(&checkpoint.block_hash)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(
            chain_id = checkpoint.chain_id,
            indexer_id = %checkpoint.indexer_id,
            block = checkpoint.block_number,
            "checkpoint saved"
        );
        Ok(())
    }

    async fn delete(&self, chain_id: u64, indexer_id: &str) -> Result<(), IndexerError> {
        sqlx::query("DELETE FROM checkpoints WHERE chain_id = ? AND indexer_id = ?")
            .bind(chain_id as i64)
            .bind(indexer_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
