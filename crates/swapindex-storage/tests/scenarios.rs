//! End-to-end tests: decoded events through `SwapIndexer` into a real backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy_primitives::U256;
use async_trait::async_trait;
use serde_json::{json, Value};

use swapindex_core::{
    AtomicSwap, ChainConfig, ChainStatistics, Checkpoint, CheckpointStore, CompletionPolicy,
    DecodedEvent, DestinationEscrow, EscrowCancellation, EscrowStatus, EscrowWithdrawal, EventKind,
    FundsRescued, IgnoreReason, IndexerBuilder, IndexerError, ProcessOutcome, SourceEscrow,
    SwapIndexer, SwapStatus, SwapStore, UnitOfWork,
};
use swapindex_storage::InMemoryStorage;

const SRC_CHAIN: u64 = 8453;
const DST_CHAIN: u64 = 42793;
const SRC_FACTORY: &str = "0xa7bcb4eac8964306f9e3764f67db6a7af6ddf99a";
const DST_FACTORY: &str = "0x00000000000000000000000000000000000000fd";
const SRC_IMPL: &str = "0x1111111111111111111111111111111111111111";
const DST_ESCROW: &str = "0x00000000000000000000000000000000000000ee";
const OTHER_DST_ESCROW: &str = "0x00000000000000000000000000000000000000ef";
const DEPLOYED_AT: u64 = 1_700_000_000;
const SRC_CANCELLATION_OFFSET: u64 = 3_600;

fn h(byte: &str) -> String {
    format!("0x{}", byte.repeat(32))
}

fn indexer_with<S>(store: Arc<S>, policy: CompletionPolicy) -> SwapIndexer<S>
where
    S: SwapStore + CheckpointStore + 'static,
{
    IndexerBuilder::new()
        .id("scenarios")
        .chain(
            ChainConfig::new(SRC_CHAIN, "base")
                .factory(SRC_FACTORY)
                .src_escrow_implementation(SRC_IMPL),
        )
        .chain(ChainConfig::new(DST_CHAIN, "etherlink").factory(DST_FACTORY))
        .completion_policy(policy)
        .build(store)
        .unwrap()
}

fn indexer() -> (Arc<InMemoryStorage>, SwapIndexer<InMemoryStorage>) {
    let store = Arc::new(InMemoryStorage::new());
    let indexer = indexer_with(store.clone(), CompletionPolicy::BothLegsWithdrawn);
    (store, indexer)
}

fn ev(schema: &str, chain_id: u64, address: &str, block: u64, tx: &str, fields: Value) -> DecodedEvent {
    DecodedEvent {
        schema: schema.into(),
        chain_id,
        address: address.into(),
        block_number: block,
        block_timestamp: DEPLOYED_AT as i64 + block as i64,
        tx_hash: h(tx),
        log_index: 0,
        fields_json: fields,
    }
}

fn packed_timelocks() -> U256 {
    (U256::from(DEPLOYED_AT) << 224usize) | (U256::from(SRC_CANCELLATION_OFFSET) << 64usize)
}

fn src_created(order: &str, amount: u64) -> DecodedEvent {
    ev(
        "SrcEscrowCreated",
        SRC_CHAIN,
        SRC_FACTORY,
        100,
        "01",
        json!({
            "srcImmutables": {
                "orderHash": h(order),
                "hashlock": h("bb"),
                "maker": "0x1111111111111111111111111111111111111111",
                "taker": "0x2222222222222222222222222222222222222222",
                "token": "0x3333333333333333333333333333333333333333",
                "amount": amount.to_string(),
                "safetyDeposit": "1",
                "timelocks": packed_timelocks().to_string()
            },
            "dstImmutablesComplement": {
                "maker": "0x4444444444444444444444444444444444444444",
                "amount": "99",
                "token": "0x5555555555555555555555555555555555555555",
                "safetyDeposit": "1",
                "chainId": DST_CHAIN
            }
        }),
    )
}

fn dst_created_at(escrow: &str, tx: &str) -> DecodedEvent {
    ev(
        "DstEscrowCreated",
        DST_CHAIN,
        DST_FACTORY,
        200,
        tx,
        json!({
            "escrow": escrow,
            "hashlock": h("bb"),
            "taker": "0x2222222222222222222222222222222222222222"
        }),
    )
}

fn dst_created() -> DecodedEvent {
    dst_created_at(DST_ESCROW, "02")
}

fn withdrawal(chain_id: u64, escrow: &str, tx: &str) -> DecodedEvent {
    ev("EscrowWithdrawal", chain_id, escrow, 300, tx, json!({ "secret": h("cc") }))
}

fn cancellation(chain_id: u64, escrow: &str, tx: &str) -> DecodedEvent {
    ev("EscrowCancelled", chain_id, escrow, 400, tx, Value::Null)
}

async fn src_escrow<S: SwapStore>(store: &S) -> SourceEscrow {
    let mut rows = store.source_escrows().await.unwrap();
    assert_eq!(rows.len(), 1);
    rows.remove(0)
}

async fn stats<S: SwapStore>(store: &S, chain_id: u64) -> ChainStatistics {
    store.statistics(chain_id).await.unwrap().unwrap()
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_source_escrow_created() {
    let (store, indexer) = indexer();

    let out = indexer.process(&src_created("aa", 100)).await.unwrap();
    assert_eq!(out, ProcessOutcome::Applied(EventKind::SrcEscrowCreated));

    let escrow = src_escrow(store.as_ref()).await;
    assert_eq!(escrow.id, format!("{SRC_CHAIN}-{}", escrow.address));
    assert_eq!(escrow.status, EscrowStatus::Created);
    assert_eq!(escrow.maker, "0x1111111111111111111111111111111111111111");
    assert_eq!(escrow.dst_chain_id, DST_CHAIN);
    assert_eq!(escrow.decoded_timelocks.deployed_at, DEPLOYED_AT);
    assert!(indexer.is_tracked(SRC_CHAIN, &escrow.address).await);

    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.status, SwapStatus::SrcCreated);
    assert_eq!(swap.src_escrow.as_deref(), Some(escrow.address.as_str()));

    let s = stats(store.as_ref(), SRC_CHAIN).await;
    assert_eq!(s.id, "8453");
    assert_eq!(s.total_src_escrows, 1);
    assert_eq!(s.total_volume_locked, U256::from(100u64));
}

#[tokio::test]
async fn scenario_b_destination_joins_swap() {
    let (store, indexer) = indexer();
    indexer.process(&src_created("aa", 100)).await.unwrap();

    let out = indexer.process(&dst_created()).await.unwrap();
    assert_eq!(out, ProcessOutcome::Applied(EventKind::DstEscrowCreated));

    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.status, SwapStatus::BothCreated);
    assert_eq!(swap.dst_chain_id, Some(DST_CHAIN));
    assert_eq!(swap.dst_escrow.as_deref(), Some(DST_ESCROW));

    let dst = store
        .destination_escrow(&format!("{DST_CHAIN}-{DST_ESCROW}"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dst.src_cancellation_timestamp, Some(DEPLOYED_AT + SRC_CANCELLATION_OFFSET));
    assert_eq!(stats(store.as_ref(), DST_CHAIN).await.total_dst_escrows, 1);
}

#[tokio::test]
async fn scenario_c_destination_withdrawal_reveals_secret() {
    let (store, indexer) = indexer();
    indexer.process(&src_created("aa", 100)).await.unwrap();
    indexer.process(&dst_created()).await.unwrap();

    let out = indexer.process(&withdrawal(DST_CHAIN, DST_ESCROW, "03")).await.unwrap();
    assert_eq!(out, ProcessOutcome::Applied(EventKind::EscrowWithdrawal));

    let dst = store
        .destination_escrow(&format!("{DST_CHAIN}-{DST_ESCROW}"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dst.status, EscrowStatus::Withdrawn);

    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.secret, Some(h("cc")));
    // only one leg withdrawn under the default policy
    assert_eq!(swap.status, SwapStatus::BothCreated);

    let s = stats(store.as_ref(), DST_CHAIN).await;
    assert_eq!(s.total_withdrawals, 1);
    assert_eq!(s.total_volume_withdrawn, U256::from(99u64));
    assert_eq!(
        store.withdrawals().unwrap()[0].id,
        format!("{DST_CHAIN}-{DST_ESCROW}-{}", h("03"))
    );
}

#[tokio::test]
async fn scenario_d_duplicate_cancellation_counts_once() {
    let (store, indexer) = indexer();
    indexer.process(&src_created("aa", 100)).await.unwrap();
    let src = src_escrow(store.as_ref()).await;

    let cancel = cancellation(SRC_CHAIN, &src.address, "04");
    assert_eq!(
        indexer.process(&cancel).await.unwrap(),
        ProcessOutcome::Applied(EventKind::EscrowCancelled)
    );
    assert_eq!(
        indexer.process(&cancel).await.unwrap(),
        ProcessOutcome::Duplicate(EventKind::EscrowCancelled)
    );

    assert_eq!(stats(store.as_ref(), SRC_CHAIN).await.total_cancellations, 1);
    assert_eq!(store.cancellations().unwrap().len(), 1);
    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.status, SwapStatus::Cancelled);
    assert_eq!(swap.cancelled_at, Some(DEPLOYED_AT as i64 + 400));
}

// ─── Correlation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn correlation_is_order_independent() {
    let (store_a, src_first) = indexer();
    src_first.process(&src_created("aa", 100)).await.unwrap();
    src_first.process(&dst_created()).await.unwrap();

    let (store_b, dst_first) = indexer();
    dst_first.process(&dst_created()).await.unwrap();
    let placeholder = store_b.swap(&h("bb")).await.unwrap().unwrap();
    assert!(placeholder.is_placeholder());
    assert_eq!(placeholder.status, SwapStatus::DstCreated);
    dst_first.process(&src_created("aa", 100)).await.unwrap();

    assert!(store_b.swap(&h("bb")).await.unwrap().is_none());
    assert_eq!(store_a.swaps().await.unwrap(), store_b.swaps().await.unwrap());
    assert_eq!(
        store_a.destination_escrows().await.unwrap(),
        store_b.destination_escrows().await.unwrap()
    );
    assert_eq!(
        store_a.all_statistics().await.unwrap(),
        store_b.all_statistics().await.unwrap()
    );
}

#[tokio::test]
async fn second_destination_escrow_does_not_relink() {
    let (store, indexer) = indexer();
    indexer.process(&src_created("aa", 100)).await.unwrap();
    indexer.process(&dst_created()).await.unwrap();

    let out = indexer
        .process(&dst_created_at(OTHER_DST_ESCROW, "05"))
        .await
        .unwrap();
    assert_eq!(out, ProcessOutcome::Applied(EventKind::DstEscrowCreated));

    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.dst_escrow.as_deref(), Some(DST_ESCROW));
    // the escrow row and its counter are still recorded
    assert_eq!(store.destination_escrows().await.unwrap().len(), 2);
    assert_eq!(stats(store.as_ref(), DST_CHAIN).await.total_dst_escrows, 2);
}

#[tokio::test]
async fn unlinked_escrow_cancellation_leaves_swap_alone() {
    let (store, indexer) = indexer();
    indexer.process(&src_created("aa", 100)).await.unwrap();
    indexer.process(&dst_created()).await.unwrap();
    indexer.process(&dst_created_at(OTHER_DST_ESCROW, "05")).await.unwrap();

    let out = indexer
        .process(&cancellation(DST_CHAIN, OTHER_DST_ESCROW, "09"))
        .await
        .unwrap();
    assert_eq!(out, ProcessOutcome::Applied(EventKind::EscrowCancelled));

    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.status, SwapStatus::BothCreated);
    assert!(swap.cancelled_at.is_none());
    assert_eq!(swap.dst_escrow.as_deref(), Some(DST_ESCROW));

    // the unlinked escrow itself still records its own lifecycle
    let other = store
        .destination_escrow(&format!("{DST_CHAIN}-{OTHER_DST_ESCROW}"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(other.status, EscrowStatus::Cancelled);
    assert_eq!(stats(store.as_ref(), DST_CHAIN).await.total_cancellations, 1);
}

#[tokio::test]
async fn unlinked_escrow_withdrawal_does_not_complete_swap() {
    let (store, indexer) = indexer();
    indexer.process(&src_created("aa", 100)).await.unwrap();
    indexer.process(&dst_created()).await.unwrap();
    indexer.process(&dst_created_at(OTHER_DST_ESCROW, "05")).await.unwrap();
    let src = src_escrow(store.as_ref()).await;
    indexer.process(&withdrawal(SRC_CHAIN, &src.address, "06")).await.unwrap();

    indexer
        .process(&withdrawal(DST_CHAIN, OTHER_DST_ESCROW, "03"))
        .await
        .unwrap();

    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.status, SwapStatus::BothCreated);
    assert!(swap.completed_at.is_none());
    let linked = store
        .destination_escrow(&format!("{DST_CHAIN}-{DST_ESCROW}"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(linked.status, EscrowStatus::Created);

    let s = stats(store.as_ref(), DST_CHAIN).await;
    assert_eq!(s.total_withdrawals, 1);
    assert_eq!(s.total_volume_withdrawn, U256::ZERO);

    // the linked escrow still completes the swap
    indexer.process(&withdrawal(DST_CHAIN, DST_ESCROW, "07")).await.unwrap();
    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.status, SwapStatus::Completed);
    assert_eq!(
        stats(store.as_ref(), DST_CHAIN).await.total_volume_withdrawn,
        U256::from(99u64)
    );
}

// ─── Completion policy ───────────────────────────────────────────────────────

#[tokio::test]
async fn both_legs_withdrawn_completes_swap() {
    let (store, indexer) = indexer();
    indexer.process(&src_created("aa", 100)).await.unwrap();
    indexer.process(&dst_created()).await.unwrap();
    let src = src_escrow(store.as_ref()).await;

    indexer.process(&withdrawal(DST_CHAIN, DST_ESCROW, "03")).await.unwrap();
    indexer.process(&withdrawal(SRC_CHAIN, &src.address, "06")).await.unwrap();

    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.status, SwapStatus::Completed);
    assert_eq!(swap.completed_at, Some(DEPLOYED_AT as i64 + 300));
    assert_eq!(
        stats(store.as_ref(), SRC_CHAIN).await.total_volume_withdrawn,
        U256::from(100u64)
    );

    // a late cancellation cannot undo completion
    let out = indexer.process(&cancellation(SRC_CHAIN, &src.address, "07")).await.unwrap();
    assert_eq!(out, ProcessOutcome::Duplicate(EventKind::EscrowCancelled));
    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.status, SwapStatus::Completed);
}

#[tokio::test]
async fn first_withdrawal_policy_completes_immediately() {
    let store = Arc::new(InMemoryStorage::new());
    let indexer = indexer_with(store.clone(), CompletionPolicy::FirstWithdrawal);
    indexer.process(&src_created("aa", 100)).await.unwrap();
    indexer.process(&dst_created()).await.unwrap();

    indexer.process(&withdrawal(DST_CHAIN, DST_ESCROW, "03")).await.unwrap();

    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.status, SwapStatus::Completed);
}

// ─── Idempotency & conservation ──────────────────────────────────────────────

fn rescue(escrow: &str, log_index: u32) -> DecodedEvent {
    let mut e = ev(
        "FundsRescued",
        DST_CHAIN,
        escrow,
        500,
        "08",
        json!({ "token": "0x5555555555555555555555555555555555555555", "amount": "3" }),
    );
    e.log_index = log_index;
    e
}

/// Apply `events`, then apply them again and check the second pass is a
/// no-op on every table.
async fn apply_twice(
    indexer: &SwapIndexer<InMemoryStorage>,
    store: &InMemoryStorage,
    events: &[DecodedEvent],
) {
    for e in events {
        indexer.process(e).await.unwrap();
    }
    let swaps = store.swaps().await.unwrap();
    let sources = store.source_escrows().await.unwrap();
    let destinations = store.destination_escrows().await.unwrap();
    let all_stats = store.all_statistics().await.unwrap();

    for e in events {
        let out = indexer.process(e).await.unwrap();
        assert!(matches!(out, ProcessOutcome::Duplicate(_)), "{} -> {out:?}", e.schema);
    }
    assert_eq!(store.swaps().await.unwrap(), swaps);
    assert_eq!(store.source_escrows().await.unwrap(), sources);
    assert_eq!(store.destination_escrows().await.unwrap(), destinations);
    assert_eq!(store.all_statistics().await.unwrap(), all_stats);
}

#[tokio::test]
async fn replay_is_idempotent() {
    let (store, indexer) = indexer();
    indexer.process(&src_created("aa", 100)).await.unwrap();
    let src = src_escrow(store.as_ref()).await;

    let events = vec![
        src_created("aa", 100),
        dst_created(),
        withdrawal(DST_CHAIN, DST_ESCROW, "03"),
        withdrawal(SRC_CHAIN, &src.address, "06"),
        rescue(DST_ESCROW, 0),
    ];
    apply_twice(&indexer, &store, &events).await;
    assert_eq!(store.rescues().unwrap().len(), 1);
    assert_eq!(store.swap(&h("aa")).await.unwrap().unwrap().status, SwapStatus::Completed);
}

#[tokio::test]
async fn replay_is_idempotent_destination_first() {
    let (store, indexer) = indexer();
    indexer.process(&dst_created()).await.unwrap();
    assert!(store.swap(&h("bb")).await.unwrap().unwrap().is_placeholder());
    indexer.process(&src_created("aa", 100)).await.unwrap();
    let src = src_escrow(store.as_ref()).await;

    let events = vec![
        dst_created(),
        src_created("aa", 100),
        withdrawal(DST_CHAIN, DST_ESCROW, "03"),
        withdrawal(SRC_CHAIN, &src.address, "06"),
    ];
    apply_twice(&indexer, &store, &events).await;

    // the placeholder stays re-keyed under the order hash
    assert!(store.swap(&h("bb")).await.unwrap().is_none());
    let swaps = store.swaps().await.unwrap();
    assert_eq!(swaps.len(), 1);
    assert_eq!(swaps[0].id, h("aa"));
    assert_eq!(swaps[0].status, SwapStatus::Completed);
}

#[tokio::test]
async fn replay_is_idempotent_with_cancellations() {
    let (store, indexer) = indexer();
    indexer.process(&src_created("aa", 100)).await.unwrap();
    let src = src_escrow(store.as_ref()).await;

    let events = vec![
        src_created("aa", 100),
        dst_created(),
        cancellation(DST_CHAIN, DST_ESCROW, "09"),
        cancellation(SRC_CHAIN, &src.address, "0a"),
    ];
    apply_twice(&indexer, &store, &events).await;

    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.status, SwapStatus::Cancelled);
    assert_eq!(swap.cancelled_at, Some(DEPLOYED_AT as i64 + 400));
    assert_eq!(store.cancellations().unwrap().len(), 2);
    assert_eq!(stats(store.as_ref(), SRC_CHAIN).await.total_cancellations, 1);
    assert_eq!(stats(store.as_ref(), DST_CHAIN).await.total_cancellations, 1);
}

#[tokio::test]
async fn rescues_in_one_transaction_are_kept_apart() {
    let (store, indexer) = indexer();
    indexer.process(&dst_created()).await.unwrap();

    for log_index in [0, 1] {
        let out = indexer.process(&rescue(DST_ESCROW, log_index)).await.unwrap();
        assert_eq!(out, ProcessOutcome::Applied(EventKind::FundsRescued));
    }
    let rows = store.rescues().unwrap();
    assert_eq!(rows.len(), 2);
    assert_ne!(rows[0].id, rows[1].id);
    assert_eq!(rows[0].tx_hash, rows[1].tx_hash);

    for log_index in [0, 1] {
        let out = indexer.process(&rescue(DST_ESCROW, log_index)).await.unwrap();
        assert_eq!(out, ProcessOutcome::Duplicate(EventKind::FundsRescued));
    }
    assert_eq!(store.rescues().unwrap().len(), 2);
    // rescues move no counters
    assert_eq!(stats(store.as_ref(), DST_CHAIN).await.total_withdrawals, 0);
}

#[tokio::test]
async fn counters_match_committed_rows() {
    let (store, indexer) = indexer();
    indexer.process(&src_created("aa", 100)).await.unwrap();
    indexer.process(&src_created("a1", 50)).await.unwrap();
    indexer.process(&dst_created()).await.unwrap();
    indexer.process(&withdrawal(DST_CHAIN, DST_ESCROW, "03")).await.unwrap();
    indexer.process(&cancellation(DST_CHAIN, DST_ESCROW, "09")).await.unwrap();

    let src_rows = store.source_escrows().await.unwrap();
    let src_stats = stats(store.as_ref(), SRC_CHAIN).await;
    assert_eq!(src_stats.total_src_escrows, src_rows.len() as u64);
    assert_eq!(src_stats.total_volume_locked, U256::from(150u64));

    let dst_stats = stats(store.as_ref(), DST_CHAIN).await;
    assert_eq!(dst_stats.total_dst_escrows, 1);
    assert_eq!(dst_stats.total_withdrawals, store.withdrawals().unwrap().len() as u64);
    // cancellation after withdrawal is a duplicate
    assert_eq!(dst_stats.total_cancellations, 0);
    assert!(store.cancellations().unwrap().is_empty());
}

// ─── Filtering & failures ────────────────────────────────────────────────────

#[tokio::test]
async fn unregistered_escrow_events_are_ignored() {
    let (store, indexer) = indexer();
    let out = indexer.process(&withdrawal(DST_CHAIN, DST_ESCROW, "03")).await.unwrap();
    assert_eq!(out, ProcessOutcome::Ignored(IgnoreReason::UnregisteredEscrow));
    assert!(store.withdrawals().unwrap().is_empty());
    assert!(store.all_statistics().await.unwrap().is_empty());
}

#[tokio::test]
async fn decode_failure_leaves_store_untouched() {
    let (store, indexer) = indexer();
    let mut bad = src_created("aa", 100);
    bad.fields_json["srcImmutables"]["amount"] = json!("not a number");

    let err = indexer.process(&bad).await.unwrap_err();
    assert!(err.is_decode());
    assert!(store.source_escrows().await.unwrap().is_empty());
    assert!(store.swaps().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_deployment_config_is_a_config_error() {
    let store = Arc::new(InMemoryStorage::new());
    let indexer = IndexerBuilder::new().build(store.clone()).unwrap();

    let err = indexer.process(&src_created("aa", 100)).await.unwrap_err();
    assert!(matches!(err, IndexerError::Config(_)));
    assert!(store.source_escrows().await.unwrap().is_empty());
}

/// Delegates to `InMemoryStorage` but can be told to fail commits.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryStorage,
    fail_commits: AtomicBool,
}

#[async_trait]
impl SwapStore for FlakyStore {
    async fn source_escrow(&self, id: &str) -> Result<Option<SourceEscrow>, IndexerError> {
        self.inner.source_escrow(id).await
    }
    async fn destination_escrow(&self, id: &str) -> Result<Option<DestinationEscrow>, IndexerError> {
        self.inner.destination_escrow(id).await
    }
    async fn withdrawal(&self, id: &str) -> Result<Option<EscrowWithdrawal>, IndexerError> {
        self.inner.withdrawal(id).await
    }
    async fn cancellation(&self, id: &str) -> Result<Option<EscrowCancellation>, IndexerError> {
        self.inner.cancellation(id).await
    }
    async fn rescue(&self, id: &str) -> Result<Option<FundsRescued>, IndexerError> {
        self.inner.rescue(id).await
    }
    async fn swap(&self, id: &str) -> Result<Option<AtomicSwap>, IndexerError> {
        self.inner.swap(id).await
    }
    async fn swap_by_hashlock(&self, hashlock: &str) -> Result<Option<AtomicSwap>, IndexerError> {
        self.inner.swap_by_hashlock(hashlock).await
    }
    async fn statistics(&self, chain_id: u64) -> Result<Option<ChainStatistics>, IndexerError> {
        self.inner.statistics(chain_id).await
    }
    async fn source_escrows(&self) -> Result<Vec<SourceEscrow>, IndexerError> {
        self.inner.source_escrows().await
    }
    async fn destination_escrows(&self) -> Result<Vec<DestinationEscrow>, IndexerError> {
        self.inner.destination_escrows().await
    }
    async fn swaps(&self) -> Result<Vec<AtomicSwap>, IndexerError> {
        self.inner.swaps().await
    }
    async fn all_statistics(&self) -> Result<Vec<ChainStatistics>, IndexerError> {
        self.inner.all_statistics().await
    }
    async fn commit(&self, unit: UnitOfWork) -> Result<(), IndexerError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(IndexerError::Storage("disk full".into()));
        }
        self.inner.commit(unit).await
    }
}

#[async_trait]
impl CheckpointStore for FlakyStore {
    async fn load(&self, chain_id: u64, indexer_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        self.inner.load(chain_id, indexer_id).await
    }
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        self.inner.save(checkpoint).await
    }
    async fn delete(&self, chain_id: u64, indexer_id: &str) -> Result<(), IndexerError> {
        self.inner.delete(chain_id, indexer_id).await
    }
}

#[tokio::test]
async fn failed_commit_does_not_register_escrow() {
    let store = Arc::new(FlakyStore::default());
    let indexer = indexer_with(store.clone(), CompletionPolicy::BothLegsWithdrawn);

    store.fail_commits.store(true, Ordering::SeqCst);
    let err = indexer.process(&dst_created()).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(!indexer.is_tracked(DST_CHAIN, DST_ESCROW).await);
    assert!(store.destination_escrows().await.unwrap().is_empty());

    // redelivery after the backend recovers
    store.fail_commits.store(false, Ordering::SeqCst);
    let out = indexer.process(&dst_created()).await.unwrap();
    assert_eq!(out, ProcessOutcome::Applied(EventKind::DstEscrowCreated));
    assert!(indexer.is_tracked(DST_CHAIN, DST_ESCROW).await);
    assert_eq!(stats(store.as_ref(), DST_CHAIN).await.total_dst_escrows, 1);
}

// ─── Restart ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn restore_rebuilds_registry_from_rows() {
    let (store, first) = indexer();
    first.process(&src_created("aa", 100)).await.unwrap();
    first.process(&dst_created()).await.unwrap();
    first.complete_block(DST_CHAIN, 200, "0xblock").await.unwrap();
    first.flush_checkpoints().await.unwrap();
    drop(first);

    let restarted = indexer_with(store.clone(), CompletionPolicy::BothLegsWithdrawn);
    assert_eq!(restarted.resume_block(DST_CHAIN).await.unwrap(), Some(201));
    assert!(!restarted.is_tracked(DST_CHAIN, DST_ESCROW).await);
    assert_eq!(restarted.restore().await.unwrap(), 2);

    let out = restarted.process(&withdrawal(DST_CHAIN, DST_ESCROW, "03")).await.unwrap();
    assert_eq!(out, ProcessOutcome::Applied(EventKind::EscrowWithdrawal));
}

#[tokio::test]
async fn replayed_creation_reregisters_escrow() {
    let (store, first) = indexer();
    first.process(&dst_created()).await.unwrap();
    drop(first);

    let restarted = indexer_with(store.clone(), CompletionPolicy::BothLegsWithdrawn);
    let out = restarted.process(&dst_created()).await.unwrap();
    assert_eq!(out, ProcessOutcome::Duplicate(EventKind::DstEscrowCreated));
    assert!(restarted.is_tracked(DST_CHAIN, DST_ESCROW).await);
    assert_eq!(stats(store.as_ref(), DST_CHAIN).await.total_dst_escrows, 1);
}

// ─── SQLite backend ──────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_backend_runs_scenarios_a_to_c() {
    use swapindex_storage::SqliteStorage;

    let store = Arc::new(SqliteStorage::in_memory().await.unwrap());
    let indexer = indexer_with(store.clone(), CompletionPolicy::BothLegsWithdrawn);

    indexer.process(&dst_created()).await.unwrap();
    indexer.process(&src_created("aa", 100)).await.unwrap();
    indexer.process(&withdrawal(DST_CHAIN, DST_ESCROW, "03")).await.unwrap();

    let swap = store.swap(&h("aa")).await.unwrap().unwrap();
    assert_eq!(swap.status, SwapStatus::BothCreated);
    assert_eq!(swap.secret, Some(h("cc")));
    assert!(store.swap(&h("bb")).await.unwrap().is_none());

    assert_eq!(stats(store.as_ref(), SRC_CHAIN).await.total_volume_locked, U256::from(100u64));
    assert_eq!(stats(store.as_ref(), DST_CHAIN).await.total_withdrawals, 1);
}
