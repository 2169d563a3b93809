//! Typed escrow events.
//!
//! One variant per on-chain event kind, each carrying a payload shaped like
//! its ABI. Decoding is the only place loosely-typed arguments are touched;
//! everything downstream dispatches on [`EventKind`].

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{self, decode_packed_address, keccak256};
use crate::error::IndexerError;
use crate::timelocks::Timelocks;
use crate::types::DecodedEvent;

// ─── EventKind ───────────────────────────────────────────────────────────────

/// Tag of a [`SwapEvent`], also the key handlers are registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    SrcEscrowCreated,
    DstEscrowCreated,
    EscrowWithdrawal,
    EscrowCancelled,
    FundsRescued,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::SrcEscrowCreated,
        EventKind::DstEscrowCreated,
        EventKind::EscrowWithdrawal,
        EventKind::EscrowCancelled,
        EventKind::FundsRescued,
    ];

    /// The ABI event name.
    pub fn schema_name(&self) -> &'static str {
        match self {
            Self::SrcEscrowCreated => "SrcEscrowCreated",
            Self::DstEscrowCreated => "DstEscrowCreated",
            Self::EscrowWithdrawal => "EscrowWithdrawal",
            Self::EscrowCancelled => "EscrowCancelled",
            Self::FundsRescued => "FundsRescued",
        }
    }

    pub fn from_schema(schema: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.schema_name() == schema)
    }

    /// Emitted by the escrow factory rather than by an escrow instance.
    pub fn is_factory_event(&self) -> bool {
        matches!(self, Self::SrcEscrowCreated | Self::DstEscrowCreated)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.schema_name())
    }
}

// ─── Payloads ────────────────────────────────────────────────────────────────

/// Source-side escrow immutables, exactly as emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Immutables {
    pub order_hash: B256,
    pub hashlock: B256,
    /// Packed `Address` words.
    pub maker: U256,
    pub taker: U256,
    pub token: U256,
    pub amount: U256,
    pub safety_deposit: U256,
    /// Packed timelocks (deployment timestamp already filled in).
    pub timelocks: U256,
}

impl Immutables {
    /// create2 salt the factory deploys the escrow clone with:
    /// keccak256 of the static ABI encoding of all eight words.
    pub fn salt(&self) -> B256 {
        let mut encoded = Vec::with_capacity(8 * 32);
        encoded.extend_from_slice(self.order_hash.as_slice());
        encoded.extend_from_slice(self.hashlock.as_slice());
        for word in [
            self.maker,
            self.taker,
            self.token,
            self.amount,
            self.safety_deposit,
            self.timelocks,
        ] {
            encoded.extend_from_slice(&word.to_be_bytes::<32>());
        }
        B256::from(keccak256(&encoded))
    }

    pub fn decoded_timelocks(&self) -> Timelocks {
        Timelocks::from_packed(self.timelocks)
    }
}

/// Destination-side parameters the source factory commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DstImmutablesComplement {
    pub maker: U256,
    pub amount: U256,
    pub token: U256,
    pub safety_deposit: U256,
    pub chain_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcEscrowCreated {
    pub src: Immutables,
    pub dst: DstImmutablesComplement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DstEscrowCreated {
    pub escrow: String,
    pub hashlock: String,
    pub taker: String,
    /// Only present when the sync engine reads it from the creation call.
    pub src_cancellation_timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalArgs {
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescueArgs {
    pub token: String,
    pub amount: U256,
}

// ─── SwapEvent ───────────────────────────────────────────────────────────────

/// A decoded escrow event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapEvent {
    SrcEscrowCreated(SrcEscrowCreated),
    DstEscrowCreated(DstEscrowCreated),
    EscrowWithdrawal(WithdrawalArgs),
    EscrowCancelled,
    FundsRescued(RescueArgs),
}

impl SwapEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SrcEscrowCreated(_) => EventKind::SrcEscrowCreated,
            Self::DstEscrowCreated(_) => EventKind::DstEscrowCreated,
            Self::EscrowWithdrawal(_) => EventKind::EscrowWithdrawal,
            Self::EscrowCancelled => EventKind::EscrowCancelled,
            Self::FundsRescued(_) => EventKind::FundsRescued,
        }
    }

    /// Decode the arguments of `event` as `kind`.
    ///
    /// A missing or malformed argument fails the whole event.
    pub fn decode(kind: EventKind, event: &DecodedEvent) -> Result<Self, IndexerError> {
        let args = Args {
            schema: kind.schema_name(),
            root: &event.fields_json,
        };
        let decoded = match kind {
            EventKind::SrcEscrowCreated => {
                let src = args.object("srcImmutables")?;
                let dst = args.object("dstImmutablesComplement")?;
                let dst_chain = dst.u256("chainId")?;
                Self::SrcEscrowCreated(SrcEscrowCreated {
                    src: Immutables {
                        order_hash: src.b256("orderHash")?,
                        hashlock: src.b256("hashlock")?,
                        maker: src.u256("maker")?,
                        taker: src.u256("taker")?,
                        token: src.u256("token")?,
                        amount: src.u256("amount")?,
                        safety_deposit: src.u256("safetyDeposit")?,
                        timelocks: src.u256("timelocks")?,
                    },
                    dst: DstImmutablesComplement {
                        maker: dst.u256("maker")?,
                        amount: dst.u256("amount")?,
                        token: dst.u256("token")?,
                        safety_deposit: dst.u256("safetyDeposit")?,
                        chain_id: u64::try_from(dst_chain).map_err(|_| {
                            IndexerError::decode(kind.schema_name(), "chainId exceeds u64")
                        })?,
                    },
                })
            }
            EventKind::DstEscrowCreated => Self::DstEscrowCreated(DstEscrowCreated {
                escrow: args.address("escrow")?,
                hashlock: args.hash("hashlock")?,
                taker: decode_packed_address(args.u256("taker")?),
                src_cancellation_timestamp: args.optional_u64("srcCancellationTimestamp")?,
            }),
            EventKind::EscrowWithdrawal => Self::EscrowWithdrawal(WithdrawalArgs {
                secret: args.hash("secret")?,
            }),
            EventKind::EscrowCancelled => Self::EscrowCancelled,
            EventKind::FundsRescued => Self::FundsRescued(RescueArgs {
                token: args.address("token")?,
                amount: args.u256("amount")?,
            }),
        };
        Ok(decoded)
    }
}

/// Field accessor that turns every failure into a decode error for `schema`.
struct Args<'a> {
    schema: &'static str,
    root: &'a Value,
}

impl<'a> Args<'a> {
    fn field(&self, key: &str) -> Result<&'a Value, IndexerError> {
        match self.root.get(key) {
            Some(v) if !v.is_null() => Ok(v),
            _ => Err(IndexerError::decode(
                self.schema,
                format!("missing field `{key}`"),
            )),
        }
    }

    fn wrap<T>(&self, key: &str, r: Result<T, String>) -> Result<T, IndexerError> {
        r.map_err(|reason| IndexerError::decode(self.schema, format!("`{key}`: {reason}")))
    }

    fn object(&self, key: &str) -> Result<Args<'a>, IndexerError> {
        let v = self.field(key)?;
        if !v.is_object() {
            return Err(IndexerError::decode(
                self.schema,
                format!("`{key}` is not a struct"),
            ));
        }
        Ok(Args {
            schema: self.schema,
            root: v,
        })
    }

    fn u256(&self, key: &str) -> Result<U256, IndexerError> {
        let v = self.field(key)?;
        self.wrap(key, codec::parse_u256(v))
    }

    fn optional_u64(&self, key: &str) -> Result<Option<u64>, IndexerError> {
        match self.root.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => {
                let n = self.wrap(key, codec::parse_u256(v))?;
                let n = self.wrap(key, u64::try_from(n).map_err(|_| "exceeds u64".to_string()))?;
                Ok(Some(n))
            }
        }
    }

    fn hash(&self, key: &str) -> Result<String, IndexerError> {
        let v = self.field(key)?;
        self.wrap(key, codec::parse_b256(v))
    }

    fn b256(&self, key: &str) -> Result<B256, IndexerError> {
        let s = self.hash(key)?;
        self.wrap(key, s.parse::<B256>().map_err(|e| e.to_string()))
    }

    fn address(&self, key: &str) -> Result<String, IndexerError> {
        let v = self.field(key)?;
        self.wrap(key, codec::parse_address(v))
    }
}
