//! Event handler trait + registry.
//!
//! A handler never writes to storage. It reads what it needs through the
//! context, then returns every write it wants as one [`UnitOfWork`] which the
//! engine commits atomically.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::IndexerConfig;
use crate::entity::EscrowSide;
use crate::error::IndexerError;
use crate::event::{EventKind, SwapEvent};
use crate::store::{SwapStore, UnitOfWork};
use crate::types::EventMeta;

/// Everything a handler may look at while processing one event.
pub struct HandlerContext<'a> {
    pub meta: &'a EventMeta,
    pub store: &'a dyn SwapStore,
    pub config: &'a IndexerConfig,
    /// Side of the emitting escrow, for escrow-level events.
    pub side: Option<EscrowSide>,
}

/// An escrow address to start tracking once the unit of work is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub chain_id: u64,
    pub address: String,
    pub side: EscrowSide,
}

/// What a handler produced for one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerOutcome {
    pub unit: UnitOfWork,
    /// The event was already applied; `unit` is empty.
    pub duplicate: bool,
    pub discovered: Option<Discovery>,
}

impl HandlerOutcome {
    pub fn applied(unit: UnitOfWork) -> Self {
        Self {
            unit,
            ..Default::default()
        }
    }

    pub fn duplicate() -> Self {
        Self {
            duplicate: true,
            ..Default::default()
        }
    }

    pub fn discovering(mut self, discovery: Discovery) -> Self {
        self.discovered = Some(discovery);
        self
    }
}

/// Processes one kind of escrow event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// The event kind this handler processes.
    fn kind(&self) -> EventKind;

    async fn handle(
        &self,
        event: &SwapEvent,
        ctx: &HandlerContext<'_>,
    ) -> Result<HandlerOutcome, IndexerError>;
}

/// Registry of event handlers, one per [`EventKind`].
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handler for every event kind.
    pub fn standard() -> Self {
        use crate::handlers::*;

        let mut registry = Self::new();
        registry.on_event(Arc::new(SrcEscrowCreatedHandler));
        registry.on_event(Arc::new(DstEscrowCreatedHandler));
        registry.on_event(Arc::new(WithdrawalHandler));
        registry.on_event(Arc::new(CancellationHandler));
        registry.on_event(Arc::new(RescueHandler));
        registry
    }

    /// Register a handler, replacing any previous one for the same kind.
    pub fn on_event(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: EventKind) -> Option<&Arc<dyn EventHandler>> {
        self.handlers.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
