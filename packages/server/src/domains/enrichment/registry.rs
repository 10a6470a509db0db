//! Handler registry mapping job kinds to their enrichment logic.
//!
//! Each job kind registers a handler at startup. The runner claims tasks
//! from the database and dispatches them here without knowing the concrete
//! handler types.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::kernel::ServerKernel;

use super::models::JobKind;

/// What processing one target produced.
#[derive(Debug, Clone, Default)]
pub struct TaskOutcome {
    /// True when something was written to the target
    pub changed: bool,
    /// Handler-specific detail stored on the task row
    pub result: Option<Value>,
}

impl TaskOutcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn changed(result: Value) -> Self {
        Self {
            changed: true,
            result: Some(result),
        }
    }

    pub fn skipped(reason: &str) -> Self {
        Self {
            changed: false,
            result: Some(serde_json::json!({ "skipped": reason })),
        }
    }
}

/// One enrichment job family: how to find its targets and process one.
#[async_trait]
pub trait EnrichmentHandler: Send + Sync {
    fn kind(&self) -> JobKind;

    /// All target IDs a fresh run of this kind should cover, in stable order.
    async fn targets(&self, kernel: &ServerKernel) -> Result<Vec<Uuid>>;

    /// Process a single target. An Err marks the task failed; the run
    /// continues with the remaining targets.
    async fn process(&self, target_id: Uuid, kernel: &ServerKernel) -> Result<TaskOutcome>;
}

impl std::fmt::Debug for dyn EnrichmentHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EnrichmentHandler")
            .field(&self.kind())
            .finish()
    }
}

/// Registry keyed by job kind.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobKind, Arc<dyn EnrichmentHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn EnrichmentHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: JobKind) -> Result<Arc<dyn EnrichmentHandler>> {
        self.handlers.get(&kind).cloned().ok_or_else(|| {
            anyhow!(
                "No handler registered for job kind {} (registered: {:?})",
                kind,
                self.registered_kinds()
            )
        })
    }

    pub fn is_registered(&self, kind: JobKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn registered_kinds(&self) -> Vec<JobKind> {
        self.handlers.keys().copied().collect()
    }
}

/// Thread-safe registry wrapped in Arc.
pub type SharedHandlerRegistry = Arc<HandlerRegistry>;
