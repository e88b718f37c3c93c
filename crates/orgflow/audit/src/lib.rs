//! Orgflow Audit - append-only event log contract
//!
//! The engine writes one event per mutation and never reads the log back for
//! decisions. Sinks are fire-and-forget from the engine's perspective: a
//! failed append is surfaced as a logged error, never as a rolled-back
//! operation.

#![deny(unsafe_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use thiserror::Error;
use uuid::Uuid;

/// One auditable mutation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    /// Action-specific payload, typically before/after status and level.
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Payload helper for state-machine transitions.
    pub fn transition_payload(
        before_status: &str,
        after_status: &str,
        before_level: u32,
        after_level: u32,
    ) -> serde_json::Value {
        serde_json::json!({
            "before": { "status": before_status, "level": before_level },
            "after": { "status": after_status, "level": after_level },
        })
    }
}

/// A stored audit record, hash-linked to its predecessor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_id: String,
    pub sequence: u64,
    #[serde(flatten)]
    pub event: AuditEvent,
    pub previous_hash: Option<String>,
    pub hash: String,
}

/// Audit sink failures. These never abort the primary operation.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("sink error: {0}")]
    Sink(String),
}

/// Append-only audit sink.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one event and return the canonical stored record.
    async fn record(&self, event: AuditEvent) -> Result<AuditRecord, AuditError>;
}

/// Sink that discards everything; useful when wiring tests that do not
/// assert on the trail.
#[derive(Default)]
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<AuditRecord, AuditError> {
        Ok(AuditRecord {
            event_id: format!("audit-{}", Uuid::new_v4()),
            sequence: 0,
            event,
            previous_hash: None,
            hash: String::new(),
        })
    }
}

/// In-memory sink with a blake3 hash chain over the append order.
#[derive(Default)]
pub struct InMemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in append order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Latest hash anchor, if any event was recorded.
    pub fn latest_hash(&self) -> Option<String> {
        self.records
            .read()
            .ok()
            .and_then(|guard| guard.last().map(|record| record.hash.clone()))
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<AuditRecord, AuditError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| AuditError::Sink("audit lock poisoned".to_string()))?;

        let previous_hash = guard.last().map(|record| record.hash.clone());
        let sequence = guard.len() as u64 + 1;
        let hash = compute_hash(&event, previous_hash.as_deref(), sequence)?;

        let record = AuditRecord {
            event_id: format!("audit-{}", Uuid::new_v4()),
            sequence,
            event,
            previous_hash,
            hash,
        };
        guard.push(record.clone());
        Ok(record)
    }
}

fn compute_hash(
    event: &AuditEvent,
    previous_hash: Option<&str>,
    sequence: u64,
) -> Result<String, AuditError> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "actor_id": event.actor_id,
        "entity_type": event.entity_type,
        "entity_id": event.entity_id,
        "action": event.action,
        "payload": event.payload,
        "timestamp": event.timestamp,
    });
    let serialized =
        serde_json::to_vec(&serializable).map_err(|e| AuditError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}
