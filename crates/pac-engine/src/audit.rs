//! Audit Sink
//!
//! Append-only audit trail contract for every policy mutation and access
//! decision, plus a tamper-evident in-memory implementation with a sha2 hash
//! chain.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Record id
    pub id: Uuid,
    /// Action code, e.g. `rbac.template.updated`
    pub action: String,
    /// Acting administrator
    pub actor: String,
    /// Structured action payload
    pub details: serde_json::Value,
    /// When the action happened
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry stamped with the current time
    pub fn new(action: &str, actor: &str, details: serde_json::Value) -> Self {
        Self::at(action, actor, details, Utc::now())
    }

    /// Build an entry with an explicit timestamp
    pub fn at(action: &str, actor: &str, details: serde_json::Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.to_string(),
            actor: actor.to_string(),
            details,
            timestamp,
        }
    }
}

/// Durable append-only audit log
///
/// `append` must be durable when it returns: compliance-sensitive writes
/// (break-glass activation, policy updates) block on it before the operation
/// is considered settled.
pub trait AuditSink: Send + Sync {
    /// Append one record to the trail
    fn append(&self, entry: AuditEntry);
}

/// Sealed record in the in-memory trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedEntry {
    /// The audit record
    pub entry: AuditEntry,
    /// Hash of the previous record
    pub prev_hash: String,
    /// Hash covering this record and the previous hash
    pub hash: String,
}

impl SealedEntry {
    fn seal(entry: AuditEntry, prev_hash: &str) -> Self {
        let hash = Self::compute_hash(&entry, prev_hash);
        Self {
            entry,
            prev_hash: prev_hash.to_string(),
            hash,
        }
    }

    fn compute_hash(entry: &AuditEntry, prev_hash: &str) -> String {
        let data = format!(
            "{}|{}|{}|{}|{}|{}",
            entry.id, entry.timestamp, entry.action, entry.actor, entry.details, prev_hash
        );
        hex::encode(Sha256::digest(data.as_bytes()))
    }
}

/// In-memory audit sink with hash chain
pub struct MemoryAuditSink {
    events: RwLock<Vec<SealedEntry>>,
    last_hash: RwLock<String>,
}

impl MemoryAuditSink {
    /// Empty trail
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            last_hash: RwLock::new("genesis".into()),
        }
    }

    /// Most recent entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let events = self.events.read();
        events
            .iter()
            .rev()
            .take(limit)
            .map(|sealed| sealed.entry.clone())
            .collect()
    }

    /// All entries for one action code, oldest first
    pub fn for_action(&self, action: &str) -> Vec<AuditEntry> {
        self.events
            .read()
            .iter()
            .filter(|sealed| sealed.entry.action == action)
            .map(|sealed| sealed.entry.clone())
            .collect()
    }

    /// Total record count
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether the trail is empty
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Walk the hash chain and verify every link
    pub fn verify_integrity(&self) -> IntegrityResult {
        let events = self.events.read();
        let mut prev_hash = "genesis".to_string();
        let mut checked = 0;

        for sealed in events.iter() {
            if sealed.prev_hash != prev_hash {
                return IntegrityResult {
                    valid: false,
                    checked_count: checked,
                    error: Some(format!("hash chain broken at entry {}", sealed.entry.id)),
                };
            }
            let computed = SealedEntry::compute_hash(&sealed.entry, &prev_hash);
            if computed != sealed.hash {
                return IntegrityResult {
                    valid: false,
                    checked_count: checked,
                    error: Some(format!("entry {} hash mismatch", sealed.entry.id)),
                };
            }
            prev_hash = sealed.hash.clone();
            checked += 1;
        }

        IntegrityResult {
            valid: true,
            checked_count: checked,
            error: None,
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, entry: AuditEntry) {
        // Write lock on events doubles as the chain critical section
        let mut events = self.events.write();
        let prev_hash = self.last_hash.read().clone();
        let sealed = SealedEntry::seal(entry, &prev_hash);
        *self.last_hash.write() = sealed.hash.clone();
        events.push(sealed);
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a hash chain verification
#[derive(Debug, Clone)]
pub struct IntegrityResult {
    /// Whether every link checked out
    pub valid: bool,
    /// Records verified before stopping
    pub checked_count: usize,
    /// First broken link, if any
    pub error: Option<String>,
}
